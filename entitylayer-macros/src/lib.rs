//! Procedural macros for the entitylayer project.
//!
//! This crate provides compile-time code generation for the entitylayer
//! framework, currently the [`Entity`](macro@Entity) derive macro.

#[allow(unused_extern_crates)]
extern crate self as entitylayer_macros;

use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derives the `Entity` trait for a struct.
///
/// The struct must have an `id: String` field and an `updated_at: i64` field.
/// The collection name is mandatory; the schema version defaults to `1.0.0`.
///
/// ```ignore
/// use entitylayer::prelude::*;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
/// #[entity(collection = "conversations", version = "2.1.0")]
/// pub struct Conversation {
///     pub id: String,
///     pub version: String,
///     pub updated_at: i64,
///     pub title: String,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let mut collection: Option<LitStr> = None;
    let mut version: Option<LitStr> = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                collection = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("version") {
                version = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported entity attribute, expected `collection` or `version`"))
            }
        });

        if let Err(error) = parsed {
            return error.to_compile_error().into();
        }
    }

    let Some(collection) = collection else {
        return syn::Error::new_spanned(
            &input.ident,
            "Entity derive requires #[entity(collection = \"...\")]",
        )
        .to_compile_error()
        .into();
    };
    let version = version.unwrap_or_else(|| LitStr::new("1.0.0", name.span()));

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    &input.ident,
                    "Entity can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(&input.ident, "Entity can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let has_field = |wanted: &str| {
        fields
            .iter()
            .any(|field| field.ident.as_ref().is_some_and(|ident| ident == wanted))
    };

    for (field, ty) in [("id", "String"), ("updated_at", "i64")] {
        if !has_field(field) {
            return syn::Error::new_spanned(
                &input.ident,
                format!("Entity derive requires a `{field}: {ty}` field"),
            )
            .to_compile_error()
            .into();
        }
    }

    let expanded = quote! {
        impl ::entitylayer_core::entity::Entity for #name {
            fn collection_name() -> &'static str {
                #collection
            }

            fn schema_version() -> &'static str {
                #version
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn updated_at(&self) -> i64 {
                self.updated_at
            }

            fn set_updated_at(&mut self, updated_at: i64) {
                self.updated_at = updated_at;
            }
        }
    };

    expanded.into()
}
