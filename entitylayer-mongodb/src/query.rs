//! Condition translation from entitylayer trees to MongoDB query syntax.
//!
//! This module translates [`Condition`] trees into MongoDB BSON filter
//! documents for execution by the MongoDB query engine.

use bson::{Bson, Document, doc};

use entitylayer_core::{
    condition::{CompareOp, Condition, ConditionVisitor},
    error::EntityLayerError,
};

/// Translates condition trees into MongoDB filter documents.
///
/// This struct implements the [`ConditionVisitor`] trait to convert abstract
/// conditions into MongoDB's native BSON query syntax.
pub(crate) struct MongoConditionTranslator;

impl ConditionVisitor for MongoConditionTranslator {
    type Output = Document;
    type Error = EntityLayerError;

    fn visit_and(&mut self, conditions: &[Condition]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": conditions
                .iter()
                .map(|condition| self.visit_condition(condition))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, conditions: &[Condition]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": conditions
                .iter()
                .map(|condition| self.visit_condition(condition))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, condition: &Condition) -> Result<Self::Output, Self::Error> {
        // MongoDB has no top-level $not; $nor over a single branch is the
        // equivalent form.
        Ok(doc! {
            "$nor": [self.visit_condition(condition)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_compare(
        &mut self,
        field: &str,
        op: &CompareOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                CompareOp::Eq => doc! { "$eq": value },
                CompareOp::Ne => doc! { "$ne": value },
                CompareOp::Gt => doc! { "$gt": value },
                CompareOp::Gte => doc! { "$gte": value },
                CompareOp::Lt => doc! { "$lt": value },
                CompareOp::Lte => doc! { "$lte": value },
                CompareOp::In => doc! { "$in": value },
                CompareOp::NotIn => doc! { "$nin": value },
                CompareOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": format!(".*{}.*", s), "$options": "i" },
                    _ => doc! { "$all": [value] },
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(condition: &Condition) -> Document {
        MongoConditionTranslator.visit_condition(condition).unwrap()
    }

    #[test]
    fn compound_conditions_nest_under_logical_operators() {
        let filter = translate(
            &Condition::eq("make", "Toyota").and(Condition::gte("year", 2020)),
        );

        assert_eq!(
            filter,
            doc! { "$and": [
                { "make": { "$eq": "Toyota" } },
                { "year": { "$gte": 2020 } },
            ] }
        );
    }

    #[test]
    fn negation_uses_nor() {
        let filter = translate(&Condition::eq("make", "Toyota").negate());

        assert_eq!(filter, doc! { "$nor": [{ "make": { "$eq": "Toyota" } }] });
    }

    #[test]
    fn membership_maps_to_in_and_nin() {
        let filter = translate(&Condition::any_of("make", ["Toyota", "Honda"]));
        assert_eq!(filter, doc! { "make": { "$in": ["Toyota", "Honda"] } });

        let filter = translate(&Condition::none_of("make", ["Kia"]));
        assert_eq!(filter, doc! { "make": { "$nin": ["Kia"] } });
    }

    #[test]
    fn contains_is_regex_for_strings_and_all_for_values() {
        let filter = translate(&Condition::contains("model", "oroll"));
        assert_eq!(
            filter,
            doc! { "model": { "$regex": ".*oroll.*", "$options": "i" } }
        );

        let filter = translate(&Condition::contains("tags", 7));
        assert_eq!(filter, doc! { "tags": { "$all": [7] } });
    }

    #[test]
    fn exists_translates_directly() {
        assert_eq!(
            translate(&Condition::exists("price")),
            doc! { "price": { "$exists": true } }
        );
        assert_eq!(
            translate(&Condition::not_exists("price")),
            doc! { "price": { "$exists": false } }
        );
    }
}
