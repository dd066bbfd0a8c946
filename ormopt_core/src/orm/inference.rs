//! Inference of the index sets of a record sourced parameter or variable
//!
//! A set built from `Food.id` indexes every component whose data is keyed by `Food.id`.
//! For tuple indices each column is looked up locally, and foreign key columns are also
//! followed to the record type they reference, so `FoodNutrientAmount.food_id` finds the set
//! built from `Food.id`.
use log::warn;

use crate::optimize::set::SetComponent;
use crate::orm::{IndexSpec, OrmError};
use crate::store::Schema;

/// Find the declared sets indexing data of `origin_type` keyed by `spec`
///
/// Results keep declaration order. Several sets matching the same column are all returned
/// and reported with a warning, no match at all is not an error.
pub fn infer_index_sets<'a>(
    schema: &Schema,
    origin_type: &str,
    spec: &IndexSpec,
    declared_sets: impl IntoIterator<Item = &'a SetComponent>,
) -> Result<Vec<&'a SetComponent>, OrmError> {
    let declared: Vec<&SetComponent> = declared_sets.into_iter().collect();
    let record_type = schema.record_type(origin_type)?;
    let matching = |rt: &str, attr: &str| -> Vec<&'a SetComponent> {
        declared
            .iter()
            .copied()
            .filter(|s| s.origin().is_some_and(|o| o.matches(rt, attr)))
            .collect()
    };

    let mut inferred = Vec::new();
    for name in spec.columns() {
        let column = record_type.column(name)?;
        let mut found = matching(origin_type, name);
        // Only tuple indices follow foreign keys
        if let (IndexSpec::Multi(_), Some(fk)) = (spec, &column.foreign_key) {
            let target = schema.resolve_foreign_key(fk)?;
            found.extend(matching(&target.name, &fk.column));
        }
        if found.len() > 1 {
            warn!(
                "{}.{} is indexed by several sets: {}",
                origin_type,
                name,
                found.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
            );
        }
        inferred.extend(found);
    }
    Ok(inferred)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::{OrmOrigin, RecordSource};
    use crate::store::memory::tests::diet_schema;
    use crate::store::QuerySet;

    fn record_set(name: &str, record_type: &str, from_attr: &str) -> SetComponent {
        SetComponent::from_records(
            name,
            RecordSource {
                origin: OrmOrigin::new(record_type, from_attr),
                indexed_by: IndexSpec::NoIndex,
                queryset: QuerySet::all(record_type),
            },
        )
    }

    fn names(sets: &[&SetComponent]) -> Vec<String> {
        sets.iter().map(|s| s.name.clone()).collect()
    }

    #[test]
    fn no_index_has_no_sets() {
        let declared = [record_set("foods", "Food", "id")];
        let sets = infer_index_sets(&diet_schema(), "Food", &IndexSpec::NoIndex, &declared).unwrap();
        assert!(sets.is_empty());
    }

    #[test]
    fn single_index_keeps_every_match_in_order() {
        let declared = [
            record_set("foods", "Food", "id"),
            record_set("nutrients", "Nutrient", "id"),
            record_set("more_foods", "Food", "id"),
            record_set("food_names", "Food", "name"),
            SetComponent::with_members("fixed", [1, 2]),
        ];
        let sets = infer_index_sets(&diet_schema(), "Food", &"id".into(), &declared).unwrap();
        assert_eq!(names(&sets), vec!["foods", "more_foods"]);
    }

    #[test]
    fn single_index_does_not_follow_foreign_keys() {
        let declared = [record_set("foods", "Food", "id")];
        let sets =
            infer_index_sets(&diet_schema(), "FoodNutrientAmount", &"food_id".into(), &declared).unwrap();
        assert!(sets.is_empty());
    }

    #[test]
    fn tuple_index_follows_foreign_keys() {
        let declared = [
            record_set("foods", "Food", "id"),
            record_set("nutrients", "Nutrient", "id"),
        ];
        let spec = IndexSpec::from(["food_id", "nutrient_id"]);
        let sets = infer_index_sets(&diet_schema(), "FoodNutrientAmount", &spec, &declared).unwrap();
        assert_eq!(names(&sets), vec!["foods", "nutrients"]);
    }

    #[test]
    fn tuple_index_puts_local_matches_first() {
        let declared = [
            record_set("foods", "Food", "id"),
            record_set("amount_foods", "FoodNutrientAmount", "food_id"),
            record_set("nutrients", "Nutrient", "id"),
        ];
        let spec = IndexSpec::from(["food_id", "nutrient_id"]);
        let sets = infer_index_sets(&diet_schema(), "FoodNutrientAmount", &spec, &declared).unwrap();
        assert_eq!(names(&sets), vec!["amount_foods", "foods", "nutrients"]);
    }

    #[test]
    fn unknown_columns_are_missing_attributes() {
        let declared = [record_set("foods", "Food", "id")];
        let res = infer_index_sets(&diet_schema(), "Food", &"colour".into(), &declared);
        if let Err(OrmError::MissingAttribute {
            record_type,
            attribute,
        }) = res
        {
            assert_eq!(record_type, "Food");
            assert_eq!(attribute, "colour");
        } else {
            panic!("Missing attribute not caught")
        }
        let spec = IndexSpec::from(["food_id", "colour"]);
        let res = infer_index_sets(&diet_schema(), "FoodNutrientAmount", &spec, &declared);
        assert!(matches!(res, Err(OrmError::MissingAttribute { .. })));
    }

    #[test]
    fn dangling_foreign_key_is_unknown_table() {
        // Registration rejects these, a deserialized schema can still hold one
        let mut json = serde_json::to_value(diet_schema()).unwrap();
        json["record_types"]["FoodNutrientAmount"]["columns"]["food_id"]["foreign_key"]["table"] =
            "pantry".into();
        let schema: Schema = serde_json::from_value(json).unwrap();
        let declared = [record_set("foods", "Food", "id")];
        let spec = IndexSpec::from(["food_id", "nutrient_id"]);
        let res = infer_index_sets(&schema, "FoodNutrientAmount", &spec, &declared);
        if let Err(OrmError::UnknownTable(table)) = res {
            assert_eq!(table, "pantry");
        } else {
            panic!("Dangling foreign key not caught")
        }
    }
}
