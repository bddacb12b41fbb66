use crate::api::error::AppError;
use crate::entities::{ingredients, prelude::*, tags};
use crate::utils::image::{decode_data_uri, sniff_image};
use crate::utils::validation::{
    BLANK, FieldErrors, IntError, REQUIRED, display_value, parse_id, parse_positive_small_int,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QuerySelect};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::RecipeService;
use super::types::*;

const MISSING_LIST: &str = "Missing field or empty value.";
const NAME_MAX_LENGTH: usize = 256;

static ABSENT: Value = Value::Null;

impl RecipeService {
    /// Runs every check and reports all failures together.
    pub async fn validate(
        &self,
        payload: RecipePayload,
        mode: WriteMode,
    ) -> Result<ValidatedRecipe, AppError> {
        let RecipePayload { fields, image_file } = payload;
        let mut errors = FieldErrors::new();
        let mut validated = ValidatedRecipe::default();

        match validate_text(&fields, "name", Some(NAME_MAX_LENGTH), mode) {
            Ok(v) => validated.name = v,
            Err(msg) => errors.add("name", msg),
        }
        match validate_text(&fields, "text", None, mode) {
            Ok(v) => validated.text = v,
            Err(msg) => errors.add("text", msg),
        }
        match validate_cooking_time(&fields, mode) {
            Ok(v) => validated.cooking_time = v,
            Err(msg) => errors.add("cooking_time", msg),
        }

        let image = match image_file {
            Some(bytes) => Some(sniff_image(bytes, self.config.max_image_size).map_err(|e| e.to_string())),
            None => match fields.get("image") {
                None if mode == WriteMode::Create => Some(Err(REQUIRED.to_string())),
                None => None,
                Some(Value::String(uri)) => Some(
                    decode_data_uri(uri, self.config.max_image_size).map_err(|e| e.to_string()),
                ),
                Some(_) => Some(Err(
                    "No file was submitted. Check the encoding type on the form.".to_string(),
                )),
            },
        };
        match image {
            Some(Ok(img)) => validated.image = Some(img),
            Some(Err(msg)) => errors.add("image", msg),
            None => {}
        }

        if let Some(value) = list_field(&fields, "ingredients", mode) {
            let known = self.known_ingredients(value).await?;
            match validate_ingredient_entries(value, &known) {
                Ok(items) => validated.ingredients = Some(items),
                Err(messages) => messages.into_iter().for_each(|m| errors.add("ingredients", m)),
            }
        }

        if let Some(value) = list_field(&fields, "tags", mode) {
            let known = self.known_tags(value).await?;
            match validate_tag_entries(value, &known) {
                Ok(items) => validated.tags = Some(items),
                Err(messages) => messages.into_iter().for_each(|m| errors.add("tags", m)),
            }
        }

        errors.into_result()?;
        Ok(validated)
    }

    async fn known_ingredients(&self, value: &Value) -> Result<HashSet<i32>, AppError> {
        let ids = submitted_ids(value, |entry| entry.get("id"));
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let found: Vec<i32> = Ingredients::find()
            .select_only()
            .column(ingredients::Column::Id)
            .filter(ingredients::Column::Id.is_in(ids))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(found.into_iter().collect())
    }

    async fn known_tags(&self, value: &Value) -> Result<HashSet<i32>, AppError> {
        let ids = submitted_ids(value, Some);
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let found: Vec<i32> = Tags::find()
            .select_only()
            .column(tags::Column::Id)
            .filter(tags::Column::Id.is_in(ids))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(found.into_iter().collect())
    }
}

fn submitted_ids<'a>(value: &'a Value, id_of: impl Fn(&'a Value) -> Option<&'a Value>) -> Vec<i32> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(&id_of).filter_map(parse_id).collect())
        .unwrap_or_default()
}

/// `None` when the list may be left out (partial update). On create an absent
/// list is validated as `null` so it reports the missing-value error.
fn list_field<'a>(fields: &'a Map<String, Value>, key: &str, mode: WriteMode) -> Option<&'a Value> {
    match (fields.get(key), mode) {
        (Some(value), _) => Some(value),
        (None, WriteMode::Create) => Some(&ABSENT),
        (None, WriteMode::Update) => None,
    }
}

fn validate_text(
    fields: &Map<String, Value>,
    key: &str,
    max_length: Option<usize>,
    mode: WriteMode,
) -> Result<Option<String>, String> {
    let value = match fields.get(key) {
        None if mode == WriteMode::Create => return Err(REQUIRED.to_string()),
        None => return Ok(None),
        Some(value) => value,
    };

    let text = match value {
        Value::String(s) => s.trim(),
        Value::Null => return Err("This field may not be null.".to_string()),
        _ => return Err("Not a valid string.".to_string()),
    };
    if text.is_empty() {
        return Err(BLANK.to_string());
    }
    if let Some(max) = max_length.filter(|max| text.chars().count() > *max) {
        return Err(format!(
            "Ensure this field has no more than {} characters.",
            max
        ));
    }
    Ok(Some(text.to_string()))
}

fn validate_cooking_time(fields: &Map<String, Value>, mode: WriteMode) -> Result<Option<i32>, String> {
    let value = match fields.get("cooking_time") {
        None if mode == WriteMode::Create => return Err(REQUIRED.to_string()),
        None => return Ok(None),
        Some(value) => value,
    };

    parse_positive_small_int(value)
        .map(Some)
        .map_err(|e| match e {
            IntError::NotANumber => "A valid integer is required.".to_string(),
            IntError::NotPositive => "Ensure this value is greater than or equal to 1.".to_string(),
            IntError::TooLarge => "Ensure this value is less than or equal to 32767.".to_string(),
        })
}

/// Checks `[{id, amount}, ...]` against the ids that exist.
pub fn validate_ingredient_entries(
    value: &Value,
    known: &HashSet<i32>,
) -> Result<Vec<IngredientAmount>, Vec<String>> {
    let entries = match value.as_array() {
        Some(entries) if !entries.is_empty() => entries,
        _ => return Err(vec![MISSING_LIST.to_string()]),
    };

    let mut errors = Vec::new();
    let mut items = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();

    for entry in entries {
        let raw_id = match entry.get("id") {
            Some(id) if !id.is_null() => id,
            _ => {
                errors.push("Missing field 'id'.".to_string());
                continue;
            }
        };

        let ingredient_id = parse_id(raw_id).filter(|id| known.contains(id));
        match ingredient_id {
            None => errors.push(format!(
                "Ingredient with id = {} not found.",
                display_value(raw_id)
            )),
            Some(id) if !seen.insert(id) => {
                errors.push(format!(
                    "Ingredient with id = {} is listed more than once.",
                    id
                ));
            }
            Some(_) => {}
        }

        let amount = match entry.get("amount") {
            Some(amount) if !amount.is_null() => amount,
            _ => {
                errors.push("Missing field 'amount'.".to_string());
                continue;
            }
        };

        let amount = match parse_positive_small_int(amount) {
            Ok(amount) => amount,
            Err(IntError::NotANumber) => {
                errors.push("Field 'amount' must be a number.".to_string());
                continue;
            }
            Err(IntError::NotPositive) => {
                errors.push("Field 'amount' must be greater than 0.".to_string());
                continue;
            }
            Err(IntError::TooLarge) => {
                errors.push("Field 'amount' must be less than or equal to 32767.".to_string());
                continue;
            }
        };

        if let Some(ingredient_id) = ingredient_id {
            items.push(IngredientAmount {
                ingredient_id,
                amount,
            });
        }
    }

    if errors.is_empty() { Ok(items) } else { Err(errors) }
}

/// Checks `[tag_id, ...]` against the ids that exist.
pub fn validate_tag_entries(value: &Value, known: &HashSet<i32>) -> Result<Vec<i32>, Vec<String>> {
    let entries = match value.as_array() {
        Some(entries) if !entries.is_empty() => entries,
        _ => return Err(vec![MISSING_LIST.to_string()]),
    };

    let mut errors = Vec::new();
    let mut ids = Vec::with_capacity(entries.len());

    for entry in entries {
        match parse_id(entry).filter(|id| known.contains(id)) {
            None => errors.push(format!("Tag with id = {} not found.", display_value(entry))),
            Some(id) if ids.contains(&id) => {
                errors.push(format!("Tag with id = {} is listed more than once.", id))
            }
            Some(id) => ids.push(id),
        }
    }

    if errors.is_empty() { Ok(ids) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known(ids: &[i32]) -> HashSet<i32> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_ingredients_accept_int_and_numeric_string() {
        let value = json!([{"id": 1, "amount": 100}, {"id": "2", "amount": "50"}]);
        let items = validate_ingredient_entries(&value, &known(&[1, 2])).unwrap();
        assert_eq!(
            items,
            vec![
                IngredientAmount {
                    ingredient_id: 1,
                    amount: 100
                },
                IngredientAmount {
                    ingredient_id: 2,
                    amount: 50
                },
            ]
        );
    }

    #[test]
    fn test_ingredients_collect_every_error() {
        let value = json!([
            {"id": 1, "amount": 0},
            {"id": 99, "amount": 5},
            {"amount": 5},
            {"id": 2, "amount": "lots"},
            {"id": 3},
        ]);
        let errors = validate_ingredient_entries(&value, &known(&[1, 2, 3])).unwrap_err();
        assert_eq!(
            errors,
            vec![
                "Field 'amount' must be greater than 0.",
                "Ingredient with id = 99 not found.",
                "Missing field 'id'.",
                "Field 'amount' must be a number.",
                "Missing field 'amount'.",
            ]
        );
    }

    #[test]
    fn test_ingredients_missing_or_empty() {
        let expected = vec![MISSING_LIST.to_string()];
        assert_eq!(
            validate_ingredient_entries(&Value::Null, &known(&[])).unwrap_err(),
            expected
        );
        assert_eq!(
            validate_ingredient_entries(&json!([]), &known(&[])).unwrap_err(),
            expected
        );
    }

    #[test]
    fn test_ingredients_reject_duplicates() {
        let value = json!([{"id": 1, "amount": 1}, {"id": 1, "amount": 2}]);
        let errors = validate_ingredient_entries(&value, &known(&[1])).unwrap_err();
        assert_eq!(errors, vec!["Ingredient with id = 1 is listed more than once."]);
    }

    #[test]
    fn test_tags() {
        assert_eq!(
            validate_tag_entries(&json!([1, "2"]), &known(&[1, 2])).unwrap(),
            vec![1, 2]
        );
        assert_eq!(
            validate_tag_entries(&json!([1, 5, "x"]), &known(&[1])).unwrap_err(),
            vec!["Tag with id = 5 not found.", "Tag with id = x not found."]
        );
        assert_eq!(
            validate_tag_entries(&json!([]), &known(&[1])).unwrap_err(),
            vec![MISSING_LIST]
        );
    }

    #[test]
    fn test_text_fields() {
        let fields = json!({"name": "  ", "text": 5}).as_object().cloned().unwrap();
        assert_eq!(
            validate_text(&fields, "name", Some(256), WriteMode::Create).unwrap_err(),
            BLANK
        );
        assert_eq!(
            validate_text(&fields, "text", None, WriteMode::Create).unwrap_err(),
            "Not a valid string."
        );

        let empty = Map::new();
        assert_eq!(
            validate_text(&empty, "name", Some(256), WriteMode::Create).unwrap_err(),
            REQUIRED
        );
        assert_eq!(
            validate_text(&empty, "name", Some(256), WriteMode::Update).unwrap(),
            None
        );
    }

    #[test]
    fn test_cooking_time() {
        let fields = |v: Value| json!({ "cooking_time": v }).as_object().cloned().unwrap();
        assert_eq!(
            validate_cooking_time(&fields(json!(15)), WriteMode::Create).unwrap(),
            Some(15)
        );
        assert_eq!(
            validate_cooking_time(&fields(json!(0)), WriteMode::Create).unwrap_err(),
            "Ensure this value is greater than or equal to 1."
        );
        assert_eq!(
            validate_cooking_time(&Map::new(), WriteMode::Update).unwrap(),
            None
        );
    }
}
