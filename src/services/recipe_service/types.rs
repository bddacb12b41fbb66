use crate::utils::image::DecodedImage;
use serde::Deserialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Documentation-only shape of a recipe write request. The handlers accept
/// the raw JSON object so that every problem can be reported per field.
#[allow(dead_code)]
#[derive(Deserialize, ToSchema)]
pub struct RecipeWriteRequest {
    pub ingredients: Vec<IngredientAmountRequest>,
    pub tags: Vec<i32>,
    /// `data:image/<type>;base64,<payload>`
    pub image: String,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

#[allow(dead_code)]
#[derive(Deserialize, ToSchema)]
pub struct IngredientAmountRequest {
    pub id: i32,
    /// Integer or numeric string
    pub amount: i32,
}

/// A recipe write as received: JSON object fields plus an optional binary
/// image from a multipart upload.
#[derive(Debug, Default, Clone)]
pub struct RecipePayload {
    pub fields: Map<String, Value>,
    pub image_file: Option<Vec<u8>>,
}

impl RecipePayload {
    pub fn from_json(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            image_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Every field is required.
    Create,
    /// Absent fields keep their stored value.
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub ingredient_id: i32,
    pub amount: i32,
}

/// Output of validation; `None` means "not supplied".
#[derive(Debug, Default)]
pub struct ValidatedRecipe {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<DecodedImage>,
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<i32>>,
}
