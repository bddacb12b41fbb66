use crate::AppState;
use crate::api::error::AppError;
use crate::services::storage::validate_key;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

#[utoipa::path(
    get,
    path = "/media/{key}",
    params(("key" = String, Path, description = "Storage key, e.g. recipes/images/<uuid>.png")),
    responses(
        (status = 200, description = "Stored image"),
        (status = 404, description = "No such file")
    ),
    tag = "media"
)]
pub async fn serve_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let not_found = || AppError::NotFound("File not found".to_string());

    validate_key(&key).map_err(|_| not_found())?;
    if !state.storage.file_exists(&key).await? {
        return Err(not_found());
    }

    let data = state.storage.get_file(&key).await?;
    let content_type = infer::get(&data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], data))
}
