use crate::AppState;
use crate::api::error::AppError;
use crate::entities::prelude::{Tokens, Users};
use crate::utils::auth::validate_jwt;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use sea_orm::EntityTrait;

/// The authenticated caller, inserted by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub jti: String,
}

/// The caller of a route open to anonymous users, inserted by
/// [`optional_auth_middleware`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewer(pub Option<i32>);

impl Viewer {
    pub fn require(&self) -> Result<i32, AppError> {
        self.0.ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        })
    }
}

fn extract_token(req: &Request) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("Token ")))
        .map(|s| s.trim().to_string())
}

async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, StatusCode> {
    let claims =
        validate_jwt(token, &state.config.jwt_secret).map_err(|_| StatusCode::UNAUTHORIZED)?;
    let user_id = claims.user_id().ok_or(StatusCode::UNAUTHORIZED)?;

    // Revoked tokens have no row
    let issued = Tokens::find_by_id(claims.jti.clone())
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .filter(|t| t.user_id == user_id && t.expires_at > Utc::now())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user_exists = Users::find_by_id(issued.user_id)
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some();

    if !user_exists {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(AuthUser {
        id: user_id,
        jti: claims.jti,
    })
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_token(&req).ok_or(StatusCode::UNAUTHORIZED)?;
    let user = authenticate(&state, &token).await?;

    req.extensions_mut().insert(Viewer(Some(user.id)));
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Lets anonymous requests through; a present but invalid token is still a 401.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let viewer = match extract_token(&req) {
        Some(token) => {
            let user = authenticate(&state, &token).await?;
            let viewer = Viewer(Some(user.id));
            req.extensions_mut().insert(user);
            viewer
        }
        None => Viewer(None),
    };

    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}
