//! Authentication middleware
//!
//! Validates the bearer JWT issued by the auth service and exposes the
//! caller's household and user ids to handlers.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Household and acting user extracted from the JWT
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HouseholdContext {
    pub user_id: Uuid,
    pub household_id: Uuid,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    let context = match decode_context(token, &state.config.jwt.secret) {
        Ok(context) => context,
        Err(msg) => return unauthorized_response(&msg),
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub household_id: String,
    pub exp: i64,
    pub iat: i64,
}

/// Decode a token into the household context it grants
pub fn decode_context(token: &str, secret: &str) -> Result<HouseholdContext, String> {
    let claims = decode_jwt(token, secret)?;

    let user_id =
        Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token".to_string())?;
    let household_id = Uuid::parse_str(&claims.household_id)
        .map_err(|_| "Invalid household ID in token".to_string())?;

    Ok(HouseholdContext {
        user_id,
        household_id,
    })
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}

/// Extractor for the authenticated household context
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser(pub HouseholdContext);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<HouseholdContext>()
            .copied()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}
