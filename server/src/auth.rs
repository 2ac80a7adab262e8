//! Caller identity supplied by the authentication gateway.
//!
//! Credentials are checked upstream; the gateway forwards the verified user
//! as headers and this extractor trusts them.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::models::{Caller, Role};
use crate::utils::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_DEPARTMENT_HEADER: &str = "x-user-department";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, AppError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| AppError::AuthError(format!("Malformed {name} header")))
        })
        .transpose()
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER)?
            .ok_or_else(|| AppError::AuthError("Missing caller identity".to_string()))?;
        let id = Uuid::parse_str(id)
            .map_err(|_| AppError::AuthError("Caller id is not a valid UUID".to_string()))?;

        let role: Role = header(parts, USER_ROLE_HEADER)?
            .ok_or_else(|| AppError::AuthError("Missing caller role".to_string()))?
            .parse()
            .map_err(AppError::AuthError)?;

        let department = header(parts, USER_DEPARTMENT_HEADER)?
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(Caller {
            id,
            role,
            department,
        })
    }
}
