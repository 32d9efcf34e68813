pub mod jwt;
pub mod principal;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;

use crate::models::ParseEnumError;
use crate::services::{parse_optional_uuid, ServiceError, ServiceResult};
use crate::{error::AppError, state::AppState};

pub use principal::{Principal, Role};

pub const ROLE_HEADER: &str = "x-user-role";
pub const ORG_HEADER: &str = "x-org-id";
pub const DRIVER_HEADER: &str = "x-driver-id";

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if parts.headers.contains_key(AUTHORIZATION) {
            let TypedHeader(Authorization(bearer)) =
                TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                    .await
                    .map_err(|_| AppError::unauthorized("invalid authorization header"))?;

            let claims = state
                .jwt
                .verify_token(bearer.token())
                .map_err(|_| AppError::unauthorized("invalid token"))?;

            return claims.principal().map_err(|err| {
                tracing::debug!(error = %err, "rejecting token claims");
                AppError::unauthorized("invalid token")
            });
        }

        if !state.config.trust_identity_headers {
            return Err(AppError::unauthorized("missing bearer token"));
        }

        principal_from_headers(&parts.headers)
    }
}

fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, AppError> {
    let role = match header_value(headers, ROLE_HEADER)?.map(str::trim) {
        Some(role) if !role.is_empty() => role,
        _ => return Err(AppError::unauthorized("missing user role")),
    };

    Ok(resolve_principal(
        role,
        header_value(headers, ORG_HEADER)?,
        header_value(headers, DRIVER_HEADER)?,
    )?)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AppError> {
    match headers.get(name) {
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| AppError::bad_request(format!("invalid {name} header"))),
        None => Ok(None),
    }
}

/// Decodes gateway-provided identity values. Blank ids count as absent.
pub fn resolve_principal(
    role: &str,
    org_id: Option<&str>,
    driver_id: Option<&str>,
) -> ServiceResult<Principal> {
    let role: Role = role
        .parse()
        .map_err(|err: ParseEnumError| ServiceError::invalid(err.to_string()))?;
    let org_id = parse_optional_uuid(non_blank(org_id), "organization id")?;
    let driver_id = parse_optional_uuid(non_blank(driver_id), "driver id")?;
    Ok(Principal::new(role, org_id, driver_id))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
