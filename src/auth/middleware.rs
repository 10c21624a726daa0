use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AuthError;
use crate::model::role::Role;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::AUTHORIZATION,
    web::Data,
};
use tracing::debug;

/// Resolve the bearer token into an `AuthUser` stored in the request extensions.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    match authenticate(&req) {
        Ok(auth_user) => {
            req.extensions_mut().insert(auth_user);
            next.call(req).await
        }
        Err(e) => Ok(req.error_response(e)),
    }
}

fn authenticate(req: &ServiceRequest) -> Result<AuthUser, AuthError> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or(AuthError::Misconfigured)?;

    let token = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AuthError::MalformedHeader)?;

    let claims = verify_token(token, &config.jwt_secret).map_err(|reason| {
        debug!(%reason, path = req.path(), "Rejected bearer token");
        AuthError::InvalidToken
    })?;

    let role = Role::from_id(claims.role).ok_or(AuthError::UnknownRole { role: claims.role })?;

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
        employee_id: claims.employee_id,
    })
}
