use crate::error::AuthError;
use crate::model::role::Role;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// Caller identity established by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AuthError::Unauthenticated.into()),
        )
    }
}

impl AuthUser {
    pub fn require_hr_or_admin(&self) -> Result<(), AuthError> {
        if self.role.manages_attendance() {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    /// The employee record this user clocks in as.
    pub fn require_employee(&self) -> Result<u64, AuthError> {
        self.employee_id.ok_or(AuthError::NoEmployeeProfile)
    }

    /// HR/Admin may act on anyone; other users only on their own record.
    pub fn require_self_or_hr(&self, employee_id: u64) -> Result<(), AuthError> {
        if self.employee_id == Some(employee_id) {
            return Ok(());
        }
        self.require_hr_or_admin()
    }
}
