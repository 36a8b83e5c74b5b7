use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::auth::permissions::role_has_permission;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::model::user::{Claims, TokenType};
use crate::services::leave::Actor;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl AuthUser {
    /// Builds the user from verified claims; refresh tokens and unknown roles are refused.
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }
        let role = Role::parse(&claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }

    pub fn can(&self, permission: &str) -> bool {
        role_has_permission(self.role, permission)
    }

    pub fn require_permission(&self, permission: &str) -> Result<(), AppError> {
        if self.can(permission) {
            Ok(())
        } else {
            tracing::debug!(user_id = self.user_id, role = %self.role, permission, "Permission denied");
            Err(AppError::Forbidden(format!("Missing permission {permission}")))
        }
    }

    /// Passes with `all`, or with `own` when `employee_id` is the caller's own record.
    pub fn require_own_or(&self, all: &str, own: &str, employee_id: u64) -> Result<(), AppError> {
        if self.can(all) || (self.can(own) && self.employee_id == Some(employee_id)) {
            Ok(())
        } else {
            tracing::debug!(user_id = self.user_id, role = %self.role, permission = all, employee_id, "Permission denied");
            Err(AppError::Forbidden(format!("Missing permission {all}")))
        }
    }

    /// The caller's employee record id; accounts without one cannot use self-service routes.
    pub fn require_employee_id(&self) -> Result<u64, AppError> {
        self.employee_id
            .ok_or_else(|| AppError::Forbidden("No employee profile".into()))
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
            employee_id: self.employee_id,
        }
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(AppError::Unauthorized("Missing token".into()))),
        };

        let Some(config) = req.app_data::<Data<Config>>() else {
            tracing::error!("Config missing from app data");
            return ready(Err(AppError::Internal));
        };

        let result = verify_token(token, &config.jwt_secret)
            .map_err(|_| AppError::Unauthorized("Invalid token".into()))
            .and_then(AuthUser::from_claims);
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: &str, token_type: TokenType) -> Claims {
        Claims {
            user_id: 2,
            sub: "hr".into(),
            role: role.into(),
            exp: 0,
            jti: "x".into(),
            token_type,
            employee_id: Some(2),
        }
    }

    #[test]
    fn refresh_tokens_cannot_authenticate() {
        assert!(AuthUser::from_claims(claims("hr", TokenType::Refresh)).is_err());
    }

    #[test]
    fn unknown_role_is_unauthorized() {
        assert!(matches!(
            AuthUser::from_claims(claims("root", TokenType::Access)),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn permission_guard() {
        let user = AuthUser::from_claims(claims("hr", TokenType::Access)).unwrap();
        assert!(user.require_permission("payroll:create").is_ok());
        assert!(matches!(
            user.require_permission("employee:delete"),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(user.require_employee_id().unwrap(), 2);
    }

    #[test]
    fn own_records_need_only_the_own_permission() {
        let user = AuthUser::from_claims(claims("employee", TokenType::Access)).unwrap();
        assert!(user.require_own_or("payroll:read_all", "payroll:read_own", 2).is_ok());
        assert!(user.require_own_or("payroll:read_all", "payroll:read_own", 3).is_err());
    }
}
