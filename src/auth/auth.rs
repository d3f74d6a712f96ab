use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::{Claims, PrincipalKind, TokenType};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

/// Authenticated caller of a protected endpoint.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub principal: PrincipalKind,
    pub subject_id: u64,
    pub name: String,
    /// Back-office role; `None` for employees
    pub role: Option<Role>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        let role = match (claims.principal, claims.role) {
            (PrincipalKind::User, Some(id)) => Some(
                Role::from_id(id).ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?,
            ),
            (PrincipalKind::User, None) => {
                return Err(AppError::Unauthorized("Invalid role".into()));
            }
            (PrincipalKind::Employee, _) => None,
        };

        Ok(Self {
            principal: claims.principal,
            subject_id: claims.subject_id,
            name: claims.sub,
            role,
        })
    }

    /// Any back-office user.
    pub fn require_user(&self) -> Result<Role, AppError> {
        match (self.principal, self.role) {
            (PrincipalKind::User, Some(role)) => Ok(role),
            _ => Err(AppError::Forbidden("Back-office users only".into())),
        }
    }

    /// Admin always passes; other users need one of `roles`.
    pub fn require_roles(&self, roles: &[Role]) -> Result<Role, AppError> {
        let role = self.require_user()?;
        if role == Role::Admin || roles.contains(&role) {
            Ok(role)
        } else {
            Err(AppError::Forbidden("Insufficient role".into()))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        self.require_roles(&[]).map(|_| ())
    }

    /// Employee self-service; returns the caller's employee id.
    pub fn require_employee(&self) -> Result<u64, AppError> {
        match self.principal {
            PrincipalKind::Employee => Ok(self.subject_id),
            PrincipalKind::User => Err(AppError::Forbidden("Employee accounts only".into())),
        }
    }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on the protected scope
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let Some(token) = bearer_token(req) else {
            return ready(Err(AppError::Unauthorized("Missing token".into()).into()));
        };

        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Err(
                AppError::Internal(anyhow::anyhow!("Config missing")).into()
            ));
        };

        let result = verify_token(token, &config.jwt_secret)
            .map_err(|_| AppError::Unauthorized("Invalid token".into()))
            .and_then(AuthUser::from_claims)
            .map_err(actix_web::Error::from);

        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(principal: PrincipalKind, role: Option<u8>, token_type: TokenType) -> Claims {
        Claims {
            sub: "someone".into(),
            principal,
            subject_id: 3,
            role,
            exp: 0,
            jti: "j".into(),
            token_type,
        }
    }

    #[test]
    fn refresh_tokens_cannot_authenticate_requests() {
        let err = AuthUser::from_claims(claims(PrincipalKind::User, Some(1), TokenType::Refresh))
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn users_need_a_known_role() {
        assert!(AuthUser::from_claims(claims(PrincipalKind::User, None, TokenType::Access)).is_err());
        assert!(
            AuthUser::from_claims(claims(PrincipalKind::User, Some(77), TokenType::Access)).is_err()
        );
    }

    #[test]
    fn role_guards() {
        let hr = AuthUser::from_claims(claims(PrincipalKind::User, Some(2), TokenType::Access))
            .unwrap();
        assert!(hr.require_roles(&[Role::Hr]).is_ok());
        assert!(hr.require_roles(&[Role::Finance]).is_err());
        assert!(hr.require_admin().is_err());
        assert!(hr.require_employee().is_err());

        let admin = AuthUser::from_claims(claims(PrincipalKind::User, Some(1), TokenType::Access))
            .unwrap();
        assert!(admin.require_roles(&[Role::Store]).is_ok());
        assert!(admin.require_admin().is_ok());
    }

    #[test]
    fn employees_only_pass_self_service() {
        let emp =
            AuthUser::from_claims(claims(PrincipalKind::Employee, None, TokenType::Access))
                .unwrap();
        assert_eq!(emp.require_employee().unwrap(), 3);
        assert!(emp.require_user().is_err());
    }
}
