//! Admin authentication middleware for axum.
//!
//! The admin billing API requires `Authorization: Bearer <JWT>` signed with
//! HS256 using the configured admin secret. The token must carry
//! `role == "admin"`.
//!
//! ```text
//! Request → admin_auth_middleware → injects AdminPrincipal into extensions
//!                                          ↓
//!                                  Handler reads AdminPrincipal
//! ```
//!
//! - Missing, malformed, expired, or badly signed token → 401
//! - Valid token without the admin role → 403

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Role claim required for the admin API.
pub const ADMIN_ROLE: &str = "admin";

/// Claims read from an admin session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    #[serde(default)]
    pub role: String,
    pub exp: u64,
}

/// Authenticated administrator, injected into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPrincipal {
    pub subject: String,
}

/// Shared-secret verifier for admin tokens.
pub struct AdminTokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl AdminTokenVerifier {
    pub fn new(secret: &SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AdminPrincipal, AdminAuthRejection> {
        let data = decode::<AdminClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("Admin token expired"),
                _ => tracing::warn!(error = %e, "Admin token validation failed"),
            }
            AdminAuthRejection::Unauthenticated
        })?;

        if data.claims.role != ADMIN_ROLE {
            tracing::warn!(subject = %data.claims.sub, role = %data.claims.role, "Non-admin token on admin route");
            return Err(AdminAuthRejection::Forbidden);
        }

        Ok(AdminPrincipal {
            subject: data.claims.sub,
        })
    }
}

/// Admin middleware state.
pub type AdminAuthState = Arc<AdminTokenVerifier>;

pub async fn admin_auth_middleware(
    State(verifier): State<AdminAuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return AdminAuthRejection::Unauthenticated.into_response();
    };

    match verifier.verify(token) {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    }
}

/// Rejection type for admin authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAuthRejection {
    Unauthenticated,
    Forbidden,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AdminAuthRejection::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Authentication required",
            ),
            AdminAuthRejection::Forbidden => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", "Administrator role required")
            }
        };

        (
            status,
            Json(serde_json::json!({
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "admin-test-secret";

    fn verifier() -> AdminTokenVerifier {
        AdminTokenVerifier::new(&SecretString::new(SECRET.to_string()))
    }

    fn token(role: &str, exp_offset_secs: i64, secret: &str) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset_secs) as u64;
        encode(
            &Header::new(Algorithm::HS256),
            &AdminClaims {
                sub: "ops-1".to_string(),
                role: role.to_string(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn admin_token_is_accepted() {
        let principal = verifier().verify(&token("admin", 600, SECRET)).unwrap();
        assert_eq!(principal.subject, "ops-1");
    }

    #[test]
    fn non_admin_role_is_forbidden() {
        let result = verifier().verify(&token("member", 600, SECRET));
        assert_eq!(result, Err(AdminAuthRejection::Forbidden));
    }

    #[test]
    fn wrong_secret_is_unauthenticated() {
        let result = verifier().verify(&token("admin", 600, "other-secret"));
        assert_eq!(result, Err(AdminAuthRejection::Unauthenticated));
    }

    #[test]
    fn expired_token_is_unauthenticated() {
        let result = verifier().verify(&token("admin", -3600, SECRET));
        assert_eq!(result, Err(AdminAuthRejection::Unauthenticated));
    }

    #[test]
    fn garbage_is_unauthenticated() {
        assert_eq!(
            verifier().verify("not-a-jwt"),
            Err(AdminAuthRejection::Unauthenticated)
        );
    }

    #[test]
    fn rejections_map_to_status_codes() {
        assert_eq!(
            AdminAuthRejection::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AdminAuthRejection::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
