//! Actor identity and role checks
//!
//! Provides:
//! - The closed role set consumed from the identity provider
//! - Per-call actor context (no ambient session)
//! - Verification of identity-provider JWTs
//! - Actor extraction for axum handlers

use crate::errors::{AppError, Result};
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Header carrying the actor id from a trusted identity proxy
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Header carrying a comma separated role list
pub const ACTOR_ROLES_HEADER: &str = "x-actor-roles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Author,
    Reviewer,
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Author => "author",
            Role::Reviewer => "reviewer",
            Role::Editor => "editor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "author" => Ok(Role::Author),
            "reviewer" => Ok(Role::Reviewer),
            "editor" => Ok(Role::Editor),
            other => Err(AppError::Unauthenticated {
                message: format!("Unknown role '{}'", other),
            }),
        }
    }
}

/// Authenticated caller, passed explicitly into every workflow operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub actor_id: Uuid,
    pub roles: BTreeSet<Role>,
}

impl ActorContext {
    pub fn new(actor_id: Uuid, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            actor_id,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Require a specific role, returning error if not present
    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AppError::Unauthorized {
                message: format!("Actor {} lacks the {} role", self.actor_id, role),
            })
        }
    }

    pub fn is_editor(&self) -> bool {
        self.has_role(Role::Editor)
    }
}

/// Claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct ActorClaims {
    /// Subject (actor ID)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Verifies identity-provider tokens. Never issues any.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Validate a token and turn its claims into an actor
    pub fn verify(&self, token: &str) -> Result<ActorContext> {
        let claims = decode::<ActorClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::Unauthenticated {
                    message: "Token expired".to_string(),
                },
                _ => AppError::Unauthenticated {
                    message: "Invalid token".to_string(),
                },
            })?;

        let actor_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthenticated {
            message: "Token subject is not an actor id".to_string(),
        })?;

        Ok(ActorContext::new(actor_id, claims.roles))
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Parse a comma separated role header; empty entries are ignored
pub fn parse_roles(header: &str) -> Result<BTreeSet<Role>> {
    header
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(Role::from_str)
        .collect()
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Axum extractor for ActorContext.
///
/// A bearer token wins when a `TokenVerifier` is installed as a request
/// extension; otherwise the identity proxy headers are trusted.
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        if let Some(verifier) = parts.extensions.get::<Arc<TokenVerifier>>() {
            let token = header(parts, "authorization")
                .and_then(extract_bearer)
                .ok_or_else(|| AppError::Unauthenticated {
                    message: "Missing bearer token".to_string(),
                })?;
            return verifier.verify(token);
        }

        let actor_id = header(parts, ACTOR_ID_HEADER)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| AppError::Unauthenticated {
                message: "Missing or invalid X-Actor-Id header".to_string(),
            })?;

        let roles = parse_roles(header(parts, ACTOR_ROLES_HEADER).unwrap_or_default())?;

        Ok(ActorContext { actor_id, roles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, roles: Vec<Role>, exp: i64) -> String {
        let claims = ActorClaims {
            sub: sub.to_string(),
            exp,
            roles,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_parse_roles() {
        let roles = parse_roles("author, Editor,,").unwrap();
        assert_eq!(roles, BTreeSet::from([Role::Author, Role::Editor]));
        assert!(parse_roles("").unwrap().is_empty());
        assert!(parse_roles("author,admin").is_err());
    }

    #[test]
    fn test_require_role() {
        let actor = ActorContext::new(Uuid::new_v4(), [Role::Reviewer]);
        assert!(actor.require_role(Role::Reviewer).is_ok());
        assert!(matches!(
            actor.require_role(Role::Editor),
            Err(AppError::Unauthorized { .. })
        ));
        assert!(!actor.is_editor());
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_verify_identity_token() {
        let verifier = TokenVerifier::new("test_secret");
        let actor_id = Uuid::new_v4();
        let exp = chrono::Utc::now().timestamp() + 3600;

        let actor = verifier
            .verify(&token("test_secret", &actor_id.to_string(), vec![Role::Editor], exp))
            .unwrap();
        assert_eq!(actor.actor_id, actor_id);
        assert!(actor.is_editor());
    }

    #[test]
    fn test_verify_rejects_bad_tokens() {
        let verifier = TokenVerifier::new("test_secret");
        let exp = chrono::Utc::now().timestamp() + 3600;

        let wrong_secret = token("other", &Uuid::new_v4().to_string(), vec![], exp);
        assert!(matches!(verifier.verify(&wrong_secret), Err(AppError::Unauthenticated { .. })));

        let bad_subject = token("test_secret", "not-a-uuid", vec![], exp);
        assert!(verifier.verify(&bad_subject).is_err());

        let expired = token("test_secret", &Uuid::new_v4().to_string(), vec![], exp - 7200);
        assert!(verifier.verify(&expired).is_err());
    }
}
