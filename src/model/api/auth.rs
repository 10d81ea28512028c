use std::fmt::Display;

use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::debug;
use rocket::{
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    config::Config,
    error::{Error, Result},
    model::mongodb::Id,
};

const AUTHORIZATION: &str = "Authorization";
const BEARER_PREFIX: &str = "Bearer ";

/// The rights level carried by a token.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

/// An authentication token naming a stable identity with specific rights.
///
/// Tokens are issued by the portal's identity service; this crate only ever
/// decodes them, apart from [`AuthToken::encode`] which exists for tooling
/// and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
}

impl AuthToken {
    pub fn new(id: Id, rights: Rights) -> Self {
        Self { id, rights }
    }

    #[allow(clippy::missing_panics_doc)]
    /// Sign this token, valid for the given time.
    pub fn encode(self, config: &Config, ttl: Duration) -> String {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + ttl,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings")
    }

    /// Verify and decode a signed token.
    pub fn decode(token: &str, config: &Config) -> std::result::Result<Self, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// Who is making a request.
///
/// This is the only place identity is resolved. Everything downstream matches
/// on the variant and never inspects the content of an ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Authenticated { voter_id: Id, rights: Rights },
    Unauthenticated,
}

impl Principal {
    /// Is this caller a privileged operator?
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::Authenticated {
                rights: Rights::Admin,
                ..
            }
        )
    }

    /// The caller's identity, or [`Error::Unauthorized`].
    pub fn require_authenticated(&self) -> Result<(Id, Rights)> {
        match *self {
            Self::Authenticated { voter_id, rights } => Ok((voter_id, rights)),
            Self::Unauthenticated => Err(Error::Unauthorized(
                "A valid bearer token is required".to_string(),
            )),
        }
    }

    /// The operator's identity, or an error if the caller is not privileged.
    pub fn require_privileged(&self) -> Result<Id> {
        match self.require_authenticated()? {
            (id, Rights::Admin) => Ok(id),
            (_, Rights::Voter) => Err(Error::Forbidden(
                "This operation requires administrator rights".to_string(),
            )),
        }
    }
}

impl Display for Principal {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authenticated { voter_id, rights } => write!(formatter, "{rights} {voter_id}"),
            Self::Unauthenticated => write!(formatter, "anonymous"),
        }
    }
}

impl From<AuthToken> for Principal {
    fn from(token: AuthToken) -> Self {
        Self::Authenticated {
            voter_id: token.id,
            rights: token.rights,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Principal {
    type Error = Error;

    /// Resolve the caller from the `Authorization` header. Never fails: a
    /// missing or invalid token just makes the caller unauthenticated.
    ///
    /// The result is cached on the request for the response log.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let principal = *req.local_cache(|| Some(Self::resolve(req)));
        Outcome::Success(principal.unwrap_or(Self::Unauthenticated))
    }
}

impl Principal {
    fn resolve(req: &Request<'_>) -> Self {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => return Self::Unauthenticated,
        };

        let token = req
            .headers()
            .get_one(AUTHORIZATION)
            .and_then(|header| header.strip_prefix(BEARER_PREFIX));
        match token {
            Some(token) => match AuthToken::decode(token.trim(), config) {
                Ok(token) => token.into(),
                Err(err) => {
                    debug!("Rejected bearer token: {err}");
                    Self::Unauthenticated
                }
            },
            None => Self::Unauthenticated,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_survives_signing() {
        let config = Config::example();
        let token = AuthToken::new(Id::new(), Rights::Admin);

        let signed = token.encode(&config, Duration::minutes(5));
        assert_eq!(AuthToken::decode(&signed, &config).unwrap(), token);
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let config = Config::example();
        let token = AuthToken::new(Id::new(), Rights::Voter);

        let expired = token.encode(&config, Duration::minutes(-10));
        assert!(AuthToken::decode(&expired, &config).is_err());

        let other = Config::example_with_secret("another-secret");
        let foreign = token.encode(&other, Duration::minutes(5));
        assert!(AuthToken::decode(&foreign, &config).is_err());
    }

    #[test]
    fn privilege_checks() {
        assert!(Principal::admin_example().require_privileged().is_ok());
        assert!(matches!(
            Principal::voter_example().require_privileged(),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            Principal::Unauthenticated.require_privileged(),
            Err(Error::Unauthorized(_))
        ));
        assert!(!Principal::voter_example().is_privileged());
    }

    #[test]
    fn principals_describe_themselves_for_logs() {
        let id = Id::new();
        let admin = Principal::Authenticated {
            voter_id: id,
            rights: Rights::Admin,
        };
        assert_eq!(admin.to_string(), format!("admin {id}"));
        assert_eq!(Principal::Unauthenticated.to_string(), "anonymous");
    }
}
