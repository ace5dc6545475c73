//! Access/refresh token issuance and access token validation.
//!
//! Access tokens are HMAC-signed JWTs carrying the caller's claims plus the
//! fixed `iss`, `iat`, `exp` and `typ` claims. Refresh tokens are opaque
//! random strings; storing and rotating them is the caller's job.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::claims::{
    Claim, EMAIL_VERIFICATION_CLAIM, EMAIL_VERIFIED_VALUE, extract_claims, insert_claims,
};
use crate::config::Config;

/// Claim names set by the issuer; callers cannot supply them.
pub const RESERVED_CLAIMS: [&str; 4] = ["iss", "iat", "exp", "typ"];

/// Random bytes in a refresh token (encoded as 43 base64url characters).
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Token type marker stored in the `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived signed access token
    Access,
}

/// Fixed claims present in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IssuerClaims {
    iss: String,
    #[serde(rename = "typ")]
    token_type: TokenType,
    /// Issued at (Unix timestamp)
    iat: u64,
    /// Expiration time (Unix timestamp)
    exp: u64,
}

/// Opaque refresh token and its expiration, always issued together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    #[serde(rename = "refresh_token")]
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    #[serde(rename = "refresh_token_expires_at")]
    pub expires_at: u64,
}

/// Result of issuing a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    /// Expiration timestamp of the access token (Unix seconds)
    pub access_token_expires_at: u64,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<RefreshToken>,
}

/// A validated access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub issuer: String,
    pub issued_at: u64,
    pub expires_at: u64,
    /// Caller-supplied claims, without the fixed issuer claims
    pub claims: Vec<Claim>,
}

impl AccessToken {
    pub fn has_claim(&self, name: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|c| c.name == name && c.value == value)
    }

    /// Whether the email verification policy would accept this token.
    pub fn is_email_verified(&self) -> bool {
        self.has_claim(EMAIL_VERIFICATION_CLAIM, EMAIL_VERIFIED_VALUE)
    }

    /// True when the token carries no caller-supplied claims.
    pub fn is_anonymous(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Issues and validates tokens with a fixed key and lifetimes.
#[derive(Clone)]
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_token_lifetime: Duration,
    refresh_token_lifetime: Option<Duration>,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        Self {
            algorithm: config.algorithm.jwt_algorithm(),
            encoding_key: EncodingKey::from_secret(config.signing_key()),
            decoding_key: DecodingKey::from_secret(config.signing_key()),
            issuer: config.issuer.clone(),
            access_token_lifetime: config.access_token_lifetime,
            refresh_token_lifetime: config
                .issue_refresh_token
                .then_some(config.refresh_token_lifetime),
        }
    }

    /// Issue an access token for `claims`, plus a refresh token when
    /// configured. `None` and an empty slice both yield an anonymous token.
    ///
    /// Fails only on bad input: a claim named after one of the fixed issuer
    /// claims returns [`TokenError::ReservedClaim`]. A valid [`Config`]
    /// never makes issuing fail.
    pub fn issue(&self, claims: Option<&[Claim]>) -> Result<IssuedToken, TokenError> {
        let claims = claims.unwrap_or_default();

        if let Some(reserved) = claims
            .iter()
            .find(|c| RESERVED_CLAIMS.contains(&c.name.as_str()))
        {
            return Err(TokenError::ReservedClaim(reserved.name.clone()));
        }

        let now = unix_now()?;
        let exp = now + self.access_token_lifetime.as_secs();

        let fixed = IssuerClaims {
            iss: self.issuer.clone(),
            token_type: TokenType::Access,
            iat: now,
            exp,
        };
        let mut payload = match serde_json::to_value(&fixed).map_err(TokenError::Payload)? {
            Value::Object(map) => map,
            other => {
                return Err(TokenError::Payload(serde::de::Error::custom(format!(
                    "issuer claims serialized to {other}, expected an object"
                ))));
            }
        };
        insert_claims(&mut payload, claims);

        let access_token =
            jsonwebtoken::encode(&Header::new(self.algorithm), &payload, &self.encoding_key)
                .map_err(TokenError::Encoding)?;

        let refresh = self.refresh_token_lifetime.map(|lifetime| RefreshToken {
            token: generate_refresh_token(),
            expires_at: now + lifetime.as_secs(),
        });

        Ok(IssuedToken {
            access_token,
            access_token_expires_at: exp,
            refresh,
        })
    }

    /// Validate and decode an access token issued by this issuer.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessToken, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        // `aud` is an ordinary caller claim, carried through untouched
        validation.validate_aud = false;

        let token_data =
            jsonwebtoken::decode::<Map<String, Value>>(token, &self.decoding_key, &validation)
                .map_err(TokenError::Decoding)?;

        let mut payload = token_data.claims;
        let mut fixed = Map::new();
        for name in RESERVED_CLAIMS {
            if let Some(value) = payload.remove(name) {
                fixed.insert(name.to_string(), value);
            }
        }

        let fixed: IssuerClaims =
            serde_json::from_value(Value::Object(fixed)).map_err(|_| TokenError::WrongTokenType)?;
        if fixed.token_type != TokenType::Access {
            return Err(TokenError::WrongTokenType);
        }

        Ok(AccessToken {
            issuer: fixed.iss,
            issued_at: fixed.iat,
            expires_at: fixed.exp,
            claims: extract_claims(payload),
        })
    }
}

/// Generate an opaque, high-entropy refresh token.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn unix_now() -> Result<u64, TokenError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TokenError::Time)?
        .as_secs())
}

/// Errors that can occur during token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("Failed to decode token: {0}")]
    Decoding(#[source] jsonwebtoken::errors::Error),
    #[error("Failed to build token payload: {0}")]
    Payload(#[source] serde_json::Error),
    #[error("System time error")]
    Time,
    #[error("Wrong token type")]
    WrongTokenType,
    #[error("Claim name is reserved for the issuer: {0}")]
    ReservedClaim(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SigningAlgorithm;

    const SECRET: &[u8] = b"test-secret-key-for-testing-0123";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&Config::builder(SECRET).build().unwrap())
    }

    #[test]
    fn test_issue_and_validate_access_token() {
        let issuer = issuer();
        let claims = vec![Claim::new("sub", "uuid-123"), Claim::new("name", "alice")];

        let issued = issuer.issue(Some(claims.as_slice())).unwrap();
        let token = issuer.validate_access_token(&issued.access_token).unwrap();

        assert_eq!(token.issuer, "warden");
        assert_eq!(token.expires_at, issued.access_token_expires_at);
        assert_eq!(token.expires_at - token.issued_at, 5 * 60);
        assert!(token.has_claim("sub", "uuid-123"));
        assert!(token.has_claim("name", "alice"));
        assert_eq!(token.claims.len(), 2);
    }

    #[test]
    fn test_anonymous_token() {
        let issuer = issuer();

        for claims in [None, Some(&[][..])] {
            let issued = issuer.issue(claims).unwrap();
            let token = issuer.validate_access_token(&issued.access_token).unwrap();
            assert!(token.is_anonymous());
        }
    }

    #[test]
    fn test_refresh_token_paired_with_expiration() {
        let issued = issuer().issue(None).unwrap();
        let refresh = issued.refresh.expect("refresh token should be issued");

        assert_eq!(refresh.token.len(), 43);
        assert!(!refresh.token.contains('.'));
        assert_eq!(
            refresh.expires_at - issued.access_token_expires_at,
            14 * 24 * 60 * 60 - 5 * 60
        );
    }

    #[test]
    fn test_refresh_token_disabled() {
        let config = Config::builder(SECRET)
            .issue_refresh_token(false)
            .build()
            .unwrap();
        let issued = TokenIssuer::new(&config).issue(None).unwrap();
        assert!(issued.refresh.is_none());

        let json = serde_json::to_value(&issued).unwrap();
        assert!(json.get("refresh_token").is_none());
        assert!(json.get("refresh_token_expires_at").is_none());
    }

    #[test]
    fn test_issued_token_json_shape() {
        let issued = issuer().issue(None).unwrap();
        let json = serde_json::to_value(&issued).unwrap();

        assert!(json["access_token"].is_string());
        assert!(json["access_token_expires_at"].is_u64());
        assert!(json["refresh_token"].is_string());
        assert!(json["refresh_token_expires_at"].is_u64());
    }

    #[test]
    fn test_unique_refresh_tokens() {
        let issuer = issuer();
        let a = issuer.issue(None).unwrap().refresh.unwrap();
        let b = issuer.issue(None).unwrap().refresh.unwrap();
        assert_ne!(a.token, b.token, "Each refresh token should be unique");
    }

    #[test]
    fn test_reserved_claim_rejected() {
        let result = issuer().issue(Some(&[Claim::new("exp", "0")][..]));
        assert!(matches!(result, Err(TokenError::ReservedClaim(name)) if name == "exp"));
    }

    #[test]
    fn test_invalid_token() {
        let result = issuer().validate_access_token("invalid-token");
        assert!(matches!(result, Err(TokenError::Decoding(_))));
    }

    #[test]
    fn test_wrong_secret() {
        let issued = issuer().issue(None).unwrap();

        let other = Config::builder(&b"another-secret-key-for-tests-456"[..])
            .build()
            .unwrap();
        let result = TokenIssuer::new(&other).validate_access_token(&issued.access_token);
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_algorithm_rejected() {
        let hs512 = Config::builder(SECRET)
            .algorithm(SigningAlgorithm::Hs512)
            .build()
            .unwrap();
        let issued = TokenIssuer::new(&hs512).issue(None).unwrap();

        assert!(issuer().validate_access_token(&issued.access_token).is_err());
        assert!(
            TokenIssuer::new(&hs512)
                .validate_access_token(&issued.access_token)
                .is_ok()
        );
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let other = Config::builder(SECRET).issuer("someone-else").build().unwrap();
        let issued = TokenIssuer::new(&other).issue(None).unwrap();

        assert!(issuer().validate_access_token(&issued.access_token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let now = unix_now().unwrap();
        let mut payload = Map::new();
        payload.insert("iss".into(), "warden".into());
        payload.insert("typ".into(), "access".into());
        payload.insert("iat".into(), (now - 100).into());
        // Expired 50 seconds ago
        payload.insert("exp".into(), (now - 50).into());

        let token = jsonwebtoken::encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(issuer().validate_access_token(&token).is_err());
    }

    #[test]
    fn test_missing_type_marker_rejected() {
        let now = unix_now().unwrap();
        let mut payload = Map::new();
        payload.insert("iss".into(), "warden".into());
        payload.insert("iat".into(), now.into());
        payload.insert("exp".into(), (now + 60).into());

        let token = jsonwebtoken::encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let result = issuer().validate_access_token(&token);
        assert!(matches!(result, Err(TokenError::WrongTokenType)));
    }

    #[test]
    fn test_email_verified_claim_round_trips() {
        let issuer = issuer();
        let issued = issuer
            .issue(Some(&[Claim::new("sub", "1"), Claim::email_verified()][..]))
            .unwrap();
        let token = issuer.validate_access_token(&issued.access_token).unwrap();
        assert!(token.is_email_verified());

        let issued = issuer.issue(Some(&[Claim::new("sub", "1")][..])).unwrap();
        let token = issuer.validate_access_token(&issued.access_token).unwrap();
        assert!(!token.is_email_verified());
    }
}
