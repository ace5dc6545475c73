//! Claims carried by access tokens.
//!
//! A claim set is a plain list of name/value pairs. Names may repeat; when a
//! name appears more than once the token payload stores its values as a JSON
//! array, in input order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the authorization policy that requires a verified email address.
pub const EMAIL_VERIFICATION_POLICY: &str = "Email Verification Policy";

/// Claim checked by the email verification policy.
pub const EMAIL_VERIFICATION_CLAIM: &str = "EmailVerification";

/// Value of [`EMAIL_VERIFICATION_CLAIM`] for a verified subject.
pub const EMAIL_VERIFIED_VALUE: &str = "True";

/// A single asserted fact about the token subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub name: String,
    pub value: String,
}

impl Claim {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The claim that marks a subject as having a verified email address.
    pub fn email_verified() -> Self {
        Self::new(EMAIL_VERIFICATION_CLAIM, EMAIL_VERIFIED_VALUE)
    }
}

/// Parse a `name=value` pair. The value may itself contain `=`.
impl std::str::FromStr for Claim {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok(Claim::new(name, value)),
            _ => Err(format!("Claim must be in the form name=value: {}", s)),
        }
    }
}

/// Merge claims into a JSON object, turning repeated names into arrays.
pub(crate) fn insert_claims(payload: &mut Map<String, Value>, claims: &[Claim]) {
    for claim in claims {
        let value = Value::String(claim.value.clone());
        match payload.get_mut(&claim.name) {
            None => {
                payload.insert(claim.name.clone(), value);
            }
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
}

/// Flatten a JSON object back into claims. Non-string scalars are kept in
/// their JSON text form; nested objects are skipped.
pub(crate) fn extract_claims(payload: Map<String, Value>) -> Vec<Claim> {
    let mut claims = Vec::with_capacity(payload.len());
    for (name, value) in payload {
        match value {
            Value::Array(values) => {
                for v in values {
                    if let Some(text) = scalar_text(v) {
                        claims.push(Claim::new(name.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    claims.push(Claim::new(name, text));
                }
            }
        }
    }
    claims
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
