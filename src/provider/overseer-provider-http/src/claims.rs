//! Access-token claims.
//!
//! Access tokens issued by the provider are HS256 JWTs signed with the
//! project's JWT secret.

use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use overseer_provider::ProviderError;

/// Audience of tokens issued to signed-in users.
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Claims carried by a provider access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (principal id).
    pub sub: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Audience.
    pub aud: String,
    /// Database role (`authenticated`, `service_role`, ...).
    #[serde(default)]
    pub role: Option<String>,
    /// Issued at (Unix timestamp).
    #[serde(default)]
    pub iat: Option<i64>,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Provider session id.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Verifies access tokens against the project's JWT secret.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Creates a verifier for the given secret.
    pub fn new(jwt_secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUTHENTICATED_AUDIENCE]);
        validation.validate_exp = true;
        validation.validate_nbf = false;

        Self {
            decoding_key,
            validation,
        }
    }

    /// Verifies `token` and returns its claims.
    ///
    /// An expired token is [`ProviderError::SessionExpired`]; any other
    /// failure is [`ProviderError::Unauthorized`].
    pub fn verify(&self, token: &str) -> Result<AccessClaims, ProviderError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ProviderError::SessionExpired,
                _ => ProviderError::Unauthorized(format!("invalid access token: {e}")),
            })
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Reads the `exp` claim without verifying the signature.
///
/// Only used to learn when a token the provider just handed out expires.
pub fn unverified_expiry(token: &str) -> Option<i64> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims.exp)
}
