use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::AuthError;
use crate::config::JwtConfig;
use crate::models::TokenIssuer;

/// The `typ` claim stamped on every token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    AccessToken,
    RefreshToken,
}

/// When a token stops being valid.
#[derive(Debug, Clone, Copy)]
pub enum Expiry {
    /// The configured lifetime for the token type.
    Default,
    /// Relative to the moment of encoding.
    In(Duration),
    /// Used verbatim.
    At(DateTime<Utc>),
}

/// Claims of a session access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Case-folded email of the identity.
    pub sub: String,
}

/// Claims of a refresh token. `jti` is the ledger id of the access token it renews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub jti: String,
}

/// Claims of an invite or password-reset link token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleUseClaims {
    pub iat: i64,
    pub iss: TokenIssuer,
    pub sub: String,
}

/// Verified token contents: the flow-specific claims plus the stamped fields.
#[derive(Debug, Clone)]
pub struct Decoded<C> {
    pub claims: C,
    pub exp: i64,
    pub typ: TokenType,
}

/// Signs and verifies tokens with the shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_token_lifetime: Duration,
    refresh_token_lifetime: Duration,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();

        tracing::info!(algorithm = ?config.algorithm, "Token codec initialized");

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: config.algorithm,
            access_token_lifetime: Duration::minutes(config.access_token_expiry_minutes),
            refresh_token_lifetime: Duration::minutes(config.refresh_token_expiry_minutes),
        }
    }

    fn default_lifetime(&self, typ: TokenType) -> Duration {
        match typ {
            TokenType::AccessToken => self.access_token_lifetime,
            TokenType::RefreshToken => self.refresh_token_lifetime,
        }
    }

    /// Access token lifetime in seconds (for client info).
    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_lifetime.num_seconds()
    }

    /// Sign `claims`, stamping `exp` and `typ` over whatever they carry.
    pub fn encode<C: Serialize>(
        &self,
        claims: &C,
        typ: TokenType,
        expiry: Expiry,
    ) -> Result<String, AuthError> {
        let exp = match expiry {
            Expiry::Default => Utc::now() + self.default_lifetime(typ),
            Expiry::In(window) => Utc::now() + window,
            Expiry::At(instant) => instant,
        };

        let mut payload = match serde_json::to_value(claims)
            .map_err(|e| anyhow::anyhow!("Failed to serialize token claims: {}", e))?
        {
            Value::Object(map) => map,
            _ => {
                return Err(AuthError::Internal(anyhow::anyhow!(
                    "Token claims must serialize to an object"
                )))
            }
        };
        payload.insert("exp".to_string(), Value::from(exp.timestamp()));
        payload.insert(
            "typ".to_string(),
            serde_json::to_value(typ).map_err(|e| anyhow::anyhow!(e))?,
        );

        jsonwebtoken::encode(&Header::new(self.algorithm), &payload, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Verify a token and read its claims.
    ///
    /// The signature is always checked. Expiry is skipped only when
    /// `allow_expired` is set. A valid token of the wrong type is rejected.
    pub fn decode<C: DeserializeOwned>(
        &self,
        token: &str,
        expected: TokenType,
        allow_expired: bool,
    ) -> Result<Decoded<C>, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_exp = !allow_expired;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })?;

        let mut payload = data.claims;

        let typ: TokenType = payload
            .remove("typ")
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or(AuthError::TokenInvalid)?;
        if typ != expected {
            return Err(AuthError::TokenTypeMismatch);
        }

        let exp = payload
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or(AuthError::TokenInvalid)?;

        let claims =
            serde_json::from_value(Value::Object(payload)).map_err(|_| AuthError::TokenInvalid)?;

        Ok(Decoded { claims, exp, typ })
    }
}
