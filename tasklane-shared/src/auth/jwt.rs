/// JWT token generation and validation
///
/// Tasklane issues two kinds of HS256 tokens, each signed with its own secret:
///
/// - **Access token**: 15 minutes, sent as `Authorization: Bearer` and as the
///   `?token=` of the WebSocket handshake
/// - **Refresh token**: 7 days, exchanged at `POST /auth/refresh` for a new
///   pair. Only its SHA-256 digest is persisted, and only one is active per
///   user at a time.
///
/// Every token carries a random `jti`, so two tokens issued to the same user
/// in the same second still differ and a rotated refresh token never equals
/// its predecessor. Validation uses zero leeway: a token is accepted only
/// before `exp`.
///
/// # Example
///
/// ```
/// use tasklane_shared::auth::jwt::{issue_token_pair, validate_access_token, JwtSecrets};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secrets = JwtSecrets::new(
///     "access-secret-at-least-32-bytes-long!!",
///     "refresh-secret-at-least-32-bytes-long!",
/// );
/// let user_id = Uuid::new_v4();
///
/// let pair = issue_token_pair(user_id, &secrets)?;
/// let claims = validate_access_token(&pair.access_token, &secrets.access)?;
/// assert_eq!(claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Issuer claim on every token
pub const ISSUER: &str = "tasklane";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Invalid token: {0}")]
    Invalid(String),

    /// Signature was valid but `exp` has passed
    #[error("Token has expired")]
    Expired,

    /// An access token was presented where a refresh token was expected, or
    /// the other way round
    #[error("Wrong token type: expected {expected}")]
    WrongType { expected: &'static str },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    /// Lifetime of a freshly issued token
    pub fn lifetime(&self) -> Duration {
        match self {
            TokenType::Access => Duration::minutes(15),
            TokenType::Refresh => Duration::days(7),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Signing secrets, one per token type
#[derive(Clone)]
pub struct JwtSecrets {
    pub access: String,
    pub refresh: String,
}

impl JwtSecrets {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    pub fn for_type(&self, token_type: TokenType) -> &str {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }
}

impl std::fmt::Debug for JwtSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSecrets")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user ID
    pub sub: Uuid,

    /// Always [`ISSUER`]
    pub iss: String,

    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,

    /// Unique token ID
    pub jti: Uuid,

    pub token_type: TokenType,
}

impl Claims {
    /// Claims with the default lifetime for `token_type`
    pub fn new(user_id: Uuid, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, token_type, token_type.lifetime())
    }

    /// Claims with a custom lifetime (negative values produce an already
    /// expired token, which tests use)
    pub fn with_expiration(user_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4(),
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// An access/refresh pair as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Signs claims with HS256
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key).map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, issuer, `nbf` and `exp`, returning the claims
///
/// # Errors
///
/// - `JwtError::Expired` if the token is past `exp`
/// - `JwtError::Invalid` for any other failure
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::Invalid(e.to_string()),
    })?;

    Ok(token_data.claims)
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected: expected.as_str(),
        });
    }

    Ok(claims)
}

/// Validates an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Access)
}

/// Validates a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Refresh)
}

/// Issues a fresh access/refresh pair for a user
pub fn issue_token_pair(user_id: Uuid, secrets: &JwtSecrets) -> Result<TokenPair, JwtError> {
    let access = Claims::new(user_id, TokenType::Access);
    let refresh = Claims::new(user_id, TokenType::Refresh);

    Ok(TokenPair {
        access_token: create_token(&access, &secrets.access)?,
        refresh_token: create_token(&refresh, &secrets.refresh)?,
        token_type: "Bearer".to_string(),
        expires_in: TokenType::Access.lifetime().num_seconds(),
    })
}

/// SHA-256 hex digest of a token, the form refresh tokens are stored in
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &str = "access-secret-at-least-32-bytes-long!!";
    const REFRESH: &str = "refresh-secret-at-least-32-bytes-long!";

    fn secrets() -> JwtSecrets {
        JwtSecrets::new(ACCESS, REFRESH)
    }

    #[test]
    fn test_lifetimes() {
        assert_eq!(TokenType::Access.lifetime(), Duration::minutes(15));
        assert_eq!(TokenType::Refresh.lifetime(), Duration::days(7));
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, TokenType::Access);

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_pair_roundtrip() {
        let user_id = Uuid::new_v4();
        let pair = issue_token_pair(user_id, &secrets()).unwrap();

        assert_eq!(validate_access_token(&pair.access_token, ACCESS).unwrap().sub, user_id);
        assert_eq!(validate_refresh_token(&pair.refresh_token, REFRESH).unwrap().sub, user_id);
        assert_eq!(pair.expires_in, 900);
    }

    #[test]
    fn test_tokens_are_bound_to_their_secret() {
        let pair = issue_token_pair(Uuid::new_v4(), &secrets()).unwrap();

        assert!(matches!(
            validate_access_token(&pair.refresh_token, ACCESS),
            Err(JwtError::Invalid(_))
        ));
        assert!(validate_refresh_token(&pair.access_token, REFRESH).is_err());
    }

    #[test]
    fn test_wrong_type_with_same_secret() {
        let claims = Claims::new(Uuid::new_v4(), TokenType::Refresh);
        let token = create_token(&claims, ACCESS).unwrap();

        assert!(matches!(
            validate_access_token(&token, ACCESS),
            Err(JwtError::WrongType { expected: "access" })
        ));
    }

    #[test]
    fn test_expired_token() {
        let claims = Claims::with_expiration(Uuid::new_v4(), TokenType::Access, Duration::seconds(-5));
        let token = create_token(&claims, ACCESS).unwrap();

        assert!(matches!(validate_access_token(&token, ACCESS), Err(JwtError::Expired)));
    }

    #[test]
    fn test_token_past_fifteen_minutes_is_rejected() {
        let mut claims = Claims::new(Uuid::new_v4(), TokenType::Access);
        claims.iat -= 16 * 60;
        claims.nbf -= 16 * 60;
        claims.exp -= 16 * 60;
        let token = create_token(&claims, ACCESS).unwrap();

        assert!(matches!(validate_access_token(&token, ACCESS), Err(JwtError::Expired)));
    }

    #[test]
    fn test_wrong_issuer() {
        let mut claims = Claims::new(Uuid::new_v4(), TokenType::Access);
        claims.iss = "someone-else".into();
        let token = create_token(&claims, ACCESS).unwrap();

        assert!(matches!(validate_access_token(&token, ACCESS), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_rotation_produces_new_refresh_token() {
        let user_id = Uuid::new_v4();
        let first = issue_token_pair(user_id, &secrets()).unwrap();
        let second = issue_token_pair(user_id, &secrets()).unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
        assert_ne!(hash_token(&first.refresh_token), hash_token(&second.refresh_token));
    }

    #[test]
    fn test_hash_token() {
        let digest = hash_token("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_secrets_debug_is_redacted() {
        let debug = format!("{:?}", secrets());
        assert!(!debug.contains(ACCESS));
    }
}
