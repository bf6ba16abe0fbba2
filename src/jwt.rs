//! JWT token generation and validation.
//!
//! Access and refresh tokens share one HS256 signing key. Validation reports
//! *why* a token is unusable so the gateway can tell an expired access token
//! (reissue) apart from every other failure (reject).

use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Default access token lifetime: 30 minutes
pub const ACCESS_TOKEN_DURATION: Duration = Duration::from_secs(30 * 60);

/// Default refresh token lifetime: 30 days, matching the refresh record TTL
pub const REFRESH_TOKEN_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Presented as the bearer credential on every request
    Access,
    /// Kept server-side in the refresh store, never sent by clients
    Refresh,
}

/// JWT claims carried by both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (identity, an email-like string)
    pub sub: String,
    /// Role claim; a single role string
    #[serde(rename = "auth", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Token type
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// JWT ID, unique per minted token
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Why a token was accepted or refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid(Claims),
    /// Correctly signed and well-formed, but `now >= exp`.
    Expired(Claims),
    MalformedFormat,
    UnsupportedFormat,
    BadSignature,
    OtherInvalid,
}

impl ValidationOutcome {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Valid(_) => "valid",
            Self::Expired(_) => "expired",
            Self::MalformedFormat => "malformed format",
            Self::UnsupportedFormat => "unsupported format",
            Self::BadSignature => "bad signature",
            Self::OtherInvalid => "invalid",
        }
    }
}

/// Lifetimes applied when minting tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: ACCESS_TOKEN_DURATION,
            refresh: REFRESH_TOKEN_DURATION,
        }
    }
}

/// Signing material and token lifetimes, built once at startup and shared
/// read-only behind an `Arc`.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    lifetimes: TokenLifetimes,
}

/// A freshly minted token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// JWT ID
    pub jti: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given raw secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            lifetimes: TokenLifetimes::default(),
        }
    }

    /// Create a configuration from a base64 encoded secret.
    pub fn from_base64_secret(encoded: &str) -> Result<Self, JwtError> {
        let secret = STANDARD
            .decode(encoded.trim())
            .map_err(JwtError::SecretDecoding)?;
        Ok(Self::new(&secret))
    }

    pub fn with_lifetimes(mut self, lifetimes: TokenLifetimes) -> Self {
        self.lifetimes = lifetimes;
        self
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Mint a token for `identity` expiring `ttl` from now.
    pub fn create(
        &self,
        identity: &str,
        role: Option<&str>,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken, JwtError> {
        let now = unix_now()?;
        let exp = now
            .checked_add(ttl.as_secs())
            .ok_or(JwtError::LifetimeOverflow)?;
        let jti = uuid::Uuid::new_v4().to_string();

        let claims = Claims {
            sub: identity.to_string(),
            role: role.map(str::to_string),
            kind,
            jti: jti.clone(),
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            jti,
            issued_at: now,
            expires_at: exp,
        })
    }

    /// Mint an access token with the configured access lifetime.
    pub fn create_access(&self, identity: &str, role: Option<&str>) -> Result<IssuedToken, JwtError> {
        self.create(identity, role, TokenKind::Access, self.lifetimes.access)
    }

    /// Mint a refresh token with the configured refresh lifetime.
    pub fn create_refresh(&self, identity: &str, role: Option<&str>) -> Result<IssuedToken, JwtError> {
        self.create(identity, role, TokenKind::Refresh, self.lifetimes.refresh)
    }

    /// Check signature and format first, then expiry.
    pub fn validate(&self, token: &str) -> ValidationOutcome {
        let claims = match self.decode(token) {
            Ok(claims) => claims,
            Err(JwtError::Decoding(e)) => return classify(e.kind()),
            Err(_) => return ValidationOutcome::OtherInvalid,
        };

        match unix_now() {
            Ok(now) if now < claims.exp => ValidationOutcome::Valid(claims),
            Ok(_) => ValidationOutcome::Expired(claims),
            Err(_) => ValidationOutcome::OtherInvalid,
        }
    }

    /// Read claims from a correctly signed token, ignoring expiry.
    pub fn parse_claims(&self, token: &str) -> Result<Claims, JwtError> {
        self.decode(token)
    }

    fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        // Expiry is compared in `validate` so that `exp` itself already counts
        // as expired and expired claims stay readable.
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "sub".to_string()]);

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(JwtError::Decoding)
    }
}

fn classify(kind: &ErrorKind) -> ValidationOutcome {
    match kind {
        ErrorKind::InvalidSignature => ValidationOutcome::BadSignature,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            ValidationOutcome::MalformedFormat
        }
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            ValidationOutcome::UnsupportedFormat
        }
        _ => ValidationOutcome::OtherInvalid,
    }
}

/// Current Unix time in whole seconds.
pub(crate) fn unix_now() -> Result<u64, JwtError> {
    unix_secs(SystemTime::now())
}

/// Whole seconds since the Unix epoch; earlier times are an error.
pub(crate) fn unix_secs(time: SystemTime) -> Result<u64, JwtError> {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token
    Decoding(jsonwebtoken::errors::Error),
    /// Signing secret is not valid base64
    SecretDecoding(base64::DecodeError),
    /// System time error
    TimeError,
    /// Token lifetime pushes `exp` past the representable range
    LifetimeOverflow,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::SecretDecoding(e) => write!(f, "Signing secret is not valid base64: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::LifetimeOverflow => write!(f, "Token lifetime is too long"),
        }
    }
}

impl std::error::Error for JwtError {}
