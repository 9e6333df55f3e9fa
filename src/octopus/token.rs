//! Session token management for the Kraken API.
//!
//! Kraken issues JWT bearer tokens from the login mutation. The expiry is
//! read from the `exp` claim so the client can re-authenticate before the
//! token actually lapses.

use crate::logging::get_logger;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};

/// Treat a token as expired this many seconds before its real expiry
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Assumed validity when the expiry claim cannot be decoded
const FALLBACK_VALIDITY_SECS: i64 = 3600;

/// Holds the current JWT and its decoded expiry
#[derive(Debug, Default)]
pub struct TokenManager {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenManager {
    /// Create an empty token manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new token and decode its expiry from the JWT payload
    pub fn set_token(&mut self, token: String) {
        let logger = get_logger("token");
        match decode_jwt_expiry(&token) {
            Some(expiry) => {
                let valid_for = (expiry - Utc::now()).num_seconds();
                logger.info(&format!("Token set, valid for {} seconds", valid_for));
                self.expires_at = Some(expiry);
            }
            None => {
                logger.warn("Could not decode token expiry, assuming 1 hour validity");
                self.expires_at = Some(Utc::now() + chrono::Duration::seconds(FALLBACK_VALIDITY_SECS));
            }
        }
        self.token = Some(token);
    }

    /// Current token, if any
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Whether the token is still usable, with the expiry margin applied
    pub fn is_valid(&self) -> bool {
        match (&self.token, self.expires_at) {
            (Some(_), Some(expiry)) => {
                Utc::now() < expiry - chrono::Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS)
            }
            _ => false,
        }
    }

    /// Seconds until expiry, zero when absent or lapsed
    pub fn expires_in(&self) -> i64 {
        self.expires_at
            .map(|expiry| (expiry - Utc::now()).num_seconds().max(0))
            .unwrap_or(0)
    }

    /// Forget the current token
    pub fn clear(&mut self) {
        self.token = None;
        self.expires_at = None;
    }

    /// Authorization header value for the current token
    pub fn authorization_value(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("JWT {}", t))
    }
}

/// Decode the `exp` claim from a JWT without verifying the signature
fn decode_jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    Utc.timestamp_opt(exp, 0).single()
}
