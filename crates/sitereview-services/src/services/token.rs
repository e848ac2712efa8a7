use rand::Rng;
use serde::Serialize;
use sitereview_core::constants::TOKEN_MAX_ATTEMPTS;
use sitereview_core::{AppError, Clock, ReviewToken, SystemClock, TokenLookup};
use std::sync::Arc;
use thiserror::Error;

const TOKEN_MIN: u32 = 100_000;
const TOKEN_MAX: u32 = 999_999;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token lookup failed: {0}")]
    Lookup(#[source] anyhow::Error),

    #[error("Invalid token value: {0}")]
    Invalid(#[source] anyhow::Error),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: anyhow::Error::new(err),
        }
    }
}

/// How a token was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenOrigin {
    /// Checked against the lookup and free at generation time.
    Unique { attempts: u32 },
    /// Every attempt collided; derived from the clock and not checked.
    Fallback { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedToken {
    pub token: ReviewToken,
    pub origin: TokenOrigin,
}

/// Generates six-digit review tokens.
///
/// Draws uniformly from `100000..=999999` and asks the lookup whether the
/// candidate is taken, up to `max_attempts` times. When every draw collides
/// the token is the last six digits of the current Unix time in
/// milliseconds, zero-padded, and is returned without another lookup. That
/// fallback can collide with a stored token and can be below `100000`.
#[derive(Clone)]
pub struct TokenGenerator {
    max_attempts: u32,
    clock: Arc<dyn Clock>,
}

impl TokenGenerator {
    pub fn new(max_attempts: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_attempts,
            clock,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn generate(&self, lookup: &dyn TokenLookup) -> Result<GeneratedToken, TokenError> {
        let mut attempts = 0;

        while attempts < self.max_attempts {
            attempts += 1;
            let candidate = draw_candidate();
            let token = ReviewToken::from_number(candidate).map_err(TokenError::Invalid)?;

            let taken = lookup
                .token_exists(token.as_str())
                .await
                .map_err(TokenError::Lookup)?;

            if !taken {
                tracing::debug!(attempts, "Generated unique review token");
                return Ok(GeneratedToken {
                    token,
                    origin: TokenOrigin::Unique { attempts },
                });
            }
        }

        let millis = self.clock.now_millis().rem_euclid(1_000_000) as u32;
        let token = ReviewToken::from_number(millis).map_err(TokenError::Invalid)?;

        tracing::warn!(
            attempts,
            token = %token,
            "Could not find a free review token, using time-based fallback"
        );

        Ok(GeneratedToken {
            token,
            origin: TokenOrigin::Fallback { attempts },
        })
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new(TOKEN_MAX_ATTEMPTS, Arc::new(SystemClock))
    }
}

fn draw_candidate() -> u32 {
    rand::rng().random_range(TOKEN_MIN..=TOKEN_MAX)
}
