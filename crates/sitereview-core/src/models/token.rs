use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Length of a review token.
pub const TOKEN_LENGTH: usize = 6;

/// Short numeric token handed to anonymous submitters so they can later
/// claim or update their review.
///
/// Always exactly six ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReviewToken(String);

impl ReviewToken {
    pub fn parse(value: &str) -> Result<Self, anyhow::Error> {
        if value.len() != TOKEN_LENGTH || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(anyhow::anyhow!(
                "review token must be {} ASCII digits, got {:?}",
                TOKEN_LENGTH,
                value
            ));
        }
        Ok(Self(value.to_string()))
    }

    /// Token from a number below 1_000_000, zero-padded to six digits.
    pub fn from_number(value: u32) -> Result<Self, anyhow::Error> {
        if value >= 1_000_000 {
            return Err(anyhow::anyhow!("review token value {} exceeds six digits", value));
        }
        Ok(Self(format!("{:06}", value)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ReviewToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl FromStr for ReviewToken {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ReviewToken {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ReviewToken> for String {
    fn from(token: ReviewToken) -> Self {
        token.0
    }
}

/// Existence check against persisted reviews, used while generating tokens.
#[async_trait]
pub trait TokenLookup: Send + Sync {
    /// Whether a review already carries `candidate` as its token.
    async fn token_exists(&self, candidate: &str) -> anyhow::Result<bool>;
}
