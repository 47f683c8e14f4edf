//! Correlation token generation.

use uuid::Uuid;

/// Produces client request tokens that tag one logical operation.
///
/// Every event the provider emits for that operation carries the token,
/// which is how the event poller tells operations apart.
pub trait TokenSource: Send + Sync {
    /// Returns a token never issued before by this source.
    fn next_token(&self) -> String;
}

/// Issues `{prefix}-{uuid v4}` tokens.
#[derive(Debug, Clone)]
pub struct UuidTokenSource {
    prefix: String,
}

impl UuidTokenSource {
    /// Creates a source with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for UuidTokenSource {
    fn default() -> Self {
        Self::new("stackwright")
    }
}

impl TokenSource for UuidTokenSource {
    fn next_token(&self) -> String {
        format!("{}-{}", self.prefix, Uuid::new_v4())
    }
}
