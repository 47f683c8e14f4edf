//! Deterministic token source.

use parking_lot::Mutex;

use crate::deploy::TokenSource;

/// Issues `{prefix}-1`, `{prefix}-2`, ... and remembers them.
#[derive(Debug)]
pub struct SequentialTokenSource {
    prefix: String,
    issued: Mutex<Vec<String>>,
}

impl SequentialTokenSource {
    /// Creates a source with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Returns every token issued so far, oldest first.
    #[must_use]
    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().clone()
    }
}

impl Default for SequentialTokenSource {
    fn default() -> Self {
        Self::new("token")
    }
}

impl TokenSource for SequentialTokenSource {
    fn next_token(&self) -> String {
        let mut issued = self.issued.lock();
        let token = format!("{}-{}", self.prefix, issued.len() + 1);
        issued.push(token.clone());
        token
    }
}
