use std::sync::Arc;

use tracing::{debug, info};

use super::{AccessToken, TokenError, TokenRequest, TokenSource};

/// Ordered list of token sources, tried until one succeeds.
///
/// The chain remembers nothing between calls: the first source is always
/// tried first, even if it failed on the previous request.
#[derive(Clone)]
pub struct TokenChain {
    sources: Vec<Arc<dyn TokenSource>>,
}

impl std::fmt::Debug for TokenChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenChain")
            .field("sources", &self.names())
            .finish()
    }
}

impl TokenChain {
    pub fn new(sources: Vec<Arc<dyn TokenSource>>) -> Result<Self, TokenError> {
        if sources.is_empty() {
            return Err(TokenError::Config(
                "at least one token source is required".to_string(),
            ));
        }
        Ok(Self { sources })
    }

    /// Source names in the order they are tried.
    pub fn names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Acquire a token from the first source that yields one.
    ///
    /// A chain with a single source returns that source's error unchanged;
    /// longer chains report every failure in [`TokenError::Exhausted`].
    pub async fn token(&self, request: &TokenRequest<'_>) -> Result<AccessToken, TokenError> {
        let mut failures = Vec::new();

        for source in &self.sources {
            match source.token(request).await {
                Ok(token) => {
                    info!(
                        name: "token.acquired",
                        source = source.name(),
                        attempts = failures.len() + 1,
                        "Access token acquired"
                    );
                    return Ok(token);
                }
                Err(err) => {
                    debug!(
                        name: "token.source.failed",
                        source = source.name(),
                        error = %err,
                        "Token source failed"
                    );
                    failures.push((source.name(), err));
                }
            }
        }

        if failures.len() == 1 {
            if let Some((_, err)) = failures.pop() {
                return Err(err);
            }
        }
        Err(TokenError::Exhausted(failures))
    }
}
