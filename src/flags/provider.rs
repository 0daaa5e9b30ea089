//! The seam to the external decision service.

use std::collections::HashMap;

use async_trait::async_trait;

use super::decision::{Decision, Variables};
use super::entities::Attributes;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An identified user, as handed to the provider. The id is never empty.
#[derive(Clone, Debug, PartialEq)]
pub struct UserContext {
    pub user_id: String,
    pub attributes: Attributes,
}

/// An external experimentation / decision service.
///
/// Implementations own the vendor SDK: config sync, bucketing, event
/// dispatch. [`FlagClient`](super::FlagClient) guarantees `ready` has
/// succeeded before `decide` is called, and calls `close` at most once.
#[async_trait]
pub trait DecisionProvider: Send + Sync + 'static {
    /// Resolves once the provider can answer decisions. The client bounds it
    /// with its own timeout, so this may wait indefinitely.
    async fn ready(&self) -> Result<(), BoxError>;

    async fn decide(&self, user: &UserContext, flag_key: &str) -> Result<Decision, BoxError>;

    /// Variables attached to a variation, used when a forced decision picks
    /// the variation instead of the provider.
    fn variation_variables(&self, _flag_key: &str, _variation_key: &str) -> Variables {
        Variables::new()
    }

    /// Flush and release resources.
    async fn close(&self) {}
}

/// A fixed, in-memory provider for local development and tests.
///
/// Every user gets the same configured decision for a flag; unknown flags are
/// disabled. There is no targeting or bucketing.
#[derive(Clone, Debug, Default)]
pub struct StaticProvider {
    flags: HashMap<String, Decision>,
    variations: HashMap<(String, String), Variables>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `decision` for `decision.flag_key`.
    pub fn flag(mut self, decision: Decision) -> Self {
        self.flags.insert(decision.flag_key.clone(), decision);
        self
    }

    /// Variables returned when `variation_key` is forced on `flag_key`.
    pub fn variation(
        mut self,
        flag_key: impl Into<String>,
        variation_key: impl Into<String>,
        variables: Variables,
    ) -> Self {
        self.variations.insert((flag_key.into(), variation_key.into()), variables);
        self
    }
}

#[async_trait]
impl DecisionProvider for StaticProvider {
    async fn ready(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn decide(&self, _user: &UserContext, flag_key: &str) -> Result<Decision, BoxError> {
        Ok(self
            .flags
            .get(flag_key)
            .cloned()
            .unwrap_or_else(|| Decision::disabled(flag_key)))
    }

    fn variation_variables(&self, flag_key: &str, variation_key: &str) -> Variables {
        self.variations
            .get(&(flag_key.to_owned(), variation_key.to_owned()))
            .cloned()
            .unwrap_or_default()
    }
}
