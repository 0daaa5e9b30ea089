use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::FlagError;
use super::decision::Decision;
use super::entities::Entities;
use super::forced::ForcedDecision;
use super::provider::{DecisionProvider, UserContext};
use crate::config::Config;

#[derive(Clone, Debug)]
pub struct FlagOptions {
    /// How long [`FlagClient::ready`] waits for the provider.
    pub ready_timeout: Duration,
}

impl Default for FlagOptions {
    fn default() -> Self {
        Self { ready_timeout: Duration::from_millis(5_000) }
    }
}

impl From<&Config> for FlagOptions {
    fn from(config: &Config) -> Self {
        Self { ready_timeout: config.ready_timeout }
    }
}

/// One startup attempt, polled by every caller waiting on it. The error is
/// a message so the output stays `Clone`.
type Attempt = Shared<BoxFuture<'static, Result<(), String>>>;

/// Shared handle on the decision service.
///
/// Construct one at startup with [`initialize`](Self::initialize), clone it
/// into whatever needs decisions, and call [`shutdown`](Self::shutdown) after
/// the server has drained. Clones share one provider and one readiness
/// barrier.
#[derive(Clone)]
pub struct FlagClient {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn DecisionProvider>,
    startup: Mutex<Option<Attempt>>,
    ready: AtomicBool,
    ready_timeout: Duration,
    closed: AtomicBool,
}

impl FlagClient {
    /// Wraps `provider`. Nothing is awaited here; readiness is established
    /// lazily by the first [`ready`](Self::ready) or [`decide`](Self::decide).
    pub fn initialize(provider: impl DecisionProvider, options: FlagOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider: Arc::new(provider),
                startup: Mutex::new(None),
                ready: AtomicBool::new(false),
                ready_timeout: options.ready_timeout,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Waits until the provider is ready, at most `ready_timeout`.
    ///
    /// Concurrent callers join the same attempt and all see its outcome,
    /// success or failure. Success is remembered; a failed attempt is
    /// dropped once it resolves, so the next caller starts a fresh one.
    pub async fn ready(&self) -> Result<(), FlagError> {
        if self.is_closed() {
            return Err(FlagError::Closed);
        }
        if self.inner.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let attempt = {
            let mut slot = self.inner.startup.lock();
            slot.get_or_insert_with(|| self.start()).clone()
        };

        match attempt.clone().await {
            Ok(()) => {
                self.inner.ready.store(true, Ordering::Release);
                Ok(())
            }
            Err(msg) => {
                let mut slot = self.inner.startup.lock();
                if slot.as_ref().is_some_and(|current| current.ptr_eq(&attempt)) {
                    *slot = None;
                }
                Err(FlagError::Unavailable(msg))
            }
        }
    }

    fn start(&self) -> Attempt {
        let provider = Arc::clone(&self.inner.provider);
        let timeout = self.inner.ready_timeout;
        async move {
            match tokio::time::timeout(timeout, provider.ready()).await {
                Ok(Ok(())) => {
                    info!("decision service ready");
                    Ok(())
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "decision service failed to start");
                    Err(e.to_string())
                }
                Err(_) => {
                    warn!(timeout = ?timeout, "decision service not ready in time");
                    Err(format!("not ready within {timeout:?}"))
                }
            }
        }
        .boxed()
        .shared()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire) && !self.is_closed()
    }

    /// Decide `flag_key` for `entities`.
    ///
    /// An entity without a user id fails with [`FlagError::MissingUserId`]
    /// before the provider is touched. A forced decision for the whole flag
    /// wins outright, without waiting for the provider to be ready; one
    /// scoped to a rule wins only if the provider picked that rule. Forced
    /// decisions always come back enabled.
    pub async fn decide(
        &self,
        flag_key: &str,
        entities: &Entities,
        forced: &[ForcedDecision],
    ) -> Result<Decision, FlagError> {
        let Some(user_id) = entities.user_id.as_deref().filter(|id| !id.is_empty()) else {
            return Err(FlagError::MissingUserId);
        };
        if self.is_closed() {
            return Err(FlagError::Closed);
        }

        let mut overrides = forced.iter().filter(|f| f.flag_key == flag_key);
        if let Some(f) = overrides.clone().find(|f| f.rule_key.is_none()) {
            debug!(flag = flag_key, variation = %f.variation_key, "forced decision");
            return Ok(self.forced(f));
        }

        self.ready().await?;

        let user = UserContext {
            user_id: user_id.to_owned(),
            attributes: entities.attributes.clone(),
        };
        let mut decision = self
            .inner
            .provider
            .decide(&user, flag_key)
            .await
            .map_err(FlagError::Provider)?;
        decision.flag_key = flag_key.to_owned();

        if let Some(f) = overrides.find(|f| f.rule_key.is_some() && f.rule_key == decision.rule_key) {
            debug!(flag = flag_key, rule = ?f.rule_key, variation = %f.variation_key, "forced decision for rule");
            return Ok(self.forced(f));
        }

        debug!(
            flag = flag_key,
            enabled = decision.enabled,
            variation = ?decision.variation_key,
            "decision"
        );
        Ok(decision)
    }

    /// Close the provider. Later calls fail with [`FlagError::Closed`];
    /// calling this again is a no-op.
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.provider.close().await;
        info!("flag client shut down");
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn forced(&self, f: &ForcedDecision) -> Decision {
        Decision {
            variation_key: Some(f.variation_key.clone()),
            enabled: true,
            variables: self.inner.provider.variation_variables(&f.flag_key, &f.variation_key),
            rule_key: f.rule_key.clone(),
            flag_key: f.flag_key.clone(),
        }
    }
}
