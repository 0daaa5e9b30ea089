//! Feature flags backed by an external decision service.
//!
//! The decision service (bucketing, targeting, rollouts) sits behind the
//! [`DecisionProvider`] trait and is treated as a black box. This module
//! adds what sits around it:
//!
//! - [`FlagClient`] — the shared, explicitly injected handle with a
//!   `initialize → ready → decide → shutdown` lifecycle
//! - [`Flag`] — a named flag that derives [`Entities`] from the request and
//!   falls back to a disabled [`Decision`] on any failure
//! - [`forced`] — per-request overrides read from the `x-forced-decisions` header
//!
//! ```rust,no_run
//! use flagline::flags::{Decision, Flag, FlagClient, FlagOptions, StaticProvider};
//! use flagline::Request;
//!
//! # async fn run(req: Request) {
//! let provider = StaticProvider::new().flag(Decision {
//!     variation_key: Some("on".into()),
//!     enabled: true,
//!     variables: Default::default(),
//!     rule_key: Some("everyone".into()),
//!     flag_key: "new_checkout".into(),
//! });
//! let client = FlagClient::initialize(provider, FlagOptions::default());
//!
//! let flag = Flag::new("new_checkout");
//! let decision = flag.evaluate(&req, &client).await;
//! # }
//! ```

mod client;
mod decision;
mod entities;
mod flag;
pub mod forced;
mod provider;

pub use client::{FlagClient, FlagOptions};
pub use decision::{Decision, Variables};
pub use entities::{Attributes, Entities};
pub use flag::{Flag, StaticFlag};
pub use forced::ForcedDecision;
pub use provider::{BoxError, DecisionProvider, StaticProvider, UserContext};

/// Why a decision could not be produced.
///
/// [`Flag::evaluate`] turns every variant into [`Decision::disabled`]; call
/// [`FlagClient::decide`] directly to see them.
#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    #[error("a user id is required for a decision")]
    MissingUserId,

    #[error("decision service unavailable: {0}")]
    Unavailable(String),

    #[error("decision service failed: {0}")]
    Provider(#[source] BoxError),

    #[error("flag client is shut down")]
    Closed,
}
