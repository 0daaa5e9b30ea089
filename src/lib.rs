//! # flagline
//!
//! Anonymous session identity and feature-flag delivery for hyper services.
//!
//! Two pieces do the work:
//!
//! - [`middleware::session::SessionIdentity`] gives every client a random
//!   `sessionToken` cookie the first time it shows up without one. It never
//!   blocks a request: if anything goes wrong the request simply proceeds
//!   without the cookie.
//! - [`flags::FlagClient`] wraps an external decision service behind the
//!   [`flags::DecisionProvider`] trait. [`flags::Flag`] uses the session
//!   token as the user id and answers with a [`flags::Decision`], falling back
//!   to a disabled decision on any failure.
//!
//! Around them sits just enough framework to host them: radix-tree routing
//! via [`matchit`], a middleware chain, HTTP/1.1 + HTTP/2 through hyper, and
//! graceful shutdown on SIGTERM / Ctrl-C.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use flagline::flags::{Flag, FlagClient, FlagOptions, StaticProvider};
//! use flagline::middleware::{session::SessionIdentity, trace::Trace};
//! use flagline::{Config, Request, Router, Server, health};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), flagline::Error> {
//!     let config = Config::from_env()?;
//!     let client = FlagClient::initialize(StaticProvider::new(), (&config).into());
//!     let flag = Flag::new("rollout_to_specific_audiences");
//!
//!     let decide = {
//!         let client = client.clone();
//!         move |req: Request| {
//!             let (client, flag) = (client.clone(), flag.clone());
//!             async move { flag.evaluate(&req, &client).await }
//!         }
//!     };
//!
//!     let app = Router::new()
//!         .get("/flag", decide)
//!         .get("/readyz", health::readiness(client.clone()))
//!         .layer(Trace)
//!         .layer(SessionIdentity::from_config(&config));
//!
//!     Server::bind(config.bind.clone()).serve(app).await?;
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod flags;
pub mod health;
pub mod middleware;

pub use config::Config;
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use request::{CookieHeaderError, Request};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
