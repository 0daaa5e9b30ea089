//! Health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the decision service answer? Failure → pulled from load-balancer. |
//!
//! ```rust,no_run
//! use flagline::{Router, health};
//! use flagline::flags::{FlagClient, FlagOptions, StaticProvider};
//!
//! let client = FlagClient::initialize(StaticProvider::new(), FlagOptions::default());
//! let app = Router::new()
//!     .get("/healthz", health::liveness)
//!     .get("/readyz", health::readiness(client));
//! ```

use http::StatusCode;

use crate::flags::FlagClient;
use crate::handler::Handler;
use crate::{Request, Response};

/// Liveness probe handler.
///
/// Always returns `200 OK` with body `"ok"`. It has no dependencies.
pub async fn liveness(_req: Request) -> Response {
    Response::text("ok")
}

/// Readiness probe gated on the flag client.
///
/// The first probe triggers the client's startup wait; after that it answers
/// from the cached state. `503` while the decision service is unavailable or
/// after shutdown.
pub fn readiness(client: FlagClient) -> impl Handler {
    move |_req: Request| {
        let client = client.clone();
        async move {
            match client.ready().await {
                Ok(()) => Response::text("ready"),
                Err(_) => Response::status(StatusCode::SERVICE_UNAVAILABLE),
            }
        }
    }
}
