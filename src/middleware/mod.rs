//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns. A middleware receives the request and a [`Next`]
//! handle to the rest of the chain; it may act before calling
//! [`Next::run`], after it, or both.
//!
//! Built-in middleware:
//! - [`session::SessionIdentity`] — assigns the anonymous `sessionToken` cookie
//! - [`trace::Trace`] — per-request span with method, path, status, latency
//!
//! Ad-hoc middleware can be written as a closure with [`from_fn`]:
//!
//! ```rust
//! use flagline::{Router, middleware::from_fn};
//!
//! let app = Router::new().layer(from_fn(|req, next| async move {
//!     tracing::debug!(path = req.path(), "before");
//!     next.run(req).await
//! }));
//! ```

pub mod session;
pub mod trace;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::Response;

/// A request/response interceptor installed with
/// [`Router::layer`](crate::Router::layer).
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// The remainder of the chain: the middleware not yet run, then the handler.
pub struct Next {
    stack: Arc<[BoxedMiddleware]>,
    pos: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(stack: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { stack, pos: 0, endpoint }
    }

    /// Pass the request on and wait for the response.
    pub async fn run(mut self, req: Request) -> Response {
        match self.stack.get(self.pos).cloned() {
            Some(middleware) => {
                self.pos += 1;
                middleware.handle(req, self).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

/// Wrap an async closure as a [`Middleware`].
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FromFn(f)
}

/// Middleware built by [`from_fn`].
pub struct FromFn<F>(F);

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin((self.0)(req, next))
    }
}
