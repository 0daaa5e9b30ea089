//! HTTP server and graceful shutdown.
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. Immediately stops `listener.accept()` — no new connections are made.
//! 2. Tells every open connection to finish its in-flight request and close,
//!    idle keep-alive and HTTP/2 connections included.
//! 3. Waits up to the drain timeout for them, then aborts the stragglers.
//! 4. Returns from [`Server::serve`], after which `main` should call
//!    [`FlagClient::shutdown`](crate::flags::FlagClient::shutdown).
//!
//! Keep the drain timeout below the orchestrator's kill grace period
//! (30 s by default on Kubernetes) so the flag client still gets closed.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(25);

/// The HTTP server.
pub struct Server {
    addr: String,
    drain_timeout: Duration,
}

impl Server {
    /// Configures the server to bind to `addr` (`host:port`) when
    /// [`serve`](Server::serve) is called.
    ///
    /// ```rust,no_run
    /// use flagline::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), drain_timeout: DEFAULT_DRAIN_TIMEOUT }
    }

    /// How long open connections get to close after the signal. Defaults
    /// to 25 s.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Serves `router` until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Serves `router` until `signal` resolves, then drains.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(&self.addr).await?;
        let local = listener.local_addr()?;

        // Shared by every connection task; the routing table is never copied.
        let router = Arc::new(router);

        info!(addr = %local, "flagline listening");

        // `auto::Builder` handles both HTTP/1.1 and HTTP/2, whatever the
        // client negotiates.
        let builder = ConnBuilder::new(TokioExecutor::new());

        // Every connection is registered here so the signal can reach the
        // ones sitting idle between requests.
        let graceful = GracefulShutdown::new();

        // One task per connection, awaited again during the drain.
        let mut tasks = tokio::task::JoinSet::new();

        // `select!` polls the signal by reference across iterations, so it
        // must stay put in memory.
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Arms are checked top to bottom. Shutdown goes first so a
                // SIGTERM stops accepting at once, even if more connections
                // are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    // Adapts tokio's AsyncRead/AsyncWrite to hyper's IO traits.
                    let io = TokioIo::new(stream);

                    // Called once per request on the connection, not once
                    // per connection.
                    let svc = service_fn(move |req| {
                        let router = Arc::clone(&router);
                        async move { dispatch(router, req, remote_addr).await }
                    });

                    let conn = graceful.watch(builder.serve_connection(io, svc).into_owned());
                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        tokio::select! {
            () = graceful.shutdown() => {
                info!("all connections closed");
            }
            () = tokio::time::sleep(self.drain_timeout) => {
                warn!(
                    remaining = tasks.len(),
                    timeout = ?self.drain_timeout,
                    "drain timed out, aborting open connections"
                );
                tasks.abort_all();
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("flagline stopped");
        Ok(())
    }
}

/// Buffers the body, then hands the request to the router.
///
/// Never returns `Err`: failures become responses.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let response = router.handle(Request::from_parts(parts, body)).await;
    Ok(response.into_inner())
}

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C on Windows).
///
/// If a handler can't be installed that arm never fires; the other still
/// works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // Never resolves, so off Unix only Ctrl-C counts.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::config::Environment;
    use crate::middleware::session::SessionIdentity;

    async fn free_addr() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    }

    #[tokio::test]
    async fn serves_over_tcp_and_drains_on_signal() {
        let addr = free_addr().await;
        let app = Router::new()
            .get("/", |_req: Request| async { "hello" })
            .layer(SessionIdentity::new(Environment::Development));
        let (stop, stopped) = oneshot::channel::<()>();

        let server = tokio::spawn(
            Server::bind(addr.clone()).serve_with_shutdown(app, async move {
                let _ = stopped.await;
            }),
        );

        let mut stream = loop {
            match TcpStream::connect(&addr).await {
                Ok(s) => break s,
                Err(_) => tokio::task::yield_now().await,
            }
        };
        stream
            .write_all(b"GET / HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.to_ascii_lowercase().contains("set-cookie: sessiontoken="));
        assert!(raw.ends_with("hello"));

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn idle_keep_alive_connection_does_not_block_shutdown() {
        let addr = free_addr().await;
        let app = Router::new().get("/", |_req: Request| async { "hello" });
        let (stop, stopped) = oneshot::channel::<()>();

        let server = tokio::spawn(
            Server::bind(addr.clone()).serve_with_shutdown(app, async move {
                let _ = stopped.await;
            }),
        );

        let mut stream = loop {
            match TcpStream::connect(&addr).await {
                Ok(s) => break s,
                Err(_) => tokio::task::yield_now().await,
            }
        };
        stream.write_all(b"GET / HTTP/1.1\r\nhost: test\r\n\r\n").await.unwrap();

        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        while !raw.ends_with(b"hello") {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the response finished");
            raw.extend_from_slice(&chunk[..n]);
        }
        assert!(raw.starts_with(b"HTTP/1.1 200 OK"));

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(3), server)
            .await
            .expect("server kept running with an idle connection open")
            .unwrap()
            .unwrap();

        let n = stream.read(&mut chunk).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn drain_timeout_aborts_slow_requests() {
        let addr = free_addr().await;
        let app = Router::new().get("/", |_req: Request| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "late"
        });
        let (stop, stopped) = oneshot::channel::<()>();

        let server = tokio::spawn(
            Server::bind(addr.clone())
                .drain_timeout(Duration::from_millis(100))
                .serve_with_shutdown(app, async move {
                    let _ = stopped.await;
                }),
        );

        let mut stream = loop {
            match TcpStream::connect(&addr).await {
                Ok(s) => break s,
                Err(_) => tokio::task::yield_now().await,
            }
        };
        stream.write_all(b"GET / HTTP/1.1\r\nhost: test\r\n\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(3), server)
            .await
            .expect("drain timeout was not enforced")
            .unwrap()
            .unwrap();
    }
}
