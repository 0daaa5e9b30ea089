//! Minimal flagline example — session cookies, one flag, health checks.
//!
//! Run with:
//!   FLAGLINE_SDK_KEY=dev RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/                  # first visit: Set-Cookie
//!   curl -i -b sessionToken=abc http://localhost:3000/flag
//!   curl -b sessionToken=abc \
//!        -H 'x-forced-decisions: [{"flagKey":"rollout_to_specific_audiences","variationKey":"on"}]' \
//!        http://localhost:3000/flag
//!   curl http://localhost:3000/readyz

use flagline::flags::{Decision, Flag, FlagClient, StaticFlag, StaticProvider};
use flagline::middleware::{session::SessionIdentity, trace::Trace};
use flagline::{Config, Request, Response, Router, Server, health};

const REORDER_HOME_HEADING: StaticFlag<bool> = StaticFlag::new("reorder-homepage-heading", false);

#[tokio::main]
async fn main() -> Result<(), flagline::Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    // A real deployment plugs the vendor SDK in here as a DecisionProvider,
    // keyed by config.sdk_key and refreshing every config.update_interval.
    tracing::info!(update_interval = ?config.update_interval, "using static decision provider");
    let provider = StaticProvider::new().flag(Decision {
        variation_key: Some("off".into()),
        enabled: false,
        variables: Default::default(),
        rule_key: Some("default-rollout".into()),
        flag_key: "rollout_to_specific_audiences".into(),
    });
    let client = FlagClient::initialize(provider, (&config).into());

    let rollout = Flag::new("rollout_to_specific_audiences").attribute("HasUserProductX", true);
    let decide = {
        let client = client.clone();
        move |req: Request| {
            let (client, rollout) = (client.clone(), rollout.clone());
            async move { rollout.evaluate(&req, &client).await }
        }
    };

    let app = Router::new()
        .get("/", home)
        .get("/flag", decide)
        .get("/healthz", health::liveness)
        .get("/readyz", health::readiness(client.clone()))
        .layer(Trace)
        .layer(SessionIdentity::from_config(&config));

    Server::bind(config.bind.clone()).serve(app).await?;
    client.shutdown().await;
    Ok(())
}

// GET / — heading order comes from a flag fixed in code.
async fn home(_req: Request) -> Response {
    if REORDER_HOME_HEADING.decide() {
        Response::text("Welcome back\nflagline demo")
    } else {
        Response::text("flagline demo\nWelcome back")
    }
}
