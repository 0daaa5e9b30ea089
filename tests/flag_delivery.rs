use bytes::Bytes;
use cookie::Cookie;
use flagline::config::Environment;
use flagline::flags::{Decision, Flag, FlagClient, FlagOptions, StaticProvider};
use flagline::middleware::session::{SESSION_COOKIE_NAME, SessionIdentity};
use flagline::{Request, Router};
use http::header;

const ROLLOUT: &str = "rollout_to_specific_audiences";

fn app() -> Router {
    let provider = StaticProvider::new().flag(Decision {
        variation_key: Some("off".into()),
        enabled: false,
        variables: Default::default(),
        rule_key: Some("default-rollout".into()),
        flag_key: ROLLOUT.into(),
    });
    let client = FlagClient::initialize(provider, FlagOptions::default());
    let flag = Flag::new(ROLLOUT).attribute("HasUserProductX", true);

    Router::new()
        .get("/flag", move |req: Request| {
            let (client, flag) = (client.clone(), flag.clone());
            async move { flag.evaluate(&req, &client).await }
        })
        .layer(SessionIdentity::new(Environment::Production))
}

fn get(headers: &[(&str, &str)]) -> Request {
    let mut req = http::Request::builder().uri("/flag");
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    Request::from(req.body(Bytes::new()).unwrap())
}

fn decision(body: &[u8]) -> Decision {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn first_visit_gets_cookie_and_disabled_flag() {
    let res = app().handle(get(&[])).await;

    let set_cookie = res.headers().get_all(header::SET_COOKIE).iter().collect::<Vec<_>>();
    assert_eq!(set_cookie.len(), 1);
    let cookie = Cookie::parse(set_cookie[0].to_str().unwrap()).unwrap();
    assert_eq!(cookie.name(), SESSION_COOKIE_NAME);
    assert!(!cookie.value().is_empty());
    assert_eq!(cookie.secure(), Some(true));

    // The cookie only arrives with this response, so the flag has no user yet.
    assert_eq!(decision(res.body()), Decision::disabled(ROLLOUT));
}

#[tokio::test]
async fn returning_visit_is_decided_by_provider() {
    let res = app().handle(get(&[("cookie", "sessionToken=abc")])).await;
    assert!(res.headers().get(header::SET_COOKIE).is_none());

    let decision = decision(res.body());
    assert_eq!(decision.variation_key.as_deref(), Some("off"));
    assert!(!decision.enabled);
}

#[tokio::test]
async fn forced_decision_header_overrides_provider() {
    let res = app()
        .handle(get(&[
            ("cookie", "sessionToken=abc"),
            (
                "x-forced-decisions",
                r#"[{"flagKey":"rollout_to_specific_audiences","variationKey":"on"}]"#,
            ),
        ]))
        .await;

    let decision = decision(res.body());
    assert_eq!(decision.variation_key.as_deref(), Some("on"));
    assert!(decision.enabled);
    assert_eq!(decision.flag_key, ROLLOUT);
}

#[tokio::test]
async fn garbage_override_header_is_ignored() {
    let res = app()
        .handle(get(&[("cookie", "sessionToken=abc"), ("x-forced-decisions", "{{{")]))
        .await;
    assert_eq!(decision(res.body()).variation_key.as_deref(), Some("off"));
}
