use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::client::FlagClient;
use super::decision::Decision;
use super::entities::{Attributes, Entities};
use super::{FlagError, forced};
use crate::middleware::session::session_id;
use crate::request::Request;

type Identify = Arc<dyn Fn(&Request) -> Entities + Send + Sync>;

/// A flag decided by the decision service.
///
/// By default the user id is the caller's session cookie, so a first-time
/// visitor (no cookie yet) gets the disabled decision.
#[derive(Clone)]
pub struct Flag {
    key: String,
    identify: Identify,
    attributes: Attributes,
}

impl Flag {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            identify: Arc::new(|req: &Request| Entities {
                user_id: session_id(req),
                attributes: Attributes::new(),
            }),
            attributes: Attributes::new(),
        }
    }

    /// Adds a fixed attribute sent with every decision for this flag.
    /// Attributes returned by `identify` take precedence.
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Replaces how entities are derived from the request.
    pub fn identify(
        mut self,
        identify: impl Fn(&Request) -> Entities + Send + Sync + 'static,
    ) -> Self {
        self.identify = Arc::new(identify);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entities(&self, req: &Request) -> Entities {
        let mut entities = (self.identify)(req);
        for (name, value) in &self.attributes {
            entities.attributes.entry(name.clone()).or_insert_with(|| value.clone());
        }
        entities
    }

    /// Decide this flag for `req`. Never fails: any error is logged and
    /// answered with [`Decision::disabled`].
    pub async fn evaluate(&self, req: &Request, client: &FlagClient) -> Decision {
        let entities = self.entities(req);
        let forced = forced::from_request(req);
        match client.decide(&self.key, &entities, &forced).await {
            Ok(decision) => decision,
            Err(FlagError::MissingUserId) => {
                debug!(flag = %self.key, "no user id, flag disabled");
                Decision::disabled(&self.key)
            }
            Err(e) => {
                warn!(flag = %self.key, error = %e, "flag decision failed, using default");
                Decision::disabled(&self.key)
            }
        }
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("key", &self.key)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

/// A flag whose value is fixed in code, e.g. a UI toggle kept for demos.
#[derive(Clone, Debug)]
pub struct StaticFlag<T> {
    key: &'static str,
    value: T,
}

impl<T: Clone> StaticFlag<T> {
    pub const fn new(key: &'static str, value: T) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn decide(&self) -> T {
        self.value.clone()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::header;
    use serde_json::json;

    use super::*;
    use crate::flags::forced::FORCED_DECISIONS_HEADER;
    use crate::flags::{FlagOptions, StaticProvider};

    const ROLLOUT: &str = "rollout_to_specific_audiences";

    fn request(headers: &[(&str, &str)]) -> Request {
        let mut req = http::Request::builder().uri("/");
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        Request::from(req.body(Bytes::new()).unwrap())
    }

    fn client() -> FlagClient {
        let provider = StaticProvider::new().flag(Decision {
            variation_key: Some("off".into()),
            enabled: false,
            variables: Default::default(),
            rule_key: Some("default-rollout".into()),
            flag_key: ROLLOUT.into(),
        });
        FlagClient::initialize(provider, FlagOptions::default())
    }

    #[test]
    fn default_identify_uses_session_cookie() {
        let flag = Flag::new(ROLLOUT).attribute("HasUserProductX", true);
        let entities = flag.entities(&request(&[(header::COOKIE.as_str(), "sessionToken=abc")]));
        assert_eq!(entities.user_id.as_deref(), Some("abc"));
        assert_eq!(entities.attributes["HasUserProductX"], json!(true));
    }

    #[test]
    fn identified_attributes_take_precedence() {
        let flag = Flag::new(ROLLOUT)
            .attribute("plan", "free")
            .attribute("region", "eu")
            .identify(|_req| Entities::user("fixed").attribute("plan", "pro"));
        let entities = flag.entities(&request(&[]));
        assert_eq!(entities.user_id.as_deref(), Some("fixed"));
        assert_eq!(entities.attributes["plan"], json!("pro"));
        assert_eq!(entities.attributes["region"], json!("eu"));
    }

    #[tokio::test]
    async fn no_session_means_disabled() {
        let decision = Flag::new(ROLLOUT).evaluate(&request(&[]), &client()).await;
        assert_eq!(decision, Decision::disabled(ROLLOUT));
    }

    #[tokio::test]
    async fn provider_decision_for_known_session() {
        let req = request(&[("cookie", "sessionToken=abc")]);
        let decision = Flag::new(ROLLOUT).evaluate(&req, &client()).await;
        assert_eq!(decision.variation_key.as_deref(), Some("off"));
        assert_eq!(decision.rule_key.as_deref(), Some("default-rollout"));
    }

    #[tokio::test]
    async fn header_override_forces_variation() {
        let req = request(&[
            ("cookie", "sessionToken=abc"),
            (
                FORCED_DECISIONS_HEADER,
                r#"[{"flagKey":"rollout_to_specific_audiences","variationKey":"on"}]"#,
            ),
        ]);
        let decision = Flag::new(ROLLOUT).evaluate(&req, &client()).await;
        assert_eq!(decision.variation_key.as_deref(), Some("on"));
        assert!(decision.enabled);
        assert_eq!(decision.flag_key, ROLLOUT);
    }

    #[tokio::test]
    async fn malformed_override_is_ignored() {
        let req = request(&[
            ("cookie", "sessionToken=abc"),
            (FORCED_DECISIONS_HEADER, r#"[{"flagKey":"rollout_to_specific_audiences"}]"#),
        ]);
        let decision = Flag::new(ROLLOUT).evaluate(&req, &client()).await;
        assert_eq!(decision.variation_key.as_deref(), Some("off"));
    }

    #[tokio::test]
    async fn closed_client_falls_back_to_disabled() {
        let client = client();
        client.shutdown().await;
        let req = request(&[("cookie", "sessionToken=abc")]);
        let decision = Flag::new(ROLLOUT).evaluate(&req, &client).await;
        assert_eq!(decision, Decision::disabled(ROLLOUT));
    }

    #[test]
    fn static_flag_is_constant() {
        const REORDER: StaticFlag<bool> = StaticFlag::new("reorder-homepage-heading", false);
        assert_eq!(REORDER.key(), "reorder-homepage-heading");
        assert!(!REORDER.decide());
    }
}
