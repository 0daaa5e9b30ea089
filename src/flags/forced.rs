//! Per-request forced decisions.
//!
//! A caller can pin a flag to a variation by sending a JSON array in the
//! `x-forced-decisions` header:
//!
//! ```text
//! x-forced-decisions: [{"flagKey":"checkout","variationKey":"on"},
//!                      {"flagKey":"banner","ruleKey":"beta","variationKey":"b"}]
//! ```
//!
//! Without `ruleKey` the override applies to the flag as a whole. With it,
//! the override only applies when the decision service lands on that rule.
//!
//! The header is untrusted. Anything that isn't exactly this shape (extra
//! fields, wrong types, empty keys, non-text bytes) causes the whole header
//! to be ignored.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::request::Request;

pub const FORCED_DECISIONS_HEADER: &str = "x-forced-decisions";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForcedDecision {
    pub flag_key: String,
    #[serde(default)]
    pub rule_key: Option<String>,
    pub variation_key: String,
}

impl ForcedDecision {
    pub fn flag(flag_key: impl Into<String>, variation_key: impl Into<String>) -> Self {
        Self { flag_key: flag_key.into(), rule_key: None, variation_key: variation_key.into() }
    }

    pub fn rule(
        flag_key: impl Into<String>,
        rule_key: impl Into<String>,
        variation_key: impl Into<String>,
    ) -> Self {
        Self {
            flag_key: flag_key.into(),
            rule_key: Some(rule_key.into()),
            variation_key: variation_key.into(),
        }
    }

    fn is_valid(&self) -> bool {
        !self.flag_key.is_empty()
            && !self.variation_key.is_empty()
            && self.rule_key.as_deref().is_none_or(|r| !r.is_empty())
    }
}

/// Parse a header payload. Returns an empty list for anything malformed.
pub fn parse(raw: &str) -> Vec<ForcedDecision> {
    match serde_json::from_str::<Vec<ForcedDecision>>(raw) {
        Ok(list) if list.iter().all(ForcedDecision::is_valid) => list,
        Ok(_) => {
            debug!("ignoring forced decisions: empty key");
            Vec::new()
        }
        Err(e) => {
            debug!(error = %e, "ignoring malformed forced decisions");
            Vec::new()
        }
    }
}

/// Forced decisions carried by `req`, if any.
pub fn from_request(req: &Request) -> Vec<ForcedDecision> {
    let Some(value) = req.headers().get(FORCED_DECISIONS_HEADER) else {
        return Vec::new();
    };
    match value.to_str() {
        Ok(raw) => parse(raw),
        Err(e) => {
            debug!(error = %e, "ignoring unreadable forced decisions header");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::HeaderValue;

    use super::*;

    #[test]
    fn parses_flag_and_rule_overrides() {
        let parsed = parse(
            r#"[{"flagKey":"a","variationKey":"on"},
                {"flagKey":"b","ruleKey":"r","variationKey":"v"},
                {"flagKey":"c","ruleKey":null,"variationKey":"x"}]"#,
        );
        assert_eq!(
            parsed,
            [
                ForcedDecision::flag("a", "on"),
                ForcedDecision::rule("b", "r", "v"),
                ForcedDecision::flag("c", "x"),
            ]
        );
    }

    #[test]
    fn rejects_anything_off_schema() {
        for raw in [
            "",
            "not json",
            r#"{"flagKey":"a","variationKey":"on"}"#,
            r#"[{"flagKey":"a"}]"#,
            r#"[{"flagKey":"a","variationKey":1}]"#,
            r#"[{"flagKey":"a","variationKey":"on","extra":true}]"#,
            r#"[{"flagKey":"","variationKey":"on"}]"#,
            r#"[{"flagKey":"a","ruleKey":"","variationKey":"on"}]"#,
            r#"[{"flagKey":"a","variationKey":"on"},{"oops":1}]"#,
        ] {
            assert!(parse(raw).is_empty(), "accepted {raw:?}");
        }
    }

    #[test]
    fn empty_array_is_fine() {
        assert!(parse("[]").is_empty());
    }

    #[test]
    fn reads_from_request_header() {
        let req = |value: &[u8]| {
            Request::from(
                http::Request::builder()
                    .header(FORCED_DECISIONS_HEADER, HeaderValue::from_bytes(value).unwrap())
                    .body(Bytes::new())
                    .unwrap(),
            )
        };
        assert_eq!(
            from_request(&req(br#"[{"flagKey":"a","variationKey":"on"}]"#)),
            [ForcedDecision::flag("a", "on")]
        );
        assert!(from_request(&req(b"[\xff]")).is_empty());

        let bare = Request::from(http::Request::new(Bytes::new()));
        assert!(from_request(&bare).is_empty());
    }
}
