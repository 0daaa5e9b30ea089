use serde::{Deserialize, Serialize};
use tracing::error;

use crate::response::{IntoResponse, Response};

/// Variable name → value for the selected variation.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// The outcome of evaluating one flag for one identity.
///
/// Serialises with camelCase keys:
/// `{"variationKey":…,"enabled":…,"variables":{…},"ruleKey":…,"flagKey":…}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub variation_key: Option<String>,
    pub enabled: bool,
    #[serde(default)]
    pub variables: Variables,
    pub rule_key: Option<String>,
    pub flag_key: String,
}

impl Decision {
    /// The safe default: no variation, disabled, no variables, no rule.
    pub fn disabled(flag_key: impl Into<String>) -> Self {
        Self {
            variation_key: None,
            enabled: false,
            variables: Variables::new(),
            rule_key: None,
            flag_key: flag_key.into(),
        }
    }
}

impl IntoResponse for Decision {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self) {
            Ok(bytes) => Response::json(bytes),
            Err(e) => {
                error!(flag = %self.flag_key, "decision serialisation failed: {e}");
                Response::status(http::StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn disabled_shape() {
        let value = serde_json::to_value(Decision::disabled("f")).unwrap();
        assert_eq!(
            value,
            json!({
                "variationKey": null,
                "enabled": false,
                "variables": {},
                "ruleKey": null,
                "flagKey": "f",
            })
        );
    }

    #[test]
    fn renders_as_json_response() {
        let mut variables = Variables::new();
        variables.insert("headline".into(), json!("Hello"));
        let res = Decision {
            variation_key: Some("on".into()),
            enabled: true,
            variables,
            rule_key: Some("r1".into()),
            flag_key: "f".into(),
        }
        .into_response();

        assert_eq!(res.headers()[http::header::CONTENT_TYPE], "application/json");
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["variationKey"], "on");
        assert_eq!(body["variables"]["headline"], "Hello");
    }
}
