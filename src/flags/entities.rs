use serde_json::Value;

/// Attribute name → value, used by the decision service for targeting.
pub type Attributes = serde_json::Map<String, Value>;

/// Who a decision is for.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entities {
    pub user_id: Option<String>,
    pub attributes: Attributes,
}

impl Entities {
    pub fn user(id: impl Into<String>) -> Self {
        Self { user_id: Some(id.into()), attributes: Attributes::new() }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}
