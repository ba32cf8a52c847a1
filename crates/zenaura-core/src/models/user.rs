use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User identifier. The identity provider hands out either numeric ids or
/// opaque string ids (`_id` on document stores), so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", n),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId::Number(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId::Text(id.to_string())
    }
}

/// Profile of the currently authenticated user.
///
/// Only `id` is required. Fields the client does not model are kept in
/// `extra` so a profile survives a round trip through the session unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name for display, falling back to email and then the id
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Envelope returned by `GET /auth/me`
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub user: UserProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_profile() {
        let resp: ProfileResponse =
            serde_json::from_str(r#"{"user": {"id": 1, "name": "A"}}"#).unwrap();
        assert_eq!(resp.user, UserProfile::new(1).with_name("A"));
    }

    #[test]
    fn test_parse_document_id_keeps_extra_fields() {
        let json = r#"{"_id": "65f0c2", "email": "a@example.com", "plan": "pro"}"#;
        let user: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, UserId::Text("65f0c2".to_string()));
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
        assert_eq!(user.extra.get("plan"), Some(&Value::from("pro")));
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(UserProfile::new(2).display_name(), "2");
        assert_eq!(UserProfile::new(2).with_name("Ana").display_name(), "Ana");

        let mut user = UserProfile::new("x1");
        user.email = Some("x@example.com".to_string());
        assert_eq!(user.display_name(), "x@example.com");
    }
}
