//! Identity profile built from the user-info response.

use serde::{Deserialize, Serialize};

/// Name parts, when the provider sends them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEmail {
    pub value: String,
}

/// An authenticated user as reported by the provider.
///
/// `raw` is the user-info document exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProfile {
    pub provider: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub name: ProfileName,
    #[serde(default)]
    pub emails: Vec<ProfileEmail>,
    pub raw: serde_json::Value,
}

impl IdentityProfile {
    /// Build a profile for `subject` from a user-info document.
    #[must_use]
    pub fn from_userinfo(provider: &str, subject: &str, userinfo: serde_json::Value) -> Self {
        let text = |key: &str| userinfo.get(key).and_then(|v| v.as_str()).map(str::to_owned);

        let name = ProfileName {
            family_name: text("family_name"),
            given_name: text("given_name"),
            middle_name: text("middle_name"),
        };
        let emails = text("email").map(|value| vec![ProfileEmail { value }]).unwrap_or_default();

        Self {
            provider: provider.to_string(),
            id: subject.to_string(),
            display_name: text("name"),
            name,
            emails,
            raw: userinfo,
        }
    }
}
