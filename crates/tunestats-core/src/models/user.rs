use serde::{Deserialize, Serialize};

use super::upstream::{ExternalUrls, Followers, RawImage};

/// Profile snapshot of the signed-in user, carried inside sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub images: Vec<RawImage>,
    #[serde(default)]
    pub followers: Followers,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl UserInfo {
    /// Display name, falling back to the account id.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    pub fn profile_picture(&self) -> Option<&str> {
        self.images.first().map(|i| i.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_profile() {
        let json = r#"{
            "id": "alice",
            "display_name": "Alice",
            "images": [{"url": "https://i.scdn.co/image/alice", "width": 300, "height": 300}],
            "followers": {"href": null, "total": 12},
            "external_urls": {"spotify": "https://open.spotify.com/user/alice"}
        }"#;
        let user: UserInfo = serde_json::from_str(json).unwrap();
        assert_eq!(user.name(), "Alice");
        assert_eq!(user.followers.total, 12);
        assert_eq!(user.profile_picture(), Some("https://i.scdn.co/image/alice"));
    }

    #[test]
    fn test_name_falls_back_to_id() {
        let user: UserInfo =
            serde_json::from_str(r#"{"id": "bob", "display_name": null}"#).unwrap();
        assert_eq!(user.name(), "bob");
        assert!(user.profile_picture().is_none());
    }
}
