use serde::{Deserialize, Deserializer, Serialize};

/// Bucket holding [`UserRecord`] documents.
pub const USER_BUCKET: &str = "User";
/// Bucket holding [`ThreadRecord`] documents and the `ThreadNum` counter.
pub const THREAD_BUCKET: &str = "Thread";
/// Bucket holding [`CommentRecord`] documents and the `CommentNum` counter.
pub const COMMENT_BUCKET: &str = "Comment";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "Id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub friends: Vec<String>,
    #[serde(default)]
    pub follower: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
    #[serde(rename = "writeThread", default)]
    pub written_threads: Vec<String>,
    #[serde(rename = "writeComment", default)]
    pub written_comments: Vec<String>,
    #[serde(rename = "likeThread", default)]
    pub liked_threads: Vec<String>,
    #[serde(rename = "likeComment", default)]
    pub liked_comments: Vec<String>,
    #[serde(rename = "blockUser", default)]
    pub blocked_users: Vec<String>,
    #[serde(rename = "unreadThread", default)]
    pub unread_threads: Vec<String>,
    #[serde(rename = "readedThread", default)]
    pub read_threads: Vec<String>,
    #[serde(default)]
    pub registered_at: i64,
}

impl UserRecord {
    pub fn new(id: impl Into<String>, registered_at: i64) -> Self {
        Self {
            id: id.into(),
            registered_at,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    #[serde(rename = "Id", alias = "id")]
    pub id: String,
    pub author: String,
    #[serde(default = "default_public", deserialize_with = "deserialize_visibility")]
    pub is_public: bool,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub pub_date: i64,
    #[serde(rename = "likes", default)]
    pub likers: Vec<String>,
    #[serde(rename = "reports", default)]
    pub reporters: Vec<String>,
    #[serde(rename = "blocks", alias = "hides", default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub readers: Vec<String>,
    #[serde(default)]
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(rename = "Id", alias = "id")]
    pub id: String,
    pub thread_id: String,
    pub author: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pub_date: i64,
    #[serde(rename = "likes", default)]
    pub likers: Vec<String>,
    #[serde(rename = "reports", default)]
    pub reporters: Vec<String>,
    #[serde(rename = "blocks", default)]
    pub blockers: Vec<String>,
}

pub(crate) fn default_public() -> bool {
    true
}

/// Older producers send visibility as a string ("true", "1", "public").
pub(crate) fn deserialize_visibility<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Visibility {
        Flag(bool),
        Text(String),
    }

    Ok(match Visibility::deserialize(deserializer)? {
        Visibility::Flag(flag) => flag,
        Visibility::Text(text) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "public" | "yes"
        ),
    })
}
