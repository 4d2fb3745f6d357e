//! Wire format of inbound action messages.
//!
//! Every message is a JSON object carrying an `action` discriminator. The
//! discriminator is read on its own first so unknown kinds can be dropped
//! without caring about the rest of the payload; known kinds are then decoded
//! once into the closed [`Action`] type.

use crate::database::models::{default_public, deserialize_visibility};
use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    NewThread,
    ThreadLike,
    ThreadUnlike,
    ThreadReport,
    ThreadBlock,
    CommentAdd,
    CommentLike,
    CommentUnlike,
    CommentReport,
    CommentBlock,
    FriendAdd,
    FriendDelete,
    UserRegister,
}

impl ActionKind {
    pub const ALL: [ActionKind; 13] = [
        ActionKind::NewThread,
        ActionKind::ThreadLike,
        ActionKind::ThreadUnlike,
        ActionKind::ThreadReport,
        ActionKind::ThreadBlock,
        ActionKind::CommentAdd,
        ActionKind::CommentLike,
        ActionKind::CommentUnlike,
        ActionKind::CommentReport,
        ActionKind::CommentBlock,
        ActionKind::FriendAdd,
        ActionKind::FriendDelete,
        ActionKind::UserRegister,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::NewThread => "newThread",
            ActionKind::ThreadLike => "threadLike",
            ActionKind::ThreadUnlike => "threadUnlike",
            ActionKind::ThreadReport => "threadReport",
            ActionKind::ThreadBlock => "threadBlock",
            ActionKind::CommentAdd => "commentAdd",
            ActionKind::CommentLike => "commentLike",
            ActionKind::CommentUnlike => "commentUnlike",
            ActionKind::CommentReport => "commentReport",
            ActionKind::CommentBlock => "commentBlock",
            ActionKind::FriendAdd => "friendAdd",
            ActionKind::FriendDelete => "friendDelete",
            ActionKind::UserRegister => "userRegister",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of peeking at a payload's `action` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discriminator {
    Known(ActionKind),
    /// Unrecognized or missing (`""`) action name.
    Unknown(String),
}

#[derive(Deserialize)]
struct ActionHeader {
    #[serde(default)]
    action: String,
}

/// Reads only the `action` field. Fails only when the payload is not a JSON object.
pub fn decode_kind(payload: &[u8]) -> Result<Discriminator, DecodeError> {
    let header: ActionHeader = serde_json::from_slice(payload)?;
    Ok(match ActionKind::parse(&header.action) {
        Some(kind) => Discriminator::Known(kind),
        None => Discriminator::Unknown(header.action),
    })
}

/// Fully decodes and validates a payload whose kind is already known.
/// Identifiers come back trimmed.
pub fn decode_action(payload: &[u8]) -> Result<Action, DecodeError> {
    let mut action: Action = serde_json::from_slice(payload)?;
    action.normalize()?;
    Ok(action)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    NewThread(NewThreadRequest),
    ThreadLike(ThreadRequest),
    ThreadUnlike(ThreadRequest),
    ThreadReport(ThreadRequest),
    ThreadBlock(ThreadRequest),
    CommentAdd(NewCommentRequest),
    CommentLike(CommentRequest),
    CommentUnlike(CommentRequest),
    CommentReport(CommentRequest),
    CommentBlock(CommentRequest),
    FriendAdd(FriendRequest),
    FriendDelete(FriendRequest),
    UserRegister(RegisterRequest),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::NewThread(_) => ActionKind::NewThread,
            Action::ThreadLike(_) => ActionKind::ThreadLike,
            Action::ThreadUnlike(_) => ActionKind::ThreadUnlike,
            Action::ThreadReport(_) => ActionKind::ThreadReport,
            Action::ThreadBlock(_) => ActionKind::ThreadBlock,
            Action::CommentAdd(_) => ActionKind::CommentAdd,
            Action::CommentLike(_) => ActionKind::CommentLike,
            Action::CommentUnlike(_) => ActionKind::CommentUnlike,
            Action::CommentReport(_) => ActionKind::CommentReport,
            Action::CommentBlock(_) => ActionKind::CommentBlock,
            Action::FriendAdd(_) => ActionKind::FriendAdd,
            Action::FriendDelete(_) => ActionKind::FriendDelete,
            Action::UserRegister(_) => ActionKind::UserRegister,
        }
    }

    /// Trims every identifier in place and rejects the ones left empty.
    fn normalize(&mut self) -> Result<(), DecodeError> {
        match self {
            Action::NewThread(req) => require("author", &mut req.author),
            Action::ThreadLike(req)
            | Action::ThreadUnlike(req)
            | Action::ThreadReport(req)
            | Action::ThreadBlock(req) => {
                require("thread_id", &mut req.thread_id)?;
                require("user", &mut req.user)
            }
            Action::CommentAdd(req) => {
                require("thread_id", &mut req.thread_id)?;
                require("author", &mut req.author)
            }
            Action::CommentLike(req)
            | Action::CommentUnlike(req)
            | Action::CommentReport(req)
            | Action::CommentBlock(req) => {
                require("comment_id", &mut req.comment_id)?;
                require("user", &mut req.user)
            }
            Action::FriendAdd(req) | Action::FriendDelete(req) => {
                for target in &mut req.friend_list {
                    trim_in_place(target);
                }
                require("user", &mut req.user)
            }
            Action::UserRegister(req) => require("Id", &mut req.id),
        }
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn require(field: &'static str, value: &mut String) -> Result<(), DecodeError> {
    trim_in_place(value);
    if value.is_empty() {
        Err(DecodeError::Empty(field))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewThreadRequest {
    pub author: String,
    #[serde(default = "default_public", deserialize_with = "deserialize_visibility")]
    pub is_public: bool,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub pub_date: Option<i64>,
    #[serde(default)]
    pub time: Option<i64>,
}

impl NewThreadRequest {
    /// `pub_date` wins over the older `time` field.
    pub fn published_at(&self) -> Option<i64> {
        self.pub_date.or(self.time)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRequest {
    pub thread_id: String,
    pub user: String,
    #[serde(default)]
    pub time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCommentRequest {
    pub thread_id: String,
    #[serde(alias = "user")]
    pub author: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pub_date: Option<i64>,
    #[serde(default)]
    pub time: Option<i64>,
}

impl NewCommentRequest {
    pub fn published_at(&self) -> Option<i64> {
        self.pub_date.or(self.time)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRequest {
    pub comment_id: String,
    pub user: String,
    #[serde(default)]
    pub time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub user: String,
    #[serde(default, alias = "friendList", alias = "FriendList")]
    pub friend_list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "Id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub time: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_read_without_decoding_the_body() {
        let payload = br#"{"action":"threadLike","thread_id":42,"extra":{"nested":true}}"#;
        assert_eq!(
            decode_kind(payload).unwrap(),
            Discriminator::Known(ActionKind::ThreadLike)
        );
        // the body itself is wrong for a threadLike
        assert!(decode_action(payload).is_err());
    }

    #[test]
    fn unknown_and_missing_actions_are_sentinels() {
        assert_eq!(
            decode_kind(br#"{"action":"threadHide"}"#).unwrap(),
            Discriminator::Unknown("threadHide".into())
        );
        assert_eq!(
            decode_kind(br#"{"user":"alice"}"#).unwrap(),
            Discriminator::Unknown(String::new())
        );
        assert!(matches!(
            decode_kind(b"not json"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn every_kind_name_parses_back() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ActionKind::parse("newThread_textOnly"), None);
    }

    #[test]
    fn decodes_typed_payloads() {
        let action = decode_action(
            br#"{"action":"newThread","author":"alice","is_public":"true","content":"hi","time":17}"#,
        )
        .unwrap();
        let Action::NewThread(req) = action else {
            panic!("expected newThread");
        };
        assert_eq!(req.author, "alice");
        assert!(req.is_public);
        assert_eq!(req.published_at(), Some(17));
        assert_eq!(req.image_url, None);

        let action =
            decode_action(br#"{"action":"friendAdd","user":"alice","friendList":["bob","carol"]}"#)
                .unwrap();
        assert_eq!(action.kind(), ActionKind::FriendAdd);
        let Action::FriendAdd(req) = action else {
            panic!("expected friendAdd");
        };
        assert_eq!(req.friend_list, vec!["bob".to_string(), "carol".to_string()]);

        let action = decode_action(br#"{"action":"userRegister","Id":"dave"}"#).unwrap();
        assert_eq!(
            action,
            Action::UserRegister(RegisterRequest {
                id: "dave".into(),
                time: None
            })
        );
    }

    #[test]
    fn empty_identifiers_fail_validation() {
        let err = decode_action(br#"{"action":"threadUnlike","thread_id":"","user":"a"}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Empty("thread_id")));

        let err = decode_action(br#"{"action":"userRegister","Id":"  "}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Empty("Id")));
    }

    #[test]
    fn identifiers_are_trimmed_for_every_action() {
        let action = decode_action(br#"{"action":"userRegister","Id":" alice "}"#).unwrap();
        assert_eq!(
            action,
            Action::UserRegister(RegisterRequest {
                id: "alice".into(),
                time: None
            })
        );

        let action =
            decode_action(br#"{"action":"threadLike","thread_id":" 7","user":" alice "}"#).unwrap();
        let Action::ThreadLike(req) = action else {
            panic!("expected threadLike");
        };
        assert_eq!((req.thread_id.as_str(), req.user.as_str()), ("7", "alice"));

        let action = decode_action(
            br#"{"action":"friendDelete","user":"alice ","friend_list":[" bob",""]}"#,
        )
        .unwrap();
        let Action::FriendDelete(req) = action else {
            panic!("expected friendDelete");
        };
        assert_eq!(req.user, "alice");
        assert_eq!(req.friend_list, vec!["bob".to_string(), String::new()]);
    }

    #[test]
    fn pub_date_and_time_may_both_be_present() {
        let action = decode_action(
            br#"{"action":"commentAdd","thread_id":"1","author":"bob","pub_date":30,"time":12}"#,
        )
        .unwrap();
        let Action::CommentAdd(req) = action else {
            panic!("expected commentAdd");
        };
        assert_eq!(req.published_at(), Some(30));

        let action =
            decode_action(br#"{"action":"newThread","author":"alice","time":12}"#).unwrap();
        let Action::NewThread(req) = action else {
            panic!("expected newThread");
        };
        assert_eq!(req.pub_date, None);
        assert_eq!(req.published_at(), Some(12));
    }
}
