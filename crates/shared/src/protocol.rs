use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    board::Board,
    domain::{BoardId, CommentId, UserId},
};

/// Stored board snapshot as echoed by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRecord {
    /// Absent for the default board served before any save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BoardId>,
    pub classmate_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<UserId>,
    #[serde(flatten)]
    pub board: Board,
    pub seq: i64,
    pub updated_at: DateTime<Utc>,
}

/// Complete-replace write of one board snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBoardRequest {
    #[serde(flatten)]
    pub board: Board,
    #[serde(default)]
    pub classmate_name: Option<String>,
    #[serde(default)]
    pub seq: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: CommentId,
    pub content: String,
    pub author_user_id: UserId,
    pub author_name: String,
    pub tier_id: String,
    pub classmate_name: String,
    pub created_at: DateTime<Utc>,
}

/// New comment submission. `text` is the canonical field; `content` is
/// accepted as an alias for older clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommentRequest {
    #[serde(alias = "content")]
    pub text: String,
    pub tier_id: String,
    pub classmate_name: String,
}
