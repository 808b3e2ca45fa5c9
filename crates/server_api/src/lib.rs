use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use shared::{
    board::Board,
    domain::UserId,
    error::{ApiError, ErrorCode},
    protocol::{BoardRecord, CommentRecord},
};
use storage::{Storage, StoredBoard, StoredComment};
use tracing::warn;

/// Upper bound on comments returned for one thread.
pub const COMMENT_PAGE_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

/// Fetches the stored snapshot for `(classmate_name, owner)`, falling
/// back to the default seed board when nothing has been saved yet.
pub async fn fetch_board(
    ctx: &ApiContext,
    classmate_name: &str,
    owner: Option<UserId>,
) -> Result<BoardRecord, ApiError> {
    let classmate_name = require_param("classmateName", classmate_name)?;
    let stored = ctx
        .storage
        .load_board(classmate_name, owner)
        .await
        .map_err(internal)?;

    Ok(match stored {
        Some(stored) => board_record(stored),
        None => BoardRecord {
            id: None,
            classmate_name: classmate_name.to_string(),
            owner_user_id: owner,
            board: Board::default(),
            seq: 0,
            updated_at: Utc::now(),
        },
    })
}

/// Complete-replace save of one board snapshot. The snapshot is stored
/// as-is; duplicate member names are tolerated but logged, matching the
/// convention-not-enforced invariant of the board model.
pub async fn save_board(
    ctx: &ApiContext,
    classmate_name: &str,
    owner: Option<UserId>,
    board: &Board,
    seq: i64,
) -> Result<BoardRecord, ApiError> {
    let classmate_name = require_param("classmateName", classmate_name)?;

    let mut seen = Vec::new();
    for tier in &board.tiers {
        let id = tier.id.trim();
        if id.is_empty() {
            return Err(ApiError::new(
                ErrorCode::Validation,
                "each tier must have a non-empty id",
            ));
        }
        if seen.contains(&id) {
            return Err(ApiError::new(
                ErrorCode::Validation,
                format!("duplicate tier id '{id}'"),
            ));
        }
        seen.push(id);
    }

    let duplicates = board.duplicate_members();
    if !duplicates.is_empty() {
        warn!(?duplicates, %classmate_name, "saving board with duplicate member names");
    }

    let stored = ctx
        .storage
        .save_board(classmate_name, owner, board, seq)
        .await
        .map_err(internal)?;
    Ok(board_record(stored))
}

/// Removes the stored snapshot for `(classmate_name, owner)`. Returns the
/// number of rows removed; deleting an absent board is not an error.
pub async fn reset_board(
    ctx: &ApiContext,
    classmate_name: &str,
    owner: Option<UserId>,
) -> Result<u64, ApiError> {
    let classmate_name = require_param("classmateName", classmate_name)?;
    ctx.storage
        .delete_boards(classmate_name, owner)
        .await
        .map_err(internal)
}

pub async fn list_comments(
    ctx: &ApiContext,
    tier_id: &str,
    classmate_name: &str,
) -> Result<Vec<CommentRecord>, ApiError> {
    let tier_id = require_param("tierId", tier_id)?;
    let classmate_name = require_param("classmateName", classmate_name)?;

    let comments = ctx
        .storage
        .list_comments(tier_id, classmate_name, COMMENT_PAGE_LIMIT)
        .await
        .map_err(internal)?;
    Ok(comments.into_iter().map(comment_record).collect())
}

/// Appends a comment for an authenticated author. Markup is stripped
/// before the emptiness check, so `"<b></b>"` is rejected the same way
/// whitespace is.
pub async fn post_comment(
    ctx: &ApiContext,
    author: UserId,
    tier_id: &str,
    classmate_name: &str,
    text: &str,
) -> Result<CommentRecord, ApiError> {
    let tier_id = require_param("tierId", tier_id)?;
    let classmate_name = require_param("classmateName", classmate_name)?;

    let sanitized = sanitize_comment_text(text);
    if sanitized.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "comment text cannot be empty",
        ));
    }

    let stored = ctx
        .storage
        .insert_comment(tier_id, classmate_name, &sanitized, author)
        .await
        .map_err(internal)?;
    Ok(comment_record(stored))
}

/// Shallow sanitization: drops anything shaped like an HTML tag, then
/// trims. Not XSS-safe in general; it mirrors what the stored records
/// have always looked like.
pub fn sanitize_comment_text(text: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>?").expect("valid tag pattern"));
    tag.replace_all(text, "").trim().to_string()
}

fn board_record(stored: StoredBoard) -> BoardRecord {
    BoardRecord {
        id: Some(stored.id),
        classmate_name: stored.classmate_name,
        owner_user_id: stored.owner_user_id,
        board: stored.board,
        seq: stored.seq,
        updated_at: stored.updated_at,
    }
}

fn comment_record(stored: StoredComment) -> CommentRecord {
    CommentRecord {
        id: stored.id,
        content: stored.content,
        author_user_id: stored.author_user_id,
        author_name: stored.author_name,
        tier_id: stored.tier_id,
        classmate_name: stored.classmate_name,
        created_at: stored.created_at,
    }
}

fn require_param<'a>(name: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{name} is required"),
        ));
    }
    Ok(trimmed)
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
