use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    board::{Board, Tier},
    domain::{BoardId, CommentId, UserId},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredBoard {
    pub id: BoardId,
    pub classmate_name: String,
    pub owner_user_id: Option<UserId>,
    pub board: Board,
    pub seq: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredComment {
    pub id: CommentId,
    pub tier_id: String,
    pub classmate_name: String,
    pub content: String,
    pub author_user_id: UserId,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, username: &str) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (username) VALUES (?)
             ON CONFLICT(username) DO UPDATE SET username=excluded.username
             RETURNING id",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn username_for_user(&self, user_id: UserId) -> Result<Option<String>> {
        let row = sqlx::query("SELECT username FROM users WHERE id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    /// Complete-replace write of one board snapshot, keyed by classmate
    /// name plus the owning user (NULL owner is the shared board). Last
    /// writer wins.
    pub async fn save_board(
        &self,
        classmate_name: &str,
        owner: Option<UserId>,
        board: &Board,
        seq: i64,
    ) -> Result<StoredBoard> {
        let tiers_json = serde_json::to_string(&board.tiers).context("serialize tiers")?;
        let bin_json = serde_json::to_string(&board.bin).context("serialize bin")?;

        let row = if let Some(owner) = owner {
            sqlx::query(
                "INSERT INTO tier_lists (classmate_name, owner_user_id, tiers_json, bin_json, seq)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(classmate_name, owner_user_id) WHERE owner_user_id IS NOT NULL
                 DO UPDATE SET
                    tiers_json = excluded.tiers_json,
                    bin_json = excluded.bin_json,
                    seq = excluded.seq,
                    updated_at = CURRENT_TIMESTAMP
                 RETURNING id, seq, updated_at",
            )
            .bind(classmate_name)
            .bind(owner.0)
            .bind(&tiers_json)
            .bind(&bin_json)
            .bind(seq)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query(
                "INSERT INTO tier_lists (classmate_name, owner_user_id, tiers_json, bin_json, seq)
                 VALUES (?, NULL, ?, ?, ?)
                 ON CONFLICT(classmate_name) WHERE owner_user_id IS NULL
                 DO UPDATE SET
                    tiers_json = excluded.tiers_json,
                    bin_json = excluded.bin_json,
                    seq = excluded.seq,
                    updated_at = CURRENT_TIMESTAMP
                 RETURNING id, seq, updated_at",
            )
            .bind(classmate_name)
            .bind(&tiers_json)
            .bind(&bin_json)
            .bind(seq)
            .fetch_one(&self.pool)
            .await?
        };

        Ok(StoredBoard {
            id: BoardId(row.get::<i64, _>(0)),
            classmate_name: classmate_name.to_string(),
            owner_user_id: owner,
            board: board.clone(),
            seq: row.get::<i64, _>(1),
            updated_at: row.get::<DateTime<Utc>, _>(2),
        })
    }

    pub async fn load_board(
        &self,
        classmate_name: &str,
        owner: Option<UserId>,
    ) -> Result<Option<StoredBoard>> {
        let row = if let Some(owner) = owner {
            sqlx::query(
                "SELECT id, owner_user_id, tiers_json, bin_json, seq, updated_at
                 FROM tier_lists
                 WHERE classmate_name = ? AND owner_user_id = ?",
            )
            .bind(classmate_name)
            .bind(owner.0)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id, owner_user_id, tiers_json, bin_json, seq, updated_at
                 FROM tier_lists
                 WHERE classmate_name = ? AND owner_user_id IS NULL",
            )
            .bind(classmate_name)
            .fetch_optional(&self.pool)
            .await?
        };

        let Some(row) = row else {
            return Ok(None);
        };

        let tiers: Vec<Tier> =
            serde_json::from_str(&row.get::<String, _>(2)).context("decode stored tiers")?;
        let bin: Vec<String> =
            serde_json::from_str(&row.get::<String, _>(3)).context("decode stored bin")?;

        Ok(Some(StoredBoard {
            id: BoardId(row.get::<i64, _>(0)),
            classmate_name: classmate_name.to_string(),
            owner_user_id: row.get::<Option<i64>, _>(1).map(UserId),
            board: Board { tiers, bin },
            seq: row.get::<i64, _>(4),
            updated_at: row.get::<DateTime<Utc>, _>(5),
        }))
    }

    pub async fn delete_boards(
        &self,
        classmate_name: &str,
        owner: Option<UserId>,
    ) -> Result<u64> {
        let result = if let Some(owner) = owner {
            sqlx::query("DELETE FROM tier_lists WHERE classmate_name = ? AND owner_user_id = ?")
                .bind(classmate_name)
                .bind(owner.0)
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query("DELETE FROM tier_lists WHERE classmate_name = ? AND owner_user_id IS NULL")
                .bind(classmate_name)
                .execute(&self.pool)
                .await?
        };
        Ok(result.rows_affected())
    }

    pub async fn insert_comment(
        &self,
        tier_id: &str,
        classmate_name: &str,
        content: &str,
        author: UserId,
    ) -> Result<StoredComment> {
        let row = sqlx::query(
            "INSERT INTO comments (tier_id, classmate_name, content, author_user_id)
             VALUES (?, ?, ?, ?)
             RETURNING id, created_at",
        )
        .bind(tier_id)
        .bind(classmate_name)
        .bind(content)
        .bind(author.0)
        .fetch_one(&self.pool)
        .await?;

        let author_name = self
            .username_for_user(author)
            .await?
            .unwrap_or_else(|| "Anonymous".to_string());

        Ok(StoredComment {
            id: CommentId(row.get::<i64, _>(0)),
            tier_id: tier_id.to_string(),
            classmate_name: classmate_name.to_string(),
            content: content.to_string(),
            author_user_id: author,
            author_name,
            created_at: row.get::<DateTime<Utc>, _>(1),
        })
    }

    /// Newest-first comment page for one `(tier, classmate)` pair.
    pub async fn list_comments(
        &self,
        tier_id: &str,
        classmate_name: &str,
        limit: u32,
    ) -> Result<Vec<StoredComment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.content, c.author_user_id, u.username, c.created_at
             FROM comments c
             INNER JOIN users u ON u.id = c.author_user_id
             WHERE c.tier_id = ? AND c.classmate_name = ?
             ORDER BY c.id DESC
             LIMIT ?",
        )
        .bind(tier_id)
        .bind(classmate_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| StoredComment {
                id: CommentId(r.get::<i64, _>(0)),
                tier_id: tier_id.to_string(),
                classmate_name: classmate_name.to_string(),
                content: r.get::<String, _>(1),
                author_user_id: UserId(r.get::<i64, _>(2)),
                author_name: r.get::<String, _>(3),
                created_at: r.get::<DateTime<Utc>, _>(4),
            })
            .collect())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
