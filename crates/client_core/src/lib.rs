use std::sync::Arc;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use shared::{
    board::{Board, DropTarget},
    protocol::{BoardRecord, CommentRecord, NewCommentRequest, SaveBoardRequest},
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch, RwLock},
    task::JoinHandle,
};
use tracing::warn;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected request: {0}")]
    Rejected(String),
    #[error("sign in before posting comments")]
    NotSignedIn,
    #[error("save worker is no longer running")]
    WorkerGone,
}

/// Outcome of the most recently completed background save.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saved {
        seq: i64,
    },
    Failed {
        seq: i64,
        error: String,
    },
}

#[derive(Debug, Serialize)]
struct LoginRequest {
    username: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user_id: i64,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
struct PendingSave {
    seq: i64,
    board: Board,
}

/// Client-side half of the board persistence contract.
///
/// Drag gestures are applied optimistically to the local snapshot and
/// queued for upload. The queue carries a sequence number per snapshot
/// and the worker coalesces to the newest pending one, so an in-flight
/// save for an older state can never clobber a newer one. When a save
/// fails, the last known-good board is refetched and replaces the
/// optimistic local state; the failure is published on a watch channel
/// for the UI to surface inline.
pub struct BoardClient {
    http: Client,
    server_url: String,
    classmate_name: String,
    token: Arc<RwLock<Option<String>>>,
    board: Arc<RwLock<Board>>,
    next_seq: i64,
    save_tx: mpsc::UnboundedSender<PendingSave>,
    status_rx: watch::Receiver<SaveStatus>,
    worker: JoinHandle<()>,
}

impl BoardClient {
    pub fn new(server_url: impl Into<String>, classmate_name: impl Into<String>) -> Self {
        let http = Client::new();
        let server_url = server_url.into();
        let classmate_name = classmate_name.into();
        let token = Arc::new(RwLock::new(None));
        let board = Arc::new(RwLock::new(Board::default()));
        let (save_tx, save_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SaveStatus::Idle);

        let worker = tokio::spawn(run_save_worker(
            http.clone(),
            server_url.clone(),
            classmate_name.clone(),
            Arc::clone(&token),
            Arc::clone(&board),
            save_rx,
            status_tx,
        ));

        Self {
            http,
            server_url,
            classmate_name,
            token,
            board,
            next_seq: 0,
            save_tx,
            status_rx,
            worker,
        }
    }

    pub async fn login(&self, username: &str) -> Result<i64, ClientError> {
        let response = self
            .http
            .post(format!("{}/login", self.server_url))
            .json(&LoginRequest {
                username: username.to_string(),
            })
            .send()
            .await?;
        let body: LoginResponse = check(response).await?.json().await?;
        *self.token.write().await = Some(body.token);
        Ok(body.user_id)
    }

    /// Fetches the remote board and replaces the local snapshot.
    pub async fn load(&mut self) -> Result<Board, ClientError> {
        let record = fetch_remote_board(
            &self.http,
            &self.server_url,
            &self.classmate_name,
            &self.token,
        )
        .await?;
        self.next_seq = record.seq;
        *self.board.write().await = record.board.clone();
        Ok(record.board)
    }

    /// Current local snapshot.
    pub async fn board(&self) -> Board {
        self.board.read().await.clone()
    }

    /// Applies one drag gesture. No-op gestures return `false` without
    /// touching the network; otherwise the new snapshot is installed
    /// locally and queued for upload.
    pub async fn apply_drag(
        &mut self,
        dragged: &str,
        target: &DropTarget,
    ) -> Result<bool, ClientError> {
        let current = self.board.read().await.clone();
        let Some(next) = current.reassign(dragged, target) else {
            return Ok(false);
        };

        *self.board.write().await = next.clone();
        self.next_seq += 1;
        self.save_tx
            .send(PendingSave {
                seq: self.next_seq,
                board: next,
            })
            .map_err(|_| ClientError::WorkerGone)?;
        Ok(true)
    }

    /// Watch handle reporting background save completions and failures.
    pub fn save_status(&self) -> watch::Receiver<SaveStatus> {
        self.status_rx.clone()
    }

    pub async fn list_comments(&self, tier_id: &str) -> Result<Vec<CommentRecord>, ClientError> {
        let response = self
            .http
            .get(format!("{}/api/comments", self.server_url))
            .query(&[
                ("tierId", tier_id),
                ("classmateName", &self.classmate_name),
            ])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Posts a comment, then refetches the whole thread rather than
    /// appending locally.
    pub async fn post_comment(
        &self,
        tier_id: &str,
        text: &str,
    ) -> Result<Vec<CommentRecord>, ClientError> {
        let token = self
            .token
            .read()
            .await
            .clone()
            .ok_or(ClientError::NotSignedIn)?;

        let response = self
            .http
            .post(format!("{}/api/comments", self.server_url))
            .bearer_auth(token)
            .json(&NewCommentRequest {
                text: text.to_string(),
                tier_id: tier_id.to_string(),
                classmate_name: self.classmate_name.clone(),
            })
            .send()
            .await?;
        check(response).await?;

        self.list_comments(tier_id).await
    }
}

impl Drop for BoardClient {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_save_worker(
    http: Client,
    server_url: String,
    classmate_name: String,
    token: Arc<RwLock<Option<String>>>,
    board: Arc<RwLock<Board>>,
    mut save_rx: mpsc::UnboundedReceiver<PendingSave>,
    status_tx: watch::Sender<SaveStatus>,
) {
    while let Some(first) = save_rx.recv().await {
        let pending = drain_to_newest(first, &mut save_rx);
        let result = push_snapshot(&http, &server_url, &classmate_name, &token, &pending).await;
        match result {
            Ok(()) => {
                let _ = status_tx.send(SaveStatus::Saved { seq: pending.seq });
            }
            Err(error) => {
                warn!(seq = pending.seq, %error, "board save failed; refetching last known-good state");
                match fetch_remote_board(&http, &server_url, &classmate_name, &token).await {
                    Ok(record) => {
                        *board.write().await = record.board;
                    }
                    Err(fetch_error) => {
                        warn!(%fetch_error, "refetch after failed save also failed");
                    }
                }
                let _ = status_tx.send(SaveStatus::Failed {
                    seq: pending.seq,
                    error: error.to_string(),
                });
            }
        }
    }
}

/// Collapses queued snapshots down to the newest one. Superseded saves
/// are dropped before they ever hit the wire.
fn drain_to_newest(
    first: PendingSave,
    save_rx: &mut mpsc::UnboundedReceiver<PendingSave>,
) -> PendingSave {
    let mut newest = first;
    while let Ok(next) = save_rx.try_recv() {
        if next.seq > newest.seq {
            newest = next;
        }
    }
    newest
}

async fn push_snapshot(
    http: &Client,
    server_url: &str,
    classmate_name: &str,
    token: &Arc<RwLock<Option<String>>>,
    pending: &PendingSave,
) -> Result<(), ClientError> {
    let mut request = http.post(format!("{server_url}/api/tierlist")).json(&SaveBoardRequest {
        board: pending.board.clone(),
        classmate_name: Some(classmate_name.to_string()),
        seq: Some(pending.seq),
    });
    if let Some(token) = token.read().await.as_deref() {
        request = request.bearer_auth(token);
    }
    check(request.send().await?).await?;
    Ok(())
}

async fn fetch_remote_board(
    http: &Client,
    server_url: &str,
    classmate_name: &str,
    token: &Arc<RwLock<Option<String>>>,
) -> Result<BoardRecord, ClientError> {
    let mut request = http
        .get(format!("{server_url}/api/tierlist"))
        .query(&[("classmateName", classmate_name)]);
    if let Some(token) = token.read().await.as_deref() {
        request = request.bearer_auth(token);
    }
    Ok(check(request.send().await?).await?.json().await?)
}

async fn check(response: Response) -> Result<Response, ClientError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    Err(ClientError::Rejected(message))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
