//! Screen view-models.
//!
//! Each screen is a `State`, a `Msg` enum and a pure `update` function that
//! mutates the state and returns the effects to run. A screen wrapper owns
//! the collaborators and a [`ScreenTasks`] set; effects become tokio tasks
//! whose results come back as messages. Dropping the wrapper aborts every
//! task it started, so nothing reaches a screen that is gone.
//!
//! ```text
//!   user action ──▶ Msg ──▶ update(&mut State) ──▶ Vec<Effect>
//!                    ▲                                 │
//!                    └──── ScreenTasks (tokio) ◀───────┘
//! ```
//!
//! | Screen | Module |
//! |--------|--------|
//! | Profile | [`profile`] |
//! | Create profile | [`create_profile`] |
//! | Manage account | [`manage_account`] |

pub mod create_profile;
pub mod manage_account;
pub mod profile;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};

/// The signed-in user as the client sees them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

/// Server-side outcome of a username availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UsernameError {
    #[error("username too short")]
    TooShort,
    #[error("username too long")]
    TooLong,
    #[error("username has invalid characters")]
    InvalidPattern,
    #[error("username unavailable")]
    NameUnavailable,
    #[error("internal server error")]
    InternalServer,
    #[error("network error")]
    Network,
    #[error("unknown error")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("network error")]
    Network,
    #[error("unauthorized")]
    Unauthorized,
    #[error("unknown error")]
    Unknown,
}

/// A profile ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
}

impl UserProfile {
    /// Validates the fields, returning a user-facing message on failure.
    pub fn make(username: &str, name: &str, bio: Option<String>) -> Result<Self, String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("Name cannot be empty.".to_string());
        }
        let username = username.trim().to_lowercase();
        if let Some(status) = PotentialUsernameStatus::validation_error(&username) {
            return Err(status
                .message()
                .unwrap_or("Username cannot be empty.")
                .to_string());
        }
        Ok(Self {
            username,
            name: name.to_string(),
            bio: bio.filter(|b| !b.trim().is_empty()),
        })
    }
}

pub const USERNAME_MIN_LEN: usize = 4;
pub const USERNAME_MAX_LEN: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PotentialUsernameStatus {
    #[default]
    NoUsername,
    Available,
    TooShort,
    TooLong,
    InvalidPattern,
    Unavailable,
}

impl PotentialUsernameStatus {
    /// Local checks run before asking the server. `username` is expected to
    /// be lowercased already.
    pub fn validation_error(username: &str) -> Option<Self> {
        let len = username.chars().count();
        if len == 0 {
            return Some(Self::NoUsername);
        }
        if len < USERNAME_MIN_LEN {
            return Some(Self::TooShort);
        }
        if len > USERNAME_MAX_LEN {
            return Some(Self::TooLong);
        }
        if !matches_username_pattern(username) {
            return Some(Self::InvalidPattern);
        }
        None
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::TooShort => Some("Username must contain at least 4 characters"),
            Self::TooLong => Some("Username must be less than 15 characters"),
            Self::InvalidPattern => Some("Username can contain only letters and numbers"),
            Self::Unavailable => Some("This name is not available"),
            Self::NoUsername | Self::Available => None,
        }
    }
}

/// `^[a-z0-9][a-z0-9_]+[a-z0-9]$`
fn matches_username_pattern(username: &str) -> bool {
    let chars: Vec<char> = username.chars().collect();
    if chars.len() < 3 {
        return false;
    }
    let edge = |c: &char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let inner = |c: &char| edge(c) || *c == '_';

    edge(&chars[0]) && edge(&chars[chars.len() - 1]) && chars[1..chars.len() - 1].iter().all(inner)
}

/// Data access used by the screens.
#[async_trait]
pub trait DataService: Send + Sync {
    /// The viewer cached from the last successful fetch, if any.
    fn current_viewer(&self) -> Option<Viewer>;

    async fn fetch_viewer(&self) -> Result<Viewer>;

    async fn validate_username(&self, username: &str) -> std::result::Result<(), UsernameError>;

    async fn delete_account(&self, user_id: &str) -> Result<()>;

    async fn reset_data_cache(&self) -> Result<()>;
}

/// Session management used by the screens.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn create_account(&self, profile: UserProfile) -> std::result::Result<(), LoginError>;

    async fn logout(&self, is_account_deletion: bool);
}

/// Tasks started on behalf of one screen.
///
/// Each task resolves to a message delivered through [`next`](Self::next).
/// All tasks are aborted when the set is dropped.
pub struct ScreenTasks<M> {
    tasks: JoinSet<()>,
    tx: mpsc::UnboundedSender<M>,
    rx: mpsc::UnboundedReceiver<M>,
}

impl<M: Send + 'static> ScreenTasks<M> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tasks: JoinSet::new(),
            tx,
            rx,
        }
    }

    /// Runs `fut` on the runtime and queues its output as a message.
    pub fn spawn<F>(&mut self, fut: F) -> AbortHandle
    where
        F: Future<Output = M> + Send + 'static,
    {
        let tx = self.tx.clone();
        self.tasks.spawn(async move {
            let msg = fut.await;
            // receiver only goes away with the screen
            let _ = tx.send(msg);
        })
    }

    /// Number of tasks not yet reaped.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for the next message. Returns `None` once no task is left
    /// and nothing is queued.
    pub async fn next(&mut self) -> Option<M> {
        loop {
            if let Ok(msg) = self.rx.try_recv() {
                return Some(msg);
            }
            match self.tasks.join_next().await {
                Some(Ok(())) => continue,
                Some(Err(e)) if e.is_cancelled() => continue,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "screen task failed");
                    continue;
                }
                None => return self.rx.try_recv().ok(),
            }
        }
    }

    pub fn abort_all(&mut self) {
        self.tasks.abort_all();
    }
}

impl<M: Send + 'static> Default for ScreenTasks<M> {
    fn default() -> Self {
        Self::new()
    }
}
