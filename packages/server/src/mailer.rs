//! Out-of-band delivery of confirmation codes.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::{MailBackend, MailConfig};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Message {
    /// The message carrying a freshly issued confirmation code.
    pub fn confirmation_code(from: &str, to: &str, username: &str, code: &str) -> Self {
        Self {
            from: from.to_owned(),
            to: to.to_owned(),
            subject: "Your confirmation code".into(),
            body: format!(
                "Hello, {username}!\n\n\
                 Your confirmation code is: {code}\n\n\
                 Exchange it for an access token at /api/v1/auth/token.\n\
                 The code can be used once and expires shortly."
            ),
        }
    }

    fn render(&self) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\n\r\n{}\r\n",
            self.from, self.to, self.subject, self.body
        )
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), MailError>;
}

/// Writes each message to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: Message) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "Outgoing mail:\n{}",
            message.body
        );
        Ok(())
    }
}

/// Drops each message as a file into a directory.
pub struct FileMailer {
    dir: PathBuf,
}

impl FileMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Mailer for FileMailer {
    async fn send(&self, message: Message) -> Result<(), MailError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.eml", uuid::Uuid::now_v7()));
        tokio::fs::write(&path, message.render()).await?;
        info!(to = %message.to, path = %path.display(), "Mail written to file");
        Ok(())
    }
}

/// Keeps messages in memory.
#[derive(Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<Message>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Message> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent message sent to `to`.
    pub fn last_to(&self, to: &str) -> Option<Message> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|m| m.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: Message) -> Result<(), MailError> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }
}

pub fn from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match config.backend {
        MailBackend::Log => Arc::new(LogMailer),
        MailBackend::File => Arc::new(FileMailer::new(config.file_dir.clone())),
    }
}
