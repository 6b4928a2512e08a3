//! Crate error type
//!
//! Only setup can fail with an `Err`: loading settings and schedules.
//! Generation failure is reported as [`crate::Outcome::Failed`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}
