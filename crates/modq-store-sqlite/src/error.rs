//! Error type for `modq-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rejection (`NotFound`, `NotOwner`, ...), passed through as-is.
  #[error(transparent)]
  Core(#[from] modq_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// Every claim attempt lost a race against a concurrent writer.
  #[error("lease claim still contended after {0} attempts")]
  ClaimContention(u32),
}

impl From<Error> for modq_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      other => modq_core::Error::Store(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
