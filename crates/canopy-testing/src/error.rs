use std::time::Duration;

use canopy::{BoxError, RuntimeError};

#[derive(Debug, thiserror::Error)]
pub enum TesterError {
  #[error("timed out after {after:?} waiting for {waiting_for}")]
  Timeout {
    waiting_for: &'static str,
    after: Duration,
  },

  #[error("expected no rendering, got one")]
  UnexpectedRendering,

  /// The runner ended; `cancel` reports why.
  #[error("workflow runtime stopped")]
  Stopped,

  #[error(transparent)]
  Runtime(#[from] RuntimeError),

  #[error("workflow runtime task panicked or was aborted")]
  Join(#[from] tokio::task::JoinError),

  /// A render pass did not request the child or worker being handled.
  #[error("{kind} {name} was not requested with key {key:?}")]
  NotRequested {
    kind: &'static str,
    name: &'static str,
    key: String,
  },

  #[error("no action was sent to the render pass's sink")]
  NoActionSent,

  #[error("action '{action}' failed")]
  Action {
    action: String,
    #[source]
    source: BoxError,
  },

  #[error("expected no worker output, got one")]
  UnexpectedOutput,

  #[error("worker finished")]
  WorkerFinished,

  #[error("worker failed")]
  Worker(#[source] BoxError),
}
