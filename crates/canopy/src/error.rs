//! Runtime errors.

/// A type-erased error raised by workflow code (render, actions, workers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that stop a workflow tree.
///
/// Any of these returned from a node's render or tick propagates to the
/// runner, which cancels the whole tree.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// The same child (type, key) was rendered twice in one pass.
  #[error("expected keys to be unique for {workflow}: key={key:?}")]
  DuplicateChild { workflow: String, key: String },

  /// The same worker (type, key) was requested twice in one pass.
  #[error("expected keys to be unique for worker {worker}: key={key:?}")]
  DuplicateWorker { worker: String, key: String },

  /// A workflow's render function failed.
  #[error("workflow '{workflow}' failed to render")]
  Workflow {
    workflow: String,
    #[source]
    source: BoxError,
  },

  /// An action failed while being applied to state.
  #[error("action '{action}' failed in workflow '{workflow}'")]
  Action {
    workflow: String,
    action: String,
    #[source]
    source: BoxError,
  },

  /// A worker's stream yielded an error.
  #[error("worker '{worker}' failed in workflow '{workflow}'")]
  Worker {
    workflow: String,
    worker: String,
    #[source]
    source: BoxError,
  },

  /// The props source closed before producing a first value.
  #[error("props source closed before the first props value")]
  PropsClosed,

  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,
}

impl RuntimeError {
  /// Wrap an error raised by a workflow's render function.
  pub fn render_failed(workflow: impl Into<String>, source: impl Into<BoxError>) -> Self {
    Self::Workflow {
      workflow: workflow.into(),
      source: source.into(),
    }
  }
}

/// Errors returned when delivering an action through a [`Sink`](crate::Sink).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
  /// The sink was used while the render pass that created it was still running.
  #[error("action sink used before render returned: {action}")]
  RenderInProgress { action: String },

  /// An action was already delivered for this generation.
  #[error("expected to successfully deliver {action}; an action was already delivered. Are you using an old rendering?")]
  AlreadyDelivered { action: String },

  /// A later render pass superseded the rendering holding this sink.
  #[error("rendering is stale, dropped {action}. Are you using an old rendering?")]
  Stale { action: String },

  /// The workflow node behind this sink has been torn down.
  #[error("workflow is no longer running, dropped {action}")]
  Closed { action: String },
}
