//! Runtime events and observers.
//!
//! Observers are handed to the runner through [`RuntimeConfig`](crate::RuntimeConfig)
//! and threaded down to every node. Consumers decide what to do with the events
//! (log them, record them in tests, stream them to a debugger, ignore them).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events emitted while a workflow tree runs.
///
/// `workflow_id` and `worker_id` are diagnostic ids: unique within one runtime
/// and never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowEvent {
  RuntimeStarted {
    runtime_id: String,
    workflow: String,
  },

  RuntimeStopped {
    runtime_id: String,
    error: Option<String>,
  },

  RenderPassStarted {
    runtime_id: String,
  },

  RenderPassFinished {
    runtime_id: String,
  },

  /// The whole tree was snapshotted after a render pass.
  SnapshotPassFinished {
    runtime_id: String,
    bytes: usize,
  },

  /// A node was created, either fresh or from a snapshot.
  WorkflowStarted {
    workflow_id: u64,
    parent_id: Option<u64>,
    workflow_type: String,
    key: String,
    restored_from_snapshot: bool,
  },

  WorkflowStopped {
    workflow_id: u64,
  },

  /// A node received props different from its last render.
  PropsChanged {
    workflow_id: u64,
  },

  WorkflowRendered {
    workflow_id: u64,
    generation: u64,
    children: usize,
    workers: usize,
  },

  WorkerStarted {
    worker_id: u64,
    workflow_id: u64,
    key: String,
    description: String,
  },

  WorkerStopped {
    worker_id: u64,
    workflow_id: u64,
  },

  /// An action arrived through a node's sink.
  SinkReceived {
    workflow_id: u64,
    action: String,
  },

  ActionApplied {
    workflow_id: u64,
    action: String,
    has_output: bool,
  },

  /// A snapshot could not be restored; the node started from initial state.
  SnapshotRestoreFailed {
    workflow_id: u64,
    error: String,
  },
}

/// Receives runtime events.
///
/// Called synchronously from the runtime loop, so implementations should hand
/// events off rather than block.
pub trait WorkflowObserver: Send + Sync {
  fn notify(&self, event: WorkflowEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {
  fn notify(&self, _event: WorkflowEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
  sender: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelObserver {
  pub fn new(sender: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
    Self { sender }
  }

  /// Create an observer together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl WorkflowObserver for ChannelObserver {
  fn notify(&self, event: WorkflowEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver;

impl WorkflowObserver for TracingObserver {
  fn notify(&self, event: WorkflowEvent) {
    match &event {
      WorkflowEvent::RuntimeStarted { .. } | WorkflowEvent::RuntimeStopped { error: None, .. } => {
        info!(event = ?event, "workflow_event")
      }
      WorkflowEvent::RuntimeStopped { error: Some(_), .. }
      | WorkflowEvent::SnapshotRestoreFailed { .. } => warn!(event = ?event, "workflow_event"),
      _ => debug!(event = ?event, "workflow_event"),
    }
  }
}

/// Forwards every event to each observer in order.
#[derive(Clone, Default)]
pub struct ChainedObserver {
  observers: Vec<Arc<dyn WorkflowObserver>>,
}

impl ChainedObserver {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, observer: impl WorkflowObserver + 'static) -> Self {
    self.observers.push(Arc::new(observer));
    self
  }
}

impl WorkflowObserver for ChainedObserver {
  fn notify(&self, event: WorkflowEvent) {
    if let Some((last, rest)) = self.observers.split_last() {
      for observer in rest {
        observer.notify(event.clone());
      }
      last.notify(event);
    }
  }
}

/// The observer plus the diagnostic id counter, shared by every node of one
/// runtime.
#[derive(Clone, Default)]
pub(crate) struct Diagnostics {
  observer: Option<Arc<dyn WorkflowObserver>>,
  ids: Arc<AtomicU64>,
}

impl Diagnostics {
  pub(crate) fn new(observer: Option<Arc<dyn WorkflowObserver>>) -> Self {
    Self {
      observer,
      ids: Arc::new(AtomicU64::new(0)),
    }
  }

  pub(crate) fn next_id(&self) -> u64 {
    self.ids.fetch_add(1, Ordering::Relaxed)
  }

  /// Build and deliver an event, only if someone is listening.
  pub(crate) fn notify(&self, event: impl FnOnce() -> WorkflowEvent) {
    if let Some(observer) = &self.observer {
      observer.notify(event());
    }
  }
}
