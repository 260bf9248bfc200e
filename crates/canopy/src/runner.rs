//! The runtime loop driving one root workflow.
//!
//! The `WorkflowRunner` receives props over an mpsc channel and publishes each
//! generation's rendering and snapshot, plus root outputs, over two more.

use std::fmt;

use canopy_snapshot::Snapshot;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::id::{WorkflowId, WorkflowIdentifier};
use crate::node::WorkflowNode;
use crate::observer::{Diagnostics, WorkflowEvent};
use crate::workflow::Workflow;

/// One generation's rendering and the snapshot of the tree that produced it.
#[derive(Debug, Clone)]
pub struct RenderingAndSnapshot<R> {
  pub rendering: R,
  pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
  AwaitingFirstProps,
  Rendering,
  AwaitingChange,
  Terminated,
}

impl fmt::Display for LoopState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      LoopState::AwaitingFirstProps => "awaiting_first_props",
      LoopState::Rendering => "rendering",
      LoopState::AwaitingChange => "awaiting_change",
      LoopState::Terminated => "terminated",
    })
  }
}

/// Runs a workflow tree until cancelled.
///
/// # Usage
///
/// ```ignore
/// let (runner, mut handle) = WorkflowRunner::new(MyWorkflow, RuntimeConfig::default());
/// let cancel = CancellationToken::new();
/// tokio::spawn(runner.start(cancel.clone()));
///
/// handle.send_props(props).await?;
/// let first = handle.next_rendering().await;
/// ```
pub struct WorkflowRunner<W: Workflow> {
  workflow: W,
  runtime_id: String,
  props: mpsc::Receiver<W::Props>,
  renderings: mpsc::Sender<RenderingAndSnapshot<W::Rendering>>,
  outputs: mpsc::Sender<W::Output>,
  snapshot: Option<Snapshot>,
  diagnostics: Diagnostics,
}

impl<W: Workflow> WorkflowRunner<W> {
  /// Create a runner and the handle used to feed and observe it.
  pub fn new(workflow: W, config: RuntimeConfig) -> (Self, WorkflowHandle<W>) {
    let (props_tx, props_rx) = mpsc::channel(config.props_buffer.max(1));
    let (renderings_tx, renderings_rx) = mpsc::channel(config.rendering_buffer.max(1));
    let (outputs_tx, outputs_rx) = mpsc::channel(config.output_buffer.max(1));

    let runner = Self {
      workflow,
      runtime_id: Uuid::new_v4().to_string(),
      props: props_rx,
      renderings: renderings_tx,
      outputs: outputs_tx,
      snapshot: None,
      diagnostics: Diagnostics::new(config.observer),
    };
    let handle = WorkflowHandle {
      props: props_tx,
      renderings: renderings_rx,
      outputs: outputs_rx,
    };
    (runner, handle)
  }

  /// Restore the tree from `snapshot` when the first props arrive.
  pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
    self.snapshot = Some(snapshot);
    self
  }

  pub fn runtime_id(&self) -> &str {
    &self.runtime_id
  }

  /// Run the loop.
  ///
  /// Returns `Ok(())` once `cancel` fires and the first error otherwise. The
  /// tree is torn down before this returns either way.
  #[instrument(
    name = "workflow_runtime",
    skip(self, cancel),
    fields(runtime_id = %self.runtime_id, workflow = W::type_name())
  )]
  pub async fn start(mut self, cancel: CancellationToken) -> Result<(), RuntimeError> {
    info!(runtime_id = %self.runtime_id, workflow = W::type_name(), "workflow_runtime_started");
    self.diagnostics.notify(|| WorkflowEvent::RuntimeStarted {
      runtime_id: self.runtime_id.clone(),
      workflow: W::type_name().to_string(),
    });

    let result = self.run(&cancel).await;
    self.transition(LoopState::Terminated);

    match &result {
      Ok(()) => info!(runtime_id = %self.runtime_id, "workflow_runtime_stopped"),
      Err(e) => error!(runtime_id = %self.runtime_id, error = %e, "workflow_runtime_failed"),
    }
    self.diagnostics.notify(|| WorkflowEvent::RuntimeStopped {
      runtime_id: self.runtime_id.clone(),
      error: result.as_ref().err().map(ToString::to_string),
    });
    result
  }

  async fn run(&mut self, cancel: &CancellationToken) -> Result<(), RuntimeError> {
    self.transition(LoopState::AwaitingFirstProps);
    let props = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Ok(()),
      props = self.props.recv() => props.ok_or(RuntimeError::PropsClosed)?,
    };

    let mut root = WorkflowNode::new(
      WorkflowId::new(WorkflowIdentifier::of::<W>(), ""),
      &self.workflow,
      props.clone(),
      self.snapshot.take(),
      cancel.child_token(),
      self.diagnostics.clone(),
      None,
    );
    let result = self.drive(&mut root, props, cancel).await;
    root.cancel();
    result
  }

  async fn drive(
    &mut self,
    root: &mut WorkflowNode<W>,
    mut props: W::Props,
    cancel: &CancellationToken,
  ) -> Result<(), RuntimeError> {
    let mut props_open = true;
    let mut output = None;

    loop {
      self.transition(LoopState::Rendering);
      self.diagnostics.notify(|| WorkflowEvent::RenderPassStarted {
        runtime_id: self.runtime_id.clone(),
      });
      let rendering = root.render(&self.workflow, props.clone())?;
      self.diagnostics.notify(|| WorkflowEvent::RenderPassFinished {
        runtime_id: self.runtime_id.clone(),
      });

      let snapshot = root.snapshot();
      self.diagnostics.notify(|| WorkflowEvent::SnapshotPassFinished {
        runtime_id: self.runtime_id.clone(),
        bytes: snapshot.len(),
      });

      let published = RenderingAndSnapshot {
        rendering,
        snapshot,
      };
      if !publish(&self.renderings, published, cancel).await {
        return Ok(());
      }
      if let Some(output) = output.take() {
        if !publish(&self.outputs, output, cancel).await {
          return Ok(());
        }
      }

      self.transition(LoopState::AwaitingChange);
      output = loop {
        tokio::select! {
          biased;
          _ = cancel.cancelled() => return Ok(()),
          next = self.props.recv(), if props_open => match next {
            Some(next) => {
              props = next;
              break None;
            }
            None => {
              debug!(runtime_id = %self.runtime_id, "props_closed");
              props_open = false;
            }
          },
          result = root.tick() => break result?,
        }
      };
    }
  }

  fn transition(&self, state: LoopState) {
    debug!(runtime_id = %self.runtime_id, state = %state, "runtime_state");
  }
}

/// Send `value` unless `cancel` fires first. A dropped receiver is ignored.
async fn publish<T>(sender: &mpsc::Sender<T>, value: T, cancel: &CancellationToken) -> bool {
  tokio::select! {
    biased;
    _ = cancel.cancelled() => false,
    _ = sender.send(value) => true,
  }
}

/// The caller's side of a [`WorkflowRunner`].
pub struct WorkflowHandle<W: Workflow> {
  props: mpsc::Sender<W::Props>,
  renderings: mpsc::Receiver<RenderingAndSnapshot<W::Rendering>>,
  outputs: mpsc::Receiver<W::Output>,
}

impl<W: Workflow> WorkflowHandle<W> {
  /// A sender for new props, for code that outlives this handle.
  pub fn props_sender(&self) -> mpsc::Sender<W::Props> {
    self.props.clone()
  }

  /// Send new props. Fails with [`RuntimeError::Cancelled`] once the runner
  /// has stopped.
  pub async fn send_props(&self, props: W::Props) -> Result<(), RuntimeError> {
    self
      .props
      .send(props)
      .await
      .map_err(|_| RuntimeError::Cancelled)
  }

  /// The next (rendering, snapshot) pair, or `None` once the runner stopped.
  pub async fn next_rendering(&mut self) -> Option<RenderingAndSnapshot<W::Rendering>> {
    self.renderings.recv().await
  }

  /// The next root output, or `None` once the runner stopped.
  pub async fn next_output(&mut self) -> Option<W::Output> {
    self.outputs.recv().await
  }

  pub fn renderings(&mut self) -> &mut mpsc::Receiver<RenderingAndSnapshot<W::Rendering>> {
    &mut self.renderings
  }

  pub fn outputs(&mut self) -> &mut mpsc::Receiver<W::Output> {
    &mut self.outputs
  }

  /// Split into the props sender and the two receivers.
  #[allow(clippy::type_complexity)]
  pub fn into_parts(
    self,
  ) -> (
    mpsc::Sender<W::Props>,
    mpsc::Receiver<RenderingAndSnapshot<W::Rendering>>,
    mpsc::Receiver<W::Output>,
  ) {
    (self.props, self.renderings, self.outputs)
  }
}

/// Spawn a runner with `props` already queued.
pub fn launch_workflow<W: Workflow>(
  workflow: W,
  props: W::Props,
  snapshot: Option<Snapshot>,
  config: RuntimeConfig,
  cancel: CancellationToken,
) -> (WorkflowHandle<W>, JoinHandle<Result<(), RuntimeError>>) {
  let (mut runner, handle) = WorkflowRunner::new(workflow, config);
  if let Some(snapshot) = snapshot {
    runner = runner.with_snapshot(snapshot);
  }
  // Capacity is at least one and nothing else has sent yet.
  let _ = handle.props.try_send(props);
  let task = tokio::spawn(runner.start(cancel));
  (handle, task)
}
