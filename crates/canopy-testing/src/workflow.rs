//! Driving a workflow through the real runner.

use std::time::Duration;

use canopy::{
  RenderingAndSnapshot, RuntimeConfig, RuntimeError, Snapshot, Workflow, WorkflowHandle,
  launch_workflow,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::DEFAULT_TIMEOUT;
use crate::error::TesterError;

/// A running workflow plus helpers to await its renderings and outputs.
///
/// Every wait is bounded by the tester's timeout. Dropping the tester cancels
/// the workflow.
pub struct WorkflowTester<W: Workflow> {
  handle: WorkflowHandle<W>,
  cancel: CancellationToken,
  task: Option<JoinHandle<Result<(), RuntimeError>>>,
  timeout: Duration,
  last_snapshot: Option<Snapshot>,
}

impl<W: Workflow> WorkflowTester<W> {
  /// Start `workflow` from initial state.
  pub fn start(workflow: W, props: W::Props) -> Self {
    Self::start_with(workflow, props, None, RuntimeConfig::default())
  }

  /// Start `workflow` restored from `snapshot`.
  pub fn start_from_snapshot(workflow: W, props: W::Props, snapshot: Snapshot) -> Self {
    Self::start_with(workflow, props, Some(snapshot), RuntimeConfig::default())
  }

  pub fn start_with(
    workflow: W,
    props: W::Props,
    snapshot: Option<Snapshot>,
    config: RuntimeConfig,
  ) -> Self {
    let cancel = CancellationToken::new();
    let (handle, task) = launch_workflow(workflow, props, snapshot, config, cancel.clone());
    Self {
      handle,
      cancel,
      task: Some(task),
      timeout: DEFAULT_TIMEOUT,
      last_snapshot: None,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub async fn await_next_rendering(&mut self) -> Result<W::Rendering, TesterError> {
    Ok(self.await_next_rendering_and_snapshot().await?.rendering)
  }

  pub async fn await_next_rendering_and_snapshot(
    &mut self,
  ) -> Result<RenderingAndSnapshot<W::Rendering>, TesterError> {
    let next = tokio::time::timeout(self.timeout, self.handle.next_rendering())
      .await
      .map_err(|_| TesterError::Timeout {
        waiting_for: "rendering",
        after: self.timeout,
      })?
      .ok_or(TesterError::Stopped)?;
    self.last_snapshot = Some(next.snapshot.clone());
    Ok(next)
  }

  /// Skip renderings until one satisfies `predicate`.
  pub async fn await_rendering_where(
    &mut self,
    mut predicate: impl FnMut(&W::Rendering) -> bool,
  ) -> Result<W::Rendering, TesterError> {
    loop {
      let rendering = self.await_next_rendering().await?;
      if predicate(&rendering) {
        return Ok(rendering);
      }
    }
  }

  pub async fn await_next_output(&mut self) -> Result<W::Output, TesterError> {
    tokio::time::timeout(self.timeout, self.handle.next_output())
      .await
      .map_err(|_| TesterError::Timeout {
        waiting_for: "output",
        after: self.timeout,
      })?
      .ok_or(TesterError::Stopped)
  }

  /// Fail if a rendering arrives within `within`.
  pub async fn assert_no_rendering(&mut self, within: Duration) -> Result<(), TesterError> {
    match tokio::time::timeout(within, self.handle.next_rendering()).await {
      Err(_) => Ok(()),
      Ok(Some(_)) => Err(TesterError::UnexpectedRendering),
      Ok(None) => Err(TesterError::Stopped),
    }
  }

  pub async fn send_props(&self, props: W::Props) -> Result<(), TesterError> {
    Ok(self.handle.send_props(props).await?)
  }

  /// Snapshot that came with the most recent rendering.
  pub fn last_snapshot(&self) -> Option<&Snapshot> {
    self.last_snapshot.as_ref()
  }

  /// Stop the workflow and return how the runner ended.
  pub async fn cancel(mut self) -> Result<(), TesterError> {
    self.cancel.cancel();
    self.join().await
  }

  /// Wait for the runner to end on its own, typically with an error.
  pub async fn await_failure(mut self) -> Result<RuntimeError, TesterError> {
    match tokio::time::timeout(self.timeout, self.join()).await {
      Err(_) => Err(TesterError::Timeout {
        waiting_for: "failure",
        after: self.timeout,
      }),
      Ok(Ok(())) => Err(TesterError::Stopped),
      Ok(Err(TesterError::Runtime(error))) => Ok(error),
      Ok(Err(error)) => Err(error),
    }
  }

  async fn join(&mut self) -> Result<(), TesterError> {
    match self.task.take() {
      Some(task) => Ok(task.await??),
      None => Ok(()),
    }
  }
}

impl<W: Workflow> Drop for WorkflowTester<W> {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}
