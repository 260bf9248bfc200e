//! Running workers of one node.
//!
//! Entries are keyed by worker type and key. Each started worker runs on its
//! own task and forwards into a capacity-1 channel, so a worker never gets more
//! than one value ahead of the node consuming it.

use std::any::{Any, TypeId};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::action::{Action, ActionFuture};
use crate::active_staging::{ActiveStagingList, Staged};
use crate::error::{BoxError, RuntimeError};
use crate::node::NodeScope;
use crate::observer::WorkflowEvent;
use crate::worker::{Worker, WorkerEvent, WorkerStream};

/// Maps a worker event to an action for the owning node. `None` ignores it.
pub(crate) type WorkerHandler<T, S, O> =
  Box<dyn Fn(WorkerEvent<T>) -> Option<Action<S, O>> + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkerKey {
  worker_type: TypeId,
  key: String,
}

enum WorkerMessage<T> {
  Output(T),
  Failed(BoxError),
  Finished,
}

trait WorkerNode<S, O>: Send {
  fn key(&self) -> &WorkerKey;
  fn as_any(&self) -> &dyn Any;
  fn as_any_mut(&mut self) -> &mut dyn Any;
  fn is_tombstoned(&self) -> bool;
  fn tick(&mut self) -> ActionFuture<'_, S, O>;
  fn cancel(&mut self);
}

struct RunningWorker<W: Worker, S, O> {
  key: WorkerKey,
  worker: W,
  description: String,
  messages: mpsc::Receiver<WorkerMessage<W::Output>>,
  handler: WorkerHandler<W::Output, S, O>,
  token: CancellationToken,
  scope: NodeScope,
  diagnostic_id: u64,
  tombstoned: bool,
  stopped: bool,
}

impl<W: Worker, S: 'static, O: 'static> RunningWorker<W, S, O> {
  fn start(
    mut worker: W,
    key: WorkerKey,
    handler: WorkerHandler<W::Output, S, O>,
    scope: &NodeScope,
  ) -> Self {
    let token = scope.token.child_token();
    let diagnostic_id = scope.diagnostics.next_id();
    let description = worker.describe();

    debug!(workflow = %scope.name, worker = %description, key = %key.key, "worker_started");
    scope.diagnostics.notify(|| WorkflowEvent::WorkerStarted {
      worker_id: diagnostic_id,
      workflow_id: scope.diagnostic_id,
      key: key.key.clone(),
      description: description.clone(),
    });

    let (sender, messages) = mpsc::channel(1);
    tokio::spawn(forward(worker.run(), sender, token.clone()));

    Self {
      key,
      worker,
      description,
      messages,
      handler,
      token,
      scope: scope.clone(),
      diagnostic_id,
      tombstoned: false,
      stopped: false,
    }
  }

  fn failure(&self, source: BoxError) -> RuntimeError {
    RuntimeError::Worker {
      workflow: self.scope.name.to_string(),
      worker: self.description.clone(),
      source,
    }
  }

  fn stop(&mut self) {
    if self.stopped {
      return;
    }
    self.stopped = true;
    self.scope.diagnostics.notify(|| WorkflowEvent::WorkerStopped {
      worker_id: self.diagnostic_id,
      workflow_id: self.scope.diagnostic_id,
    });
  }
}

impl<W: Worker, S: 'static, O: 'static> WorkerNode<S, O> for RunningWorker<W, S, O> {
  fn key(&self) -> &WorkerKey {
    &self.key
  }

  fn as_any(&self) -> &dyn Any {
    self
  }

  fn as_any_mut(&mut self) -> &mut dyn Any {
    self
  }

  fn is_tombstoned(&self) -> bool {
    self.tombstoned
  }

  fn tick(&mut self) -> ActionFuture<'_, S, O> {
    Box::pin(async move {
      let event = match self.messages.recv().await {
        Some(WorkerMessage::Output(value)) => WorkerEvent::Output(value),
        Some(WorkerMessage::Finished) => {
          debug!(workflow = %self.scope.name, worker = %self.description, "worker_finished");
          self.tombstoned = true;
          self.stop();
          WorkerEvent::Finished
        }
        Some(WorkerMessage::Failed(source)) => return Err(self.failure(source)),
        None => return Err(self.failure("worker task exited before finishing".into())),
      };
      Ok((self.handler)(event))
    })
  }

  fn cancel(&mut self) {
    self.token.cancel();
    if !self.stopped {
      debug!(workflow = %self.scope.name, worker = %self.description, "worker_cancelled");
    }
    self.stop();
  }
}

impl<W: Worker, S, O> Drop for RunningWorker<W, S, O> {
  fn drop(&mut self) {
    self.token.cancel();
  }
}

/// Pump a worker's stream into its channel until it ends, fails, or the
/// token fires.
async fn forward<T: Send + 'static>(
  mut stream: WorkerStream<T>,
  sender: mpsc::Sender<WorkerMessage<T>>,
  token: CancellationToken,
) {
  let pump = async {
    while let Some(item) = stream.next().await {
      let (message, failed) = match item {
        Ok(value) => (WorkerMessage::Output(value), false),
        Err(error) => (WorkerMessage::Failed(error), true),
      };
      if sender.send(message).await.is_err() || failed {
        return;
      }
    }
    let _ = sender.send(WorkerMessage::Finished).await;
  };

  tokio::select! {
    biased;
    _ = token.cancelled() => {}
    _ = pump => {}
  }
}

pub(crate) struct WorkerTracker<S, O> {
  workers: ActiveStagingList<Box<dyn WorkerNode<S, O>>>,
  scope: NodeScope,
}

impl<S: 'static, O: 'static> WorkerTracker<S, O> {
  pub(crate) fn new(scope: NodeScope) -> Self {
    Self {
      workers: ActiveStagingList::new(),
      scope,
    }
  }

  /// Request `worker` under `key` for the render in progress.
  ///
  /// An equivalent running worker keeps its stream and only gets the new
  /// handler. A non-equivalent one is cancelled before the new one starts.
  pub(crate) fn run<W: Worker>(
    &mut self,
    worker: W,
    key: &str,
    handler: WorkerHandler<W::Output, S, O>,
  ) -> Result<(), RuntimeError> {
    let worker_key = WorkerKey {
      worker_type: TypeId::of::<W>(),
      key: key.to_string(),
    };

    if self.workers.staging().any(|running| running.key() == &worker_key) {
      return Err(RuntimeError::DuplicateWorker {
        worker: worker.describe(),
        key: key.to_string(),
      });
    }

    if let Some(mut replaced) = self.workers.remove_active(|running| {
      running.key() == &worker_key && !does_same_work(&**running, &worker)
    }) {
      debug!(workflow = %self.scope.name, key = %key, "worker_replaced");
      replaced.cancel();
    }

    match self.workers.stage(|running| running.key() == &worker_key) {
      Staged::Retained(running) => {
        if let Some(running) = running.as_any_mut().downcast_mut::<RunningWorker<W, S, O>>() {
          running.handler = handler;
        }
      }
      Staged::Vacant(vacant) => {
        vacant.insert(Box::new(RunningWorker::start(
          worker,
          worker_key,
          handler,
          &self.scope,
        )));
      }
    }
    Ok(())
  }

  /// Cancel workers the last render stopped requesting.
  pub(crate) fn commit(&mut self) {
    self.workers.commit(|mut removed| removed.cancel());
  }

  pub(crate) fn cancel_all(&mut self) {
    self.workers.drain_all(|mut removed| removed.cancel());
  }

  /// Add one tick source per live worker.
  pub(crate) fn tick_workers<'a>(&'a mut self, sources: &mut Vec<ActionFuture<'a, S, O>>) {
    for running in self.workers.active_mut() {
      if !running.is_tombstoned() {
        sources.push(running.tick());
      }
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.workers.active().count()
  }
}

fn does_same_work<W: Worker, S: 'static, O: 'static>(
  running: &dyn WorkerNode<S, O>,
  worker: &W,
) -> bool {
  running
    .as_any()
    .downcast_ref::<RunningWorker<W, S, O>>()
    .is_some_and(|running| running.worker.does_same_work_as(worker))
}
