//! Testing one worker on its own.

use std::time::Duration;

use canopy::BoxError;
use canopy::worker::{Worker, WorkerStream};
use futures::StreamExt;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::DEFAULT_TIMEOUT;
use crate::error::TesterError;

enum Item<T> {
  Output(T),
  Failed(BoxError),
}

/// Runs a worker's stream on a task and buffers what it emits.
///
/// The channel closing means the worker finished. Dropping the tester cancels
/// the worker.
pub struct WorkerTester<T> {
  items: mpsc::UnboundedReceiver<Item<T>>,
  pending: Option<Item<T>>,
  closed: bool,
  token: CancellationToken,
  task: Option<JoinHandle<()>>,
  timeout: Duration,
}

impl<T: Send + 'static> WorkerTester<T> {
  pub fn start<K: Worker<Output = T>>(mut worker: K) -> Self {
    let (sender, items) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let task = tokio::spawn(pump(worker.run(), sender, token.clone()));
    Self {
      items,
      pending: None,
      closed: false,
      token,
      task: Some(task),
      timeout: DEFAULT_TIMEOUT,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Wait for the next output.
  pub async fn next_output(&mut self) -> Result<T, TesterError> {
    match self.next_item("worker output").await? {
      Some(Item::Output(value)) => Ok(value),
      Some(Item::Failed(source)) => Err(TesterError::Worker(source)),
      None => Err(TesterError::WorkerFinished),
    }
  }

  /// Fail if an output is already waiting. Does not wait.
  pub fn assert_no_output(&mut self) -> Result<(), TesterError> {
    match self.peek() {
      Some(Item::Output(_)) => {
        self.pending = None;
        Err(TesterError::UnexpectedOutput)
      }
      _ => Ok(()),
    }
  }

  /// Fail if the worker has already finished. Does not wait.
  pub fn assert_not_finished(&mut self) -> Result<(), TesterError> {
    if self.peek().is_none() && self.closed {
      return Err(TesterError::WorkerFinished);
    }
    Ok(())
  }

  /// Wait for the worker to finish without emitting anything else.
  pub async fn assert_finished(&mut self) -> Result<(), TesterError> {
    match self.next_item("worker to finish").await? {
      None => Ok(()),
      Some(Item::Output(_)) => Err(TesterError::UnexpectedOutput),
      Some(Item::Failed(source)) => Err(TesterError::Worker(source)),
    }
  }

  /// Wait for the worker's stream to yield an error and return it.
  pub async fn error(&mut self) -> Result<BoxError, TesterError> {
    match self.next_item("worker error").await? {
      Some(Item::Failed(source)) => Ok(source),
      Some(Item::Output(_)) => Err(TesterError::UnexpectedOutput),
      None => Err(TesterError::WorkerFinished),
    }
  }

  /// Cancel the worker and wait for its task to stop.
  pub async fn cancel(mut self) -> Result<(), TesterError> {
    self.token.cancel();
    match self.task.take() {
      Some(task) => Ok(task.await?),
      None => Ok(()),
    }
  }

  async fn next_item(&mut self, waiting_for: &'static str) -> Result<Option<Item<T>>, TesterError> {
    if let Some(item) = self.pending.take() {
      return Ok(Some(item));
    }
    let item = tokio::time::timeout(self.timeout, self.items.recv())
      .await
      .map_err(|_| TesterError::Timeout {
        waiting_for,
        after: self.timeout,
      })?;
    self.closed = item.is_none();
    Ok(item)
  }

  fn peek(&mut self) -> Option<&Item<T>> {
    if self.pending.is_none() {
      match self.items.try_recv() {
        Ok(item) => self.pending = Some(item),
        Err(TryRecvError::Disconnected) => self.closed = true,
        Err(TryRecvError::Empty) => {}
      }
    }
    self.pending.as_ref()
  }
}

impl<T> Drop for WorkerTester<T> {
  fn drop(&mut self) {
    self.token.cancel();
  }
}

/// Forward `stream` into `sender` until it ends, fails, or `token` fires.
async fn pump<T: Send + 'static>(
  mut stream: WorkerStream<T>,
  sender: mpsc::UnboundedSender<Item<T>>,
  token: CancellationToken,
) {
  let forward = async {
    while let Some(item) = stream.next().await {
      let (item, failed) = match item {
        Ok(value) => (Item::Output(value), false),
        Err(source) => (Item::Failed(source), true),
      };
      if sender.send(item).is_err() || failed {
        return;
      }
    }
  };

  tokio::select! {
    biased;
    _ = token.cancelled() => {}
    _ = forward => {}
  }
}
