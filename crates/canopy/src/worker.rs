//! The worker contract and ready-made workers.
//!
//! A worker describes asynchronous work a workflow wants running while it keeps
//! requesting it. The runtime starts it on first request, keeps it running
//! across renders that request equivalent work, and cancels it once a render
//! stops asking for it.

use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::error::BoxError;

/// The output stream of a running worker. An `Err` item is fatal to the tree.
pub type WorkerStream<T> = BoxStream<'static, Result<T, BoxError>>;

pub trait Worker: Send + 'static {
  type Output: Send + 'static;

  /// Start the work. Called once, when the worker is first requested.
  fn run(&mut self) -> WorkerStream<Self::Output>;

  /// Whether `other`, requested with the same key, can keep this worker's
  /// stream running instead of restarting it.
  fn does_same_work_as(&self, other: &Self) -> bool {
    let _ = other;
    true
  }

  fn describe(&self) -> String {
    std::any::type_name::<Self>().to_string()
  }
}

/// What a worker's handler observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent<T> {
  Output(T),
  /// The stream completed. Delivered once.
  Finished,
}

/// Runs a stream built ahead of time.
pub struct StreamWorker<T> {
  stream: Option<WorkerStream<T>>,
}

impl<T: Send + 'static> Worker for StreamWorker<T> {
  type Output = T;

  fn run(&mut self) -> WorkerStream<T> {
    self.stream.take().unwrap_or_else(|| stream::empty().boxed())
  }
}

pub fn from_stream<T, S>(stream: S) -> StreamWorker<T>
where
  T: Send + 'static,
  S: Stream<Item = T> + Send + 'static,
{
  StreamWorker {
    stream: Some(stream.map(Ok).boxed()),
  }
}

pub fn from_try_stream<T, E, S>(stream: S) -> StreamWorker<T>
where
  T: Send + 'static,
  E: Into<BoxError>,
  S: Stream<Item = Result<T, E>> + Send + 'static,
{
  StreamWorker {
    stream: Some(stream.map(|item| item.map_err(Into::into)).boxed()),
  }
}

/// Emits the future's output once, then finishes.
pub fn from_future<T, F>(future: F) -> StreamWorker<T>
where
  T: Send + 'static,
  F: Future<Output = T> + Send + 'static,
{
  from_stream(stream::once(future))
}

/// Emits every value received on `receiver` until all senders are dropped.
pub fn from_receiver<T: Send + 'static>(receiver: mpsc::Receiver<T>) -> StreamWorker<T> {
  from_stream(stream::unfold(receiver, |mut receiver| async move {
    let value = receiver.recv().await?;
    Some((value, receiver))
  }))
}

/// Emits `()` once after a delay. Equivalent to any timer with the same delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerWorker {
  delay: Duration,
}

impl Worker for TimerWorker {
  type Output = ();

  fn run(&mut self) -> WorkerStream<()> {
    let delay = self.delay;
    stream::once(async move {
      tokio::time::sleep(delay).await;
      Ok(())
    })
    .boxed()
  }

  fn does_same_work_as(&self, other: &Self) -> bool {
    self.delay == other.delay
  }

  fn describe(&self) -> String {
    format!("timer({:?})", self.delay)
  }
}

pub fn timer(delay: Duration) -> TimerWorker {
  TimerWorker { delay }
}

/// Finishes immediately without emitting.
pub struct FinishedWorker<T> {
  _output: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Worker for FinishedWorker<T> {
  type Output = T;

  fn run(&mut self) -> WorkerStream<T> {
    stream::empty().boxed()
  }

  fn describe(&self) -> String {
    "finished".to_string()
  }
}

pub fn finished<T: Send + 'static>() -> FinishedWorker<T> {
  FinishedWorker {
    _output: PhantomData,
  }
}

/// Runs a future for its effect and never emits.
///
/// Requested through [`RenderContext::run_side_effect`](crate::RenderContext::run_side_effect).
pub struct SideEffectWorker {
  effect: Option<BoxFuture<'static, ()>>,
}

impl SideEffectWorker {
  pub fn new(effect: impl Future<Output = ()> + Send + 'static) -> Self {
    Self {
      effect: Some(Box::pin(effect)),
    }
  }
}

impl Worker for SideEffectWorker {
  type Output = Infallible;

  fn run(&mut self) -> WorkerStream<Infallible> {
    match self.effect.take() {
      Some(effect) => stream::once(effect)
        .filter_map(|()| async { None })
        .boxed(),
      None => stream::empty().boxed(),
    }
  }

  fn describe(&self) -> String {
    "side_effect".to_string()
  }
}
