//! Action sinks and event handlers.
//!
//! Each render generation owns one [`ActionSlot`]. A sink handed out during that
//! render can deliver exactly one action, and only after render has returned.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;

use crate::action::Action;
use crate::error::SinkError;

const RENDERING: u8 = 0;
const OPEN: u8 = 1;
const DELIVERED: u8 = 2;
const STALE: u8 = 3;
const CLOSED: u8 = 4;

/// The pending-action slot of one generation.
#[derive(Debug)]
pub(crate) struct ActionSlot {
  state: AtomicU8,
}

impl ActionSlot {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Self {
      state: AtomicU8::new(RENDERING),
    })
  }

  /// Render returned; accept one delivery.
  pub(crate) fn open(&self) {
    let _ = self
      .state
      .compare_exchange(RENDERING, OPEN, Ordering::AcqRel, Ordering::Acquire);
  }

  /// A newer generation replaced this one.
  pub(crate) fn supersede(&self) {
    let _ = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
      (state != CLOSED).then_some(STALE)
    });
  }

  /// The owning node was torn down.
  pub(crate) fn close(&self) {
    self.state.store(CLOSED, Ordering::Release);
  }

  fn claim(&self, action: &str) -> Result<(), SinkError> {
    let action = action.to_string();
    match self
      .state
      .compare_exchange(OPEN, DELIVERED, Ordering::AcqRel, Ordering::Acquire)
    {
      Ok(_) => Ok(()),
      Err(RENDERING) => Err(SinkError::RenderInProgress { action }),
      Err(DELIVERED) => Err(SinkError::AlreadyDelivered { action }),
      Err(STALE) => Err(SinkError::Stale { action }),
      Err(_) => Err(SinkError::Closed { action }),
    }
  }
}

/// Delivers actions to the node that rendered it.
pub struct Sink<S, O> {
  slot: Arc<ActionSlot>,
  tx: mpsc::UnboundedSender<Action<S, O>>,
}

impl<S, O> Sink<S, O> {
  pub(crate) fn new(slot: Arc<ActionSlot>, tx: mpsc::UnboundedSender<Action<S, O>>) -> Self {
    Self { slot, tx }
  }

  /// Queue `action` for this sink's node.
  ///
  /// Fails if render has not returned yet, if an action was already delivered
  /// for this generation, if a later render superseded it, or if the node is
  /// gone. A rejected action is dropped.
  pub fn send(&self, action: Action<S, O>) -> Result<(), SinkError> {
    self.slot.claim(action.name())?;
    self.tx.send(action).map_err(|rejected| SinkError::Closed {
      action: rejected.0.name().to_string(),
    })
  }
}

impl<S, O> Clone for Sink<S, O> {
  fn clone(&self) -> Self {
    Self {
      slot: self.slot.clone(),
      tx: self.tx.clone(),
    }
  }
}

impl<S, O> fmt::Debug for Sink<S, O> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Sink").field("slot", &self.slot).finish()
  }
}

/// A callback for the presentation layer that turns an event into an action.
pub struct EventHandler<E> {
  handle: Arc<dyn Fn(E) -> Result<(), SinkError> + Send + Sync>,
}

impl<E> EventHandler<E> {
  pub(crate) fn new<S, O>(
    sink: Sink<S, O>,
    handler: impl Fn(E) -> Action<S, O> + Send + Sync + 'static,
  ) -> Self
  where
    S: 'static,
    O: 'static,
  {
    Self {
      handle: Arc::new(move |event| sink.send(handler(event))),
    }
  }

  pub fn handle(&self, event: E) -> Result<(), SinkError> {
    (self.handle)(event)
  }
}

impl<E> Clone for EventHandler<E> {
  fn clone(&self) -> Self {
    Self {
      handle: self.handle.clone(),
    }
  }
}

impl<E> fmt::Debug for EventHandler<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("EventHandler")
  }
}
