use std::sync::Arc;

use crate::id::WorkflowId;
use crate::sink::ActionSlot;

pub(crate) type TeardownHook = Box<dyn FnOnce() + Send>;

/// What one render pass asked for, frozen once render returns.
pub(crate) struct Behavior {
  /// Children in the order they were rendered.
  pub(crate) children: Vec<WorkflowId>,
  pub(crate) workers: Vec<String>,
  pub(crate) teardown: Vec<TeardownHook>,
  /// This generation's pending-action slot.
  pub(crate) slot: Arc<ActionSlot>,
}

impl Behavior {
  /// Close the slot and run teardown hooks in registration order.
  pub(crate) fn tear_down(self) {
    self.slot.close();
    for hook in self.teardown {
      hook();
    }
  }
}
