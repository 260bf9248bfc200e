//! The workflow definition trait.

use canopy_snapshot::{Snapshot, SnapshotError};

use crate::context::RenderContext;
use crate::error::RuntimeError;

/// One node's logic: how it starts, how it renders, and how its state is saved.
///
/// A workflow value is cheap configuration; the runtime keeps the state. Each
/// render receives the latest workflow value, so anything captured in it (for
/// example, injected services) may change between passes.
///
/// Stateless workflows use `State = ()`.
pub trait Workflow: Clone + Send + Sync + 'static {
  type Props: Clone + PartialEq + Send + 'static;
  type State: Send + 'static;
  type Output: Send + 'static;
  type Rendering: Send + 'static;

  /// Name written into snapshot ids for children of this type.
  ///
  /// Changing it makes previously written snapshots restore from initial state.
  /// The default, [`std::any::type_name`], is neither guaranteed unique nor
  /// stable across compiler releases; workflows whose snapshots are persisted
  /// should override it with a fixed name. Siblings whose names collide are
  /// rejected as duplicate children.
  fn type_name() -> &'static str {
    std::any::type_name::<Self>()
  }

  fn initial_state(&self, props: &Self::Props) -> Self::State;

  /// Rebuild state from bytes produced by [`Workflow::snapshot_state`].
  ///
  /// Only called with a non-empty snapshot. An error makes the runtime log it
  /// and fall back to [`Workflow::initial_state`].
  fn restore_state(
    &self,
    props: &Self::Props,
    snapshot: &Snapshot,
  ) -> Result<Self::State, SnapshotError> {
    let _ = snapshot;
    Ok(self.initial_state(props))
  }

  /// Called before a render whose props differ from the previous render's.
  fn on_props_changed(&self, old: &Self::Props, new: &Self::Props, state: &mut Self::State) {
    let _ = (old, new, state);
  }

  /// Produce this generation's rendering.
  ///
  /// Must not have observable side effects: request children, workers and
  /// side effects through `ctx`, and hand out the sink for later use.
  fn render(
    &self,
    props: &Self::Props,
    state: &Self::State,
    ctx: &mut RenderContext<'_, Self>,
  ) -> Result<Self::Rendering, RuntimeError>;

  fn snapshot_state(&self, state: &Self::State) -> Snapshot {
    let _ = state;
    Snapshot::empty()
  }
}
