//! Child reconciliation.
//!
//! Rendering a child moves it from the active list into staging, creating it if
//! it was not there. After the parent's render returns, [`SubtreeManager::commit`]
//! tears down whatever is still active, so "rendered this pass" is the only
//! signal a child needs to stay alive.

use std::any::Any;
use std::collections::HashMap;

use canopy_snapshot::{ChildId, Snapshot};

use crate::action::{Action, ActionFuture};
use crate::active_staging::{ActiveStagingList, Staged};
use crate::error::RuntimeError;
use crate::id::WorkflowId;
use crate::node::{NodeScope, WorkflowNode};
use crate::workflow::Workflow;

/// Maps a child's output to an action for its parent.
pub(crate) type ChildHandler<T, S, O> = Box<dyn Fn(T) -> Action<S, O> + Send>;

/// A child node with its workflow type erased; `S` and `O` are the parent's.
trait ChildNode<S, O>: Send {
  fn id(&self) -> &WorkflowId;
  fn as_any_mut(&mut self) -> &mut dyn Any;
  fn tick(&mut self) -> ActionFuture<'_, S, O>;
  fn snapshot(&self) -> Snapshot;
  fn cancel(&mut self);
}

struct TypedChild<C: Workflow, S, O> {
  node: WorkflowNode<C>,
  handler: ChildHandler<C::Output, S, O>,
}

impl<C: Workflow, S: Send + 'static, O: Send + 'static> ChildNode<S, O> for TypedChild<C, S, O> {
  fn id(&self) -> &WorkflowId {
    self.node.id()
  }

  fn as_any_mut(&mut self) -> &mut dyn Any {
    self
  }

  fn tick(&mut self) -> ActionFuture<'_, S, O> {
    Box::pin(async move {
      let output = self.node.tick().await?;
      Ok(output.map(|output| (self.handler)(output)))
    })
  }

  fn snapshot(&self) -> Snapshot {
    self.node.snapshot()
  }

  fn cancel(&mut self) {
    self.node.cancel();
  }
}

pub(crate) struct SubtreeManager<S, O> {
  children: ActiveStagingList<Box<dyn ChildNode<S, O>>>,
  /// Child snapshots waiting for their first render.
  snapshots: HashMap<ChildId, Snapshot>,
  scope: NodeScope,
}

impl<S: Send + 'static, O: Send + 'static> SubtreeManager<S, O> {
  pub(crate) fn new(scope: NodeScope) -> Self {
    Self {
      children: ActiveStagingList::new(),
      snapshots: HashMap::new(),
      scope,
    }
  }

  /// Seed snapshots for children created by the next render.
  pub(crate) fn restore(&mut self, children: Vec<(ChildId, Snapshot)>) {
    self.snapshots = children.into_iter().collect();
  }

  pub(crate) fn render_child<C: Workflow>(
    &mut self,
    id: WorkflowId,
    workflow: &C,
    props: C::Props,
    handler: ChildHandler<C::Output, S, O>,
  ) -> Result<C::Rendering, RuntimeError> {
    // Siblings must also differ in snapshot form, or a restore cannot tell
    // them apart.
    let child_id = id.child_id();
    if self
      .children
      .staging()
      .any(|child| child.id() == &id || child.id().child_id() == child_id)
    {
      return Err(RuntimeError::DuplicateChild {
        workflow: id.identifier().name().to_string(),
        key: id.key().to_string(),
      });
    }

    let Self {
      children,
      snapshots,
      scope,
    } = self;
    let child = match children.stage(|child| child.id() == &id) {
      Staged::Retained(child) => {
        let child = typed::<C, S, O>(child);
        child.handler = handler;
        child
      }
      Staged::Vacant(vacant) => {
        let snapshot = snapshots.remove(&id.child_id());
        let node = WorkflowNode::new(
          id,
          workflow,
          props.clone(),
          snapshot,
          scope.token.child_token(),
          scope.diagnostics.clone(),
          Some(scope.diagnostic_id),
        );
        typed::<C, S, O>(vacant.insert(Box::new(TypedChild { node, handler })))
      }
    };
    child.node.render(workflow, props)
  }

  /// Tear down children the last render did not request.
  ///
  /// Cached snapshots that no child claimed are discarded.
  pub(crate) fn commit(&mut self) {
    self.children.commit(|mut child| child.cancel());
    self.snapshots.clear();
  }

  pub(crate) fn cancel_all(&mut self) {
    self.children.drain_all(|mut child| child.cancel());
  }

  pub(crate) fn tick_children<'a>(&'a mut self, sources: &mut Vec<ActionFuture<'a, S, O>>) {
    for child in self.children.active_mut() {
      sources.push(child.tick());
    }
  }

  /// Snapshots of the active children, in render order.
  pub(crate) fn snapshots(&self) -> Vec<(ChildId, Snapshot)> {
    self
      .children
      .active()
      .map(|child| (child.id().child_id(), child.snapshot()))
      .collect()
  }

  pub(crate) fn len(&self) -> usize {
    self.children.active().count()
  }
}

fn typed<C: Workflow, S: Send + 'static, O: Send + 'static>(
  child: &mut Box<dyn ChildNode<S, O>>,
) -> &mut TypedChild<C, S, O> {
  child
    .as_any_mut()
    .downcast_mut::<TypedChild<C, S, O>>()
    .expect("child ids compare by workflow type")
}
