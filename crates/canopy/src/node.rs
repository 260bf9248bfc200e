//! A live workflow node: state, children, workers, and the last render's
//! behavior.

use std::sync::Arc;

use canopy_snapshot::{ChildId, Snapshot, SnapshotError, TreeSnapshot};
use futures::future::{BoxFuture, select_all};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::action::{Action, ActionFuture};
use crate::behavior::Behavior;
use crate::context::RenderContext;
use crate::error::RuntimeError;
use crate::id::WorkflowId;
use crate::observer::{Diagnostics, WorkflowEvent};
use crate::sink::{ActionSlot, Sink};
use crate::subtree::SubtreeManager;
use crate::workers::WorkerTracker;
use crate::workflow::Workflow;

/// What a node shares with the children and workers it owns.
#[derive(Clone)]
pub(crate) struct NodeScope {
  /// Display form of the node's id, used in logs and errors.
  pub(crate) name: Arc<str>,
  pub(crate) diagnostic_id: u64,
  /// Cancelled when the node is torn down; children and workers hold child
  /// tokens of it.
  pub(crate) token: CancellationToken,
  pub(crate) diagnostics: Diagnostics,
}

pub(crate) struct WorkflowNode<W: Workflow> {
  id: WorkflowId,
  scope: NodeScope,
  workflow: W,
  props: W::Props,
  state: W::State,
  subtree: SubtreeManager<W::State, W::Output>,
  workers: WorkerTracker<W::State, W::Output>,
  behavior: Option<Behavior>,
  actions_tx: mpsc::UnboundedSender<Action<W::State, W::Output>>,
  actions: mpsc::UnboundedReceiver<Action<W::State, W::Output>>,
  generation: u64,
  cancelled: bool,
}

impl<W: Workflow> WorkflowNode<W> {
  /// Create a node from `snapshot` if it holds one, else from initial state.
  ///
  /// A snapshot that fails to decode or restore is logged and ignored.
  pub(crate) fn new(
    id: WorkflowId,
    workflow: &W,
    props: W::Props,
    snapshot: Option<Snapshot>,
    token: CancellationToken,
    diagnostics: Diagnostics,
    parent_id: Option<u64>,
  ) -> Self {
    let scope = NodeScope {
      name: id.to_string().into(),
      diagnostic_id: diagnostics.next_id(),
      token,
      diagnostics,
    };
    let mut subtree = SubtreeManager::new(scope.clone());

    let snapshot = snapshot.filter(|snapshot| !snapshot.is_empty());
    let restored = snapshot.is_some();
    let state = match snapshot.map(|snapshot| restore(workflow, &props, &snapshot)) {
      Some(Ok((state, children))) => {
        subtree.restore(children);
        state.unwrap_or_else(|| workflow.initial_state(&props))
      }
      Some(Err(error)) => {
        warn!(workflow = %scope.name, error = %error, "snapshot_restore_failed");
        scope
          .diagnostics
          .notify(|| WorkflowEvent::SnapshotRestoreFailed {
            workflow_id: scope.diagnostic_id,
            error: error.to_string(),
          });
        workflow.initial_state(&props)
      }
      None => workflow.initial_state(&props),
    };

    debug!(workflow = %scope.name, restored, "workflow_started");
    scope.diagnostics.notify(|| WorkflowEvent::WorkflowStarted {
      workflow_id: scope.diagnostic_id,
      parent_id,
      workflow_type: id.identifier().name().to_string(),
      key: id.key().to_string(),
      restored_from_snapshot: restored,
    });

    let (actions_tx, actions) = mpsc::unbounded_channel();
    Self {
      id,
      workers: WorkerTracker::new(scope.clone()),
      scope,
      workflow: workflow.clone(),
      props,
      state,
      subtree,
      behavior: None,
      actions_tx,
      actions,
      generation: 0,
      cancelled: false,
    }
  }

  pub(crate) fn id(&self) -> &WorkflowId {
    &self.id
  }

  pub(crate) fn render(
    &mut self,
    workflow: &W,
    props: W::Props,
  ) -> Result<W::Rendering, RuntimeError> {
    self.workflow = workflow.clone();
    if props != self.props {
      workflow.on_props_changed(&self.props, &props, &mut self.state);
      self.props = props;
      self.scope.diagnostics.notify(|| WorkflowEvent::PropsChanged {
        workflow_id: self.scope.diagnostic_id,
      });
    }

    if let Some(previous) = &self.behavior {
      previous.slot.supersede();
    }
    self.generation += 1;

    let slot = ActionSlot::new();
    let sink = Sink::new(slot.clone(), self.actions_tx.clone());
    let mut ctx = RenderContext::new(&mut self.subtree, &mut self.workers, sink);
    let rendering = workflow.render(&self.props, &self.state, &mut ctx);
    let behavior = ctx.freeze(slot);
    let rendering = rendering?;

    self.subtree.commit();
    self.workers.commit();
    behavior.slot.open();

    trace!(
      workflow = %self.scope.name,
      generation = self.generation,
      children = behavior.children.len(),
      workers = ?behavior.workers,
      "workflow_rendered"
    );
    self.scope.diagnostics.notify(|| WorkflowEvent::WorkflowRendered {
      workflow_id: self.scope.diagnostic_id,
      generation: self.generation,
      children: self.subtree.len(),
      workers: self.workers.len(),
    });
    self.behavior = Some(behavior);
    Ok(rendering)
  }

  /// Wait for the next change anywhere in this subtree.
  ///
  /// Resolves once exactly one source (a child, a worker, or this node's sink)
  /// fires, after applying the action it produced. `Ok(None)` still means the
  /// node needs to render again.
  pub(crate) fn tick(&mut self) -> BoxFuture<'_, Result<Option<W::Output>, RuntimeError>> {
    Box::pin(async move {
      let action = {
        let mut sources: Vec<ActionFuture<'_, W::State, W::Output>> = Vec::new();
        self.subtree.tick_children(&mut sources);
        self.workers.tick_workers(&mut sources);

        let actions = &mut self.actions;
        let scope = &self.scope;
        sources.push(Box::pin(async move {
          match actions.recv().await {
            Some(action) => {
              scope.diagnostics.notify(|| WorkflowEvent::SinkReceived {
                workflow_id: scope.diagnostic_id,
                action: action.name().to_string(),
              });
              Ok::<_, RuntimeError>(Some(action))
            }
            // The node holds a sender, so this only happens once cancelled.
            None => std::future::pending().await,
          }
        }));

        let (winner, _, _) = select_all(sources).await;
        winner?
      };

      match action {
        Some(action) => self.apply(action),
        None => Ok(None),
      }
    })
  }

  fn apply(
    &mut self,
    action: Action<W::State, W::Output>,
  ) -> Result<Option<W::Output>, RuntimeError> {
    let name = action.name().to_string();
    let output = action
      .apply(&mut self.state)
      .map_err(|source| RuntimeError::Action {
        workflow: self.scope.name.to_string(),
        action: name.clone(),
        source,
      })?;

    trace!(workflow = %self.scope.name, action = %name, has_output = output.is_some(), "action_applied");
    self.scope.diagnostics.notify(|| WorkflowEvent::ActionApplied {
      workflow_id: self.scope.diagnostic_id,
      action: name,
      has_output: output.is_some(),
    });
    Ok(output)
  }

  /// Snapshot this node and its active children.
  pub(crate) fn snapshot(&self) -> Snapshot {
    TreeSnapshot::new(
      self.workflow.snapshot_state(&self.state),
      self.subtree.snapshots(),
    )
    .encode()
  }

  /// Tear down: teardown hooks first, then children and workers, depth-first.
  pub(crate) fn cancel(&mut self) {
    if self.cancelled {
      return;
    }
    self.cancelled = true;

    if let Some(behavior) = self.behavior.take() {
      behavior.tear_down();
    }
    self.actions.close();
    self.subtree.cancel_all();
    self.workers.cancel_all();
    self.scope.token.cancel();

    debug!(workflow = %self.scope.name, "workflow_stopped");
    self.scope.diagnostics.notify(|| WorkflowEvent::WorkflowStopped {
      workflow_id: self.scope.diagnostic_id,
    });
  }

  #[cfg(test)]
  pub(crate) fn state(&self) -> &W::State {
    &self.state
  }
}

impl<W: Workflow> Drop for WorkflowNode<W> {
  fn drop(&mut self) {
    self.cancel();
  }
}

/// Decode one level of a tree snapshot: the restored local state (`None` when
/// the node saved no bytes) and the child snapshots.
fn restore<W: Workflow>(
  workflow: &W,
  props: &W::Props,
  snapshot: &Snapshot,
) -> Result<(Option<W::State>, Vec<(ChildId, Snapshot)>), SnapshotError> {
  let tree = TreeSnapshot::parse(snapshot)?;
  let state = if tree.state.is_empty() {
    None
  } else {
    Some(workflow.restore_state(props, &tree.state)?)
  };
  Ok((state, tree.children))
}
