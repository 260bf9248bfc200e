//! Rendering a workflow once, outside a live tree.
//!
//! A [`RenderRecorder`] stands in for a node. Children and workers requested
//! during render are recorded instead of started, children render to
//! renderings supplied up front, and actions sent to the pass's sink queue up
//! for the caller to take.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::action::Action;
use crate::behavior::Behavior;
use crate::context::RenderContext;
use crate::error::RuntimeError;
use crate::id::{WorkflowId, WorkflowIdentifier};
use crate::sink::{ActionSlot, Sink};
use crate::subtree::ChildHandler;
use crate::worker::{Worker, WorkerEvent};
use crate::workers::WorkerHandler;
use crate::workflow::Workflow;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
  type_id: TypeId,
  key: String,
}

impl RecordKey {
  fn of<T: 'static>(key: &str) -> Self {
    Self {
      type_id: TypeId::of::<T>(),
      key: key.to_string(),
    }
  }
}

struct RecordedChild {
  id: WorkflowId,
  props: Box<dyn Any + Send>,
  handler: Box<dyn Any + Send>,
}

struct RecordedWorker {
  key: RecordKey,
  description: String,
  worker: Box<dyn Any + Send>,
  handler: Box<dyn Any + Send>,
}

/// Requests made by one render pass, with their handlers type-erased.
#[derive(Default)]
pub(crate) struct Recording {
  renderings: HashMap<RecordKey, Box<dyn Any + Send>>,
  children: Vec<RecordedChild>,
  workers: Vec<RecordedWorker>,
}

impl Recording {
  pub(crate) fn render_child<C: Workflow, S: 'static, O: 'static>(
    &mut self,
    id: WorkflowId,
    props: C::Props,
    handler: ChildHandler<C::Output, S, O>,
  ) -> Result<C::Rendering, RuntimeError> {
    let child_id = id.child_id();
    if self.children.iter().any(|child| child.id.child_id() == child_id) {
      return Err(RuntimeError::DuplicateChild {
        workflow: id.identifier().name().to_string(),
        key: id.key().to_string(),
      });
    }

    let rendering = self
      .renderings
      .remove(&RecordKey::of::<C>(id.key()))
      .and_then(|rendering| rendering.downcast::<C::Rendering>().ok())
      .ok_or_else(|| {
        RuntimeError::render_failed(id.to_string(), "no rendering expected for child")
      })?;

    self.children.push(RecordedChild {
      id,
      props: Box::new(props),
      handler: Box::new(handler),
    });
    Ok(*rendering)
  }

  pub(crate) fn run_worker<K: Worker, S: 'static, O: 'static>(
    &mut self,
    worker: K,
    key: &str,
    handler: WorkerHandler<K::Output, S, O>,
  ) -> Result<(), RuntimeError> {
    let record_key = RecordKey::of::<K>(key);
    if self.workers.iter().any(|recorded| recorded.key == record_key) {
      return Err(RuntimeError::DuplicateWorker {
        worker: worker.describe(),
        key: key.to_string(),
      });
    }

    self.workers.push(RecordedWorker {
      key: record_key,
      description: worker.describe(),
      worker: Box::new(worker),
      handler: Box::new(handler),
    });
    Ok(())
  }

  fn child<C: Workflow>(&self, key: &str) -> Option<&RecordedChild> {
    let identifier = WorkflowIdentifier::of::<C>();
    self
      .children
      .iter()
      .find(|child| child.id.identifier() == identifier && child.id.key() == key)
  }

  fn worker<K: Worker>(&self, key: &str) -> Option<&RecordedWorker> {
    let record_key = RecordKey::of::<K>(key);
    self.workers.iter().find(|recorded| recorded.key == record_key)
  }
}

/// Renders a workflow without starting its children or workers.
///
/// # Usage
///
/// ```ignore
/// let mut recorder = RenderRecorder::<Parent>::new();
/// recorder.expect_child::<Child>("a", child_rendering);
/// let rendering = recorder.render(&Parent, &props, &state)?;
/// let action = recorder.child_output::<Child>("a", output).unwrap();
/// ```
pub struct RenderRecorder<W: Workflow> {
  recording: Recording,
  behavior: Option<Behavior>,
  actions_tx: mpsc::UnboundedSender<Action<W::State, W::Output>>,
  actions: mpsc::UnboundedReceiver<Action<W::State, W::Output>>,
}

impl<W: Workflow> Default for RenderRecorder<W> {
  fn default() -> Self {
    Self::new()
  }
}

impl<W: Workflow> RenderRecorder<W> {
  pub fn new() -> Self {
    let (actions_tx, actions) = mpsc::unbounded_channel();
    Self {
      recording: Recording::default(),
      behavior: None,
      actions_tx,
      actions,
    }
  }

  /// Have the next request for child `C` under `key` return `rendering`.
  pub fn expect_child<C: Workflow>(&mut self, key: &str, rendering: C::Rendering) {
    self
      .recording
      .renderings
      .insert(RecordKey::of::<C>(key), Box::new(rendering));
  }

  /// Run one render pass, replacing whatever the previous pass recorded.
  ///
  /// The returned rendering's sinks accept one action, which
  /// [`next_action`](Self::next_action) then yields.
  pub fn render(
    &mut self,
    workflow: &W,
    props: &W::Props,
    state: &W::State,
  ) -> Result<W::Rendering, RuntimeError> {
    if let Some(previous) = self.behavior.take() {
      previous.slot.supersede();
    }
    self.recording.children.clear();
    self.recording.workers.clear();

    let slot = ActionSlot::new();
    let sink = Sink::new(slot.clone(), self.actions_tx.clone());
    let mut ctx = RenderContext::recording(&mut self.recording, sink);
    let rendering = workflow.render(props, state, &mut ctx);
    let behavior = ctx.freeze(slot);
    let rendering = rendering?;

    behavior.slot.open();
    self.behavior = Some(behavior);
    Ok(rendering)
  }

  /// Children requested by the last pass, in render order.
  pub fn rendered_children(&self) -> impl Iterator<Item = &WorkflowId> {
    self.recording.children.iter().map(|child| &child.id)
  }

  /// The props the last pass gave child `C` under `key`.
  pub fn child_props<C: Workflow>(&self, key: &str) -> Option<&C::Props> {
    self.recording.child::<C>(key)?.props.downcast_ref()
  }

  /// Feed `output` to the handler the last pass registered for child `C`.
  ///
  /// `None` if the pass did not render that child.
  pub fn child_output<C: Workflow>(
    &self,
    key: &str,
    output: C::Output,
  ) -> Option<Action<W::State, W::Output>> {
    let handler = self
      .recording
      .child::<C>(key)?
      .handler
      .downcast_ref::<ChildHandler<C::Output, W::State, W::Output>>()?;
    Some(handler(output))
  }

  /// (description, key) of each worker the last pass requested.
  pub fn ran_workers(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .recording
      .workers
      .iter()
      .map(|worker| (worker.description.as_str(), worker.key.key.as_str()))
  }

  /// The worker value the last pass requested under `key`.
  pub fn worker<K: Worker>(&self, key: &str) -> Option<&K> {
    self.recording.worker::<K>(key)?.worker.downcast_ref()
  }

  /// Feed `event` to the handler the last pass registered for worker `K`.
  ///
  /// The outer `None` means the pass did not request that worker; the inner
  /// one means the handler ignored the event.
  pub fn worker_event<K: Worker>(
    &self,
    key: &str,
    event: WorkerEvent<K::Output>,
  ) -> Option<Option<Action<W::State, W::Output>>> {
    let handler = self
      .recording
      .worker::<K>(key)?
      .handler
      .downcast_ref::<WorkerHandler<K::Output, W::State, W::Output>>()?;
    Some(handler(event))
  }

  /// The next action delivered through a sink or event handler.
  pub fn next_action(&mut self) -> Option<Action<W::State, W::Output>> {
    self.actions.try_recv().ok()
  }

  /// Run the last pass's teardown hooks.
  pub fn tear_down(&mut self) {
    if let Some(behavior) = self.behavior.take() {
      behavior.tear_down();
    }
  }
}
