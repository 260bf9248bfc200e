//! The render context: what a workflow can ask for while rendering.

use std::future::Future;
use std::sync::Arc;

use crate::action::Action;
use crate::behavior::{Behavior, TeardownHook};
use crate::error::RuntimeError;
use crate::id::{WorkflowId, WorkflowIdentifier};
use crate::recording::Recording;
use crate::sink::{ActionSlot, EventHandler, Sink};
use crate::subtree::{ChildHandler, SubtreeManager};
use crate::worker::{SideEffectWorker, Worker, WorkerEvent};
use crate::workers::{WorkerHandler, WorkerTracker};
use crate::workflow::Workflow;

type StateOf<W> = <W as Workflow>::State;
type OutputOf<W> = <W as Workflow>::Output;

/// Where requests made during render go: a live node, or a recorder that
/// only notes them.
enum Backend<'a, S, O> {
  Live {
    subtree: &'a mut SubtreeManager<S, O>,
    workers: &'a mut WorkerTracker<S, O>,
  },
  Recording(&'a mut Recording),
}

/// Handed to [`Workflow::render`]. Lives for exactly one render pass.
///
/// Children and workers requested here are kept alive until a render stops
/// requesting them. Requesting the same child or worker twice in one pass is an
/// error.
pub struct RenderContext<'a, W: Workflow> {
  backend: Backend<'a, StateOf<W>, OutputOf<W>>,
  sink: Sink<StateOf<W>, OutputOf<W>>,
  children: Vec<WorkflowId>,
  worker_keys: Vec<String>,
  teardown: Vec<TeardownHook>,
}

impl<'a, W: Workflow> RenderContext<'a, W> {
  pub(crate) fn new(
    subtree: &'a mut SubtreeManager<StateOf<W>, OutputOf<W>>,
    workers: &'a mut WorkerTracker<StateOf<W>, OutputOf<W>>,
    sink: Sink<StateOf<W>, OutputOf<W>>,
  ) -> Self {
    Self::with_backend(Backend::Live { subtree, workers }, sink)
  }

  pub(crate) fn recording(
    recording: &'a mut Recording,
    sink: Sink<StateOf<W>, OutputOf<W>>,
  ) -> Self {
    Self::with_backend(Backend::Recording(recording), sink)
  }

  fn with_backend(
    backend: Backend<'a, StateOf<W>, OutputOf<W>>,
    sink: Sink<StateOf<W>, OutputOf<W>>,
  ) -> Self {
    Self {
      backend,
      sink,
      children: Vec::new(),
      worker_keys: Vec::new(),
      teardown: Vec::new(),
    }
  }

  /// Render the unkeyed child of type `C` and return its rendering.
  pub fn render_child<C: Workflow>(
    &mut self,
    child: &C,
    props: C::Props,
    handler: impl Fn(C::Output) -> Action<StateOf<W>, OutputOf<W>> + Send + 'static,
  ) -> Result<C::Rendering, RuntimeError> {
    self.render_keyed_child(child, props, "", handler)
  }

  /// Render the child of type `C` identified by `key`.
  ///
  /// The child keeps its state across renders as long as it is requested with
  /// the same type and key. Its outputs pass through `handler`, which turns
  /// them into actions for this workflow.
  pub fn render_keyed_child<C: Workflow>(
    &mut self,
    child: &C,
    props: C::Props,
    key: &str,
    handler: impl Fn(C::Output) -> Action<StateOf<W>, OutputOf<W>> + Send + 'static,
  ) -> Result<C::Rendering, RuntimeError> {
    let id = WorkflowId::new(WorkflowIdentifier::of::<C>(), key);
    let handler: ChildHandler<C::Output, StateOf<W>, OutputOf<W>> = Box::new(handler);
    let rendering = match &mut self.backend {
      Backend::Live { subtree, .. } => subtree.render_child(id.clone(), child, props, handler)?,
      Backend::Recording(recording) => {
        recording.render_child::<C, _, _>(id.clone(), props, handler)?
      }
    };
    self.children.push(id);
    Ok(rendering)
  }

  /// Keep `worker` running while it is requested; outputs go through `handler`.
  pub fn run_worker<K: Worker>(
    &mut self,
    worker: K,
    key: &str,
    handler: impl Fn(K::Output) -> Action<StateOf<W>, OutputOf<W>> + Send + 'static,
  ) -> Result<(), RuntimeError> {
    self.run_worker_until_finished(worker, key, move |event| match event {
      WorkerEvent::Output(output) => Some(handler(output)),
      WorkerEvent::Finished => None,
    })
  }

  /// Like [`run_worker`](Self::run_worker), but `handler` also sees the
  /// worker finishing.
  pub fn run_worker_until_finished<K: Worker>(
    &mut self,
    worker: K,
    key: &str,
    handler: impl Fn(WorkerEvent<K::Output>) -> Option<Action<StateOf<W>, OutputOf<W>>>
    + Send
    + 'static,
  ) -> Result<(), RuntimeError> {
    let description = worker.describe();
    let handler: WorkerHandler<K::Output, StateOf<W>, OutputOf<W>> = Box::new(handler);
    match &mut self.backend {
      Backend::Live { workers, .. } => workers.run(worker, key, handler)?,
      Backend::Recording(recording) => recording.run_worker(worker, key, handler)?,
    }
    self.worker_keys.push(if key.is_empty() {
      description
    } else {
      format!("{}:{}", description, key)
    });
    Ok(())
  }

  /// Run `effect` once for as long as renders keep requesting `key`.
  ///
  /// The future passed on later renders is dropped unpolled.
  pub fn run_side_effect(
    &mut self,
    key: &str,
    effect: impl Future<Output = ()> + Send + 'static,
  ) -> Result<(), RuntimeError> {
    self.run_worker_until_finished(SideEffectWorker::new(effect), key, |_| None)
  }

  /// The sink for this generation. Usable once render has returned.
  pub fn action_sink(&self) -> Sink<StateOf<W>, OutputOf<W>> {
    self.sink.clone()
  }

  /// An event callback that sends the action `handler` builds for each event.
  pub fn on_event<E>(
    &self,
    handler: impl Fn(E) -> Action<StateOf<W>, OutputOf<W>> + Send + Sync + 'static,
  ) -> EventHandler<E> {
    EventHandler::new(self.sink.clone(), handler)
  }

  /// Run `hook` when this workflow is torn down, unless a later render
  /// replaces this one first.
  pub fn on_teardown(&mut self, hook: impl FnOnce() + Send + 'static) {
    self.teardown.push(Box::new(hook));
  }

  pub(crate) fn freeze(self, slot: Arc<ActionSlot>) -> Behavior {
    Behavior {
      children: self.children,
      workers: self.worker_keys,
      teardown: self.teardown,
      slot,
    }
  }
}
