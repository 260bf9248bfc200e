//! Testing one render pass in isolation.
//!
//! Children are not rendered: each expected child returns a rendering given
//! up front. Workers are recorded, never started. Handlers registered by the
//! pass can then be fed outputs to check the state transitions they produce.

use canopy::worker::{Worker, WorkerEvent};
use canopy::{Action, RenderRecorder, Workflow, WorkflowId};

use crate::error::TesterError;

/// Builder for a single render pass.
///
/// ```ignore
/// let result = RenderTester::new(Parent, props)
///   .expect_workflow::<Child>("a", child_rendering)
///   .render()?;
/// result.assert_rendered::<Child>("a");
/// let (state, output) = result.handle_output::<Child>("a", child_output)?;
/// ```
pub struct RenderTester<W: Workflow> {
  workflow: W,
  props: W::Props,
  state: W::State,
  recorder: RenderRecorder<W>,
}

impl<W: Workflow> RenderTester<W> {
  /// Render from the workflow's initial state for `props`.
  pub fn new(workflow: W, props: W::Props) -> Self {
    let state = workflow.initial_state(&props);
    Self {
      workflow,
      props,
      state,
      recorder: RenderRecorder::new(),
    }
  }

  pub fn with_state(mut self, state: W::State) -> Self {
    self.state = state;
    self
  }

  /// Stand in `rendering` for child `C` requested under `key`.
  pub fn expect_workflow<C: Workflow>(mut self, key: &str, rendering: C::Rendering) -> Self {
    self.recorder.expect_child::<C>(key, rendering);
    self
  }

  pub fn render(mut self) -> Result<RenderTestResult<W>, TesterError> {
    let rendering = self
      .recorder
      .render(&self.workflow, &self.props, &self.state)?;
    Ok(RenderTestResult {
      rendering,
      state: self.state,
      recorder: self.recorder,
    })
  }
}

/// What one render pass produced and requested.
///
/// The `handle_*` methods apply the resulting action to a copy of the state
/// the pass rendered with, so each call starts from the same state.
pub struct RenderTestResult<W: Workflow> {
  pub rendering: W::Rendering,
  state: W::State,
  recorder: RenderRecorder<W>,
}

impl<W: Workflow> RenderTestResult<W> {
  pub fn state(&self) -> &W::State {
    &self.state
  }

  /// Children rendered by the pass, in order.
  pub fn rendered_children(&self) -> Vec<&WorkflowId> {
    self.recorder.rendered_children().collect()
  }

  /// Panics unless child `C` was rendered under `key`; returns its props.
  #[track_caller]
  pub fn assert_rendered<C: Workflow>(&self, key: &str) -> &C::Props {
    match self.recorder.child_props::<C>(key) {
      Some(props) => props,
      None => panic!(
        "expected {} to be rendered with key {:?}, rendered: {:?}",
        C::type_name(),
        key,
        self.rendered_children()
      ),
    }
  }

  #[track_caller]
  pub fn assert_no_workflows_rendered(&self) {
    let rendered = self.rendered_children();
    if !rendered.is_empty() {
      panic!(
        "expected no workflows to be rendered, but {} were: {:?}",
        rendered.len(),
        rendered
      );
    }
  }

  /// Panics unless worker `K` ran under `key`; returns the requested worker.
  #[track_caller]
  pub fn assert_worker_ran<K: Worker>(&self, key: &str) -> &K {
    match self.recorder.worker::<K>(key) {
      Some(worker) => worker,
      None => panic!(
        "expected {} to run with key {:?}, ran: {:?}",
        std::any::type_name::<K>(),
        key,
        self.recorder.ran_workers().collect::<Vec<_>>()
      ),
    }
  }

  #[track_caller]
  pub fn assert_no_workers_ran(&self) {
    let ran: Vec<_> = self.recorder.ran_workers().collect();
    if !ran.is_empty() {
      panic!("expected no workers to run, but {} did: {:?}", ran.len(), ran);
    }
  }

  /// Run the pass's teardown hooks.
  pub fn tear_down(&mut self) {
    self.recorder.tear_down();
  }
}

impl<W: Workflow> RenderTestResult<W>
where
  W::State: Clone,
{
  /// Feed `output` from child `C` to the handler the pass registered.
  pub fn handle_output<C: Workflow>(
    &self,
    key: &str,
    output: C::Output,
  ) -> Result<(W::State, Option<W::Output>), TesterError> {
    let action =
      self
        .recorder
        .child_output::<C>(key, output)
        .ok_or_else(|| TesterError::NotRequested {
          kind: "workflow",
          name: C::type_name(),
          key: key.to_string(),
        })?;
    self.apply(action)
  }

  pub fn handle_worker_output<K: Worker>(
    &self,
    key: &str,
    output: K::Output,
  ) -> Result<(W::State, Option<W::Output>), TesterError> {
    self.handle_worker_event::<K>(key, WorkerEvent::Output(output))
  }

  pub fn handle_worker_finish<K: Worker>(
    &self,
    key: &str,
  ) -> Result<(W::State, Option<W::Output>), TesterError> {
    self.handle_worker_event::<K>(key, WorkerEvent::Finished)
  }

  /// Apply the action sent through the pass's sink or event handlers.
  pub fn handle_sent_action(&mut self) -> Result<(W::State, Option<W::Output>), TesterError> {
    let action = self.recorder.next_action().ok_or(TesterError::NoActionSent)?;
    self.apply(action)
  }

  fn handle_worker_event<K: Worker>(
    &self,
    key: &str,
    event: WorkerEvent<K::Output>,
  ) -> Result<(W::State, Option<W::Output>), TesterError> {
    let action = self
      .recorder
      .worker_event::<K>(key, event)
      .ok_or_else(|| TesterError::NotRequested {
        kind: "worker",
        name: std::any::type_name::<K>(),
        key: key.to_string(),
      })?
      .unwrap_or_else(Action::noop);
    self.apply(action)
  }

  fn apply(
    &self,
    action: Action<W::State, W::Output>,
  ) -> Result<(W::State, Option<W::Output>), TesterError> {
    let name = action.name().to_string();
    action
      .apply_to(self.state.clone())
      .map_err(|source| TesterError::Action {
        action: name,
        source,
      })
  }
}
