use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::observer::WorkflowObserver;

/// Configuration for a [`WorkflowRunner`](crate::WorkflowRunner).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
  /// Capacity of the props channel.
  pub props_buffer: usize,
  /// Capacity of the (rendering, snapshot) channel. A slow consumer holds the
  /// loop back once this many renderings are queued.
  pub rendering_buffer: usize,
  /// Capacity of the root output channel.
  pub output_buffer: usize,
  #[serde(skip)]
  pub observer: Option<Arc<dyn WorkflowObserver>>,
}

impl RuntimeConfig {
  pub fn with_observer(mut self, observer: impl WorkflowObserver + 'static) -> Self {
    self.observer = Some(Arc::new(observer));
    self
  }
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      props_buffer: 16,
      rendering_buffer: 1,
      output_buffer: 16,
      observer: None,
    }
  }
}

impl fmt::Debug for RuntimeConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RuntimeConfig")
      .field("props_buffer", &self.props_buffer)
      .field("rendering_buffer", &self.rendering_buffer)
      .field("output_buffer", &self.output_buffer)
      .field("observer", &self.observer.is_some())
      .finish()
  }
}
