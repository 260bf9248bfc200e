//! Actions: the only way a node's state changes.

use std::borrow::Cow;
use std::fmt;

use futures::future::BoxFuture;

use crate::error::{BoxError, RuntimeError};

/// One source's contribution to a node's tick: the action it produced for the
/// node, or `None` when it woke without one.
pub(crate) type ActionFuture<'a, S, O> = BoxFuture<'a, Result<Option<Action<S, O>>, RuntimeError>>;

type ApplyFn<S, O> = Box<dyn FnOnce(&mut S) -> Result<Option<O>, BoxError> + Send>;

/// A pending state transition that may also emit an output to the parent.
pub struct Action<S, O> {
  name: Cow<'static, str>,
  apply: ApplyFn<S, O>,
}

impl<S: 'static, O: Send + 'static> Action<S, O> {
  pub fn new(
    name: impl Into<Cow<'static, str>>,
    apply: impl FnOnce(&mut S) -> Option<O> + Send + 'static,
  ) -> Self {
    Self::try_new(name, move |state| Ok(apply(state)))
  }

  /// An action whose failure is fatal to the tree.
  pub fn try_new(
    name: impl Into<Cow<'static, str>>,
    apply: impl FnOnce(&mut S) -> Result<Option<O>, BoxError> + Send + 'static,
  ) -> Self {
    Self {
      name: name.into(),
      apply: Box::new(apply),
    }
  }

  /// Leaves state untouched; still forces a render.
  pub fn noop() -> Self {
    Self::new("noop", |_| None)
  }

  pub fn emit_output(output: O) -> Self {
    Self::new("emit_output", move |_| Some(output))
  }

  pub fn enter_state(state: S) -> Self
  where
    S: Send,
  {
    Self::new("enter_state", move |current| {
      *current = state;
      None
    })
  }
}

impl<S, O> Action<S, O> {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn apply(self, state: &mut S) -> Result<Option<O>, BoxError> {
    (self.apply)(state)
  }

  /// Apply to an owned state, returning the new state and the output.
  pub fn apply_to(self, mut state: S) -> Result<(S, Option<O>), BoxError> {
    let output = self.apply(&mut state)?;
    Ok((state, output))
  }
}

impl<S, O> fmt::Debug for Action<S, O> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Action").field(&self.name).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_apply_mutates_and_emits() {
    let action = Action::<i32, String>::new("bump", |count| {
      *count += 1;
      Some(format!("now {}", count))
    });
    assert_eq!(action.name(), "bump");

    let (state, output) = action.apply_to(1).unwrap();
    assert_eq!(state, 2);
    assert_eq!(output.as_deref(), Some("now 2"));
  }

  #[test]
  fn test_helpers() {
    let (state, output) = Action::<i32, ()>::noop().apply_to(5).unwrap();
    assert_eq!((state, output), (5, None));

    let (state, output) = Action::<i32, &str>::emit_output("done").apply_to(5).unwrap();
    assert_eq!((state, output), (5, Some("done")));

    let (state, output) = Action::<i32, ()>::enter_state(9).apply_to(5).unwrap();
    assert_eq!((state, output), (9, None));
  }

  #[test]
  fn test_try_new_propagates_error() {
    let action = Action::<i32, ()>::try_new("fail", |_| Err("boom".into()));
    let err = action.apply_to(0).unwrap_err();
    assert_eq!(err.to_string(), "boom");
  }
}
