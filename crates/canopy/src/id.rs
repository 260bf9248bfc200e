//! Workflow identity.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use canopy_snapshot::ChildId;

use crate::workflow::Workflow;

/// The declared type of a workflow.
///
/// Matching uses the Rust type; the name is what gets written into snapshots
/// (see [`Workflow::type_name`]).
#[derive(Clone, Copy)]
pub struct WorkflowIdentifier {
  type_id: TypeId,
  name: &'static str,
}

impl WorkflowIdentifier {
  pub fn of<W: Workflow>() -> Self {
    Self::new(TypeId::of::<W>(), W::type_name())
  }

  pub(crate) fn new(type_id: TypeId, name: &'static str) -> Self {
    Self { type_id, name }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }
}

impl PartialEq for WorkflowIdentifier {
  fn eq(&self, other: &Self) -> bool {
    self.type_id == other.type_id
  }
}

impl Eq for WorkflowIdentifier {}

impl Hash for WorkflowIdentifier {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.type_id.hash(state);
  }
}

impl fmt::Debug for WorkflowIdentifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

impl fmt::Display for WorkflowIdentifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

/// Uniquely identifies a node among its siblings: declared type plus key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct WorkflowId {
  identifier: WorkflowIdentifier,
  key: String,
}

impl WorkflowId {
  pub fn new(identifier: WorkflowIdentifier, key: impl Into<String>) -> Self {
    Self {
      identifier,
      key: key.into(),
    }
  }

  pub fn identifier(&self) -> WorkflowIdentifier {
    self.identifier
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  /// The form this id takes inside a tree snapshot.
  pub fn child_id(&self) -> ChildId {
    ChildId::new(self.identifier.name(), self.key.as_str())
  }
}

impl fmt::Display for WorkflowId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.key.is_empty() {
      write!(f, "{}", self.identifier)
    } else {
      write!(f, "{}:{}", self.identifier, self.key)
    }
  }
}
