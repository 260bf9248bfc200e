//! Tree snapshot wire format.
//!
//! ```text
//! u32 len | local state bytes
//! repeated until end of buffer:
//!   u32 len | child id bytes
//!   u32 len | child tree snapshot (recursive)
//! ```
//!
//! A child id is two length-prefixed UTF-8 strings: the workflow type name and
//! the key. A zero-length tree snapshot means "use initial state".

use bytes::Bytes;

use crate::error::SnapshotError;
use crate::snapshot::{Snapshot, SnapshotReader, SnapshotWriter};

/// Identifies a child among its siblings inside a tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChildId {
  pub workflow_type: String,
  pub key: String,
}

impl ChildId {
  pub fn new(workflow_type: impl Into<String>, key: impl Into<String>) -> Self {
    Self {
      workflow_type: workflow_type.into(),
      key: key.into(),
    }
  }

  pub fn encode(&self) -> Bytes {
    Snapshot::write(|w| {
      w.write_utf8_with_length(&self.workflow_type)
        .write_utf8_with_length(&self.key);
    })
    .into_bytes()
  }

  pub fn decode(bytes: Bytes) -> Result<Self, SnapshotError> {
    let mut reader = SnapshotReader::new(bytes);
    let workflow_type = reader.read_utf8_with_length()?;
    let key = reader.read_utf8_with_length()?;
    if !reader.is_exhausted() {
      return Err(SnapshotError::corrupt(format!(
        "{} trailing bytes after child id",
        reader.remaining()
      )));
    }
    Ok(Self { workflow_type, key })
  }
}

/// One decoded level of a tree snapshot. Child snapshots stay encoded until the
/// child itself is restored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
  /// The node's own state, as produced by its workflow.
  pub state: Snapshot,
  /// Active children in render order.
  pub children: Vec<(ChildId, Snapshot)>,
}

impl TreeSnapshot {
  pub fn new(state: Snapshot, children: Vec<(ChildId, Snapshot)>) -> Self {
    Self { state, children }
  }

  pub fn encode(&self) -> Snapshot {
    let mut writer = SnapshotWriter::new();
    writer.write_bytes_with_length(self.state.bytes());
    for (id, child) in &self.children {
      writer
        .write_bytes_with_length(&id.encode())
        .write_bytes_with_length(child.bytes());
    }
    writer.finish()
  }

  /// Decode one level. An empty snapshot decodes to an empty tree.
  pub fn parse(snapshot: &Snapshot) -> Result<Self, SnapshotError> {
    if snapshot.is_empty() {
      return Ok(Self::default());
    }

    let mut reader = SnapshotReader::new(snapshot.bytes().clone());
    let state = Snapshot::of_bytes(reader.read_bytes_with_length()?);

    let mut children = Vec::new();
    while !reader.is_exhausted() {
      let id = ChildId::decode(reader.read_bytes_with_length()?)?;
      let child = Snapshot::of_bytes(reader.read_bytes_with_length()?);
      if children.iter().any(|(existing, _)| existing == &id) {
        return Err(SnapshotError::corrupt(format!(
          "duplicate child id {}:{:?}",
          id.workflow_type, id.key
        )));
      }
      children.push((id, child));
    }

    Ok(Self { state, children })
  }

  /// Decode this level and every descendant, failing on the first corrupt node.
  pub fn parse_recursive(snapshot: &Snapshot) -> Result<SnapshotNode, SnapshotError> {
    let tree = Self::parse(snapshot)?;
    let children = tree
      .children
      .iter()
      .map(|(id, child)| Ok((id.clone(), Self::parse_recursive(child)?)))
      .collect::<Result<Vec<_>, SnapshotError>>()?;
    Ok(SnapshotNode {
      state: tree.state,
      children,
    })
  }
}

/// A fully decoded tree snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotNode {
  pub state: Snapshot,
  pub children: Vec<(ChildId, SnapshotNode)>,
}

impl SnapshotNode {
  /// Total number of nodes in this subtree, including itself.
  pub fn node_count(&self) -> usize {
    1 + self
      .children
      .iter()
      .map(|(_, child)| child.node_count())
      .sum::<usize>()
  }
}
