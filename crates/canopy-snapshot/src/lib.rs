//! Canopy snapshots.
//!
//! A [`Snapshot`] is the byte-exact state of one workflow. A [`TreeSnapshot`]
//! nests the snapshots of a node and its active children so a whole workflow
//! tree can be restored without replaying history.
//!
//! # Usage
//!
//! ```
//! use canopy_snapshot::{ChildId, Snapshot, TreeSnapshot};
//!
//! let child = TreeSnapshot::new(Snapshot::of_i32(3), Vec::new()).encode();
//! let root = TreeSnapshot::new(
//!   Snapshot::of_str("root"),
//!   vec![(ChildId::new("Counter", "a"), child)],
//! )
//! .encode();
//!
//! let tree = TreeSnapshot::parse(&root).unwrap();
//! assert_eq!(tree.children.len(), 1);
//! ```

mod error;
mod snapshot;
mod tree;

pub use error::SnapshotError;
pub use snapshot::{Snapshot, SnapshotReader, SnapshotWriter};
pub use tree::{ChildId, SnapshotNode, TreeSnapshot};
