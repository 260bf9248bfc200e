//! Snapshot errors.

/// A snapshot could not be decoded.
///
/// Every variant describes a corrupt snapshot. Callers restoring state are
/// expected to treat any of them as "start fresh".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
  /// A read ran past the end of the buffer.
  #[error("snapshot truncated: needed {needed} bytes, {remaining} remaining")]
  Truncated { needed: usize, remaining: usize },

  /// The bytes were readable but did not describe a valid value.
  #[error("corrupt snapshot: {reason}")]
  Corrupt { reason: String },
}

impl SnapshotError {
  pub fn corrupt(reason: impl Into<String>) -> Self {
    Self::Corrupt {
      reason: reason.into(),
    }
  }
}
