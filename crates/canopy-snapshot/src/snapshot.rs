//! Snapshot bytes and the reader/writer helpers workflows use to encode state.
//!
//! All integers are big-endian. Variable-length fields carry a `u32` length
//! prefix.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::SnapshotError;

/// An immutable, byte-exact capture of some state.
///
/// A zero-length snapshot means "no saved state".
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Snapshot {
  bytes: Bytes,
}

impl Snapshot {
  /// The empty snapshot.
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn of_bytes(bytes: impl Into<Bytes>) -> Self {
    Self {
      bytes: bytes.into(),
    }
  }

  pub fn of_str(value: &str) -> Self {
    Self::of_bytes(Bytes::copy_from_slice(value.as_bytes()))
  }

  pub fn of_i32(value: i32) -> Self {
    Self::write(|w| {
      w.write_i32(value);
    })
  }

  /// Build a snapshot with a [`SnapshotWriter`].
  pub fn write(f: impl FnOnce(&mut SnapshotWriter)) -> Self {
    let mut writer = SnapshotWriter::new();
    f(&mut writer);
    writer.finish()
  }

  /// Decode this snapshot with a [`SnapshotReader`].
  pub fn parse<T>(
    &self,
    f: impl FnOnce(&mut SnapshotReader) -> Result<T, SnapshotError>,
  ) -> Result<T, SnapshotError> {
    let mut reader = SnapshotReader::new(self.bytes.clone());
    f(&mut reader)
  }

  pub fn bytes(&self) -> &Bytes {
    &self.bytes
  }

  pub fn into_bytes(self) -> Bytes {
    self.bytes
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }
}

impl fmt::Debug for Snapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Snapshot(")?;
    for byte in self.bytes.iter().take(32) {
      write!(f, "{:02x}", byte)?;
    }
    if self.bytes.len() > 32 {
      write!(f, "..")?;
    }
    write!(f, "; {} bytes)", self.bytes.len())
  }
}

impl From<Bytes> for Snapshot {
  fn from(bytes: Bytes) -> Self {
    Self::of_bytes(bytes)
  }
}

impl From<Vec<u8>> for Snapshot {
  fn from(bytes: Vec<u8>) -> Self {
    Self::of_bytes(bytes)
  }
}

/// Appends encoded fields to a growing buffer.
#[derive(Debug, Default)]
pub struct SnapshotWriter {
  buf: BytesMut,
}

impl SnapshotWriter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn write_i32(&mut self, value: i32) -> &mut Self {
    self.buf.put_i32(value);
    self
  }

  pub fn write_u32(&mut self, value: u32) -> &mut Self {
    self.buf.put_u32(value);
    self
  }

  pub fn write_i64(&mut self, value: i64) -> &mut Self {
    self.buf.put_i64(value);
    self
  }

  /// Booleans are written as an `i32` of 0 or 1.
  pub fn write_bool(&mut self, value: bool) -> &mut Self {
    self.write_i32(i32::from(value))
  }

  /// Floats are written as their raw IEEE-754 bits.
  pub fn write_f32(&mut self, value: f32) -> &mut Self {
    self.write_u32(value.to_bits())
  }

  pub fn write_bytes_with_length(&mut self, bytes: &[u8]) -> &mut Self {
    self.write_len(bytes.len());
    self.buf.put_slice(bytes);
    self
  }

  pub fn write_utf8_with_length(&mut self, value: &str) -> &mut Self {
    self.write_bytes_with_length(value.as_bytes())
  }

  pub fn write_optional<T>(
    &mut self,
    value: Option<&T>,
    writer: impl FnOnce(&mut Self, &T),
  ) -> &mut Self {
    self.write_bool(value.is_some());
    if let Some(value) = value {
      writer(self, value);
    }
    self
  }

  pub fn write_list<T>(&mut self, values: &[T], mut writer: impl FnMut(&mut Self, &T)) -> &mut Self {
    self.write_len(values.len());
    for value in values {
      writer(self, value);
    }
    self
  }

  pub fn finish(self) -> Snapshot {
    Snapshot::of_bytes(self.buf.freeze())
  }

  /// Panics if `len` does not fit the `u32` length prefix (4 GiB).
  fn write_len(&mut self, len: usize) {
    let len = u32::try_from(len).expect("snapshot field larger than u32::MAX bytes");
    self.buf.put_u32(len);
  }
}

/// Reads fields back out of a snapshot, failing with [`SnapshotError`] on short
/// or malformed input instead of panicking.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
  buf: Bytes,
}

impl SnapshotReader {
  pub fn new(buf: Bytes) -> Self {
    Self { buf }
  }

  pub fn remaining(&self) -> usize {
    self.buf.remaining()
  }

  pub fn is_exhausted(&self) -> bool {
    !self.buf.has_remaining()
  }

  pub fn read_i32(&mut self) -> Result<i32, SnapshotError> {
    self.ensure(4)?;
    Ok(self.buf.get_i32())
  }

  pub fn read_u32(&mut self) -> Result<u32, SnapshotError> {
    self.ensure(4)?;
    Ok(self.buf.get_u32())
  }

  pub fn read_i64(&mut self) -> Result<i64, SnapshotError> {
    self.ensure(8)?;
    Ok(self.buf.get_i64())
  }

  pub fn read_bool(&mut self) -> Result<bool, SnapshotError> {
    match self.read_i32()? {
      0 => Ok(false),
      1 => Ok(true),
      other => Err(SnapshotError::corrupt(format!(
        "expected boolean 0 or 1, found {}",
        other
      ))),
    }
  }

  pub fn read_f32(&mut self) -> Result<f32, SnapshotError> {
    Ok(f32::from_bits(self.read_u32()?))
  }

  pub fn read_bytes_with_length(&mut self) -> Result<Bytes, SnapshotError> {
    let len = self.read_u32()? as usize;
    self.ensure(len)?;
    Ok(self.buf.split_to(len))
  }

  pub fn read_utf8_with_length(&mut self) -> Result<String, SnapshotError> {
    let bytes = self.read_bytes_with_length()?;
    String::from_utf8(bytes.to_vec())
      .map_err(|e| SnapshotError::corrupt(format!("invalid utf-8 string: {}", e)))
  }

  pub fn read_optional<T>(
    &mut self,
    reader: impl FnOnce(&mut Self) -> Result<T, SnapshotError>,
  ) -> Result<Option<T>, SnapshotError> {
    if self.read_bool()? {
      reader(self).map(Some)
    } else {
      Ok(None)
    }
  }

  pub fn read_list<T>(
    &mut self,
    mut reader: impl FnMut(&mut Self) -> Result<T, SnapshotError>,
  ) -> Result<Vec<T>, SnapshotError> {
    let len = self.read_u32()? as usize;
    // Elements may encode to zero bytes, so the count only bounds the
    // preallocation, not the read.
    let mut values = Vec::with_capacity(len.min(self.remaining()));
    for _ in 0..len {
      values.push(reader(self)?);
    }
    Ok(values)
  }

  fn ensure(&self, needed: usize) -> Result<(), SnapshotError> {
    let remaining = self.buf.remaining();
    if remaining < needed {
      return Err(SnapshotError::Truncated { needed, remaining });
    }
    Ok(())
  }
}
