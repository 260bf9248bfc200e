//! Bookkeeping for "requested last pass" vs "requested this pass".
//!
//! Render moves each requested entry from `active` into `staging`; commit drops
//! whatever is left in `active` and swaps the two lists.

use std::collections::VecDeque;

pub(crate) struct ActiveStagingList<T> {
  active: VecDeque<T>,
  staging: VecDeque<T>,
}

/// Result of [`ActiveStagingList::stage`].
pub(crate) enum Staged<'a, T> {
  /// An active entry matched and was moved into staging.
  Retained(&'a mut T),
  /// Nothing matched; insert a new entry.
  Vacant(Vacant<'a, T>),
}

pub(crate) struct Vacant<'a, T> {
  staging: &'a mut VecDeque<T>,
}

impl<'a, T> Vacant<'a, T> {
  pub(crate) fn insert(self, item: T) -> &'a mut T {
    let index = self.staging.len();
    self.staging.push_back(item);
    &mut self.staging[index]
  }
}

impl<T> ActiveStagingList<T> {
  pub(crate) fn new() -> Self {
    Self {
      active: VecDeque::new(),
      staging: VecDeque::new(),
    }
  }

  /// Move the first active entry that `matches` into staging.
  pub(crate) fn stage(&mut self, matches: impl FnMut(&T) -> bool) -> Staged<'_, T> {
    match self.remove_active(matches) {
      Some(item) => Staged::Retained(Vacant { staging: &mut self.staging }.insert(item)),
      None => Staged::Vacant(Vacant {
        staging: &mut self.staging,
      }),
    }
  }

  pub(crate) fn remove_active(&mut self, matches: impl FnMut(&T) -> bool) -> Option<T> {
    let index = self.active.iter().position(matches)?;
    self.active.remove(index)
  }

  /// Drop every unclaimed active entry, then promote staging.
  pub(crate) fn commit(&mut self, mut on_remove: impl FnMut(T)) {
    for item in self.active.drain(..) {
      on_remove(item);
    }
    std::mem::swap(&mut self.active, &mut self.staging);
  }

  /// Remove everything from both lists, active entries first.
  pub(crate) fn drain_all(&mut self, mut on_remove: impl FnMut(T)) {
    for item in self.active.drain(..).chain(self.staging.drain(..)) {
      on_remove(item);
    }
  }

  pub(crate) fn active(&self) -> impl Iterator<Item = &T> {
    self.active.iter()
  }

  pub(crate) fn active_mut(&mut self) -> impl Iterator<Item = &mut T> {
    self.active.iter_mut()
  }

  pub(crate) fn staging(&self) -> impl Iterator<Item = &T> {
    self.staging.iter()
  }
}
