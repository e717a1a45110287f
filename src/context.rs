use crate::error::{HsmError, HsmResult};

/// Number of levels the presence bits can describe.
pub const MAX_LEVELS: usize = u64::BITS as usize;

/// Per machine store of state instance data.
///
/// One level is pushed per active state (plus level 0 for the machine-wide context pushed at
/// start), but only levels that brought a context of their own occupy the store.  The presence
/// bits record which levels did:
///
/// ```text
/// |..|...|..   presence, one bit per level: 10 levels deep
/// 0123456789
/// 0  1   2     store: 3 unique contexts
/// ```
///
/// Walking from the leaf to the root moves down the store every time the walk leaves a level
/// whose bit is set.
pub struct ContextStack<C> {
  store: Vec<C>,
  count: usize,
  presence: u64,
}

impl<C> Default for ContextStack<C> {
  fn default() -> Self {
    Self::new()
  }
}

impl<C> ContextStack<C> {
  pub fn new() -> Self {
    Self { store: Vec::new(), count: 0, presence: 0 }
  }

  /// Push one level.  `None` shares the context of the level below.
  pub fn push(&mut self, context: Option<C>) -> HsmResult<()> {
    if self.count >= MAX_LEVELS {
      return Err(HsmError::ContextOverflow(MAX_LEVELS));
    }
    if let Some(context) = context {
      self.store.push(context);
      self.presence |= 1 << self.count;
    }
    self.count += 1;
    Ok(())
  }

  /// Pop one level, handing back its context if the level owned one.
  pub fn pop(&mut self) -> Option<C> {
    if self.count == 0 {
      return None;
    }
    self.count -= 1;
    let bit = 1 << self.count;
    if self.presence & bit == 0 {
      return None;
    }
    self.presence &= !bit;
    self.store.pop()
  }

  /// Most recently pushed unique context.
  pub fn top(&self) -> Option<&C> {
    self.store.last()
  }

  pub fn top_mut(&mut self) -> Option<&mut C> {
    self.store.last_mut()
  }

  /// Number of levels pushed, shared or not.
  pub fn depth(&self) -> usize {
    self.count
  }

  /// Number of levels that own a context.
  pub fn unique_count(&self) -> usize {
    self.store.len()
  }

  pub fn is_unique(&self, level: usize) -> bool {
    level < self.count && self.presence & (1 << level) != 0
  }

  pub fn is_empty(&self) -> bool {
    self.count == 0
  }

  /// The context seen at each level, from the leaf down to level 0.
  ///
  /// Shared levels yield the same reference as the level that created it.  Every call starts a
  /// fresh walk.
  pub fn iter_from_leaf(&self) -> impl Iterator<Item = &C> + '_ {
    self.levels().filter_map(move |index| self.store.get(index))
  }

  /// Like [`iter_from_leaf`](Self::iter_from_leaf) but yields store indices, so the caller can
  /// borrow each context mutably in turn.
  pub(crate) fn levels(&self) -> Levels {
    Levels {
      presence: self.presence,
      remaining: self.count,
      index: self.store.len().checked_sub(1),
    }
  }

  pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut C> {
    self.store.get_mut(index)
  }
}

/// Leaf-to-root walk over the levels of a [`ContextStack`].
///
/// Holds a copy of the presence bits rather than a borrow of the stack.
#[derive(Clone, Debug)]
pub(crate) struct Levels {
  presence: u64,
  remaining: usize,
  index: Option<usize>,
}

impl Iterator for Levels {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    if self.remaining == 0 {
      return None;
    }
    let level = self.remaining - 1;
    let index = self.index?;
    if self.presence & (1 << level) != 0 {
      self.index = index.checked_sub(1);
    }
    self.remaining = level;
    Some(index)
  }
}
