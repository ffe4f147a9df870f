//! Single-slot memoization keyed by `Setting` identity.
//!
//! A [`Memo`] remembers exactly one `(setting, value)` pair. A lookup hits
//! only when the caller passes the *same* `Rc<Setting>` (pointer identity) as
//! the previous computation; a structurally equal but distinct setting is a
//! miss. Callers therefore treat [`Setting`] as copy-on-write: keep one `Rc`
//! stable for a render pass and publish a new one when anything changes
//! (see [`Setting::update`](crate::setting::Setting::update)).
//!
//! The slot stores the `Rc` itself, so the remembered setting stays alive and
//! its address cannot be reused by a different setting.

use crate::setting::Setting;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A single-slot cache keyed by `Rc<Setting>` pointer identity.
///
/// # Examples
///
/// ```rust
/// use std::rc::Rc;
/// use towerstat::memo::Memo;
/// use towerstat::Setting;
///
/// let memo = Memo::new();
/// let setting = Rc::new(Setting::default());
///
/// assert_eq!(memo.get_or_compute(&setting, || 7), 7);
/// // Same reference: the closure is not called again.
/// assert_eq!(memo.get_or_compute(&setting, || unreachable!()), 7);
///
/// // Equal content, new reference: recomputed.
/// let copy = Rc::new((*setting).clone());
/// assert_eq!(memo.get_or_compute(&copy, || 8), 8);
/// ```
pub struct Memo<T> {
    slot: RefCell<Option<(Rc<Setting>, T)>>,
}

impl<T: Clone> Memo<T> {
    pub fn new() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }

    /// Return the cached value for `setting`, computing and storing it on a miss.
    ///
    /// No borrow is held while `compute` runs, so computations may consult
    /// other memos (or this one, for a different stage of the recursion).
    pub fn get_or_compute(&self, setting: &Rc<Setting>, compute: impl FnOnce() -> T) -> T {
        if let Some(value) = self.get(setting) {
            return value;
        }
        let value = compute();
        *self.slot.borrow_mut() = Some((Rc::clone(setting), value.clone()));
        value
    }

    /// The cached value, if it was computed for this exact setting reference.
    pub fn get(&self, setting: &Rc<Setting>) -> Option<T> {
        match &*self.slot.borrow() {
            Some((key, value)) if Rc::ptr_eq(key, setting) => Some(value.clone()),
            _ => None,
        }
    }

    /// Drop the cached value.
    pub fn invalidate(&self) {
        self.slot.borrow_mut().take();
    }
}

impl<T: Clone> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self
            .slot
            .try_borrow()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("Memo").field("cached", &cached).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_memo_hit_requires_same_reference() {
        let memo = Memo::new();
        let calls = Cell::new(0);
        let setting = Rc::new(Setting::default());

        let compute = || {
            calls.set(calls.get() + 1);
            42
        };
        assert_eq!(memo.get_or_compute(&setting, compute), 42);
        assert_eq!(memo.get_or_compute(&setting, compute), 42);
        assert_eq!(calls.get(), 1);

        let same_content = Rc::new((*setting).clone());
        assert_eq!(memo.get_or_compute(&same_content, compute), 42);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_memo_single_slot() {
        let memo = Memo::new();
        let a = Rc::new(Setting::default());
        let b = Rc::new(Setting::default());

        memo.get_or_compute(&a, || 1);
        memo.get_or_compute(&b, || 2);
        // `a` was evicted by `b`.
        assert_eq!(memo.get(&a), None);
        assert_eq!(memo.get(&b), Some(2));
    }

    #[test]
    fn test_memo_invalidate() {
        let memo = Memo::new();
        let a = Rc::new(Setting::default());
        memo.get_or_compute(&a, || 1);
        memo.invalidate();
        assert_eq!(memo.get(&a), None);
    }

    #[test]
    fn test_memo_reentrant() {
        let outer: Memo<i64> = Memo::new();
        let inner: Memo<i64> = Memo::new();
        let setting = Rc::new(Setting::default());

        let value = outer.get_or_compute(&setting, || inner.get_or_compute(&setting, || 5) * 2);
        assert_eq!(value, 10);
        assert_eq!(inner.get(&setting), Some(5));
    }
}
