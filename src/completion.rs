//! # Completion Module
//!
//! Single-slot, single-resolution continuation handle used to signal route
//! results from handler bodies back to the dispatcher.
//!
//! A [`Completion`] holds at most one of {no value yet, resolved value} and
//! at most one attached continuation. Resolution and attachment compose in
//! either order with identical observable behavior:
//!
//! - `succeed` then `then`: the callback runs immediately at attach time.
//! - `then` then `succeed`: the callback runs immediately at resolve time.
//!
//! There is no failure channel at this level: the dispatcher resolves one
//! `Completion<CallOutcome>` per request, where the outcome itself carries
//! value-or-error. The handle performs no internal synchronization — it is
//! a per-request, single-owner object and must never be shared across
//! concurrent callers.

use std::cell::RefCell;

type Continuation<T> = Box<dyn FnOnce(T)>;

struct Inner<T> {
    value: Option<T>,
    callback: Option<Continuation<T>>,
}

/// Single-shot asynchronous completion primitive.
///
/// Resolving twice is a documented misuse: the second `succeed` silently
/// overwrites the stored value (and re-fires an attached callback), matching
/// the behavior of the system this was derived from. Callers must resolve
/// at most once per instance.
pub struct Completion<T> {
    inner: RefCell<Inner<T>>,
}

impl<T: Clone + 'static> Completion<T> {
    #[must_use]
    pub fn new() -> Self {
        Completion {
            inner: RefCell::new(Inner {
                value: None,
                callback: None,
            }),
        }
    }

    /// Resolve the handle with a value.
    ///
    /// If a continuation is attached, it is invoked immediately and
    /// synchronously with the value; the value is also stored so a later
    /// `then` observes it.
    pub fn succeed(&self, value: T) {
        let callback = {
            let mut inner = self.inner.borrow_mut();
            inner.value = Some(value.clone());
            inner.callback.take()
        };
        // Invoke outside the borrow: the callback may re-enter the handle.
        if let Some(cb) = callback {
            cb(value);
        }
    }

    /// Attach a continuation.
    ///
    /// If a value is already held, the callback is invoked immediately and
    /// synchronously with a clone of it. Otherwise the callback is stored;
    /// only the most recently attached callback is remembered — there is no
    /// multi-subscriber fan-out.
    pub fn then(&self, callback: impl FnOnce(T) + 'static) {
        let ready = self.inner.borrow().value.clone();
        match ready {
            // Invoke outside the borrow: the callback may re-enter the handle.
            Some(value) => callback(value),
            None => self.inner.borrow_mut().callback = Some(Box::new(callback)),
        }
    }

    /// Whether a value has been stored.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.inner.borrow().value.is_some()
    }

    /// A clone of the resolved value, if any.
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        self.inner.borrow().value.clone()
    }
}

impl<T: Clone + 'static> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}
