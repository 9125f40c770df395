//! RAII observer registrations

use std::fmt;

/// Guard that keeps an observer registered
///
/// Dropping the guard removes the observer. Call `detach()` to keep the
/// observer for as long as the node lives.
#[must_use = "dropping a Subscription immediately unregisters the observer"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unregister the observer now
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    /// Keep the observer registered for the lifetime of the node
    pub fn detach(mut self) {
        self.cancel = None;
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
