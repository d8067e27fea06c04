use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// A single-assignment completion handle for the next fire of an event.
///
/// Obtained from [`Event::waiter()`][crate::Event::waiter]. The handle resolves when the
/// event fires: with `Err(error)` if the event fired with [`Fire::WithError`][crate::Fire],
/// otherwise with `Ok(owner)`.
///
/// Clones share the same slot and each of them resolves with a clone of the result.
/// If the event never fires, the handle never resolves; there is no timeout or cancellation.
///
/// # Example
///
/// ```
/// use futures::executor::block_on;
/// use named_events::{EventHandler, EventSource, Fire};
///
/// struct Job;
///
/// impl EventSource for Job {
///     const ONE_TIME_EVENTS: &'static [&'static str] = &["done"];
///
///     type Owner = &'static str;
///     type Error = String;
///     type Data = ();
/// }
///
/// let events = EventHandler::<Job>::new("job-1");
/// let done = events.event("done").unwrap();
/// let waiter = done.waiter();
///
/// done.fire(Fire::Plain).unwrap();
///
/// assert_eq!(block_on(waiter), Ok("job-1"));
/// ```
pub struct Waiter<O, E> {
    slot: Rc<RefCell<Slot<O, E>>>,
}

enum Slot<O, E> {
    /// Nothing has fired yet. Holds the wakers of everyone currently awaiting a clone.
    Pending(Vec<Waker>),

    /// The event has fired and this is the outcome.
    Resolved(Result<O, E>),
}

impl<O, E> Waiter<O, E> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot::Pending(Vec::new()))),
        }
    }

    /// Whether the event has fired and the handle holds its outcome.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Resolved(_))
    }

    /// Whether two handles share the same slot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }

    /// Stores the outcome and wakes everyone awaiting the handle.
    ///
    /// Only the event that created the handle resolves it and it does so at most once.
    pub(crate) fn resolve(&self, result: Result<O, E>) {
        let previous = mem::replace(&mut *self.slot.borrow_mut(), Slot::Resolved(result));

        match previous {
            Slot::Pending(wakers) => {
                // The slot borrow has ended, so awakened tasks are free to poll right away.
                for waker in wakers {
                    waker.wake();
                }
            }
            Slot::Resolved(_) => {
                debug_assert!(false, "waiter resolved twice");
            }
        }
    }
}

impl<O, E> Clone for Waiter<O, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<O, E> Future for Waiter<O, E>
where
    O: Clone,
    E: Clone,
{
    type Output = Result<O, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();

        match &mut *slot {
            Slot::Pending(wakers) => {
                // Re-polls from the same task replace nothing and add nothing.
                if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }

                Poll::Pending
            }
            Slot::Resolved(result) => Poll::Ready(result.clone()),
        }
    }
}

impl<O, E> fmt::Debug for Waiter<O, E> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::pin::pin;
    use std::task::Context;

    use futures::executor::block_on;
    use futures::task::noop_waker_ref;
    use static_assertions::assert_not_impl_any;

    use super::*;

    #[test]
    fn pending_until_resolved() {
        let waiter = Waiter::<u32, String>::new();
        let mut cx = Context::from_waker(noop_waker_ref());

        let mut future = pin!(waiter.clone());
        assert!(future.as_mut().poll(&mut cx).is_pending());
        assert!(!waiter.is_resolved());

        waiter.resolve(Ok(7));

        assert!(waiter.is_resolved());
        assert_eq!(future.poll(&mut cx), Poll::Ready(Ok(7)));
    }

    #[test]
    fn resolves_with_error() {
        let waiter = Waiter::<u32, String>::new();

        waiter.resolve(Err("refused".to_string()));

        assert_eq!(block_on(waiter), Err("refused".to_string()));
    }

    #[test]
    fn every_clone_sees_the_outcome() {
        let waiter = Waiter::<u32, String>::new();
        let first = waiter.clone();
        let second = waiter.clone();

        waiter.resolve(Ok(1));

        assert_eq!(block_on(first), Ok(1));
        assert_eq!(block_on(second), Ok(1));
    }

    #[test]
    fn repeated_polls_register_one_waker() {
        let waiter = Waiter::<u32, String>::new();
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut future = pin!(waiter.clone());

        assert!(future.as_mut().poll(&mut cx).is_pending());
        assert!(future.as_mut().poll(&mut cx).is_pending());

        match &*waiter.slot.borrow() {
            Slot::Pending(wakers) => assert_eq!(wakers.len(), 1),
            Slot::Resolved(_) => panic!("waiter resolved without resolve()"),
        }
    }

    #[test]
    fn ptr_eq_distinguishes_slots() {
        let waiter = Waiter::<u32, String>::new();
        let clone = waiter.clone();
        let other = Waiter::<u32, String>::new();

        assert!(waiter.ptr_eq(&clone));
        assert!(!waiter.ptr_eq(&other));
    }

    #[test]
    fn single_threaded_type() {
        assert_not_impl_any!(Waiter<u32, String>: Send, Sync);
    }
}
