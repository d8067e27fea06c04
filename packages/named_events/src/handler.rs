use std::fmt;
use std::rc::Rc;

use crate::{Fire, Result};

type Callback<O, E, D> = dyn Fn(&O, &Fire<E, D>) -> Result<()>;

/// A callback that can be bound to an event.
///
/// The callback receives the owner of the event and the payload the event was fired with.
/// Returning an error stops the remaining handlers of the same fire and hands the error to
/// whoever fired the event.
///
/// Handlers are cheap to clone and clones compare equal to each other, which is what
/// [`Event::unbind()`][crate::Event::unbind] matches on. Two handlers created from separate
/// [`Handler::new()`] calls are never equal, even if they wrap the same function.
///
/// # Example
///
/// ```
/// use named_events::{Fire, Handler};
///
/// let handler = Handler::<u32, (), ()>::new(|owner, fire| {
///     assert_eq!(*owner, 42);
///     assert_eq!(*fire, Fire::Plain);
///     Ok(())
/// });
///
/// let same = handler.clone();
/// assert_eq!(handler, same);
/// ```
pub struct Handler<O, E, D> {
    callback: Rc<Callback<O, E, D>>,
}

impl<O, E, D> Handler<O, E, D> {
    /// Wraps a callback so it can be bound to events.
    #[must_use]
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&O, &Fire<E, D>) -> Result<()> + 'static,
    {
        Self {
            callback: Rc::new(callback),
        }
    }

    pub(crate) fn call(&self, owner: &O, fire: &Fire<E, D>) -> Result<()> {
        (self.callback)(owner, fire)
    }
}

impl<O, E, D> Clone for Handler<O, E, D> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<O, E, D> PartialEq for Handler<O, E, D> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }
}

impl<O, E, D> Eq for Handler<O, E, D> {}

impl<O, E, D> fmt::Debug for Handler<O, E, D> {
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("callback", &Rc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;

    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::Error;

    type TestHandler = Handler<u32, String, u8>;

    #[test]
    fn clones_are_equal() {
        let handler = TestHandler::new(|_, _| Ok(()));
        let clone = handler.clone();

        assert_eq!(handler, clone);
    }

    #[test]
    fn separate_handlers_are_not_equal() {
        fn noop(_: &u32, _: &Fire<String, u8>) -> Result<()> {
            Ok(())
        }

        let first = TestHandler::new(noop);
        let second = TestHandler::new(noop);

        assert_ne!(first, second);
    }

    #[test]
    fn call_forwards_owner_and_payload() {
        let seen = Rc::new(Cell::new(0_u8));

        let handler = TestHandler::new({
            let seen = Rc::clone(&seen);
            move |owner, fire| {
                assert_eq!(*owner, 5);
                seen.set(*fire.data().unwrap());
                Ok(())
            }
        });

        handler.call(&5, &Fire::WithData(9)).unwrap();

        assert_eq!(seen.get(), 9);
    }

    #[test]
    fn call_returns_handler_error() {
        let handler = TestHandler::new(|_, _| Err(Error::Abort));

        let result = handler.call(&1, &Fire::Plain);

        assert!(matches!(result, Err(Error::Abort)));
    }

    #[test]
    fn single_threaded_type() {
        assert_not_impl_any!(TestHandler: Send, Sync);
    }
}
