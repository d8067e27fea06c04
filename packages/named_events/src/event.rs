//! A single named event with its handlers.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::mem;

use tracing::{Span, debug, trace};

use crate::{Error, Fire, Handler, Result, Waiter};

/// Whether a one-time event can still fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventState {
    Armed,
    Fired,
}

/// A named signal that invokes its handlers, in the order they were bound, when fired.
///
/// Events come in two flavors:
///
/// * One-time events fire at most once. Firing moves them into the fired state, drops all
///   their handlers and rejects any further [`bind()`][Self::bind].
/// * Many-times events can fire any number of times and keep their handlers.
///
/// Events are normally obtained from an [`EventHandler`][crate::EventHandler], which decides
/// the flavor from the name of the event.
///
/// This type is single-threaded. Handlers may freely call back into the event they are
/// being invoked by.
pub struct Event<O, E, D> {
    name: String,
    owner: O,
    onetime: bool,
    state: Cell<EventState>,
    handlers: RefCell<Vec<Handler<O, E, D>>>,
    waiter: RefCell<Option<Waiter<O, E>>>,
    span: Span,
}

impl<O, E, D> Event<O, E, D>
where
    O: Clone,
{
    /// Creates an armed event without any handlers.
    ///
    /// The event logs under `span`.
    #[must_use]
    pub fn new(name: impl Into<String>, owner: O, onetime: bool, span: Span) -> Self {
        Self {
            name: name.into(),
            owner,
            onetime,
            state: Cell::new(EventState::Armed),
            handlers: RefCell::new(Vec::new()),
            waiter: RefCell::new(None),
            span,
        }
    }

    /// The name of the event.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owner handed to every handler.
    #[must_use]
    pub fn owner(&self) -> &O {
        &self.owner
    }

    /// Whether this is a one-time event.
    #[must_use]
    pub fn onetime(&self) -> bool {
        self.onetime
    }

    /// Whether this one-time event has already fired.
    ///
    /// Always `false` for many-times events.
    #[must_use]
    pub fn fired(&self) -> bool {
        self.state.get() == EventState::Fired
    }

    /// The handlers currently bound to the event, in invocation order.
    ///
    /// This is a view into the event, not a copy.
    ///
    /// # Panics
    ///
    /// The event cannot be modified while the view is alive. Binding, unbinding, clearing or
    /// firing the event while holding the view panics.
    #[must_use]
    pub fn handlers(&self) -> Ref<'_, [Handler<O, E, D>]> {
        Ref::map(self.handlers.borrow(), Vec::as_slice)
    }

    /// Appends a handler, to be invoked after all previously bound handlers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyFired`] if this is a one-time event that has already fired.
    pub fn bind(&self, handler: Handler<O, E, D>) -> Result<()> {
        if self.fired() {
            return Err(Error::AlreadyFired {
                name: self.name.clone(),
            });
        }

        let mut handlers = self.handlers.borrow_mut();
        handlers.push(handler);

        trace!(parent: &self.span, event = %self.name, handlers = handlers.len(), "handler bound");

        Ok(())
    }

    /// Removes every handler equal to `handler`, returning how many were removed.
    pub fn unbind(&self, handler: &Handler<O, E, D>) -> usize {
        let mut handlers = self.handlers.borrow_mut();

        let before = handlers.len();
        handlers.retain(|bound| bound != handler);
        let removed = before.saturating_sub(handlers.len());

        trace!(parent: &self.span, event = %self.name, removed, "handler unbound");

        removed
    }

    /// Removes all handlers, whether or not the event has fired.
    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();

        trace!(parent: &self.span, event = %self.name, "handlers cleared");
    }

    /// Fires the event, invoking every handler with the owner and `fire`.
    ///
    /// A one-time event moves into the fired state and drops its handlers before the first
    /// handler runs, so handlers observe the event as already fired and a nested fire is a
    /// no-op. Firing an event that has already fired does nothing.
    ///
    /// A many-times event invokes a snapshot of its handlers taken when the fire starts, so a
    /// handler bound during the fire first runs on the next fire.
    ///
    /// Once every handler has succeeded, a pending [`waiter()`][Self::waiter] is resolved with
    /// the error carried by `fire` or, failing that, with the owner.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by a handler. The handlers after it are not invoked
    /// and the waiter is left pending.
    pub fn fire(&self, fire: Fire<E, D>) -> Result<()> {
        if self.fired() {
            debug!(parent: &self.span, event = %self.name, "ignoring fire of already fired event");
            return Ok(());
        }

        // Handlers may bind, unbind or fire while we iterate, so we never hold the borrow
        // across a handler call.
        let handlers = if self.onetime {
            self.state.set(EventState::Fired);
            mem::take(&mut *self.handlers.borrow_mut())
        } else {
            self.handlers.borrow().clone()
        };

        debug!(
            parent: &self.span,
            event = %self.name,
            onetime = self.onetime,
            payload = fire.kind(),
            handlers = handlers.len(),
            "firing event"
        );

        for handler in &handlers {
            handler.call(&self.owner, &fire)?;
        }

        let waiter = self.waiter.borrow_mut().take();

        if let Some(waiter) = waiter {
            debug!(parent: &self.span, event = %self.name, "resolving waiter");

            waiter.resolve(match fire {
                Fire::WithError(error) => Err(error),
                Fire::Plain | Fire::WithData(_) => Ok(self.owner.clone()),
            });
        }

        Ok(())
    }

    /// Returns a handle that resolves the next time the event fires.
    ///
    /// Every call made before the event fires returns a handle to the same slot.
    ///
    /// A one-time event that has already fired will not fire again, so a handle obtained
    /// afterwards never resolves.
    #[must_use]
    pub fn waiter(&self) -> Waiter<O, E> {
        self.waiter.borrow_mut().get_or_insert_with(Waiter::new).clone()
    }
}

impl<O, E, D> fmt::Debug for Event<O, E, D>
where
    O: fmt::Debug,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("onetime", &self.onetime)
            .field("state", &self.state.get())
            .field("handlers", &self.handlers.borrow().len())
            .field("waiter", &self.waiter.borrow().is_some())
            .field("span", &self.span)
            .finish()
    }
}

impl<O, E, D> fmt::Display for Event<O, E, D> {
    #[cfg_attr(test, mutants::skip)] // No API contract for display output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
