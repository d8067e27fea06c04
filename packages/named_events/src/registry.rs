use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use foldhash::{HashMap, HashMapExt};
use tracing::{Span, debug};

use crate::{Error, Event, EventSource, Fire, Handler, Result};

/// The event type produced by an [`EventHandler<S>`].
pub type SourceEvent<S> =
    Event<<S as EventSource>::Owner, <S as EventSource>::Error, <S as EventSource>::Data>;

/// The handler type accepted by the events of an [`EventHandler<S>`].
pub type SourceHandler<S> =
    Handler<<S as EventSource>::Owner, <S as EventSource>::Error, <S as EventSource>::Data>;

/// A lazily populated registry of named events belonging to one owner.
///
/// The registry starts out empty. The first [`event()`][Self::event] call creates the one-time
/// events listed in [`EventSource::ONE_TIME_EVENTS`] in one go, and any other name creates a
/// many-times event the first time it is requested.
///
/// Firing through the registry never creates events: [`fire_event()`][Self::fire_event] on a
/// name nobody asked for is silently ignored, and [`bind_events()`][Self::bind_events] and
/// [`copy_many_times_events()`][Self::copy_many_times_events] only touch events that already
/// exist.
///
/// # Example
///
/// ```
/// use named_events::{EventHandler, EventSource, Fire, Handler};
///
/// struct Connection;
///
/// impl EventSource for Connection {
///     const ONE_TIME_EVENTS: &'static [&'static str] = &["connection_lost"];
///
///     type Owner = u64;
///     type Error = std::io::ErrorKind;
///     type Data = Vec<u8>;
/// }
///
/// let events = EventHandler::<Connection>::new(7);
///
/// events
///     .event("connection_lost")?
///     .bind(Handler::new(|session, fire| {
///         println!("session {session} lost: {:?}", fire.error());
///         Ok(())
///     }))?;
///
/// events.fire_event("connection_lost", Fire::Plain)?;
/// assert!(events.event("connection_lost")?.fired());
/// # Ok::<(), named_events::Error>(())
/// ```
pub struct EventHandler<S>
where
    S: EventSource,
{
    owner: S::Owner,

    // `None` until the first `event()` call.
    events: RefCell<Option<HashMap<String, Rc<SourceEvent<S>>>>>,

    span: Span,
}

impl<S> EventHandler<S>
where
    S: EventSource,
{
    /// Creates an empty registry whose events do not log anywhere.
    #[must_use]
    pub fn new(owner: S::Owner) -> Self {
        Self::with_span(owner, Span::none())
    }

    /// Creates an empty registry whose events log under `span`.
    #[must_use]
    pub fn with_span(owner: S::Owner, span: Span) -> Self {
        Self {
            owner,
            events: RefCell::new(None),
            span,
        }
    }

    /// The owner handed to the handlers of every event in the registry.
    #[must_use]
    pub fn owner(&self) -> &S::Owner {
        &self.owner
    }

    /// The events created so far, or `None` if no event has ever been requested.
    ///
    /// # Panics
    ///
    /// Requesting new events while holding the view panics.
    #[must_use]
    pub fn events(&self) -> Option<Ref<'_, HashMap<String, Rc<SourceEvent<S>>>>> {
        Ref::filter_map(self.events.borrow(), Option::as_ref).ok()
    }

    /// Returns the event called `name`, creating it if necessary.
    ///
    /// Repeated calls with the same name return the same event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `name` is empty.
    pub fn event(&self, name: &str) -> Result<Rc<SourceEvent<S>>> {
        if name.is_empty() {
            return Err(Error::InvalidArgument {
                problem: "event name must not be empty".to_string(),
            });
        }

        let mut events = self.events.borrow_mut();

        let events = events.get_or_insert_with(|| {
            let mut events = HashMap::with_capacity(S::ONE_TIME_EVENTS.len());

            for &one_time in S::ONE_TIME_EVENTS {
                events.insert(
                    one_time.to_string(),
                    Rc::new(Event::new(
                        one_time,
                        self.owner.clone(),
                        true,
                        self.span.clone(),
                    )),
                );
            }

            debug!(parent: &self.span, one_time = S::ONE_TIME_EVENTS.len(), "event map created");

            events
        });

        let event = events.entry(name.to_string()).or_insert_with(|| {
            debug!(parent: &self.span, event = name, "many-times event created");

            Rc::new(Event::new(name, self.owner.clone(), false, self.span.clone()))
        });

        Ok(Rc::clone(event))
    }

    /// Fires the event called `name`, if it exists.
    ///
    /// Names that were never requested via [`event()`][Self::event] and are not one-time
    /// names of an initialized registry are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by a handler of the event.
    pub fn fire_event(&self, name: &str, fire: Fire<S::Error, S::Data>) -> Result<()> {
        let Some(event) = self.existing(name) else {
            debug!(parent: &self.span, event = name, "ignoring fire of unknown event");
            return Ok(());
        };

        event.fire(fire)
    }

    /// Binds each handler to the existing event with the matching name.
    ///
    /// Names without an existing event are skipped; no events are created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyFired`] if a matching event is a one-time event that has already
    /// fired. Handlers earlier in `handlers` stay bound.
    pub fn bind_events<N, I>(&self, handlers: I) -> Result<()>
    where
        N: AsRef<str>,
        I: IntoIterator<Item = (N, SourceHandler<S>)>,
    {
        for (name, handler) in handlers {
            if let Some(event) = self.existing(name.as_ref()) {
                event.bind(handler)?;
            }
        }

        Ok(())
    }

    /// Appends the handlers of the many-times events of `other` to the events of the same name
    /// in this registry.
    ///
    /// One-time events of `other`, events without handlers and names that do not exist in this
    /// registry are skipped. This merges into the existing events; it never creates events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyFired`] if a matching event in this registry is a one-time event
    /// that has already fired.
    pub fn copy_many_times_events<T>(&self, other: &EventHandler<T>) -> Result<()>
    where
        T: EventSource<Owner = S::Owner, Error = S::Error, Data = S::Data>,
    {
        // Collect first, as `other` may well be `self` and binding needs the events mutably.
        let mut copies = Vec::new();

        {
            let (Some(other_events), Some(events)) = (other.events(), self.events()) else {
                return Ok(());
            };

            for (name, source) in other_events.iter() {
                if source.onetime() {
                    continue;
                }

                let handlers = source.handlers();

                if handlers.is_empty() {
                    continue;
                }

                if let Some(target) = events.get(name) {
                    copies.push((Rc::clone(target), handlers.to_vec()));
                }
            }
        }

        for (target, handlers) in copies {
            debug!(
                parent: &self.span,
                event = target.name(),
                handlers = handlers.len(),
                "copying many-times handlers"
            );

            for handler in handlers {
                target.bind(handler)?;
            }
        }

        Ok(())
    }

    fn existing(&self, name: &str) -> Option<Rc<SourceEvent<S>>> {
        self.events
            .borrow()
            .as_ref()
            .and_then(|events| events.get(name))
            .map(Rc::clone)
    }
}

impl<S> fmt::Debug for EventHandler<S>
where
    S: EventSource,
    S::Owner: fmt::Debug,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Option<Vec<String>> = self.events.borrow().as_ref().map(|events| {
            let mut names: Vec<_> = events.keys().cloned().collect();
            names.sort();
            names
        });

        f.debug_struct("EventHandler")
            .field("owner", &self.owner)
            .field("events", &names)
            .field("span", &self.span)
            .finish()
    }
}
