//! Connection lifecycle plumbing built on events.
//!
//! A [`Producer`] (a server or client factory) creates one [`Connection`] per session. Each
//! connection creates a [`Consumer`] per request it processes. All three carry their own
//! [`EventHandler`]:
//!
//! | Type         | One-time events                       | Many-times events             |
//! |--------------|---------------------------------------|-------------------------------|
//! | [`Producer`] | none                                  | anything                      |
//! | [`Connection`] | `connection_made`, `connection_lost` | anything                      |
//! | [`Consumer`] | `post_request`                        | `pre_request`, `data_processed` |
//!
//! Handlers bound on the producer act as templates: every connection and consumer it produces
//! gets a copy of the producer's handlers for the events it has. Binding a handler to
//! `connection_made` on the producer therefore runs it once for every connection.
//!
//! The handlers of the whole family receive the [`SessionId`] of the connection the event
//! belongs to.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use named_events::protocol::{CONNECTION_MADE, Producer};
//! use named_events::Handler;
//!
//! let producer = Producer::new("echo");
//! let made = Rc::new(Cell::new(0));
//!
//! producer.events().event(CONNECTION_MADE)?.bind(Handler::new({
//!     let made = Rc::clone(&made);
//!     move |_, _| {
//!         made.set(made.get() + 1);
//!         Ok(())
//!     }
//! }))?;
//!
//! for _ in 0..3 {
//!     let connection = producer.create_connection()?;
//!     connection.connection_made()?;
//! }
//!
//! assert_eq!(made.get(), 3);
//! assert_eq!(producer.sessions(), 3);
//! # Ok::<(), named_events::Error>(())
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io;
use std::rc::Rc;

use tracing::{Span, debug, debug_span, info_span};

use crate::{Error, EventHandler, EventSource, Fire, Handler, Result, Waiter};

/// Fired once a connection has been established with the remote endpoint.
pub const CONNECTION_MADE: &str = "connection_made";

/// Fired once a connection has been closed, lost or aborted.
pub const CONNECTION_LOST: &str = "connection_lost";

/// Fired when a consumer starts processing a request.
///
/// A handler returning [`Error::Abort`] stops the request from starting.
pub const PRE_REQUEST: &str = "pre_request";

/// Fired once a consumer has finished processing its request.
pub const POST_REQUEST: &str = "post_request";

/// Fired each time a consumer has been fed a chunk of incoming data.
pub const DATA_PROCESSED: &str = "data_processed";

/// Identifies the session (connection) an event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// The session number. Sessions of a producer are numbered from 1.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    #[cfg_attr(test, mutants::skip)] // No API contract for display output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {}", self.0)
    }
}

/// A handler for any event of the protocol family.
pub type ProtocolHandler = Handler<SessionId, io::ErrorKind, Vec<u8>>;

/// Events of a [`Producer`].
#[derive(Debug)]
pub struct ProducerEvents;

impl EventSource for ProducerEvents {
    const ONE_TIME_EVENTS: &'static [&'static str] = &[];

    type Owner = SessionId;
    type Error = io::ErrorKind;
    type Data = Vec<u8>;
}

/// Events of a [`Connection`].
#[derive(Debug)]
pub struct ConnectionEvents;

impl EventSource for ConnectionEvents {
    const ONE_TIME_EVENTS: &'static [&'static str] = &[CONNECTION_MADE, CONNECTION_LOST];

    type Owner = SessionId;
    type Error = io::ErrorKind;
    type Data = Vec<u8>;
}

/// Events of a [`Consumer`].
#[derive(Debug)]
pub struct ConsumerEvents;

impl EventSource for ConsumerEvents {
    const ONE_TIME_EVENTS: &'static [&'static str] = &[POST_REQUEST];

    type Owner = SessionId;
    type Error = io::ErrorKind;
    type Data = Vec<u8>;
}

/// Creates connections and keeps the handlers they all share.
#[derive(Debug)]
pub struct Producer {
    name: String,
    sessions: Cell<u64>,
    requests_processed: Cell<u64>,

    // Never fired itself; the owner is a placeholder.
    events: EventHandler<ProducerEvents>,

    span: Span,
}

impl Producer {
    /// Creates a producer that has not produced any connections yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        let name = name.into();
        let span = info_span!("producer", name = %name);

        Rc::new(Self {
            events: EventHandler::with_span(SessionId(0), span.clone()),
            name,
            sessions: Cell::new(0),
            requests_processed: Cell::new(0),
            span,
        })
    }

    /// The name of the producer, used in log output.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The handlers shared by every connection and consumer of this producer.
    #[must_use]
    pub fn events(&self) -> &EventHandler<ProducerEvents> {
        &self.events
    }

    /// How many connections this producer has created.
    #[must_use]
    pub fn sessions(&self) -> u64 {
        self.sessions.get()
    }

    /// How many requests the consumers of this producer have started.
    #[must_use]
    pub fn requests_processed(&self) -> u64 {
        self.requests_processed.get()
    }

    /// Creates the connection for the next session.
    ///
    /// The connection receives a copy of the producer's handlers for its events.
    ///
    /// # Errors
    ///
    /// Returns an error if the producer's handlers cannot be copied.
    pub fn create_connection(self: &Rc<Self>) -> Result<Connection> {
        let session = SessionId(self.sessions.get().wrapping_add(1));
        self.sessions.set(session.get());

        Connection::new(Rc::clone(self), session)
    }
}

/// One session with a remote endpoint.
#[derive(Debug)]
pub struct Connection {
    session: SessionId,
    producer: Rc<Producer>,
    events: EventHandler<ConnectionEvents>,
    consumer: RefCell<Option<Rc<Consumer>>>,
    processed: Cell<u64>,
    data_received_count: Cell<u64>,
    closed: Cell<bool>,
    span: Span,
}

impl Connection {
    fn new(producer: Rc<Producer>, session: SessionId) -> Result<Self> {
        let span = info_span!(parent: &producer.span, "connection", session = session.get());
        let events = EventHandler::with_span(session, span.clone());

        // Creates the one-time events, so the producer's handlers have somewhere to go.
        events.event(CONNECTION_LOST)?;
        events.copy_many_times_events(&producer.events)?;

        Ok(Self {
            session,
            producer,
            events,
            consumer: RefCell::new(None),
            processed: Cell::new(0),
            data_received_count: Cell::new(0),
            closed: Cell::new(false),
            span,
        })
    }

    /// The session this connection serves.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// The producer that created this connection.
    #[must_use]
    pub fn producer(&self) -> &Rc<Producer> {
        &self.producer
    }

    /// The events of this connection.
    #[must_use]
    pub fn events(&self) -> &EventHandler<ConnectionEvents> {
        &self.events
    }

    /// How many requests this connection has started.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.get()
    }

    /// How many chunks of data this connection has received.
    #[must_use]
    pub fn data_received_count(&self) -> u64 {
        self.data_received_count.get()
    }

    /// Whether the connection has been closed, lost or aborted.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Signals that the connection with the remote endpoint has been established.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by a `connection_made` handler.
    pub fn connection_made(&self) -> Result<()> {
        debug!(parent: &self.span, "connection made");

        self.events.fire_event(CONNECTION_MADE, Fire::Plain)
    }

    /// Hands a chunk of incoming data to the current consumer, starting a request if needed.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by a `pre_request` handler (other than
    /// [`Error::Abort`]) or by a `data_processed` handler.
    pub fn data_received(&self, data: &[u8]) -> Result<()> {
        self.data_received_count.set(self.data_received_count.get().wrapping_add(1));

        let consumer = self.current_consumer()?;

        if !consumer.is_started() && !consumer.is_aborted() {
            self.processed.set(self.processed.get().wrapping_add(1));
            consumer.start()?;
        }

        consumer.feed_data(data)
    }

    /// The consumer of the request in progress, creating one if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the producer's handlers cannot be copied to a new consumer.
    pub fn current_consumer(&self) -> Result<Rc<Consumer>> {
        if let Some(consumer) = self.consumer.borrow().as_ref() {
            return Ok(Rc::clone(consumer));
        }

        let consumer = Rc::new(Consumer::new(
            self.session,
            Rc::clone(&self.producer),
            &self.span,
        )?);

        *self.consumer.borrow_mut() = Some(Rc::clone(&consumer));

        Ok(consumer)
    }

    /// Completes the request in progress, if any, so the next data starts a new request.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by a `post_request` handler.
    pub fn finish_request(&self) -> Result<()> {
        let consumer = self.consumer.borrow_mut().take();

        match consumer {
            Some(consumer) => consumer.finish(None),
            None => Ok(()),
        }
    }

    /// Signals that the connection is gone, optionally because of `error`.
    ///
    /// The request in progress is finished with the same error before `connection_lost` fires.
    /// `connection_lost` fires even if finishing the request fails.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by a `post_request` or `connection_lost` handler.
    pub fn connection_lost(&self, error: Option<io::ErrorKind>) -> Result<()> {
        self.closed.set(true);

        debug!(parent: &self.span, ?error, "connection lost");

        let consumer = self.consumer.borrow_mut().take();

        let finished = match consumer {
            Some(consumer) => consumer.finish(error),
            None => Ok(()),
        };

        let lost = self.events.fire_event(CONNECTION_LOST, Fire::from_error(error));

        finished.and(lost)
    }

    /// Closes the connection.
    ///
    /// Returns a waiter for the `connection_lost` event, which resolves once the connection is
    /// completely closed. Returns `None` if the connection had already been lost, as the event
    /// will not fire again.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by a `post_request` or `connection_lost` handler.
    pub fn close(&self) -> Result<Option<Waiter<SessionId, io::ErrorKind>>> {
        let lost = self.events.event(CONNECTION_LOST)?;

        if lost.fired() {
            return Ok(None);
        }

        let waiter = lost.waiter();

        if !self.closed.get() {
            debug!(parent: &self.span, "closing connection");
            self.connection_lost(None)?;
        }

        Ok(Some(waiter))
    }

    /// Tears the connection down without a graceful close.
    ///
    /// `connection_lost` fires with [`io::ErrorKind::ConnectionAborted`], so its handlers see
    /// that error and its waiter resolves with `Err(ConnectionAborted)`.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by a `post_request` or `connection_lost` handler.
    pub fn abort(&self) -> Result<()> {
        self.connection_lost(Some(io::ErrorKind::ConnectionAborted))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RequestState {
    Idle,
    Started,
    Aborted,
}

/// Processes one request of a connection.
#[derive(Debug)]
pub struct Consumer {
    session: SessionId,
    producer: Rc<Producer>,
    events: EventHandler<ConsumerEvents>,
    state: Cell<RequestState>,
    bytes_received: Cell<usize>,
    span: Span,
}

impl Consumer {
    fn new(session: SessionId, producer: Rc<Producer>, parent: &Span) -> Result<Self> {
        let span = debug_span!(parent: parent, "consumer");
        let events = EventHandler::with_span(session, span.clone());

        events.event(PRE_REQUEST)?;
        events.event(DATA_PROCESSED)?;
        events.copy_many_times_events(&producer.events)?;

        Ok(Self {
            session,
            producer,
            events,
            state: Cell::new(RequestState::Idle),
            bytes_received: Cell::new(0),
            span,
        })
    }

    /// The session this consumer belongs to.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// The events of this consumer.
    #[must_use]
    pub fn events(&self) -> &EventHandler<ConsumerEvents> {
        &self.events
    }

    /// Whether the request has started and was not aborted.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state.get() == RequestState::Started
    }

    /// Whether a `pre_request` handler aborted the request.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state.get() == RequestState::Aborted
    }

    /// Whether `post_request` has fired.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.events
            .events()
            .and_then(|events| events.get(POST_REQUEST).map(|event| event.fired()))
            .unwrap_or(false)
    }

    /// How many bytes have been fed to this consumer.
    #[must_use]
    pub fn bytes_received(&self) -> usize {
        self.bytes_received.get()
    }

    /// Starts the request by firing `pre_request`.
    ///
    /// A handler returning [`Error::Abort`] marks the request as aborted; this is not an error.
    ///
    /// # Errors
    ///
    /// Returns any other error returned by a `pre_request` handler.
    pub fn start(&self) -> Result<()> {
        self.producer
            .requests_processed
            .set(self.producer.requests_processed.get().wrapping_add(1));

        match self.events.fire_event(PRE_REQUEST, Fire::Plain) {
            Ok(()) => {
                self.state.set(RequestState::Started);
                Ok(())
            }
            Err(Error::Abort) => {
                debug!(parent: &self.span, session = self.session.get(), "request aborted");
                self.state.set(RequestState::Aborted);
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Feeds a chunk of incoming data to the consumer and fires `data_processed` with it.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by a `data_processed` handler.
    pub fn feed_data(&self, data: &[u8]) -> Result<()> {
        self.bytes_received
            .set(self.bytes_received.get().saturating_add(data.len()));

        self.events
            .fire_event(DATA_PROCESSED, Fire::WithData(data.to_vec()))
    }

    /// Finishes the request by firing `post_request`, optionally with an error.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by a `post_request` handler.
    pub fn finish(&self, error: Option<io::ErrorKind>) -> Result<()> {
        self.events.fire_event(POST_REQUEST, Fire::from_error(error))
    }
}
