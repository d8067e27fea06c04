#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Named events with synchronously invoked handlers and async waiters.
//!
//! An [`EventHandler`] is a registry of named [`Event`]s belonging to one owner. Code that is
//! interested in something happening binds a [`Handler`] to the event with that name; code that
//! makes it happen fires the event, which calls every handler in the order they were bound.
//! Anyone who would rather `.await` the next fire can ask the event for a [`Waiter`].
//!
//! There are two kinds of events:
//!
//! * **One-time events** fire at most once. The owning type lists their names in
//!   [`EventSource::ONE_TIME_EVENTS`]. After firing, the event drops its handlers and refuses new
//!   ones with [`Error::AlreadyFired`]. Think `connection_made` or `connection_lost`.
//! * **Many-times events** are everything else. They keep their handlers and can fire again and
//!   again. Their handlers can be copied between related registries with
//!   [`EventHandler::copy_many_times_events()`], which is how a server-level handler ends up on
//!   every connection the server accepts.
//!
//! Everything here is single-threaded and nothing blocks. Handlers are called synchronously and
//! the first handler error, including the [`Error::Abort`] marker, stops the fire and is
//! returned to whoever fired the event.
//!
//! Logging goes through `tracing`. The span to log under is handed to the registry via
//! [`EventHandler::with_span()`]; there is no global logger.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use futures::executor::block_on;
//! use named_events::{EventHandler, EventSource, Fire, Handler};
//!
//! struct Request;
//!
//! impl EventSource for Request {
//!     const ONE_TIME_EVENTS: &'static [&'static str] = &["post_request"];
//!
//!     type Owner = u64;
//!     type Error = String;
//!     type Data = Vec<u8>;
//! }
//!
//! let events = EventHandler::<Request>::new(1);
//! let received = Rc::new(RefCell::new(Vec::new()));
//!
//! events.event("data_received")?.bind(Handler::<u64, String, Vec<u8>>::new({
//!     let received = Rc::clone(&received);
//!     move |_, fire| {
//!         if let Some(data) = fire.data() {
//!             received.borrow_mut().extend_from_slice(data);
//!         }
//!         Ok(())
//!     }
//! }))?;
//!
//! let finished = events.event("post_request")?.waiter();
//!
//! events.fire_event("data_received", Fire::WithData(b"hello".to_vec()))?;
//! events.fire_event("post_request", Fire::Plain)?;
//!
//! assert_eq!(*received.borrow(), b"hello");
//! assert_eq!(block_on(finished), Ok(1));
//! # Ok::<(), named_events::Error>(())
//! ```

mod error;
mod event;
mod fire;
mod handler;
pub mod protocol;
mod registry;
mod source;
mod waiter;

pub use error::*;
pub use event::*;
pub use fire::*;
pub use handler::*;
pub use registry::*;
pub use source::*;
pub use waiter::*;
