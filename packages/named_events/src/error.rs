use thiserror::Error;

/// Errors that can occur when registering, binding or firing events.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller provided an event name that cannot identify an event.
    #[error("invalid event name: {problem}")]
    InvalidArgument {
        /// A human-readable description of the problem.
        problem: String,
    },

    /// A handler was bound to a one-time event that has already fired.
    #[error("event '{name}' has already fired")]
    AlreadyFired {
        /// The name of the event.
        name: String,
    },

    /// A handler asked for processing of the current event to stop.
    ///
    /// Events themselves treat this like any other handler error: the remaining handlers are
    /// skipped and the error is returned to whoever fired the event. It is up to that caller
    /// to decide whether an abort is a failure.
    #[error("event processing aborted by handler")]
    Abort,

    /// A handler failed while processing an event.
    #[error(transparent)]
    Handler(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary error raised by a handler.
    ///
    /// # Example
    ///
    /// ```
    /// use named_events::Error;
    ///
    /// let error = Error::handler(std::io::Error::other("socket closed"));
    /// assert_eq!(error.to_string(), "socket closed");
    /// ```
    pub fn handler(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Handler(Box::new(error))
    }

    /// Whether this is the [`Error::Abort`] marker.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort)
    }
}

/// A specialized `Result` type for event operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;
    use std::io;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn already_fired_names_event() {
        let error = Error::AlreadyFired {
            name: "connection_lost".to_string(),
        };

        assert_eq!(error.to_string(), "event 'connection_lost' has already fired");
        assert!(!error.is_abort());
    }

    #[test]
    fn invalid_argument_includes_problem() {
        let error = Error::InvalidArgument {
            problem: "name is empty".to_string(),
        };

        assert!(error.to_string().contains("name is empty"));
    }

    #[test]
    fn handler_error_is_transparent() {
        let error = Error::handler(io::Error::other("boom"));

        assert_eq!(error.to_string(), "boom");
        assert!(!error.is_abort());
    }

    #[test]
    fn abort_is_abort() {
        assert!(Error::Abort.is_abort());
    }
}
