/// Describes a family of events owned by some type.
///
/// An [`EventHandler<S>`][crate::EventHandler] uses this to decide which events are
/// one-time events and which types flow through its handlers.
///
/// Types that share `Owner`, `Error` and `Data` can exchange handlers via
/// [`EventHandler::copy_many_times_events()`][crate::EventHandler::copy_many_times_events],
/// even if their one-time event sets differ.
///
/// # Example
///
/// ```
/// use named_events::EventSource;
///
/// struct Download;
///
/// impl EventSource for Download {
///     const ONE_TIME_EVENTS: &'static [&'static str] = &["finished"];
///
///     type Owner = u64;
///     type Error = std::io::ErrorKind;
///     type Data = Vec<u8>;
/// }
/// ```
pub trait EventSource {
    /// Names that are pre-registered as one-time events when the event map is first created.
    ///
    /// All other names create many-times events on first access.
    const ONE_TIME_EVENTS: &'static [&'static str];

    /// The value handed to every handler as the first argument.
    ///
    /// This is typically a cheap identifier or a weak reference to the object that owns the
    /// events, as every event holds its own clone.
    type Owner: Clone;

    /// The error payload an event can be fired with.
    type Error;

    /// The data payload an event can be fired with.
    type Data;
}
