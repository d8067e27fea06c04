/// The payload an event is fired with, handed by reference to every handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fire<E, D> {
    /// The event fired without any extra argument.
    Plain,

    /// The event fired because something went wrong.
    ///
    /// A pending waiter of the event is resolved with this error.
    WithError(E),

    /// The event fired carrying some data.
    WithData(D),
}

impl<E, D> Fire<E, D> {
    /// The error carried by the payload, if any.
    #[must_use]
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::WithError(error) => Some(error),
            Self::Plain | Self::WithData(_) => None,
        }
    }

    /// The data carried by the payload, if any.
    #[must_use]
    pub fn data(&self) -> Option<&D> {
        match self {
            Self::WithData(data) => Some(data),
            Self::Plain | Self::WithError(_) => None,
        }
    }

    /// Builds a payload from an optional error, producing [`Fire::Plain`] for `None`.
    #[must_use]
    pub fn from_error(error: Option<E>) -> Self {
        error.map_or(Self::Plain, Self::WithError)
    }

    /// Short label for log output.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::WithError(_) => "error",
            Self::WithData(_) => "data",
        }
    }
}

impl<E, D> Default for Fire<E, D> {
    fn default() -> Self {
        Self::Plain
    }
}
