use http::Version;

use crate::lifecycle::AsyncState;

/// Errors raised while moving response bytes toward the transport.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum OutputError<TransportError> {
    /// An error occurred while writing to the transport
    #[error("error writing response to transport: {0}")]
    Transport(#[source] TransportError),
}

/// Errors raised by the exchange-level serve loop.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ServeError<TransportError> {
    #[error(transparent)]
    Output(#[from] OutputError<TransportError>),

    /// Only HTTP/1.0 and HTTP/1.1 framing is supported here
    #[error("unsupported protocol version {0:?}")]
    UnsupportedVersion(Version),
}

/// Programming misuse of the async lifecycle, reported synchronously to
/// the caller. Fatal to that call, not to the exchange or the server.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum AsyncError {
    #[error("start_async called while an async cycle is {actual:?}")]
    CycleOutstanding { actual: AsyncState },

    #[error("{op} called while the async cycle is {actual:?}, expected Started")]
    NotStarted {
        op: &'static str,
        actual: AsyncState,
    },

    #[error("exchange finished before {op} could be delivered")]
    ExchangeGone { op: &'static str },
}
