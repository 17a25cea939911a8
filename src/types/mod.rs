mod headers;
pub use headers::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// The response was fully written and the connection may carry
    /// another exchange (HTTP/1.1, framing other than close-delimited)
    KeepAlive,

    /// The response was fully written but the connection must close
    /// (HTTP/1.0, or close-delimited framing)
    Close,

    /// The handler failed after the response was committed; whatever
    /// bytes were already flushed are all the client gets
    Aborted,
}
