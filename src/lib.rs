//! Response framing and commit core for HTTP/1.x servers.
//!
//! This crate owns the part of a server that decides, for every response,
//! *how* the body is delimited on the wire (declared length, chunked, or
//! close-delimited) and *when* the response becomes irrevocable. Socket
//! acceptance, request parsing, routing and TLS are collaborator concerns:
//! callers hand an [`Exchange`] to a [`Handler`] and get back an ordered
//! byte stream plus a close-or-keep-alive directive.

mod types;
pub use types::*;

mod framing;
pub use framing::Framing;

mod output;

mod exchange;
pub use exchange::*;

mod lifecycle;
pub use lifecycle::{AsyncHandle, AsyncState};

pub mod h1;

pub mod error;

/// re-exported so consumers can use whatever version we use
pub use http;

/// Invoked once per exchange (and again after every dispatch) to produce
/// the response. Implementations claim the exchange with
/// [`Exchange::mark_handled`]; an exchange nobody claims defaults to 404.
#[allow(async_fn_in_trait)] // we never require Send
pub trait Handler<T: Transport> {
    type Error: std::error::Error + 'static;

    async fn handle(&self, exchange: &mut Exchange<T>) -> Result<(), Self::Error>;
}
