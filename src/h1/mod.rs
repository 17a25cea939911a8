pub(crate) mod encode;

mod server;
pub use server::*;
