mod base;
mod connection;
mod extractor;

pub use base::*;
pub use connection::*;
pub use extractor::*;
