//! Minimal line-oriented HTTP/1.1 parsing and response assembly.
//!
//! This is deliberately not a framework: the server reads a request line,
//! then headers up to a blank line, then an exact `Content-Length` body,
//! by hand — matching the manual-protocol-parsing style the rest of this
//! crate uses for its wire formats rather than pulling in an HTTP stack.

pub mod request;
pub mod response;

pub use request::{parse_request, HeaderMap, HttpRequest};
pub use response::HttpResponse;
