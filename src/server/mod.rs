//! Socket front end
//!
//! Serves the session API over a Unix domain socket with length-prefixed
//! JSON frames. `routes` maps requests onto sessions, `protocol` owns the
//! wire format, `listener` runs the accept loop.

pub mod listener;
pub mod protocol;
pub mod routes;

pub use listener::serve;
pub use protocol::{Request, Response};
pub use routes::ChatService;
