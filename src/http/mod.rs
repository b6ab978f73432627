// HTTP module: server plus re-exported composition interfaces.

pub mod server;

pub use server::{HttpServer, Server};

// Common interfaces used when composing the server.
pub use crate::controller::Controller;
pub use crate::middleware::Middleware;
