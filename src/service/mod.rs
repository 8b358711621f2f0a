//! Proxy service layer: the TCP server, per-connection sessions, and the
//! interception gate collaborators plug into.

pub mod gate;
pub mod server;
pub mod session;

pub use gate::{AllowAll, Gate};
pub use server::ProxyServer;
pub use session::{Session, SessionSet};
