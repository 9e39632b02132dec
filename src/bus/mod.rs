//! Message transports
//!
//! Messages arrive on a named topic, a Unix socket under the socket
//! directory, and optionally as lines on stdin. Both feed the same worker
//! queue.

pub mod socket;
pub mod stdin;

pub use socket::{publish, SocketLimits, Subscriber};
