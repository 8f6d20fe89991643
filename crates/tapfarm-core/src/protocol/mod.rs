//! The minitouch text protocol.
//!
//! minitouch speaks a line-oriented protocol over a forwarded TCP socket.
//! On connect the server sends a three-line handshake describing the touch
//! panel; after that the client streams command lines at it. Both halves
//! live here: [`handshake`] parses the server's greeting, [`script`] builds
//! the command batches the client sends.

pub mod handshake;
pub mod script;
