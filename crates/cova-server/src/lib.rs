//! JSON-RPC 2.0 stdio front end for the Cova gateway.
//!
//! One request per line on stdin, one response per line on stdout. Logs go
//! to stderr so they never interleave with protocol traffic.

pub mod jsonrpc;
pub mod server;

pub use server::Server;
