//! Dentro
//!
//! The `dentro` CLI and the `dentro-server` row store share this library.

pub mod server;
