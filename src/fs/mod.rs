//! File helpers.
//!
//! - [`SendfileTransfer`]: zero-copy, resumable transfer of a file range to a
//!   [`Connection`](crate::net::Connection)

pub mod sendfile;

pub use sendfile::SendfileTransfer;
