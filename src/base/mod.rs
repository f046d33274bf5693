//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): the error type shared by every operation
//! - [`IoResultExt`](context::IoResultExt): context helpers for IO errors

pub mod context;
pub mod neterror;
