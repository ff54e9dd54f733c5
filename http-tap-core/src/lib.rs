//! Core types for http-tap.
//!
//! This crate provides the shared, I/O-free pieces used by the client
//! (`http-tap`) and by anything that consumes its request logs.
//!
//! ## Modules
//!
//! - `error`: Error-chain flattening and the reserved synthetic status code
//! - `timing`: The `begin-time` / `end-time` side channel
//! - `log`: The [`RequestLog`] record

mod error;
mod log;
mod timing;

pub use error::*;
pub use log::*;
pub use timing::*;
