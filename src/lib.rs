//! Client/server toolkit for ZKTeco biometric terminals.
//!
//! Two communication models coexist: the binary TCP protocol driven
//! against a device's port 4370 ([`terminal`]), and the HTTP push
//! protocol where devices contact the server outbound ([`push`]).

pub mod bufpool;
pub mod config;
pub mod error;
pub mod logging;
pub mod proto;
pub mod push;
pub mod queue;
pub mod terminal;

pub use error::{Error, Result};
