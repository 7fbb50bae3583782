//! Push protocol server: devices contact the server outbound, poll for
//! queued commands and post correlated responses.

mod command;
pub mod consts;
mod device;
mod exchange;
pub mod payload;
mod server;

#[cfg(test)]
mod tests;

pub use command::{Command, CommandCallback, CommandResponse};
pub use consts::language_name;
pub use device::Device;
pub use exchange::ExchangeCommand;
pub use server::{NoopHook, Server, ServerHook, ServerOptions};
