pub mod app;
pub mod arq;
pub mod channel;
pub mod clock;
pub mod config;
pub mod error;
pub mod fault;
pub mod packet;
pub mod report;
pub mod retry;
pub mod session;

#[cfg(test)]
mod test;

pub use arq::Method;
pub use error::{Error, Result};
pub use session::{Receiver, Sender, SessionOptions, TransferStats};
