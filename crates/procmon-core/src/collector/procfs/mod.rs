//! Stats provider backed by the Linux `/proc` filesystem.

pub mod parser;
mod provider;

pub use parser::ParseError;
pub use provider::{NetIoCounters, ProcessSample, ProcfsStats};
