//! Talking to the switch: remote command execution and output parsing.

pub mod parser;
pub mod ssh;

pub use parser::parse_port_data;
pub use ssh::{SshExecutor, SshOptions};
