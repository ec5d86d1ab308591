mod client;
mod curl;
mod listing;
mod memory;

pub use client::{ConnectionSettings, RemoteOperation, RemoteTreeClient, DEFAULT_FTP_PORT};
pub use curl::{CommandRunner, CurlFtpClient};
pub use listing::parse_listing;
pub use memory::{MemoryRemote, RemoteCall};
