pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod functions;
pub mod operation;
pub mod reply;
pub mod request;
pub mod server;
pub mod session;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
