pub mod server;
pub mod stdio_transport;
pub mod transport;
pub mod types;
