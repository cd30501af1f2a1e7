// Hub WebSocket fanout connections

pub mod manager;

pub use manager::ConnectionManager;
