pub mod connection;

pub use connection::ConnectionStage;
