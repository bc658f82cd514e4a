pub mod relay;
pub mod tcp_transport;
