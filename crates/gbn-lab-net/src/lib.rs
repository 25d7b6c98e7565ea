pub mod config;
pub mod driver;
pub mod error;
pub mod transport;

pub use config::NetConfig;
pub use driver::{Endpoint, Role, receiver_endpoint, run_receiver, run_sender};
pub use error::NetError;
pub use transport::UdpTransport;
