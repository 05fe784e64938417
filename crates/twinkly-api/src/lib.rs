// twinkly-api: Async Rust client for the Twinkly xled/v1 control API

pub mod client;
pub mod error;
pub mod models;
pub mod session;
pub mod transport;

pub use client::DeviceClient;
pub use error::Error;
pub use models::{
    BrokerAddress, CODE_OK, DeviceDescriptor, DeviceRequest, DeviceResponse, Generation,
    HardwareAddress, InvalidBrokerAddress, InvalidHardwareAddress, LedMode, methods,
};
pub use session::{Session, SessionState};
pub use transport::{Scheme, TransportConfig};
