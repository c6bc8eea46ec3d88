// fritzgast-api: Async TR-064 client for the Fritz!Box guest WLAN service

pub mod error;
pub mod session;
mod soap;
pub mod transport;
pub mod wlan;

pub use error::Error;
pub use session::{RetryConfig, Session, SessionConfig, SessionManager};
pub use wlan::{ActionRequest, ActionResult, Tr064Client, WlanInfo};
