// fritzgast-core: guest WiFi control logic between fritzgast-api and the web layer.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod facade;
pub mod model;
pub mod reconcile;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::DeviceConfig;
pub use endpoint::GuestWlanEndpoint;
pub use error::{ReconcileError, ServiceUnavailable};
pub use facade::GuestWifi;
pub use model::{DeviceState, GuestWifiInfo};
pub use reconcile::{ReconcileConfig, Reconciler};
