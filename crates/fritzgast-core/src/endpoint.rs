// Seam between the reconciler and the protocol client.

use fritzgast_api::{Error, Tr064Client};

/// Read/write access to the guest WLAN of one device.
///
/// `Tr064Client` is the production implementation; tests substitute a
/// simulated router to exercise the reconciliation contract without a
/// network.
#[allow(async_fn_in_trait)]
pub trait GuestWlanEndpoint {
    /// One state read against the device.
    async fn read_enabled(&self) -> Result<bool, Error>;

    /// One state write. Acknowledgement does not imply the new state is
    /// observable yet.
    async fn write_enabled(&self, enable: bool) -> Result<(), Error>;

    /// Read the guest network SSID.
    async fn read_ssid(&self) -> Result<String, Error>;
}

impl GuestWlanEndpoint for Tr064Client {
    async fn read_enabled(&self) -> Result<bool, Error> {
        Ok(self.get_info().await?.enabled)
    }

    async fn write_enabled(&self, enable: bool) -> Result<(), Error> {
        self.set_enable(enable).await
    }

    async fn read_ssid(&self) -> Result<String, Error> {
        self.get_ssid().await
    }
}
