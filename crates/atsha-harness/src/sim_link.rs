//! Byte-level link to a [`SimDevice`].
//!
//! Parses command packets the way the device's receive path does: a packet
//! failing the count or CRC check is answered with a communication error
//! status instead of being executed.

use atsha_core::{Link, TransportError};
use atsha_proto::{Command, DeviceStatus, Response};

use crate::sim_device::SimDevice;

/// [`Link`] that delivers packets to an in-memory device.
#[derive(Debug)]
pub struct SimLink {
    device: SimDevice,
    awake: bool,
    pending: Option<Response>,
    sent: usize,
}

impl SimLink {
    /// Link to `device`, which starts asleep.
    pub fn new(device: SimDevice) -> Self {
        Self { device, awake: false, pending: None, sent: 0 }
    }

    /// The device behind the link.
    pub fn device(&self) -> &SimDevice {
        &self.device
    }

    /// The device behind the link, mutably.
    pub fn device_mut(&mut self) -> &mut SimDevice {
        &mut self.device
    }

    /// Number of packets delivered so far.
    pub fn packets_sent(&self) -> usize {
        self.sent
    }

    /// Whether the device is awake.
    pub fn is_awake(&self) -> bool {
        self.awake
    }
}

impl Link for SimLink {
    fn wake(&mut self) -> Result<(), TransportError> {
        self.awake = true;
        Ok(())
    }

    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        if !self.awake {
            return Err(TransportError::link("device asleep"));
        }
        self.sent += 1;

        let response = match Command::from_packet(packet) {
            Ok(command) => self.device.respond(&command),
            Err(err) => {
                tracing::debug!(error = %err, "simulated device received a bad packet");
                Response::from_status(DeviceStatus::CommunicationError)
            },
        };
        self.pending = Some(response);
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        let response = self.pending.take().ok_or_else(|| TransportError::link("no response pending"))?;
        let bytes = response.as_bytes();
        let len = bytes.len().min(buffer.len());
        buffer[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    fn idle(&mut self) -> Result<(), TransportError> {
        self.awake = false;
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), TransportError> {
        self.awake = false;
        self.device.sleep();
        Ok(())
    }
}
