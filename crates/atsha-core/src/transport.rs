//! Boundary between protocol logic and the wire.
//!
//! ```text
//!   Device / protocol runs
//!            │  Command
//!            ▼
//!   CommandExecutor ── Marshaler<L> ── frames, CRC-checks, maps status
//!                            │  bytes
//!                            ▼
//!                          Link ── wake / send / receive / idle / sleep
//! ```
//!
//! Protocol code only sees [`CommandExecutor`]. The device keeps TempKey
//! across idle but loses it on sleep, so a run must finish before the link
//! is put to sleep.

use atsha_proto::{Command, DeviceStatus, Response};

use crate::error::TransportError;

/// Executes one command and returns the parsed response.
///
/// Implementations must not retry on their own; a retried command can
/// change device TempKey state behind the caller's back.
pub trait CommandExecutor {
    /// Send `command` and wait for its response.
    fn execute(&mut self, command: &Command) -> Result<Response, TransportError>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for &mut T {
    fn execute(&mut self, command: &Command) -> Result<Response, TransportError> {
        (**self).execute(command)
    }
}

/// Raw byte link to one device.
pub trait Link {
    /// Bring the device out of sleep or idle.
    fn wake(&mut self) -> Result<(), TransportError>;

    /// Transmit a complete command packet.
    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError>;

    /// Receive a response packet into `buffer`, returning the bytes read.
    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError>;

    /// Put the device in idle. TempKey is retained.
    fn idle(&mut self) -> Result<(), TransportError>;

    /// Put the device to sleep. TempKey is lost.
    fn sleep(&mut self) -> Result<(), TransportError>;
}

/// [`CommandExecutor`] over a [`Link`].
///
/// Wakes the device before the first command after construction, idle or
/// sleep. Responses are CRC-checked, and a bare status packet carrying
/// anything but success becomes [`TransportError::Device`].
#[derive(Debug)]
pub struct Marshaler<L> {
    link: L,
    awake: bool,
}

impl<L: Link> Marshaler<L> {
    /// Wrap `link`. The device is assumed asleep.
    pub fn new(link: L) -> Self {
        Self { link, awake: false }
    }

    /// Underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Underlying link, mutably.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Release the link.
    pub fn into_inner(self) -> L {
        self.link
    }

    /// Wake the device now rather than on the next command.
    pub fn wake(&mut self) -> Result<(), TransportError> {
        self.link.wake()?;
        self.awake = true;
        Ok(())
    }

    /// Idle the device, keeping its TempKey.
    pub fn idle(&mut self) -> Result<(), TransportError> {
        self.awake = false;
        self.link.idle()
    }

    /// Put the device to sleep, discarding its TempKey.
    pub fn sleep(&mut self) -> Result<(), TransportError> {
        self.awake = false;
        self.link.sleep()
    }
}

impl<L: Link> CommandExecutor for Marshaler<L> {
    fn execute(&mut self, command: &Command) -> Result<Response, TransportError> {
        let packet = command.to_packet()?;
        if !self.awake {
            self.wake()?;
        }

        tracing::trace!(opcode = ?command.opcode(), tx = packet.len(), "sending command");
        self.link.send(&packet)?;

        let mut buffer = vec![0u8; command.rx_size()];
        let received = self.link.receive(&mut buffer)?;
        let response = Response::parse(&buffer[..received.min(buffer.len())])?;

        if let Some(status) = response.status()
            && status != DeviceStatus::Success.to_u8()
        {
            tracing::debug!(opcode = ?command.opcode(), status, "device returned error status");
            return Err(TransportError::Device { status });
        }
        Ok(response)
    }
}
