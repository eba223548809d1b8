//! Fault injection between the marshaler and a link.
//!
//! Faults apply to responses, counted from zero in the order they are
//! received. A scheduled fault fires on exactly one response; random faults
//! fire with a fixed probability from a seeded RNG, so a failing run can be
//! replayed from its seed.

use std::collections::BTreeMap;

use atsha_core::{Link, TransportError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// What happens to one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The response never arrives
    Drop,
    /// One bit of the response is inverted
    FlipBit {
        /// Byte index, modulo the response length
        byte: usize,
        /// Bit index, modulo eight
        bit: u8,
    },
    /// Only the first `len` bytes arrive
    Truncate {
        /// Bytes delivered
        len: usize,
    },
}

/// [`Link`] wrapper that corrupts or drops responses.
#[derive(Debug)]
pub struct FaultyLink<L> {
    inner: L,
    schedule: BTreeMap<usize, Fault>,
    random: Option<(ChaCha8Rng, f64)>,
    responses: usize,
    injected: usize,
}

impl<L: Link> FaultyLink<L> {
    /// Wrap `inner` with no faults scheduled.
    pub fn new(inner: L) -> Self {
        Self { inner, schedule: BTreeMap::new(), random: None, responses: 0, injected: 0 }
    }

    /// Apply `fault` to response number `index`.
    #[must_use]
    pub fn with_fault(mut self, index: usize, fault: Fault) -> Self {
        self.schedule.insert(index, fault);
        self
    }

    /// Fault each unscheduled response with probability `rate`.
    #[must_use]
    pub fn with_random_faults(mut self, seed: u64, rate: f64) -> Self {
        self.random = Some((ChaCha8Rng::seed_from_u64(seed), rate.clamp(0.0, 1.0)));
        self
    }

    /// Number of faults injected so far.
    pub fn injected(&self) -> usize {
        self.injected
    }

    /// The wrapped link.
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// The wrapped link, mutably.
    pub fn inner_mut(&mut self) -> &mut L {
        &mut self.inner
    }

    fn next_fault(&mut self) -> Option<Fault> {
        let index = self.responses;
        self.responses += 1;

        if let Some(fault) = self.schedule.remove(&index) {
            return Some(fault);
        }
        let (rng, rate) = self.random.as_mut()?;
        if !rng.gen_bool(*rate) {
            return None;
        }
        Some(match rng.gen_range(0..3) {
            0 => Fault::Drop,
            1 => Fault::FlipBit { byte: rng.gen_range(0..64), bit: rng.gen_range(0..8) },
            _ => Fault::Truncate { len: rng.gen_range(0..4) },
        })
    }
}

impl<L: Link> Link for FaultyLink<L> {
    fn wake(&mut self) -> Result<(), TransportError> {
        self.inner.wake()
    }

    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        self.inner.send(packet)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        let Some(fault) = self.next_fault() else {
            return self.inner.receive(buffer);
        };
        self.injected += 1;
        tracing::debug!(?fault, response = self.responses - 1, "injecting fault");

        let len = self.inner.receive(buffer)?;
        match fault {
            Fault::Drop => Err(TransportError::link("response dropped")),
            Fault::FlipBit { byte, bit } => {
                if len > 0 {
                    buffer[byte % len] ^= 1 << (bit % 8);
                }
                Ok(len)
            },
            Fault::Truncate { len: keep } => Ok(len.min(keep)),
        }
    }

    fn idle(&mut self) -> Result<(), TransportError> {
        self.inner.idle()
    }

    fn sleep(&mut self) -> Result<(), TransportError> {
        self.inner.sleep()
    }
}

#[cfg(test)]
mod tests {
    use atsha_proto::{Command, Response};

    use super::*;
    use crate::{SimDevice, SimLink};

    fn link() -> SimLink {
        let mut link = SimLink::new(SimDevice::new(9));
        link.wake().unwrap();
        link
    }

    fn round_trip<L: Link>(link: &mut L) -> Result<Response, String> {
        link.send(&Command::dev_rev().to_packet().unwrap()).map_err(|e| e.to_string())?;
        let mut buffer = [0u8; 16];
        let len = link.receive(&mut buffer).map_err(|e| e.to_string())?;
        Response::parse(&buffer[..len]).map_err(|e| e.to_string())
    }

    #[test]
    fn scheduled_fault_hits_only_its_response() {
        let mut link = FaultyLink::new(link()).with_fault(1, Fault::Drop);

        assert!(round_trip(&mut link).is_ok());
        assert!(round_trip(&mut link).is_err());
        assert!(round_trip(&mut link).is_ok());
        assert_eq!(link.injected(), 1);
    }

    #[test]
    fn flipped_bit_fails_crc() {
        let mut link = FaultyLink::new(link()).with_fault(0, Fault::FlipBit { byte: 2, bit: 3 });
        assert!(round_trip(&mut link).unwrap_err().contains("crc"));
    }

    #[test]
    fn truncated_response_is_rejected() {
        let mut link = FaultyLink::new(link()).with_fault(0, Fault::Truncate { len: 3 });
        assert!(round_trip(&mut link).is_err());
    }

    #[test]
    fn random_faults_replay_from_seed() {
        let outcomes = |seed| {
            let mut link = FaultyLink::new(link()).with_random_faults(seed, 0.5);
            (0..32).map(|_| round_trip(&mut link).is_ok()).collect::<Vec<_>>()
        };
        assert_eq!(outcomes(3), outcomes(3));
    }
}
