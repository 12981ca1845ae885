//! Hand-off tokens.
//!
//! Wormhole and Blackhole pass Dest banks between math and pack with one
//! counting semaphore. Quasar generalises this into a chain of dvalid
//! clients where each stage hands a bank to the next one in hardware
//! order (Unpack, FPU, SFPU, Pack).

use super::DestClient;
use crate::arch::HandshakeKind;
use smallvec::SmallVec;
use std::fmt;

/// Chain control word bit marking Half (double-buffered) mode.
pub const DVALID_CTRL_HALF: u16 = 1 << 4;

/// Ordered dvalid client chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DvalidChain {
    clients: SmallVec<[DestClient; 4]>,
}

impl DvalidChain {
    /// Build a chain from any ordering of clients; hardware order wins.
    pub fn new(clients: &[DestClient]) -> Self {
        let mut v: SmallVec<[DestClient; 4]> = DestClient::ALL
            .iter()
            .copied()
            .filter(|c| clients.contains(c))
            .collect();
        v.dedup();
        debug_assert!(v.len() >= 2, "a dvalid chain needs a producer and a consumer");
        Self { clients: v }
    }

    /// Chain from a client bitmask (`p_cleardvalid` bits).
    pub fn from_mask(mask: u32) -> Self {
        let clients: SmallVec<[DestClient; 4]> = DestClient::ALL
            .iter()
            .copied()
            .filter(|c| mask & c.dvalid_bit() != 0)
            .collect();
        Self { clients }
    }

    /// FPU to Pack.
    pub fn fpu_pack() -> Self {
        Self::new(&[DestClient::Math, DestClient::Pack])
    }

    /// FPU to SFPU to Pack.
    pub fn fpu_sfpu_pack() -> Self {
        Self::new(&[DestClient::Math, DestClient::Sfpu, DestClient::Pack])
    }

    /// Unpack-to-dest, then FPU, then Pack.
    pub fn unpack_fpu_pack() -> Self {
        Self::new(&[DestClient::Unpack, DestClient::Math, DestClient::Pack])
    }

    pub fn clients(&self) -> &[DestClient] {
        &self.clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, client: DestClient) -> bool {
        self.clients.contains(&client)
    }

    /// Stage number of `client`.
    pub fn position(&self, client: DestClient) -> Option<usize> {
        self.clients.iter().position(|&c| c == client)
    }

    /// Client that hands banks to `client`.
    pub fn predecessor(&self, client: DestClient) -> Option<DestClient> {
        let pos = self.position(client)?;
        let prev = (pos + self.clients.len() - 1) % self.clients.len();
        Some(self.clients[prev])
    }

    /// Client that receives banks from `client`.
    pub fn successor(&self, client: DestClient) -> Option<DestClient> {
        let pos = self.position(client)?;
        Some(self.clients[(pos + 1) % self.clients.len()])
    }

    /// First stage, which writes a fresh bank.
    pub fn head(&self) -> Option<DestClient> {
        self.clients.first().copied()
    }

    /// Membership bitmask.
    pub fn mask(&self) -> u32 {
        self.clients.iter().fold(0, |m, c| m | c.dvalid_bit())
    }

    /// Control word committed by each member at sync init.
    pub fn control_word(&self, half: bool) -> u16 {
        let mut word = self.mask() as u16;
        if half {
            word |= DVALID_CTRL_HALF;
        }
        word
    }
}

impl fmt::Display for DvalidChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.clients.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Hand-off token used by a lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Math posts, pack consumes; counted up to the bank count.
    Semaphore,
    /// Per-client dvalid chain.
    DataValid(DvalidChain),
}

impl Handshake {
    pub fn kind(&self) -> HandshakeKind {
        match self {
            Handshake::Semaphore => HandshakeKind::Semaphore,
            Handshake::DataValid(_) => HandshakeKind::DataValid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_uses_hardware_order() {
        let chain = DvalidChain::new(&[DestClient::Pack, DestClient::Sfpu, DestClient::Math]);
        assert_eq!(chain.clients(), &[DestClient::Math, DestClient::Sfpu, DestClient::Pack]);
        assert_eq!(chain.to_string(), "math -> sfpu -> pack");
    }

    #[test]
    fn test_neighbours_wrap() {
        let chain = DvalidChain::fpu_sfpu_pack();
        assert_eq!(chain.successor(DestClient::Math), Some(DestClient::Sfpu));
        assert_eq!(chain.successor(DestClient::Pack), Some(DestClient::Math));
        assert_eq!(chain.predecessor(DestClient::Math), Some(DestClient::Pack));
        assert_eq!(chain.predecessor(DestClient::Unpack), None);
        assert_eq!(chain.head(), Some(DestClient::Math));
    }

    #[test]
    fn test_mask_round_trip() {
        let chain = DvalidChain::unpack_fpu_pack();
        assert_eq!(chain.mask(), 0b1011);
        assert_eq!(DvalidChain::from_mask(chain.mask()), chain);
        assert_eq!(chain.control_word(true), 0b1_1011);
        assert_eq!(chain.control_word(false), 0b1011);
    }

    #[test]
    fn test_handshake_kind() {
        assert_eq!(Handshake::Semaphore.kind(), HandshakeKind::Semaphore);
        assert_eq!(
            Handshake::DataValid(DvalidChain::fpu_pack()).kind(),
            HandshakeKind::DataValid
        );
    }
}
