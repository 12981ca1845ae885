//! Per-thread Dest lifecycle.
//!
//! Each thread that touches Dest owns one [`DestLifecycle`]. The object
//! only tracks the thread's own view (which bank it targets, whether it is
//! holding one); the cross-thread state lives in the semaphores or dvalid
//! bits that the emitted instructions drive.
//!
//! Contract violations (double acquire, release without acquire, wrong
//! side of the hand-off) are `debug_assert!`s. Release builds emit the
//! same instruction words and check nothing.

use super::bank::{max_tiles, BankSelect, DestBank, TileDims};
use super::handshake::Handshake;
use super::{DestClient, DstSync};
use crate::arch::{Arch, ArchSpec, HandshakeKind};
use crate::isa::params::{p_stall, p_zeroacc, semaphore};
use crate::isa::{ops, HostWait, InstructionSink};

use semaphore::{t6_sem, MATH_PACK};

/// One thread's side of the Dest hand-off.
#[derive(Debug, Clone)]
pub struct DestLifecycle {
    arch: Arch,
    client: DestClient,
    mode: DstSync,
    handshake: Handshake,
    bank: BankSelect,
    holding: Option<DestBank>,
    epochs: [u32; 2],
    initialized: bool,
}

impl DestLifecycle {
    pub fn new(arch: Arch, client: DestClient, mode: DstSync, handshake: Handshake) -> Self {
        debug_assert!(
            match &handshake {
                Handshake::Semaphore => matches!(client, DestClient::Math | DestClient::Pack),
                Handshake::DataValid(chain) => chain.contains(client),
            },
            "{} cannot take part in {:?}",
            client,
            handshake
        );
        Self {
            arch,
            client,
            mode,
            bank: BankSelect::new(mode, arch.spec()),
            handshake,
            holding: None,
            epochs: [0; 2],
            initialized: false,
        }
    }

    /// Lifecycle using the generation's native hand-off.
    ///
    /// Dvalid generations get the shortest chain (FPU to Pack).
    pub fn native(arch: Arch, client: DestClient, mode: DstSync) -> Self {
        let handshake = match arch.spec().handshake() {
            HandshakeKind::Semaphore => Handshake::Semaphore,
            HandshakeKind::DataValid => Handshake::DataValid(super::DvalidChain::fpu_pack()),
        };
        Self::new(arch, client, mode, handshake)
    }

    #[inline]
    pub fn arch(&self) -> Arch {
        self.arch
    }

    #[inline]
    pub fn client(&self) -> DestClient {
        self.client
    }

    #[inline]
    pub fn mode(&self) -> DstSync {
        self.mode
    }

    #[inline]
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Bank the next acquire will target.
    pub fn current_bank(&self) -> DestBank {
        let index = self.bank.index();
        DestBank {
            index,
            base_row: self.bank.base_row(),
            rows: self.bank.bank_rows(),
            owner: self.holding.map(|_| self.client),
            epoch: self.epochs[index as usize],
        }
    }

    /// Bank currently held, if any.
    pub fn held(&self) -> Option<DestBank> {
        self.holding
    }

    /// Tiles that fit in one bank.
    pub fn max_tiles(&self, fp32_accumulate: bool, dims: TileDims) -> u32 {
        max_tiles(self.arch.spec(), self.mode, fp32_accumulate, dims)
    }

    fn spec(&self) -> &'static dyn ArchSpec {
        self.arch.spec()
    }

    fn offset_reg(&self) -> u8 {
        if self.client == DestClient::Pack {
            self.spec().pack_dest_offset()
        } else {
            self.spec().math_dest_offset()
        }
    }

    // ========================================================================
    // Init
    // ========================================================================

    /// Reset the hand-off and point this thread at bank 0.
    pub fn sync_init<S: InstructionSink>(&mut self, sink: &mut S) {
        debug_assert!(self.holding.is_none(), "{}: sync_init while holding a bank", self.client);

        match &self.handshake {
            Handshake::Semaphore => {
                if !self.client.is_consumer() {
                    // The previous kernel's pack must have drained everything.
                    sink.host_wait(HostWait::SemaphoreZero { sem: MATH_PACK });
                    let max = self.mode.bank_count();
                    sink.issue(ops::seminit(max, 0, t6_sem(MATH_PACK)));
                }
            }
            Handshake::DataValid(chain) => {
                let reg = self.spec().dvalid_ctrl(self.client.bit_index());
                sink.issue(ops::setc16(reg, chain.control_word(self.mode == DstSync::Half)));
            }
        }

        self.bank.reset();
        self.epochs = [0; 2];
        sink.issue(ops::setc16(self.offset_reg(), 0));
        self.initialized = true;

        log::debug!(
            "{}: {} dest sync init ({:?}, {:?})",
            self.arch,
            self.client,
            self.mode,
            self.handshake
        );
    }

    // ========================================================================
    // Producer side
    // ========================================================================

    /// Block until the selected bank is free for this client to write.
    pub fn acquire_for_write<S: InstructionSink>(&mut self, sink: &mut S) -> DestBank {
        debug_assert!(self.initialized, "{}: acquire before sync_init", self.client);
        debug_assert!(!self.client.is_consumer(), "pack acquires for read");
        debug_assert!(
            self.holding.is_none(),
            "{}: acquire_for_write while already holding {}",
            self.client,
            self.current_bank()
        );

        match &self.handshake {
            Handshake::Semaphore => sink.issue(ops::semwait(
                p_stall::STALL_MATH | p_stall::STALL_SFPU | p_stall::STALL_SYNC,
                t6_sem(MATH_PACK),
                p_stall::STALL_ON_MAX,
            )),
            Handshake::DataValid(_) => sink.issue(ops::stallwait(
                self.client.stall_target(),
                p_stall::WAIT_DEST_DVALID,
            )),
        }
        self.take_bank()
    }

    /// Signal the next stage that the held bank is written.
    pub fn release_after_write<S: InstructionSink>(&mut self, sink: &mut S) {
        debug_assert!(!self.client.is_consumer(), "pack releases after read");
        let bank = self.give_back_bank();

        let done = self.done_waits();
        sink.issue(ops::stallwait(p_stall::STALL_SYNC, done));
        match &self.handshake {
            Handshake::Semaphore => sink.issue(ops::sempost(t6_sem(MATH_PACK))),
            Handshake::DataValid(_) => sink.issue(ops::cleardvalid(0, self.client.dvalid_bit(), 0)),
        }

        log::trace!("{}: released {} for read", self.client, bank);

        if self.mode == DstSync::Half {
            self.bank.flip();
            sink.issue(ops::stallwait(p_stall::STALL_CFG, done));
            sink.issue(ops::setc16(self.offset_reg(), self.bank.base_row() as u16));
        }
    }

    fn done_waits(&self) -> u32 {
        match self.client {
            DestClient::Unpack => p_stall::UNPACK0 | p_stall::UNPACK1,
            _ => p_stall::MATH | p_stall::WAIT_SFPU,
        }
    }

    // ========================================================================
    // Consumer side
    // ========================================================================

    /// Block until the producer has released the selected bank.
    pub fn acquire_for_read<S: InstructionSink>(&mut self, sink: &mut S) -> DestBank {
        debug_assert!(self.initialized, "{}: acquire before sync_init", self.client);
        debug_assert!(self.client.is_consumer(), "{} acquires for write", self.client);
        debug_assert!(
            self.holding.is_none(),
            "pack: acquire_for_read while already holding {}",
            self.current_bank()
        );

        match &self.handshake {
            Handshake::Semaphore => sink.issue(ops::semwait(
                p_stall::STALL_TDMA,
                t6_sem(MATH_PACK),
                p_stall::STALL_ON_ZERO,
            )),
            Handshake::DataValid(_) => {
                sink.issue(ops::stallwait(p_stall::STALL_PACK, p_stall::WAIT_DEST_DVALID))
            }
        }
        self.take_bank()
    }

    /// Clear the drained bank and hand it back to the producer.
    pub fn release_after_read<S: InstructionSink>(&mut self, sink: &mut S) {
        debug_assert!(self.client.is_consumer(), "{} releases after write", self.client);
        let bank = self.give_back_bank();

        sink.issue(ops::stallwait(p_stall::STALL_MATH, p_stall::PACK));
        let (clear_mode, section) = match self.mode {
            DstSync::Half => (p_zeroacc::CLR_HALF, bank.index as u32),
            DstSync::Full => (p_zeroacc::CLR_ALL, 0),
        };
        sink.issue(ops::zeroacc(clear_mode, 0, section));
        match &self.handshake {
            Handshake::Semaphore => sink.issue(ops::semget(t6_sem(MATH_PACK))),
            Handshake::DataValid(_) => sink.issue(ops::cleardvalid(0, self.client.dvalid_bit(), 0)),
        }

        log::trace!("pack: returned {}", bank);

        if self.mode == DstSync::Half {
            self.bank.flip();
            sink.issue(ops::setc16(self.offset_reg(), self.bank.base_row() as u16));
        }
    }

    // ========================================================================
    // Bookkeeping
    // ========================================================================

    fn take_bank(&mut self) -> DestBank {
        let index = self.bank.index() as usize;
        self.epochs[index] += 1;
        let bank = DestBank {
            index: self.bank.index(),
            base_row: self.bank.base_row(),
            rows: self.bank.bank_rows(),
            owner: Some(self.client),
            epoch: self.epochs[index],
        };
        self.holding = Some(bank);
        bank
    }

    fn give_back_bank(&mut self) -> DestBank {
        debug_assert!(
            self.holding.is_some(),
            "{}: release without acquire",
            self.client
        );
        let mut bank = self.holding.take().unwrap_or_else(|| self.current_bank());
        bank.owner = None;
        bank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dest::DvalidChain;
    use crate::isa::params::p_cleardvalid;
    use crate::isa::{Decoded, Opcode, ThreadOp, ThreadProgram};

    fn decoded(prog: &ThreadProgram) -> Vec<Decoded> {
        prog.instructions().map(|i| i.decode().unwrap()).collect()
    }

    fn pair(arch: Arch, mode: DstSync) -> (DestLifecycle, DestLifecycle) {
        (
            DestLifecycle::native(arch, DestClient::Math, mode),
            DestLifecycle::native(arch, DestClient::Pack, mode),
        )
    }

    #[test]
    fn test_semaphore_producer_init() {
        let mut math = DestLifecycle::new(Arch::WormholeB0, DestClient::Math, DstSync::Half, Handshake::Semaphore);
        let mut prog = ThreadProgram::new();
        math.sync_init(&mut prog);

        assert_eq!(
            prog.ops()[0],
            ThreadOp::HostWait(HostWait::SemaphoreZero { sem: MATH_PACK })
        );
        let d = decoded(&prog);
        assert_eq!(
            d[0],
            Decoded::SemInit { max: 2, init: 0, sem_sel: t6_sem(MATH_PACK) }
        );
        assert_eq!(
            d[1],
            Decoded::SetC16 { reg: Arch::WormholeB0.spec().math_dest_offset(), value: 0 }
        );
    }

    #[test]
    fn test_full_mode_semaphore_is_binary() {
        let mut math = DestLifecycle::new(Arch::Blackhole, DestClient::Math, DstSync::Full, Handshake::Semaphore);
        let mut prog = ThreadProgram::new();
        math.sync_init(&mut prog);
        assert!(matches!(decoded(&prog)[0], Decoded::SemInit { max: 1, .. }));
    }

    #[test]
    fn test_consumer_init_skips_seminit() {
        let mut pack = DestLifecycle::native(Arch::WormholeB0, DestClient::Pack, DstSync::Half);
        let mut prog = ThreadProgram::new();
        pack.sync_init(&mut prog);
        assert_eq!(prog.count_opcode(Opcode::SemInit), 0);
        assert_eq!(
            decoded(&prog),
            vec![Decoded::SetC16 { reg: Arch::WormholeB0.spec().pack_dest_offset(), value: 0 }]
        );
    }

    #[test]
    fn test_half_mode_scenario() {
        // A writes bank 0, then gets bank 1; B reads the bank A released.
        let (mut a, mut b) = pair(Arch::WormholeB0, DstSync::Half);
        let mut sink = ThreadProgram::new();
        a.sync_init(&mut sink);
        b.sync_init(&mut sink);

        let first = a.acquire_for_write(&mut sink);
        assert_eq!(first.index, 0);
        assert_eq!(first.owner, Some(DestClient::Math));
        a.release_after_write(&mut sink);

        let second = a.acquire_for_write(&mut sink);
        assert_eq!(second.index, 1);
        assert_eq!(second.base_row, 512);

        let read = b.acquire_for_read(&mut sink);
        assert_eq!(read.index, first.index);
        assert_eq!(read.base_row, 0);
    }

    #[test]
    fn test_writes_alternate_banks() {
        let (mut math, mut pack) = pair(Arch::Blackhole, DstSync::Half);
        let mut sink = ThreadProgram::new();
        math.sync_init(&mut sink);
        pack.sync_init(&mut sink);

        for i in 0..6u32 {
            let w = math.acquire_for_write(&mut sink);
            math.release_after_write(&mut sink);
            let r = pack.acquire_for_read(&mut sink);
            pack.release_after_read(&mut sink);
            assert_eq!(w.index as u32, i % 2);
            assert_eq!(r.index, w.index);
            assert_eq!(r.epoch, w.epoch);
        }
    }

    #[test]
    fn test_full_mode_never_flips() {
        let (mut math, mut pack) = pair(Arch::WormholeB0, DstSync::Full);
        let mut sink = ThreadProgram::new();
        math.sync_init(&mut sink);
        pack.sync_init(&mut sink);
        for _ in 0..3 {
            assert_eq!(math.acquire_for_write(&mut sink).index, 0);
            math.release_after_write(&mut sink);
            assert_eq!(pack.acquire_for_read(&mut sink).rows, 1024);
            pack.release_after_read(&mut sink);
        }
        assert_eq!(sink.count_opcode(Opcode::SetC16), 2);
    }

    #[test]
    fn test_release_after_write_words() {
        let mut math = DestLifecycle::native(Arch::WormholeB0, DestClient::Math, DstSync::Half);
        let mut sink = ThreadProgram::new();
        math.sync_init(&mut sink);
        math.acquire_for_write(&mut sink);
        sink.take();
        math.release_after_write(&mut sink);

        let wh = Arch::WormholeB0.spec();
        assert_eq!(
            decoded(&sink),
            vec![
                Decoded::StallWait {
                    stall_res: p_stall::STALL_SYNC,
                    wait_res: p_stall::MATH | p_stall::WAIT_SFPU
                },
                Decoded::SemPost { sem_sel: t6_sem(MATH_PACK) },
                Decoded::StallWait {
                    stall_res: p_stall::STALL_CFG,
                    wait_res: p_stall::MATH | p_stall::WAIT_SFPU
                },
                Decoded::SetC16 { reg: wh.math_dest_offset(), value: 512 },
            ]
        );
    }

    #[test]
    fn test_release_after_read_clears_half() {
        let mut pack = DestLifecycle::native(Arch::WormholeB0, DestClient::Pack, DstSync::Half);
        let mut sink = ThreadProgram::new();
        pack.sync_init(&mut sink);
        pack.acquire_for_read(&mut sink);
        sink.take();
        pack.release_after_read(&mut sink);

        let d = decoded(&sink);
        assert_eq!(
            d[0],
            Decoded::StallWait { stall_res: p_stall::STALL_MATH, wait_res: p_stall::PACK }
        );
        assert_eq!(
            d[1],
            Decoded::ZeroAcc { clear_mode: p_zeroacc::CLR_HALF, addr_mode: 0, dst: 0 }
        );
        assert_eq!(d[2], Decoded::SemGet { sem_sel: t6_sem(MATH_PACK) });
        assert_eq!(
            d[3],
            Decoded::SetC16 { reg: Arch::WormholeB0.spec().pack_dest_offset(), value: 512 }
        );
    }

    #[test]
    fn test_dvalid_chain_words() {
        let chain = DvalidChain::fpu_sfpu_pack();
        let mut sfpu = DestLifecycle::new(
            Arch::Quasar,
            DestClient::Sfpu,
            DstSync::Half,
            Handshake::DataValid(chain.clone()),
        );
        let mut sink = ThreadProgram::new();
        sfpu.sync_init(&mut sink);
        sfpu.acquire_for_write(&mut sink);
        sfpu.release_after_write(&mut sink);

        let q = Arch::Quasar.spec();
        let d = decoded(&sink);
        assert_eq!(
            d[0],
            Decoded::SetC16 { reg: q.dvalid_ctrl(2), value: chain.control_word(true) }
        );
        assert_eq!(
            d[2],
            Decoded::StallWait { stall_res: p_stall::STALL_SFPU, wait_res: p_stall::WAIT_DEST_DVALID }
        );
        assert!(d.contains(&Decoded::ClearDvalid {
            src_clear: 0,
            dest_done: p_cleardvalid::SFPU,
            reset: 0
        }));
        assert_eq!(sink.count_opcode(Opcode::SemPost), 0);
    }

    #[test]
    fn test_native_handshake_follows_arch() {
        let q = DestLifecycle::native(Arch::Quasar, DestClient::Math, DstSync::Half);
        assert_eq!(q.handshake().kind(), HandshakeKind::DataValid);
        let wh = DestLifecycle::native(Arch::WormholeB0, DestClient::Math, DstSync::Half);
        assert_eq!(wh.handshake(), &Handshake::Semaphore);
    }

    #[test]
    fn test_max_tiles_matches_mode() {
        let math = DestLifecycle::native(Arch::WormholeB0, DestClient::Math, DstSync::Half);
        assert_eq!(math.max_tiles(false, TileDims::Tile32x32), 8);
        assert_eq!(math.max_tiles(true, TileDims::Tile32x32), 4);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "already holding")]
    fn test_double_acquire_asserts_in_debug() {
        let mut math = DestLifecycle::native(Arch::WormholeB0, DestClient::Math, DstSync::Half);
        let mut sink = ThreadProgram::new();
        math.sync_init(&mut sink);
        math.acquire_for_write(&mut sink);
        math.acquire_for_write(&mut sink);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "release without acquire")]
    fn test_release_without_acquire_asserts_in_debug() {
        let mut math = DestLifecycle::native(Arch::WormholeB0, DestClient::Math, DstSync::Half);
        let mut sink = ThreadProgram::new();
        math.sync_init(&mut sink);
        math.release_after_write(&mut sink);
    }
}
