//! The simulated core: four threads around shared state.
//!
//! Each step gives every loaded, unfinished thread one chance to advance,
//! in thread order. A step in which no thread advances means the run can
//! never finish; the core then works out whether the blocked threads form
//! a cycle ([`SimError::Deadlock`]) or simply wait on nobody
//! ([`SimError::Stalled`]).

use super::deadlock::{DeadlockDetector, WaitTarget};
use super::execute::{Progress, Shared};
use super::hazard::DestHazard;
use super::regs::{DestFile, Face, Rwc, SrcFile};
use super::stats::{StatsSummary, ThreadStats};
use super::sync::{DvalidState, Semaphore, SemaphoreStats};
use super::thread::ThreadState;
use super::{RunSummary, SimError};
use crate::addrmod::{AddrMod, AddrModPack, AddrModSlot};
use crate::arch::Arch;
use crate::config::{Config, SimConfig};
use crate::dest::DvalidChain;
use crate::isa::params::semaphore::t6_sem;
use crate::isa::{Decoded, Instr, Opcode, ThreadProgram};
use crate::mop::MopConfig;
use crate::thread::ThreadId;

/// Simulated Tensix core.
pub struct TensixCore {
    shared: Shared,
    threads: Vec<ThreadState>,
    detector: DeadlockDetector,
}

impl TensixCore {
    pub fn new(config: SimConfig) -> Self {
        let capacity = config.arch.spec().replay_capacity();
        let threads = ThreadId::ALL
            .iter()
            .map(|&id| ThreadState::new(id, capacity))
            .collect();
        let mut detector = DeadlockDetector::new();
        detector.set_enabled(config.deadlock_detection);

        log::debug!("{}: new core ({:?})", config.arch, config);

        Self {
            shared: Shared::new(config),
            threads,
            detector,
        }
    }

    /// Default configuration for `arch`.
    pub fn for_arch(arch: Arch) -> Self {
        Self::new(SimConfig::for_arch(arch))
    }

    /// Configuration from files and environment.
    pub fn from_global() -> Self {
        Self::new(Config::get().sim_config())
    }

    pub fn arch(&self) -> Arch {
        self.shared.arch
    }

    pub fn config(&self) -> &SimConfig {
        &self.shared.config
    }

    /// Append `program` to a thread.
    pub fn load(&mut self, thread: ThreadId, program: ThreadProgram) -> Result<(), SimError> {
        if !thread.exists_on(self.shared.arch) {
            return Err(SimError::NoSuchThread {
                thread,
                arch: self.shared.arch,
            });
        }
        log::debug!("{}: loaded {} ops", thread, program.len());
        self.threads[thread.index()].load(program);
        Ok(())
    }

    /// True once every thread has drained its stream.
    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(ThreadState::is_finished)
    }

    pub fn steps(&self) -> u64 {
        self.shared.step
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Advance every runnable thread by one op. Returns false if none could.
    pub fn step(&mut self) -> Result<bool, SimError> {
        self.shared.step += 1;
        let step = self.shared.step;
        let mut progressed = false;

        for t in self.threads.iter_mut() {
            if !t.is_loaded() || t.is_finished() {
                continue;
            }
            match self.shared.step_thread(t)? {
                Progress::Ran => {
                    progressed = true;
                    if t.waiting.take().is_some() {
                        self.detector.end_wait(t.id);
                    }
                    if t.is_finished() {
                        t.stats.finished_at = Some(step);
                        log::debug!("{}: finished at step {}", t.id, step);
                    }
                }
                Progress::Blocked(target) => {
                    t.stats.stall_steps += 1;
                    if t.waiting != Some(target) {
                        self.detector.start_wait(t.id, target);
                        t.waiting = Some(target);
                    }
                }
            }
        }

        Ok(progressed)
    }

    /// Run until every thread finishes.
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        loop {
            if self.is_finished() {
                let summary = RunSummary {
                    steps: self.shared.step,
                    stats: self.summary(),
                    hazards: self.shared.hazards.hazards().len(),
                };
                log::debug!("run complete:\n{}", summary);
                return Ok(summary);
            }
            if self.shared.step >= self.shared.config.max_steps {
                return Err(SimError::StepLimit {
                    steps: self.shared.step,
                });
            }
            if !self.step()? {
                return Err(self.diagnose());
            }
        }
    }

    /// Explain why no thread can move.
    fn diagnose(&mut self) -> SimError {
        let blocked: Vec<(ThreadId, WaitTarget)> = self
            .threads
            .iter()
            .filter_map(|t| t.waiting.map(|w| (t.id, w)))
            .collect();

        if self.detector.is_enabled() {
            self.detector.clear_signalers();
            for t in self.threads.iter().filter(|t| !t.is_finished()) {
                let pending = t.pending();
                for &(_, target) in &blocked {
                    if pending.iter().any(|d| unblocks(&self.shared.dvalid, d, target)) {
                        self.detector.record_signaler(t.id, target);
                    }
                }
            }
            if let Some(cycle) = self.detector.detect_deadlock() {
                log::warn!("deadlock at step {}: {}", self.shared.step, cycle);
                return SimError::Deadlock(cycle.clone());
            }
        }

        log::warn!("stalled at step {} with {} threads blocked", self.shared.step, blocked.len());
        SimError::Stalled(blocked)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    fn thread(&self, id: ThreadId) -> &ThreadState {
        &self.threads[id.index()]
    }

    /// Instructions a thread executed, in order.
    pub fn trace(&self, thread: ThreadId) -> &[Instr] {
        self.thread(thread).trace()
    }

    pub fn count_executed(&self, thread: ThreadId, opcode: Opcode) -> usize {
        self.trace(thread)
            .iter()
            .filter(|i| i.opcode() == Some(opcode))
            .count()
    }

    pub fn cfg_reg(&self, thread: ThreadId, reg: u8) -> u16 {
        self.thread(thread).cfg(reg)
    }

    /// Math address mode as committed to a thread's registers.
    pub fn addr_mod(&self, thread: ThreadId, slot: AddrModSlot) -> AddrMod {
        let t = self.thread(thread);
        AddrMod::read_back(slot, self.shared.arch.spec(), |r| t.cfg(r))
    }

    pub fn addr_mod_pack(&self, thread: ThreadId, slot: AddrModSlot) -> AddrModPack {
        let t = self.thread(thread);
        AddrModPack::read_back(slot, self.shared.arch.spec(), |r| t.cfg(r))
    }

    pub fn mop_config(&self, thread: ThreadId) -> &MopConfig {
        self.thread(thread).mop_config()
    }

    pub fn replay_memory(&self, thread: ThreadId) -> &[Instr] {
        self.thread(thread).replay_memory()
    }

    pub fn rwc(&self, thread: ThreadId) -> &Rwc {
        &self.thread(thread).rwc
    }

    pub fn semaphore(&self, index: u8) -> Semaphore {
        self.shared.sems.get(index)
    }

    pub fn semaphore_stats(&self, index: u8) -> &SemaphoreStats {
        self.shared.sems.stats(index)
    }

    pub fn dvalid(&self) -> &DvalidState {
        &self.shared.dvalid
    }

    pub fn dest(&self) -> &DestFile {
        &self.shared.dest
    }

    pub fn dest_mut(&mut self) -> &mut DestFile {
        &mut self.shared.dest
    }

    /// SrcA contents, for the unpacker's role.
    pub fn srca_mut(&mut self) -> &mut SrcFile {
        &mut self.shared.srca
    }

    pub fn srcb_mut(&mut self) -> &mut SrcFile {
        &mut self.shared.srcb
    }

    /// Faces pack has read out of Dest, in order.
    pub fn packed(&self) -> &[Face] {
        &self.shared.packed
    }

    pub fn hazards(&self) -> &[DestHazard] {
        self.shared.hazards.hazards()
    }

    pub fn detector(&self) -> &DeadlockDetector {
        &self.detector
    }

    pub fn thread_stats(&self, thread: ThreadId) -> &ThreadStats {
        &self.thread(thread).stats
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::collect(
            self.shared.step,
            self.threads
                .iter()
                .filter(|t| t.is_loaded())
                .map(|t| (t.id, &t.stats)),
            self.shared.sems.all_stats(),
        )
    }
}

/// True if executing `decoded` could satisfy `target`.
fn unblocks(dvalid: &DvalidState, decoded: &Decoded, target: WaitTarget) -> bool {
    match (target, *decoded) {
        (
            WaitTarget::SemaphoreDown(s),
            Decoded::SemGet { sem_sel } | Decoded::SemInit { sem_sel, .. },
        ) => sem_sel & t6_sem(s) != 0,
        (
            WaitTarget::SemaphoreUp(s),
            Decoded::SemPost { sem_sel } | Decoded::SemInit { sem_sel, .. },
        ) => sem_sel & t6_sem(s) != 0,
        (WaitTarget::DestValid(client), Decoded::ClearDvalid { dest_done, reset, .. }) => {
            let chain_mask = dvalid.chain().map_or(0, DvalidChain::mask);
            let owner = dvalid.owner(dvalid.bank_of(client));
            reset & chain_mask != 0 || owner.is_some_and(|o| dest_done & o.dvalid_bit() != 0)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::tensix_spec::{DEST_COLUMNS, MOP_MAX_UNPACK_COUNT};
    use crate::dest::{DestClient, DestLifecycle, DstSync, Handshake};
    use crate::isa::params::{p_mop, p_stall, semaphore};
    use crate::isa::{ops, InstructionSink};
    use crate::kernels::{
        run_eltwise_tiles, run_pack_tiles, run_reduce_tiles, EltwiseBinary, EltwiseBinaryType, PackTile,
        ReduceMax, TensorShape,
    };
    use crate::mop::{MopCountError, MopTemplate, UnpackMopTemplate};
    use crate::replay::ReplayPartition;
    use crate::sim::hazard::HazardKind;
    use crate::sim::regs::Row;
    use crate::thread::ThreadContext;

    const TILE_ROWS: usize = 64;

    /// Src rows for `tiles` tiles, every element of tile k equal to `k + offset`.
    fn tile_rows(tiles: u32, offset: f32) -> Vec<Row> {
        (0..tiles)
            .flat_map(|k| std::iter::repeat([k as f32 + offset; DEST_COLUMNS]).take(TILE_ROWS))
            .collect()
    }

    fn math_add(arch: Arch, dest: &mut DestLifecycle, batches: u32, tiles: u32) -> ThreadProgram {
        let mut math = ThreadContext::new(ThreadId::Math, arch);
        dest.sync_init(&mut math);
        let add = EltwiseBinary::new(EltwiseBinaryType::Add, TensorShape::TILE_32X32);
        add.init(&mut math);
        for _ in 0..batches {
            run_eltwise_tiles(&mut math, dest, &add, tiles);
        }
        math.finish()
    }

    fn pack(arch: Arch, dest: &mut DestLifecycle, batches: u32, tiles: u32) -> ThreadProgram {
        let mut packer = ThreadContext::new(ThreadId::Pack, arch);
        dest.sync_init(&mut packer);
        let kernel = PackTile::new(TensorShape::TILE_32X32);
        kernel.init(&mut packer);
        for _ in 0..batches {
            run_pack_tiles(&mut packer, dest, &kernel, tiles);
        }
        packer.finish()
    }

    fn add_pipeline(arch: Arch, mode: DstSync, batches: u32, tiles: u32) -> TensixCore {
        let mut math_dest = DestLifecycle::native(arch, DestClient::Math, mode);
        let mut pack_dest = DestLifecycle::native(arch, DestClient::Pack, mode);

        let mut core = TensixCore::for_arch(arch);
        core.srca_mut().load(&tile_rows(batches * tiles, 1.0));
        core.srcb_mut().fill(0.5);
        core.load(ThreadId::Math, math_add(arch, &mut math_dest, batches, tiles))
            .unwrap();
        core.load(ThreadId::Pack, pack(arch, &mut pack_dest, batches, tiles))
            .unwrap();
        core
    }

    /// Every packed face of tile k holds `k + 1.5`.
    fn assert_packed_tiles(core: &TensixCore, tiles: u32) {
        let packed = core.packed();
        assert_eq!(packed.len(), tiles as usize * 4);
        for (i, face) in packed.iter().enumerate() {
            let expected = (i / 4) as f32 + 1.5;
            assert!(
                face.iter().flatten().all(|&v| v == expected),
                "face {} should hold {}, got {:?}",
                i,
                expected,
                face[0]
            );
        }
    }

    #[test]
    fn test_half_sync_pipeline_is_hazard_free() {
        let mut core = add_pipeline(Arch::WormholeB0, DstSync::Half, 3, 2);
        let summary = core.run().unwrap();

        assert_eq!(summary.hazards, 0, "{:?}", core.hazards());
        assert_packed_tiles(&core, 6);
        assert_eq!(core.semaphore(semaphore::MATH_PACK).value, 0);
        assert_eq!(core.semaphore_stats(semaphore::MATH_PACK).posts, 3);
        assert_eq!(core.semaphore_stats(semaphore::MATH_PACK).gets, 3);
    }

    #[test]
    fn test_full_sync_pipeline_serializes() {
        let mut core = add_pipeline(Arch::Blackhole, DstSync::Full, 3, 1);
        let summary = core.run().unwrap();

        assert_eq!(summary.hazards, 0, "{:?}", core.hazards());
        assert_packed_tiles(&core, 3);
        assert_eq!(core.semaphore(semaphore::MATH_PACK).max, 1);
        // Math waits for pack to drain the only bank.
        assert!(core.semaphore_stats(semaphore::MATH_PACK).stall_steps > 0);
    }

    #[test]
    fn test_pack_without_acquire_reads_before_signal() {
        let arch = Arch::WormholeB0;
        let mut math_dest = DestLifecycle::native(arch, DestClient::Math, DstSync::Half);

        let mut packer = ThreadContext::new(ThreadId::Pack, arch);
        let kernel = PackTile::new(TensorShape::TILE_32X32);
        kernel.init(&mut packer);
        kernel.run_tile(&mut packer, &math_dest.current_bank(), 0);

        let mut core = TensixCore::for_arch(arch);
        core.load(ThreadId::Math, math_add(arch, &mut math_dest, 1, 1)).unwrap();
        core.load(ThreadId::Pack, packer.finish()).unwrap();
        let summary = core.run().unwrap();

        assert!(summary.hazards > 0);
        let first = core.hazards()[0];
        assert_eq!(first.kind, HazardKind::ReadBeforeSignal);
        assert_eq!(first.thread, ThreadId::Pack);
        assert_eq!(first.section, 0);
    }

    #[test]
    fn test_committed_addr_mods_read_back() {
        let arch = Arch::Quasar;
        let mut math = ThreadContext::new(ThreadId::Math, arch);
        let add = EltwiseBinary::new(EltwiseBinaryType::Add, TensorShape::TILE_32X32);
        add.init(&mut math);
        let mut packer = ThreadContext::new(ThreadId::Pack, arch);
        PackTile::new(TensorShape::TILE_32X32).init(&mut packer);

        let mut core = TensixCore::for_arch(arch);
        core.load(ThreadId::Math, math.finish()).unwrap();
        core.load(ThreadId::Pack, packer.finish()).unwrap();
        core.run().unwrap();

        for (slot, am) in add.addr_mods() {
            assert_eq!(core.addr_mod(ThreadId::Math, slot), am, "{}", slot);
        }
        for (slot, am) in PackTile::addr_mods() {
            assert_eq!(core.addr_mod_pack(ThreadId::Pack, slot), am, "{}", slot);
        }
        assert_eq!(*core.mop_config(ThreadId::Math), add.mop().config());
    }

    #[test]
    fn test_mop_issues_expected_stream() {
        let mut core = add_pipeline(Arch::WormholeB0, DstSync::Half, 1, 2);
        core.run().unwrap();

        // Two tiles of four faces, two FPU passes per face.
        assert_eq!(core.count_executed(ThreadId::Math, Opcode::ElwAdd), 16);
        assert_eq!(core.count_executed(ThreadId::Math, Opcode::Mop), 2);
        // Per face Src release plus one counter reset per tile.
        assert_eq!(core.count_executed(ThreadId::Math, Opcode::SetRwc), 10);
        assert_eq!(core.count_executed(ThreadId::Pack, Opcode::Pacr), 8);
        assert_eq!(core.thread_stats(ThreadId::Math).mop_runs, 2);
        assert_eq!(core.rwc(ThreadId::Math).dest.value, 0);
    }

    #[test]
    fn test_reduce_max_through_replay() {
        let arch = Arch::WormholeB0;
        let mut math = ThreadContext::new(ThreadId::Math, arch);
        let mut dest = DestLifecycle::native(arch, DestClient::Math, DstSync::Half);
        dest.sync_init(&mut math);
        let reduce = ReduceMax::new(&math);
        reduce.init(&mut math);
        run_reduce_tiles(&mut math, &mut dest, &reduce, 1);

        let mut core = TensixCore::for_arch(arch);
        let rows: Vec<Row> = (0..TILE_ROWS).map(|r| [r as f32; DEST_COLUMNS]).collect();
        core.srca_mut().load(&rows);
        core.load(ThreadId::Math, math.finish()).unwrap();
        core.run().unwrap();

        // Faces 0 and 2 into face 0, faces 1 and 3 into face 1.
        assert_eq!(core.dest().row(0)[0], 47.0);
        assert_eq!(core.dest().row(16)[0], 63.0);
        assert_eq!(core.count_executed(ThreadId::Math, Opcode::GmPool), 4);
        assert_eq!(core.thread_stats(ThreadId::Math).replays, 1);
        assert_eq!(
            &core.replay_memory(ThreadId::Math)[reduce.window().start() as usize..][..4],
            &ReduceMax::block()
        );
    }

    #[test]
    fn test_crossed_semaphores_deadlock() {
        let mut math = ThreadProgram::new();
        math.issue(ops::semwait(p_stall::STALL_MATH, t6_sem(3), p_stall::STALL_ON_ZERO));
        math.issue(ops::sempost(t6_sem(4)));
        let mut pack = ThreadProgram::new();
        pack.issue(ops::semwait(p_stall::STALL_PACK, t6_sem(4), p_stall::STALL_ON_ZERO));
        pack.issue(ops::sempost(t6_sem(3)));

        let mut core = TensixCore::for_arch(Arch::WormholeB0);
        core.load(ThreadId::Math, math).unwrap();
        core.load(ThreadId::Pack, pack).unwrap();

        match core.run() {
            Err(SimError::Deadlock(cycle)) => {
                assert!(cycle.involves(ThreadId::Math));
                assert!(cycle.involves(ThreadId::Pack));
                assert_eq!(cycle.threads.len(), 2);
            }
            other => panic!("expected deadlock, got {:?}", other),
        }
    }

    #[test]
    fn test_pack_without_producer_stalls() {
        let arch = Arch::WormholeB0;
        let mut pack_dest = DestLifecycle::native(arch, DestClient::Pack, DstSync::Half);

        let mut core = TensixCore::for_arch(arch);
        core.load(ThreadId::Pack, pack(arch, &mut pack_dest, 1, 1)).unwrap();

        let err = core.run().unwrap_err();
        assert_eq!(
            err,
            SimError::Stalled(vec![(ThreadId::Pack, WaitTarget::SemaphoreUp(semaphore::MATH_PACK))])
        );
    }

    #[test]
    fn test_math_waiting_on_its_own_init_stalls() {
        let arch = Arch::WormholeB0;
        let mut math = ThreadContext::new(ThreadId::Math, arch);
        let mut dest = DestLifecycle::native(arch, DestClient::Math, DstSync::Full);
        dest.sync_init(&mut math);
        dest.acquire_for_write(&mut math);
        math.issue(ops::nop());
        dest.release_after_write(&mut math);
        // Nothing drains the bank, so the second init never gets past its wait.
        dest.sync_init(&mut math);

        let mut core = TensixCore::for_arch(arch);
        core.load(ThreadId::Math, math.finish()).unwrap();

        assert_eq!(
            core.run().unwrap_err(),
            SimError::Stalled(vec![(ThreadId::Math, WaitTarget::SemaphoreDown(semaphore::MATH_PACK))])
        );
        assert!(core.detector().detected_deadlocks().is_empty());
    }

    #[test]
    fn test_unpack_mop_skips_masked_iterations() {
        let arch = Arch::WormholeB0;
        let mut unpack = ThreadContext::new(ThreadId::Unpack, arch);
        let template = UnpackMopTemplate::new(ops::incrwc(0, 0, 0, 1), ops::nop())
            .with_b(ops::incrwc(0, 0, 1, 0), ops::nop());
        unpack.program_mop(template);
        // Iterations 0, 2 and 17 skip; bit 17 travels in MOP_CFG.
        unpack.run_unpack_mop(18, 0x0002_0005);

        let mut core = TensixCore::for_arch(arch);
        core.load(ThreadId::Unpack, unpack.finish()).unwrap();
        core.run().unwrap();

        assert_eq!(core.count_executed(ThreadId::Unpack, Opcode::IncRwc), 30);
        assert_eq!(core.count_executed(ThreadId::Unpack, Opcode::Nop), 6);
        assert_eq!(core.rwc(ThreadId::Unpack).srca.value, 15);
        assert_eq!(core.rwc(ThreadId::Unpack).srcb.value, 15);
        assert_eq!(core.thread_stats(ThreadId::Unpack).mop_runs, 1);
        assert_eq!(*core.mop_config(ThreadId::Unpack), template.config());
    }

    #[test]
    fn test_unpack_mop_count_past_limit_fails() {
        let arch = Arch::WormholeB0;
        let mut unpack = ThreadContext::new(ThreadId::Unpack, arch);
        unpack.program_mop(UnpackMopTemplate::new(ops::nop(), ops::nop()));
        unpack.issue(ops::mop(p_mop::UNPACK_TEMPLATE, 40, 0));

        let mut core = TensixCore::for_arch(arch);
        core.load(ThreadId::Unpack, unpack.finish()).unwrap();

        assert_eq!(
            core.run().unwrap_err(),
            SimError::MopCountOutOfRange {
                thread: ThreadId::Unpack,
                source: MopCountError {
                    counter: "unpack",
                    count: 41,
                    max: MOP_MAX_UNPACK_COUNT,
                },
            }
        );
        assert_eq!(core.thread_stats(ThreadId::Unpack).mop_runs, 0);
    }

    #[test]
    fn test_unprogrammed_loop_mop_fails() {
        let mut math = ThreadProgram::new();
        math.issue(ops::mop(p_mop::LOOP_TEMPLATE, 0, 0));

        let mut core = TensixCore::for_arch(Arch::Blackhole);
        core.load(ThreadId::Math, math).unwrap();

        match core.run() {
            Err(SimError::MopCountOutOfRange { thread, source }) => {
                assert_eq!(thread, ThreadId::Math);
                assert_eq!(source.counter, "outer");
                assert_eq!(source.count, 0);
            }
            other => panic!("expected a MOP count error, got {:?}", other),
        }
    }

    #[test]
    fn test_mop_body_replays_window() {
        let arch = Arch::WormholeB0;
        let mut math = ThreadContext::new(ThreadId::Math, arch);
        let window = math.replay.window_in(ReplayPartition::Fpu, 0, 2);
        math.record(window, |rec| {
            rec.issue(ops::incrwc(0, 0, 0, 1));
            rec.issue(ops::incrwc(0, 0, 1, 0));
        });
        math.program_mop(MopTemplate::new(3, 2, window.trigger()));
        math.run_mop();

        let mut core = TensixCore::for_arch(arch);
        core.load(ThreadId::Math, math.finish()).unwrap();
        core.run().unwrap();

        // One load, then a trigger per MOP body slot.
        assert_eq!(core.count_executed(ThreadId::Math, Opcode::Replay), 7);
        assert_eq!(core.thread_stats(ThreadId::Math).replays, 6);
        assert_eq!(core.count_executed(ThreadId::Math, Opcode::IncRwc), 12);
        assert_eq!(core.rwc(ThreadId::Math).srca.value, 6);
        assert_eq!(core.rwc(ThreadId::Math).srcb.value, 6);
    }

    #[test]
    fn test_full_sync_unpack_fpu_pack_chain() {
        let arch = Arch::Quasar;
        let chain = DvalidChain::unpack_fpu_pack();
        let lifecycle =
            |client| DestLifecycle::new(arch, client, DstSync::Full, Handshake::DataValid(chain.clone()));
        let batches = 3;

        let mut unpack = ThreadContext::new(ThreadId::Unpack, arch);
        let mut unpack_dest = lifecycle(DestClient::Unpack);
        unpack_dest.sync_init(&mut unpack);
        for _ in 0..batches {
            unpack_dest.acquire_for_write(&mut unpack);
            unpack.issue(ops::nop());
            unpack_dest.release_after_write(&mut unpack);
        }
        let mut math_dest = lifecycle(DestClient::Math);
        let mut pack_dest = lifecycle(DestClient::Pack);

        let mut core = TensixCore::for_arch(arch);
        core.srca_mut().load(&tile_rows(batches, 1.0));
        core.srcb_mut().fill(0.5);
        core.load(ThreadId::Unpack, unpack.finish()).unwrap();
        core.load(ThreadId::Math, math_add(arch, &mut math_dest, batches, 1))
            .unwrap();
        core.load(ThreadId::Pack, pack(arch, &mut pack_dest, batches, 1))
            .unwrap();
        let summary = core.run().unwrap();

        assert_eq!(summary.hazards, 0, "{:?}", core.hazards());
        assert_packed_tiles(&core, batches);
        assert_eq!(core.dvalid().chain(), Some(&chain));
        assert!(!core.dvalid().is_half());
        assert_eq!(core.count_executed(ThreadId::Unpack, Opcode::ClearDvalid), 3);
        // One bank: every stage waits for the whole chain to come round.
        assert!(core.thread_stats(ThreadId::Unpack).stall_steps > 0);
        assert!(core.thread_stats(ThreadId::Math).stall_steps > 0);
    }

    #[test]
    fn test_quasar_fpu_sfpu_pack_chain() {
        let arch = Arch::Quasar;
        let chain = DvalidChain::fpu_sfpu_pack();
        let lifecycle =
            |client| DestLifecycle::new(arch, client, DstSync::Half, Handshake::DataValid(chain.clone()));
        let (batches, tiles) = (4, 1);

        let mut math_dest = lifecycle(DestClient::Math);
        let mut pack_dest = lifecycle(DestClient::Pack);

        let mut sfpu = ThreadContext::new(ThreadId::Sfpu, arch);
        let mut sfpu_dest = lifecycle(DestClient::Sfpu);
        sfpu_dest.sync_init(&mut sfpu);
        for _ in 0..batches {
            sfpu_dest.acquire_for_write(&mut sfpu);
            sfpu.issue(ops::nop());
            sfpu_dest.release_after_write(&mut sfpu);
        }

        let mut core = TensixCore::for_arch(arch);
        core.srca_mut().load(&tile_rows(batches * tiles, 1.0));
        core.srcb_mut().fill(0.5);
        core.load(ThreadId::Math, math_add(arch, &mut math_dest, batches, tiles))
            .unwrap();
        core.load(ThreadId::Sfpu, sfpu.finish()).unwrap();
        core.load(ThreadId::Pack, pack(arch, &mut pack_dest, batches, tiles))
            .unwrap();
        let summary = core.run().unwrap();

        assert_eq!(summary.hazards, 0, "{:?}", core.hazards());
        assert_packed_tiles(&core, batches * tiles);
        assert_eq!(core.dvalid().chain(), Some(&chain));
        assert!(core.dvalid().is_half());
        // Pack only ever moves once SFPU hands a bank over.
        assert!(core.thread_stats(ThreadId::Pack).stall_steps > 0);
    }

    #[test]
    fn test_replay_past_capacity_fails() {
        let mut math = ThreadProgram::new();
        math.issue(ops::replay(30, 8, false, true));

        let mut core = TensixCore::for_arch(Arch::WormholeB0);
        core.load(ThreadId::Math, math).unwrap();
        assert_eq!(
            core.run().unwrap_err(),
            SimError::ReplayOutOfRange {
                thread: ThreadId::Math,
                start: 30,
                len: 8,
                capacity: 32,
            }
        );
    }

    #[test]
    fn test_missing_thread_rejected() {
        let mut core = TensixCore::for_arch(Arch::WormholeB0);
        let err = core.load(ThreadId::Sfpu, ThreadProgram::new()).unwrap_err();
        assert_eq!(
            err,
            SimError::NoSuchThread {
                thread: ThreadId::Sfpu,
                arch: Arch::WormholeB0,
            }
        );
    }

    #[test]
    fn test_step_limit() {
        let config = SimConfig {
            max_steps: 5,
            ..SimConfig::for_arch(Arch::WormholeB0)
        };
        let mut core = TensixCore::new(config);
        let mut math = ThreadProgram::new();
        for _ in 0..20 {
            math.issue(ops::nop());
        }
        core.load(ThreadId::Math, math).unwrap();
        assert_eq!(core.run().unwrap_err(), SimError::StepLimit { steps: 5 });
    }

    #[test]
    fn test_fast_config_skips_hazards() {
        let arch = Arch::WormholeB0;
        let mut packer = ThreadContext::new(ThreadId::Pack, arch);
        let kernel = PackTile::new(TensorShape::TILE_32X32);
        kernel.init(&mut packer);
        let bank = DestLifecycle::native(arch, DestClient::Pack, DstSync::Half).current_bank();
        kernel.run_tile(&mut packer, &bank, 0);

        let mut core = TensixCore::new(SimConfig::fast(arch));
        core.load(ThreadId::Pack, packer.finish()).unwrap();
        let summary = core.run().unwrap();
        assert_eq!(summary.hazards, 0);
        assert_eq!(core.packed().len(), 4);
    }
}
