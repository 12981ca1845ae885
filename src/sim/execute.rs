//! Instruction execution.
//!
//! [`Shared`] holds everything threads communicate through. Each step a
//! thread fetches one op, routes it through the MOP expander and replay
//! unit, and executes it against the shared state.

use super::deadlock::WaitTarget;
use super::hazard::HazardTracker;
use super::regs::{DestFile, Face, SrcFile};
use super::sync::{selected, DvalidState, SemaphoreBank};
use super::thread::{Capture, Source, ThreadState};
use super::SimError;
use crate::addrmod::{AddrMod, AddrModPack, AddrModSlot};
use crate::arch::tensix_spec::{DEST_COLUMNS, FACE_R_DIM, MAX_FPU_ROWS};
use crate::arch::{Arch, ArchSpec};
use crate::config::SimConfig;
use crate::dest::DestClient;
use crate::isa::params::{p_cleardvalid, p_elwise, p_gpool, p_setrwc, p_stall, p_zeroacc, semaphore};
use crate::isa::{Decoded, FpuArgs, FpuOp, HostWait, Instr, ThreadOp};
use crate::thread::ThreadId;

/// Outcome of one thread step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Ran,
    Blocked(WaitTarget),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exec {
    Done,
    Blocked(WaitTarget),
}

/// State visible to every thread.
#[derive(Debug, Clone)]
pub struct Shared {
    pub arch: Arch,
    pub config: SimConfig,
    pub sems: SemaphoreBank,
    pub dvalid: DvalidState,
    pub dest: DestFile,
    pub srca: SrcFile,
    pub srcb: SrcFile,
    pub hazards: HazardTracker,
    pub packed: Vec<Face>,
    pub step: u64,
}

impl Shared {
    pub fn new(config: SimConfig) -> Self {
        let spec = config.arch.spec();
        Self {
            arch: config.arch,
            config,
            sems: SemaphoreBank::new(),
            dvalid: DvalidState::new(),
            dest: DestFile::new(spec.dest_rows()),
            srca: SrcFile::default(),
            srcb: SrcFile::default(),
            hazards: HazardTracker::new(spec.dest_half_rows(), config.hazard_checks),
            packed: Vec::new(),
            step: 0,
        }
    }

    fn spec(&self) -> &'static dyn ArchSpec {
        self.arch.spec()
    }

    /// Dest base row a thread addresses from.
    fn dest_base(&self, t: &ThreadState) -> u32 {
        let reg = if t.id == ThreadId::Pack {
            self.spec().pack_dest_offset()
        } else {
            self.spec().math_dest_offset()
        };
        u32::from(t.cfg(reg))
    }

    // ========================================================================
    // Fetch and routing
    // ========================================================================

    /// Advance `t` by one op.
    pub fn step_thread(&mut self, t: &mut ThreadState) -> Result<Progress, SimError> {
        let Some((source, op)) = t.fetch() else {
            return Ok(Progress::Ran);
        };

        match op {
            ThreadOp::HostWait(wait) => {
                if let Some(target) = self.host_blocked(wait) {
                    t.unfetch(source, ThreadOp::HostWait(wait));
                    return Ok(Progress::Blocked(target));
                }
                t.stats.host_ops += 1;
                Ok(Progress::Ran)
            }
            ThreadOp::WriteMopConfig(config) => {
                t.set_mop_config(config);
                t.stats.host_ops += 1;
                Ok(Progress::Ran)
            }
            ThreadOp::Issue(instr) => self.dispatch(t, source, instr),
        }
    }

    fn host_blocked(&self, wait: HostWait) -> Option<WaitTarget> {
        match wait {
            HostWait::SemaphoreZero { sem } if self.sems.get(sem).value != 0 => {
                Some(WaitTarget::SemaphoreDown(sem))
            }
            // MOP expansion completes before the host sees the next op.
            _ => None,
        }
    }

    fn dispatch(&mut self, t: &mut ThreadState, source: Source, instr: Instr) -> Result<Progress, SimError> {
        let decoded = instr
            .decode()
            .map_err(|e| SimError::Decode { thread: t.id, source: e })?;

        // MOP expander
        match decoded {
            Decoded::Mop { template, count_minus_one, zmask_lo16 } => {
                let thread = t.id;
                t.expand_mop(template, count_minus_one, zmask_lo16)
                    .map_err(|e| SimError::MopCountOutOfRange { thread, source: e })?;
                self.trace(t, instr);
                return Ok(Progress::Ran);
            }
            Decoded::MopCfg { zmask_hi16 } => {
                self.trace(t, instr);
                t.set_zmask_hi(zmask_hi16);
                return Ok(Progress::Ran);
            }
            _ => {}
        }

        // Replay unit
        if source != Source::Replay {
            if let Some(cap) = t.capture {
                if cap.exec {
                    if let Exec::Blocked(target) = self.execute(t, &decoded)? {
                        t.unfetch(source, ThreadOp::Issue(instr));
                        return Ok(Progress::Blocked(target));
                    }
                    self.trace(t, instr);
                }
                t.capture(instr);
                return Ok(Progress::Ran);
            }
        }
        if let Decoded::Replay { start, len, exec_while_loading, load_mode } = decoded {
            self.trace(t, instr);
            if start + len > t.replay_capacity() {
                return Err(SimError::ReplayOutOfRange {
                    thread: t.id,
                    start,
                    len,
                    capacity: t.replay_capacity(),
                });
            }
            if load_mode {
                if len > 0 {
                    t.capture = Some(Capture {
                        next: start,
                        remaining: len,
                        exec: exec_while_loading,
                    });
                }
            } else {
                t.play(start, len);
            }
            return Ok(Progress::Ran);
        }

        match self.execute(t, &decoded)? {
            Exec::Done => {
                self.trace(t, instr);
                Ok(Progress::Ran)
            }
            Exec::Blocked(target) => {
                t.unfetch(source, ThreadOp::Issue(instr));
                Ok(Progress::Blocked(target))
            }
        }
    }

    fn trace(&self, t: &mut ThreadState, instr: Instr) {
        if self.config.trace {
            log::trace!("[{:>7}] {:>6}: {}", self.step, t.id.as_str(), instr);
        }
        t.record_trace(instr);
        t.stats.executed += 1;
    }

    // ========================================================================
    // Execute
    // ========================================================================

    fn execute(&mut self, t: &mut ThreadState, decoded: &Decoded) -> Result<Exec, SimError> {
        match *decoded {
            Decoded::SetC16 { reg, value } => self.set_cfg(t, reg, value),
            Decoded::SemInit { max, init, sem_sel } => {
                for s in selected(sem_sel) {
                    self.sems.init(s, max, init);
                    if s == semaphore::MATH_PACK {
                        self.hazards.set_full_mode(max == 1);
                    }
                }
            }
            Decoded::SemPost { sem_sel } => {
                let row = self.dest_base(t);
                for s in selected(sem_sel) {
                    self.sems.post(s);
                    if s == semaphore::MATH_PACK && t.id != ThreadId::Pack {
                        self.hazards.on_release(row);
                    }
                }
            }
            Decoded::SemGet { sem_sel } => {
                let row = self.dest_base(t);
                for s in selected(sem_sel) {
                    self.sems.take(s);
                    if s == semaphore::MATH_PACK && t.id == ThreadId::Pack {
                        self.hazards.on_drain(row);
                    }
                }
            }
            Decoded::SemWait { sem_sel, cond, .. } => return Ok(self.sem_wait(sem_sel, cond)),
            Decoded::StallWait { wait_res, .. } => {
                if wait_res & p_stall::WAIT_DEST_DVALID != 0 {
                    let client = t.id.dest_client();
                    if !self.dvalid.owns(client) {
                        return Ok(Exec::Blocked(WaitTarget::DestValid(client)));
                    }
                }
            }
            Decoded::ClearDvalid { src_clear, dest_done, reset } => {
                self.clear_dvalid(t, src_clear, dest_done, reset)
            }
            Decoded::SetDvalid { .. } | Decoded::Nop => {}
            Decoded::SetRwc { clear_ab, d, b, a, mask, .. } => {
                self.release_src(t, clear_ab);
                t.rwc.set(d, b, a, mask);
            }
            Decoded::IncRwc { cr, d, b, a } => t.rwc.incr(cr, d, b, a),
            Decoded::Fpu { op, args } => self.fpu(t, op, args),
            Decoded::ZeroAcc { clear_mode, dst, .. } => self.zero_acc(t, clear_mode, dst),
            Decoded::Pacr { addr_mode, .. } => self.pack(t, addr_mode),
            // Routed before execution.
            Decoded::Mop { .. } | Decoded::MopCfg { .. } | Decoded::Replay { .. } => {}
        }
        Ok(Exec::Done)
    }

    fn set_cfg(&mut self, t: &mut ThreadState, reg: u8, value: u16) {
        t.set_cfg(reg, value);
        let spec = self.spec();
        for client in DestClient::ALL {
            if reg == spec.dvalid_ctrl(client.bit_index()) && self.dvalid.configure(client, value) {
                self.hazards.set_full_mode(!self.dvalid.is_half());
            }
        }
    }

    fn sem_wait(&mut self, sem_sel: u32, cond: u32) -> Exec {
        for s in selected(sem_sel) {
            let sem = self.sems.get(s);
            let target = if cond & p_stall::STALL_ON_ZERO != 0 && sem.value == 0 {
                Some(WaitTarget::SemaphoreUp(s))
            } else if cond & p_stall::STALL_ON_MAX != 0 && sem.value >= sem.max {
                Some(WaitTarget::SemaphoreDown(s))
            } else {
                None
            };
            if let Some(target) = target {
                self.sems.stats_mut(s).record_stall();
                return Exec::Blocked(target);
            }
        }
        for s in selected(sem_sel) {
            self.sems.stats_mut(s).record_wait();
        }
        Exec::Done
    }

    fn clear_dvalid(&mut self, t: &ThreadState, src_clear: u32, dest_done: u32, reset: u32) {
        if reset != 0 {
            self.dvalid.reset(reset);
        }
        let row = self.dest_base(t);
        let last_producer = self
            .dvalid
            .chain()
            .and_then(|c| c.predecessor(DestClient::Pack));
        for client in DestClient::ALL {
            if dest_done & client.dvalid_bit() == 0 || self.dvalid.done(client).is_none() {
                continue;
            }
            if client == DestClient::Pack {
                self.hazards.on_drain(row);
            } else if Some(client) == last_producer {
                self.hazards.on_release(row);
            }
        }
        if src_clear & p_cleardvalid::CLR_SRCA_VLD != 0 {
            self.srca.release(0);
        }
        if src_clear & p_cleardvalid::CLR_SRCB_VLD != 0 {
            self.srcb.release(0);
        }
    }

    fn release_src(&mut self, t: &ThreadState, clear_ab: u32) {
        if clear_ab & p_setrwc::CLR_A != 0 {
            self.srca.release(t.rwc.srca.value);
        }
        if clear_ab & p_setrwc::CLR_B != 0 {
            self.srcb.release(t.rwc.srcb.value);
        }
    }

    fn fpu(&mut self, t: &mut ThreadState, op: FpuOp, args: FpuArgs) {
        let slot = AddrModSlot::new((args.addr_mode & 0x7) as u8);
        let am = AddrMod::read_back(slot, self.spec(), |r| t.cfg(r));
        let row0 = self.dest_base(t) + args.dst + t.rwc.dest.value;
        let a0 = t.rwc.srca.value;
        let b0 = t.rwc.srcb.value;

        if t.id != ThreadId::Pack {
            let step = self.step;
            self.hazards.on_write(t.id, row0, step);
        }

        match op {
            FpuOp::ElwAdd | FpuOp::ElwSub | FpuOp::ElwMul => {
                let phase = t.rwc.fidelity.value;
                for r in 0..MAX_FPU_ROWS {
                    let a_row = *self.srca.row(a0 + r);
                    let b_row = self.operand_b(args.instr_mod, b0, r);
                    let dest = self.dest.row_mut(row0 + r);
                    for c in 0..DEST_COLUMNS {
                        let (a, b) = (a_row[c], b_row[c]);
                        match op {
                            // Later fidelity phases refine precision, not value.
                            FpuOp::ElwMul => dest[c] += if phase == 0 { a * b } else { 0.0 },
                            FpuOp::ElwAdd if args.dest_accum => dest[c] += a + b,
                            FpuOp::ElwAdd => dest[c] = a + b,
                            FpuOp::ElwSub if args.dest_accum => dest[c] += a - b,
                            FpuOp::ElwSub => dest[c] = a - b,
                            FpuOp::MvMul | FpuOp::GmPool => {}
                        }
                    }
                }
            }
            FpuOp::MvMul => {
                for r in 0..MAX_FPU_ROWS {
                    let b_row = *self.srcb.row(b0 + r);
                    let mut acc = [0.0f32; DEST_COLUMNS];
                    for (k, b) in b_row.iter().enumerate() {
                        let a_row = self.srca.row(a0 + k as u32);
                        for c in 0..DEST_COLUMNS {
                            acc[c] += b * a_row[c];
                        }
                    }
                    let dest = self.dest.row_mut(row0 + r);
                    for c in 0..DEST_COLUMNS {
                        dest[c] += acc[c];
                    }
                }
            }
            FpuOp::GmPool => {
                let mut pooled = *self.srca.row(a0);
                for r in 1..FACE_R_DIM {
                    let a_row = self.srca.row(a0 + r);
                    for c in 0..DEST_COLUMNS {
                        pooled[c] = pooled[c].max(a_row[c]);
                    }
                }
                let dest = self.dest.row_mut(row0);
                for c in 0..DEST_COLUMNS {
                    dest[c] = if args.instr_mod & p_gpool::MAX_ACCUMULATE != 0 {
                        dest[c].max(pooled[c])
                    } else {
                        pooled[c]
                    };
                }
            }
        }

        t.rwc.apply_math(&am);
        if args.clear_dvalid & p_elwise::CLR_SRC_AB != 0 {
            self.release_src(t, args.clear_dvalid);
        }
    }

    /// SrcB row `r` of an FPU op after broadcast.
    fn operand_b(&self, instr_mod: u32, b0: u32, r: u32) -> [f32; DEST_COLUMNS] {
        match instr_mod {
            p_elwise::SRCB_BCAST_COL => [self.srcb.row(b0 + r)[0]; DEST_COLUMNS],
            p_elwise::SRCB_BCAST_ROW => *self.srcb.row(b0),
            p_elwise::SRCB_BCAST_ALL => [self.srcb.row(b0)[0]; DEST_COLUMNS],
            _ => *self.srcb.row(b0 + r),
        }
    }

    fn zero_acc(&mut self, t: &ThreadState, clear_mode: u32, dst: u32) {
        let half = self.spec().dest_half_rows();
        let (start, count) = match clear_mode {
            p_zeroacc::CLR_16 => (self.dest_base(t) + dst * FACE_R_DIM, FACE_R_DIM),
            p_zeroacc::CLR_HALF => ((dst & 1) * half, half),
            p_zeroacc::CLR_ALL => (0, self.dest.len()),
            other => {
                log::warn!("{}: ZEROACC mode {} ignored", t.id, other);
                return;
            }
        };
        if t.id != ThreadId::Pack {
            let step = self.step;
            self.hazards.on_write(t.id, start, step);
        }
        self.dest.clear(start, count);
    }

    fn pack(&mut self, t: &mut ThreadState, addr_mode: u32) {
        let row = self.dest_base(t) + t.rwc.pack_zsrc.value * FACE_R_DIM + t.rwc.pack_ysrc.value;
        let step = self.step;
        self.hazards.on_read(t.id, row, step);
        self.packed.push(self.dest.face(row));

        let slot = AddrModSlot::new((addr_mode & 0x3) as u8);
        let am = AddrModPack::read_back(slot, self.spec(), |r| t.cfg(r));
        t.rwc.apply_pack(&am);
    }
}
