//! Quasar dvalid chain: FPU -> SFPU -> Pack.
//!
//! Three threads share the two Dest banks with no semaphore at all. Each
//! client waits until the chain hands it a bank and passes it on with
//! CLEARDVALID.

use anyhow::{bail, Result};
use tensix_llk::arch::tensix_spec::DEST_COLUMNS;
use tensix_llk::arch::Arch;
use tensix_llk::config::SimConfig;
use tensix_llk::dest::{DestClient, DestLifecycle, DstSync, DvalidChain, Handshake};
use tensix_llk::isa::{ops, InstructionSink};
use tensix_llk::kernels::{
    run_eltwise_tiles, run_pack_tiles, EltwiseBinary, EltwiseBinaryType, MathFidelity, PackTile, TensorShape,
};
use tensix_llk::sim::{Row, SimError, TensixCore};
use tensix_llk::thread::{ThreadContext, ThreadId};

const TILES: u32 = 6;

fn main() -> Result<()> {
    env_logger::init();

    let arch = Arch::Quasar;
    let shape = TensorShape::TILE_32X32;
    let chain = DvalidChain::fpu_sfpu_pack();
    println!("chain: {}", chain);
    let lifecycle = |client| DestLifecycle::new(arch, client, DstSync::Half, Handshake::DataValid(chain.clone()));

    let mut math = ThreadContext::new(ThreadId::Math, arch);
    let mut math_dest = lifecycle(DestClient::Math);
    math_dest.sync_init(&mut math);
    let mul = EltwiseBinary::new(EltwiseBinaryType::Mul, shape).with_fidelity(MathFidelity::HiFi2);
    mul.init(&mut math);

    let mut sfpu = ThreadContext::new(ThreadId::Sfpu, arch);
    let mut sfpu_dest = lifecycle(DestClient::Sfpu);
    sfpu_dest.sync_init(&mut sfpu);

    let mut pack = ThreadContext::new(ThreadId::Pack, arch);
    let mut pack_dest = lifecycle(DestClient::Pack);
    pack_dest.sync_init(&mut pack);
    let packer = PackTile::new(shape);
    packer.init(&mut pack);

    for _ in 0..TILES {
        run_eltwise_tiles(&mut math, &mut math_dest, &mul, 1);

        let bank = sfpu_dest.acquire_for_write(&mut sfpu);
        log::debug!("sfpu works on {}", bank);
        sfpu.issue(ops::nop());
        sfpu_dest.release_after_write(&mut sfpu);

        run_pack_tiles(&mut pack, &mut pack_dest, &packer, 1);
    }

    let operand: Vec<Row> = (0..TILES * shape.dest_rows())
        .map(|r| [(r / shape.dest_rows() + 1) as f32; DEST_COLUMNS])
        .collect();

    let mut core = TensixCore::new(SimConfig::for_arch(arch));
    core.srca_mut().load(&operand);
    core.srcb_mut().fill(2.0);
    core.load(ThreadId::Math, math.finish())?;
    core.load(ThreadId::Sfpu, sfpu.finish())?;
    core.load(ThreadId::Pack, pack.finish())?;

    match core.run() {
        Ok(summary) => println!("{}", summary),
        Err(SimError::Deadlock(cycle)) => bail!("chain deadlocked: {}", cycle),
        Err(e) => return Err(e.into()),
    }

    if !core.hazards().is_empty() {
        bail!("{} Dest hazards", core.hazards().len());
    }
    for (tile, faces) in core.packed().chunks(usize::from(shape.total_faces())).enumerate() {
        println!("tile {}: {}", tile, faces[0][0][0]);
    }
    for thread in [ThreadId::Math, ThreadId::Sfpu, ThreadId::Pack] {
        let stats = core.thread_stats(thread);
        println!("{:>6}: {} executed, {} stalled", thread.as_str(), stats.executed, stats.stall_steps);
    }

    Ok(())
}
