//! Half-sync double buffering on Wormhole B0.
//!
//! Math adds two operands tile by tile while pack drains the other Dest
//! bank, handing banks over through the MATH_PACK semaphore. Run with
//! `RUST_LOG=debug` to see the programming events.

use anyhow::{bail, Result};
use tensix_llk::arch::tensix_spec::DEST_COLUMNS;
use tensix_llk::arch::Arch;
use tensix_llk::config::{Config, SimConfig};
use tensix_llk::dest::{DestClient, DestLifecycle, DstSync};
use tensix_llk::isa::{encode_stream, Opcode};
use tensix_llk::kernels::{run_eltwise_tiles, run_pack_tiles, EltwiseBinary, EltwiseBinaryType, PackTile, TensorShape};
use tensix_llk::sim::{Row, TensixCore};
use tensix_llk::thread::{ThreadContext, ThreadId};

const BATCHES: u32 = 4;
const TILES_PER_BATCH: u32 = 2;

fn main() -> Result<()> {
    env_logger::init();

    let arch = Arch::WormholeB0;
    let shape = TensorShape::TILE_32X32;

    let mut math = ThreadContext::new(ThreadId::Math, arch);
    let mut math_dest = DestLifecycle::native(arch, DestClient::Math, DstSync::Half);
    math_dest.sync_init(&mut math);
    let add = EltwiseBinary::new(EltwiseBinaryType::Add, shape);
    add.init(&mut math);

    let mut pack = ThreadContext::new(ThreadId::Pack, arch);
    let mut pack_dest = DestLifecycle::native(arch, DestClient::Pack, DstSync::Half);
    pack_dest.sync_init(&mut pack);
    let packer = PackTile::new(shape);
    packer.init(&mut pack);

    for _ in 0..BATCHES {
        run_eltwise_tiles(&mut math, &mut math_dest, &add, TILES_PER_BATCH);
        run_pack_tiles(&mut pack, &mut pack_dest, &packer, TILES_PER_BATCH);
    }

    let math_prog = math.finish();
    let pack_prog = pack.finish();
    println!(
        "math: {} ops, {} bytes of instructions",
        math_prog.len(),
        encode_stream(math_prog.instructions()).len()
    );
    println!("pack: {} ops", pack_prog.len());

    let tiles = BATCHES * TILES_PER_BATCH;
    let operand: Vec<Row> = (0..tiles * shape.dest_rows())
        .map(|r| [(r / shape.dest_rows()) as f32; DEST_COLUMNS])
        .collect();

    // The programs above are Wormhole-only, whatever the config file says.
    let mut core = TensixCore::new(SimConfig {
        arch,
        ..Config::get().sim_config()
    });
    core.srca_mut().load(&operand);
    core.srcb_mut().fill(1.0);
    core.load(ThreadId::Math, math_prog)?;
    core.load(ThreadId::Pack, pack_prog)?;

    let summary = core.run()?;
    println!("{}", summary);

    if !core.hazards().is_empty() {
        for hazard in core.hazards() {
            eprintln!("{}", hazard);
        }
        bail!("{} Dest hazards", core.hazards().len());
    }

    for (tile, faces) in core.packed().chunks(usize::from(shape.total_faces())).enumerate() {
        println!("tile {}: {}", tile, faces[0][0][0]);
    }
    println!(
        "ELWADD issued: {}, PACR issued: {}",
        core.count_executed(ThreadId::Math, Opcode::ElwAdd),
        core.count_executed(ThreadId::Pack, Opcode::Pacr)
    );

    Ok(())
}
