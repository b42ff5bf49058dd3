use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use warpsim::gpu::{Gpu, GpuConfig, KernelStats, SimError};
use warpsim::metrics::{write_metrics, LiveMetrics};
use warpsim::program::{Program, ProgramError};

/// Exit codes: 0 when the kernel completes within the cycle budget,
/// 1 on timeout or misconfiguration, 2 on a malformed ROM.
#[derive(Parser, Debug)]
#[command(
    name = "warpsim",
    version,
    about = "Cycle-accurate simulator for a minimal SIMT GPU",
    arg_required_else_help = true
)]
struct Args {
    /// Kernel ROM listing: one 16-bit hex word per line, # comments
    rom: PathBuf,

    /// Binary image loaded into data memory before start
    #[arg(long)]
    data: Option<PathBuf>,

    /// Number of threads to launch
    #[arg(short, long, default_value_t = 8)]
    threads: u8,

    /// Number of cores
    #[arg(long, default_value_t = 2)]
    cores: usize,

    /// Hardware threads per block
    #[arg(long, default_value_t = 4)]
    block_size: u8,

    /// Memory controller channels
    #[arg(long, default_value_t = 2)]
    channels: usize,

    /// Cycle budget before the run is declared hung
    #[arg(long, default_value_t = 100_000)]
    max_cycles: u64,

    /// Print the first N bytes of data memory after completion
    #[arg(long)]
    dump: Option<usize>,

    /// Write live snapshots for `viz` (slows the clock to stay watchable)
    #[arg(long)]
    live: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if err.downcast_ref::<ProgramError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let text = std::fs::read_to_string(&args.rom)
        .with_context(|| format!("could not read ROM listing `{}`", args.rom.display()))?;
    let program = Program::parse(&text)
        .with_context(|| format!("could not parse ROM listing `{}`", args.rom.display()))?;

    let config = GpuConfig {
        num_cores: args.cores,
        threads_per_block: args.block_size,
        num_channels: args.channels,
    };
    let mut gpu = Gpu::new(config);
    gpu.load_program(program);

    if let Some(path) = &args.data {
        let image = std::fs::read(path)
            .with_context(|| format!("could not read data image `{}`", path.display()))?;
        gpu.load_data(&image);
    }

    println!(
        "[warpsim] launching '{}': {} threads | {} per block | {} cores | {} channels",
        args.rom.display(),
        args.threads,
        args.block_size,
        args.cores,
        args.channels,
    );

    gpu.set_thread_count(args.threads);
    gpu.start();

    let result = if args.live {
        run_live(&mut gpu, args.max_cycles)
    } else {
        gpu.run_until_done(args.max_cycles)
    };

    let stats = match result {
        Ok(stats) => stats,
        Err(err @ SimError::Timeout(_)) => {
            if args.live {
                write_metrics(&LiveMetrics::capture(&gpu, "timeout"));
            }
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    println!(
        "[warpsim] kernel complete: {} cycles | {} blocks | {} instructions | {} reads | {} writes",
        stats.cycles,
        stats.blocks_completed,
        stats.instructions_retired,
        stats.mem_reads,
        stats.mem_writes,
    );

    if let Some(n) = args.dump {
        dump_memory(gpu.data(), n);
    }
    Ok(())
}

/// Step the clock one tick at a time, publishing a snapshot for the viz
/// dashboard and pacing the simulation so it is watchable.
fn run_live(gpu: &mut Gpu, max_cycles: u64) -> Result<KernelStats, SimError> {
    if gpu.thread_count() == 0 {
        return Err(SimError::ZeroThreads);
    }
    for _ in 0..max_cycles {
        gpu.tick();
        write_metrics(&LiveMetrics::capture(gpu, "running"));
        std::thread::sleep(Duration::from_millis(2));
        if gpu.done() {
            write_metrics(&LiveMetrics::capture(gpu, "done"));
            return Ok(gpu.stats());
        }
    }
    Err(SimError::Timeout(max_cycles))
}

fn dump_memory(data: &[u8], n: usize) {
    let n = n.min(data.len());
    for (row, chunk) in data[..n].chunks(16).enumerate() {
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        println!("{:02x}: {}", row * 16, bytes.join(" "));
    }
}
