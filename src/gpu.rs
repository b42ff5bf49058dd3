//! Top-level device: cores, dispatcher, memory controller, data memory.
//!
//! `Gpu` owns the full hierarchy and exposes the host control surface:
//! load a program and a memory image, write the device control register,
//! pulse start, and step the clock until `done`. One `tick` is one global
//! clock edge; every component computes its next state from a pre-tick
//! snapshot of all signals and the snapshots commit together, so the
//! simulation is deterministic and order-independent inside a tick.

use crate::controller::{MemReply, MemRequest, MemoryController, DEFAULT_CHANNELS};
use crate::core::Core;
use crate::dispatcher::{CoreControl, Dispatcher};
use crate::memory::DataMemory;
use crate::program::Program;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("kernel did not complete within {0} cycles")]
    Timeout(u64),
    #[error("thread count is 0; the dispatcher will never signal done")]
    ZeroThreads,
}

/// Hardware shape of the simulated device.
#[derive(Debug, Clone)]
pub struct GpuConfig {
    /// Number of lockstep warp cores.
    pub num_cores: usize,
    /// Hardware threads per core (block size B).
    pub threads_per_block: u8,
    /// Memory controller channels between the LSUs and the memory port.
    pub num_channels: usize,
}

impl GpuConfig {
    /// Total LSU consumers on the memory controller.
    pub fn num_consumers(&self) -> usize {
        self.num_cores * usize::from(self.threads_per_block)
    }
}

impl Default for GpuConfig {
    fn default() -> GpuConfig {
        GpuConfig { num_cores: 2, threads_per_block: 4, num_channels: DEFAULT_CHANNELS }
    }
}

/// Counters reported after a kernel run.
#[derive(Debug, Default, Clone)]
pub struct KernelStats {
    pub cycles: u64,
    pub blocks_completed: u32,
    pub instructions_retired: u64,
    pub mem_reads: u64,
    pub mem_writes: u64,
}

pub struct Gpu {
    pub config: GpuConfig,
    pub rom: Program,
    pub mem: DataMemory,
    pub cores: Vec<Core>,
    pub dispatcher: Dispatcher,
    pub controller: MemoryController,
    /// Device control register: thread count of the next launch.
    thread_count: u8,
    start_pulse: bool,
    cycle: u64,
}

impl Gpu {
    pub fn new(config: GpuConfig) -> Gpu {
        assert!(
            config.num_cores > 0 && config.threads_per_block > 0 && config.num_channels > 0,
            "device shape must be non-empty"
        );
        let cores = (0..config.num_cores)
            .map(|id| Core::new(id, usize::from(config.threads_per_block)))
            .collect();
        let dispatcher = Dispatcher::new(config.num_cores, config.threads_per_block);
        let controller = MemoryController::new(config.num_consumers(), config.num_channels);
        Gpu {
            config,
            rom: Program::new(),
            mem: DataMemory::new(),
            cores,
            dispatcher,
            controller,
            thread_count: 0,
            start_pulse: false,
            cycle: 0,
        }
    }

    pub fn load_program(&mut self, rom: Program) {
        self.rom = rom;
    }

    /// Load a data-memory image before starting a kernel.
    pub fn load_data(&mut self, image: &[u8]) {
        self.mem.load_image(image);
    }

    /// Dump data memory after a kernel completes.
    pub fn data(&self) -> &[u8] {
        self.mem.as_bytes()
    }

    // ------------------------------------------------------------------
    // Host control surface
    // ------------------------------------------------------------------

    /// Assert reset for a cycle: every FSM back to its initial state,
    /// in-flight memory requests dropped. ROM and RAM contents survive.
    pub fn reset(&mut self) {
        for core in &mut self.cores {
            core.reset();
        }
        self.dispatcher.reset();
        self.controller.reset();
        self.thread_count = 0;
        self.start_pulse = false;
        self.cycle = 0;
    }

    /// Write the device control register.
    pub fn set_thread_count(&mut self, n: u8) {
        self.thread_count = n;
    }

    /// Pulse the start signal; the dispatcher samples it on the next tick.
    pub fn start(&mut self) {
        self.start_pulse = true;
    }

    /// Kernel-completion output.
    pub fn done(&self) -> bool {
        self.dispatcher.done()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn thread_count(&self) -> u8 {
        self.thread_count
    }

    /// Advance the clock by `n` ticks.
    pub fn step(&mut self, n: u32) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// One global clock edge.
    pub fn tick(&mut self) {
        let b = usize::from(self.config.threads_per_block);

        // Pre-tick snapshot of every cross-component signal.
        let start = self.start_pulse;
        self.start_pulse = false;
        let core_done: Vec<bool> = self.cores.iter().map(Core::done).collect();
        let controls: Vec<CoreControl> =
            (0..self.cores.len()).map(|i| self.dispatcher.control(i)).collect();
        let requests: Vec<MemRequest> = self
            .cores
            .iter()
            .flat_map(|core| core.threads.iter().map(|t| t.lsu.request()))
            .collect();
        let replies: Vec<MemReply> =
            (0..requests.len()).map(|j| self.controller.reply(j)).collect();

        // Sequential updates; every input above is pre-tick state.
        self.dispatcher.tick(start, self.thread_count, &core_done);
        for (i, core) in self.cores.iter_mut().enumerate() {
            core.tick(controls[i], &self.rom, &replies[i * b..(i + 1) * b]);
        }
        self.controller.tick(&requests, &mut self.mem);
        self.cycle += 1;
    }

    /// Step until `done` or the cycle budget runs out.
    pub fn run_until_done(&mut self, max_cycles: u64) -> Result<KernelStats, SimError> {
        if self.thread_count == 0 {
            return Err(SimError::ZeroThreads);
        }
        for _ in 0..max_cycles {
            self.tick();
            if self.done() {
                return Ok(self.stats());
            }
        }
        Err(SimError::Timeout(max_cycles))
    }

    /// Reset, set the thread count, pulse start, and run to completion.
    pub fn launch(&mut self, thread_count: u8, max_cycles: u64) -> Result<KernelStats, SimError> {
        self.reset();
        self.set_thread_count(thread_count);
        self.start();
        self.run_until_done(max_cycles)
    }

    pub fn stats(&self) -> KernelStats {
        KernelStats {
            cycles: self.cycle,
            blocks_completed: u32::from(self.dispatcher.blocks_done()),
            instructions_retired: self.cores.iter().map(|c| c.retired).sum(),
            mem_reads: self.controller.reads_served(),
            mem_writes: self.controller.writes_served(),
        }
    }
}
