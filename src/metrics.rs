//! Live metrics for the TUI visualizer.
//!
//! The CLI publishes a JSON snapshot to METRICS_PATH while a kernel runs;
//! the viz binary polls the file and re-renders its dashboard. Snapshots
//! are staged to a scratch file and renamed into place, so a poll never
//! sees a torn write. This is observability output only — the simulator
//! itself persists nothing.

use crate::controller::ChannelState;
use crate::gpu::Gpu;
use crate::lsu::LsuState;
use serde::{Deserialize, Serialize};

pub const METRICS_PATH: &str = "/tmp/warpsim_live.json";

/// State of one core as shown on the dashboard.
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct CoreSnapshot {
    /// Pipeline stage name, e.g. "EXECUTE"
    pub stage: String,
    /// Block currently latched (meaningful while start is high)
    pub block_id: u8,
    /// Thread-0 program counter
    pub pc: u8,
    /// Number of LSUs not in IDLE
    pub lsus_busy: usize,
    pub done: bool,
}

/// State of one memory-controller channel.
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct ChannelSnapshot {
    /// FSM state name, e.g. "PROCESSING"
    pub state: String,
    /// Claimed consumer index, if any
    pub consumer: Option<usize>,
}

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct LiveMetrics {
    /// "idle" | "running" | "done" | "timeout"
    pub status: String,
    pub cycle: u64,
    pub thread_count: u8,
    pub threads_per_block: u8,
    pub num_cores: usize,
    pub total_blocks: u8,
    pub blocks_dispatched: u8,
    pub blocks_done: u8,
    pub cores: Vec<CoreSnapshot>,
    pub channels: Vec<ChannelSnapshot>,
    pub mem_reads: u64,
    pub mem_writes: u64,
    pub instructions_retired: u64,
    /// Unix timestamp in ms when this snapshot was written
    pub timestamp_ms: u64,
}

impl LiveMetrics {
    /// Snapshot the device for the dashboard.
    pub fn capture(gpu: &Gpu, status: &str) -> LiveMetrics {
        let cores = gpu
            .cores
            .iter()
            .map(|core| CoreSnapshot {
                stage: core.scheduler.stage().to_string(),
                block_id: core.scheduler.block_id(),
                pc: core.threads[0].pc.pc(),
                lsus_busy: core
                    .threads
                    .iter()
                    .filter(|t| t.lsu.state() != LsuState::Idle)
                    .count(),
                done: core.done(),
            })
            .collect();
        let channels = gpu
            .controller
            .channel_claims()
            .into_iter()
            .map(|(state, consumer)| ChannelSnapshot {
                state: state.to_string(),
                consumer: if state == ChannelState::Idle { None } else { consumer },
            })
            .collect();
        let stats = gpu.stats();
        LiveMetrics {
            status: status.to_string(),
            cycle: gpu.cycle(),
            thread_count: gpu.thread_count(),
            threads_per_block: gpu.config.threads_per_block,
            num_cores: gpu.config.num_cores,
            total_blocks: gpu.dispatcher.total_blocks(),
            blocks_dispatched: gpu.dispatcher.blocks_dispatched(),
            blocks_done: gpu.dispatcher.blocks_done(),
            cores,
            channels,
            mem_reads: stats.mem_reads,
            mem_writes: stats.mem_writes,
            instructions_retired: stats.instructions_retired,
            timestamp_ms: now_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot file plumbing
// ---------------------------------------------------------------------------

/// Publish a snapshot: stage the JSON next to METRICS_PATH, then rename it
/// over the live file in one step. Failures are swallowed — dropping a
/// frame of telemetry must never disturb the simulation.
pub fn write_metrics(metrics: &LiveMetrics) {
    let Ok(json) = serde_json::to_string(metrics) else {
        return;
    };
    let scratch = format!("{METRICS_PATH}.partial");
    let _ = std::fs::write(&scratch, json)
        .and_then(|()| std::fs::rename(&scratch, METRICS_PATH));
}

/// The most recently published snapshot. None when nothing has been
/// published yet, or when the file on disk isn't a snapshot at all.
pub fn read_metrics() -> Option<LiveMetrics> {
    serde_json::from_str(&std::fs::read_to_string(METRICS_PATH).ok()?).ok()
}

/// Milliseconds since the Unix epoch; 0 if the system clock sits before it.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as u64,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::GpuConfig;
    use crate::isa::Instruction;
    use crate::program::Program;

    #[test]
    fn capture_reflects_device_shape() {
        let mut gpu = Gpu::new(GpuConfig::default());
        gpu.load_program(
            Program::from_instructions(&[Instruction::ret()]).unwrap(),
        );
        let m = LiveMetrics::capture(&gpu, "idle");
        assert_eq!(m.cores.len(), 2);
        assert_eq!(m.channels.len(), 2);
        assert_eq!(m.cores[0].stage, "IDLE");

        gpu.launch(8, 1_000).unwrap();
        let m = LiveMetrics::capture(&gpu, "done");
        assert_eq!(m.blocks_done, 2);
        assert_eq!(m.status, "done");
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let gpu = Gpu::new(GpuConfig::default());
        let m = LiveMetrics::capture(&gpu, "idle");
        let json = serde_json::to_string(&m).unwrap();
        let back: LiveMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cycle, m.cycle);
        assert_eq!(back.cores.len(), m.cores.len());
    }
}
