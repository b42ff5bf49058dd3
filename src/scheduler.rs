//! Per-core pipeline scheduler.
//!
//! Each core runs one warp through a strictly sequential multicycle FSM:
//! FETCH → DECODE → REQUEST → EXECUTE → UPDATE, then back to FETCH for the
//! next instruction. UPDATE doubles as the warp's memory barrier: the core
//! may not fetch again until every thread's load/store unit has either
//! finished its request or never had one, which is what keeps the warp in
//! lockstep across variable-latency memory operations.

use crate::lsu::LsuState;
use tracing::trace;

/// Pipeline stage of a core, broadcast to every downstream component.
///
/// The three-bit encodings mirror the core-state bus (100 and 111 are
/// unused) and are what the metrics layer and tests observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreStage {
    Idle,
    Fetch,
    Decode,
    Request,
    Execute,
    Update,
}

impl CoreStage {
    /// The stage's encoding on the core-state bus.
    pub fn encoding(self) -> u8 {
        match self {
            CoreStage::Idle => 0b000,
            CoreStage::Fetch => 0b001,
            CoreStage::Decode => 0b010,
            CoreStage::Request => 0b011,
            CoreStage::Execute => 0b101,
            CoreStage::Update => 0b110,
        }
    }
}

impl std::fmt::Display for CoreStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreStage::Idle => write!(f, "IDLE"),
            CoreStage::Fetch => write!(f, "FETCH"),
            CoreStage::Decode => write!(f, "DECODE"),
            CoreStage::Request => write!(f, "REQUEST"),
            CoreStage::Execute => write!(f, "EXECUTE"),
            CoreStage::Update => write!(f, "UPDATE"),
        }
    }
}

/// Edge events the core wiring reacts to within the same tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerEdge {
    /// A new block was latched this tick (bind the identity registers).
    pub block_latched: bool,
    /// UPDATE→FETCH: commit every thread's next PC.
    pub pc_commit: bool,
    /// An instruction retired this tick (UPDATE left, or RET).
    pub retired: bool,
}

pub struct Scheduler {
    stage: CoreStage,
    block_id: u8,
    thread_count: u8,
    done: bool,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler { stage: CoreStage::Idle, block_id: 0, thread_count: 0, done: false }
    }

    pub fn reset(&mut self) {
        self.stage = CoreStage::Idle;
        self.block_id = 0;
        self.thread_count = 0;
        self.done = false;
    }

    pub fn stage(&self) -> CoreStage {
        self.stage
    }

    pub fn block_id(&self) -> u8 {
        self.block_id
    }

    pub fn thread_count(&self) -> u8 {
        self.thread_count
    }

    /// High once this block's RET retires; cleared by reset or a new start.
    pub fn done(&self) -> bool {
        self.done
    }

    /// One clock edge. `start`/`block_id`/`thread_count` come from the
    /// dispatcher, `ret` from the decoder, and `lsu_states` is the pre-tick
    /// snapshot of every thread's LSU.
    pub fn tick(
        &mut self,
        start: bool,
        block_id: u8,
        thread_count: u8,
        ret: bool,
        lsu_states: &[LsuState],
    ) -> SchedulerEdge {
        let mut edge = SchedulerEdge::default();
        let next = match self.stage {
            CoreStage::Idle => {
                if start {
                    self.block_id = block_id;
                    self.thread_count = thread_count;
                    self.done = false;
                    edge.block_latched = true;
                    CoreStage::Fetch
                } else {
                    CoreStage::Idle
                }
            }
            CoreStage::Fetch => CoreStage::Decode,
            CoreStage::Decode => CoreStage::Request,
            CoreStage::Request => CoreStage::Execute,
            CoreStage::Execute => CoreStage::Update,
            CoreStage::Update => {
                if ret {
                    self.done = true;
                    edge.retired = true;
                    CoreStage::Idle
                } else if lsu_states
                    .iter()
                    .all(|s| matches!(s, LsuState::Idle | LsuState::Done))
                {
                    // Global memory barrier: threads with no memory op this
                    // instruction sit in Idle and must not block the warp.
                    edge.pc_commit = true;
                    edge.retired = true;
                    CoreStage::Fetch
                } else {
                    CoreStage::Update
                }
            }
        };
        if next != self.stage {
            trace!(from = %self.stage, to = %next, block = self.block_id, "core stage");
        }
        self.stage = next;
        edge
    }
}

impl Default for Scheduler {
    fn default() -> Scheduler {
        Scheduler::new()
    }
}
