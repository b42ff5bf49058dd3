//! Per-thread load/store unit.
//!
//! Drives at most one memory request per instruction through a four-state
//! handshake with the memory controller. The request lines are registered:
//! a valid raised this cycle is seen by the controller next cycle, and the
//! unit holds it high until the controller answers with ready. The
//! scheduler's UPDATE barrier watches these states; Idle means "no memory
//! op this instruction" and never blocks the warp.

use crate::controller::{MemReply, MemRequest};
use crate::scheduler::CoreStage;
use tracing::trace;

/// LSU FSM state. The two-bit encodings appear on the per-thread state bus
/// the scheduler samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsuState {
    Idle = 0b00,
    Requesting = 0b01,
    Waiting = 0b10,
    Done = 0b11,
}

impl std::fmt::Display for LsuState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LsuState::Idle => write!(f, "IDLE"),
            LsuState::Requesting => write!(f, "REQUESTING"),
            LsuState::Waiting => write!(f, "WAITING"),
            LsuState::Done => write!(f, "DONE"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lsu {
    state: LsuState,
    request: MemRequest,
    out: u8,
}

impl Lsu {
    pub fn new() -> Lsu {
        Lsu { state: LsuState::Idle, request: MemRequest::default(), out: 0 }
    }

    pub fn reset(&mut self) {
        self.state = LsuState::Idle;
        self.request = MemRequest::default();
        self.out = 0;
    }

    pub fn state(&self) -> LsuState {
        self.state
    }

    /// The registered request lines presented to the memory controller.
    pub fn request(&self) -> MemRequest {
        self.request
    }

    /// Data returned by the last completed load.
    pub fn out(&self) -> u8 {
        self.out
    }

    /// One clock edge. `stage` is the core's pre-tick pipeline stage,
    /// `mem_read`/`mem_write` the decoded enables, `rs`/`rt` the operand
    /// snapshot, and `reply` the controller's registered answer lines for
    /// this consumer.
    pub fn tick(
        &mut self,
        stage: CoreStage,
        mem_read: bool,
        mem_write: bool,
        rs: u8,
        rt: u8,
        reply: MemReply,
    ) {
        match self.state {
            LsuState::Idle => {
                if stage == CoreStage::Request && (mem_read || mem_write) {
                    self.request = MemRequest {
                        read_valid: mem_read,
                        write_valid: !mem_read && mem_write,
                        addr: rs,
                        data: rt,
                    };
                    self.state = LsuState::Requesting;
                    trace!(addr = rs, read = mem_read, "lsu request");
                }
            }
            LsuState::Requesting => {
                if reply.ready {
                    if self.request.read_valid {
                        self.out = reply.data;
                    }
                    self.request = MemRequest::default();
                    self.state = LsuState::Waiting;
                }
            }
            LsuState::Waiting => {
                if stage == CoreStage::Update {
                    self.state = LsuState::Done;
                }
            }
            LsuState::Done => {
                if stage != CoreStage::Update {
                    self.state = LsuState::Idle;
                }
            }
        }
    }
}

impl Default for Lsu {
    fn default() -> Lsu {
        Lsu::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_REPLY: MemReply = MemReply { ready: false, data: 0 };

    #[test]
    fn non_memory_instructions_leave_the_unit_idle() {
        let mut lsu = Lsu::new();
        for stage in [
            CoreStage::Fetch,
            CoreStage::Decode,
            CoreStage::Request,
            CoreStage::Execute,
            CoreStage::Update,
        ] {
            lsu.tick(stage, false, false, 0, 0, NO_REPLY);
            assert_eq!(lsu.state(), LsuState::Idle);
        }
    }

    #[test]
    fn load_walks_the_full_handshake() {
        let mut lsu = Lsu::new();

        lsu.tick(CoreStage::Request, true, false, 10, 0, NO_REPLY);
        assert_eq!(lsu.state(), LsuState::Requesting);
        assert!(lsu.request().read_valid);
        assert_eq!(lsu.request().addr, 10);

        // controller has not answered yet: hold the valid
        lsu.tick(CoreStage::Execute, false, false, 0, 0, NO_REPLY);
        assert_eq!(lsu.state(), LsuState::Requesting);
        assert!(lsu.request().read_valid);

        lsu.tick(CoreStage::Update, false, false, 0, 0, MemReply { ready: true, data: 42 });
        assert_eq!(lsu.state(), LsuState::Waiting);
        assert!(!lsu.request().read_valid);
        assert_eq!(lsu.out(), 42);

        lsu.tick(CoreStage::Update, false, false, 0, 0, NO_REPLY);
        assert_eq!(lsu.state(), LsuState::Done);

        // scheduler advanced: release for the next instruction
        lsu.tick(CoreStage::Fetch, false, false, 0, 0, NO_REPLY);
        assert_eq!(lsu.state(), LsuState::Idle);
    }

    #[test]
    fn store_presents_address_and_data() {
        let mut lsu = Lsu::new();
        lsu.tick(CoreStage::Request, false, true, 10, 42, NO_REPLY);
        let req = lsu.request();
        assert!(req.write_valid && !req.read_valid);
        assert_eq!(req.addr, 10);
        assert_eq!(req.data, 42);

        lsu.tick(CoreStage::Execute, false, false, 0, 0, MemReply { ready: true, data: 0 });
        assert_eq!(lsu.state(), LsuState::Waiting);
        assert_eq!(lsu.out(), 0); // stores never touch the load latch
    }
}
