//! Per-core instruction fetch.
//!
//! The ROM is combinational, so a fetch is a lookup at thread 0's PC
//! latched during FETCH. Outside FETCH the latch holds, which is what the
//! decoder re-reads while the instruction drains through the pipeline.

use crate::isa::Instruction;
use crate::program::Program;
use crate::scheduler::CoreStage;

pub struct Fetcher {
    instruction: Instruction,
}

impl Fetcher {
    pub fn new() -> Fetcher {
        Fetcher { instruction: Instruction::NOP }
    }

    pub fn reset(&mut self) {
        self.instruction = Instruction::NOP;
    }

    /// The latched instruction.
    pub fn instruction(&self) -> Instruction {
        self.instruction
    }

    /// One clock edge: latch `rom[pc0]` during FETCH.
    pub fn tick(&mut self, stage: CoreStage, rom: &Program, pc0: u8) {
        if stage == CoreStage::Fetch {
            self.instruction = rom.fetch(pc0);
        }
    }
}

impl Default for Fetcher {
    fn default() -> Fetcher {
        Fetcher::new()
    }
}
