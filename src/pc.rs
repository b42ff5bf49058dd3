//! Per-thread program counter and NZP condition flags.
//!
//! EXECUTE computes the next PC (branch target on a flag match, PC+1
//! otherwise); UPDATE latches fresh flags after a CMP; the PC itself only
//! commits when the scheduler leaves UPDATE for the next FETCH, so a
//! stalled warp re-evaluates against a stable PC.
//!
//! Every thread keeps private flags and computes a private next PC, but the
//! fetcher only consults thread 0 — the warp cannot actually diverge. The
//! branch-taken test is bitwise: any requested condition bit present in the
//! current flags takes the branch.

#[derive(Debug, Clone)]
pub struct PcNzp {
    pc: u8,
    next_pc: u8,
    nzp: u8,
}

impl PcNzp {
    pub fn new() -> PcNzp {
        PcNzp { pc: 0, next_pc: 0, nzp: 0 }
    }

    pub fn reset(&mut self) {
        self.pc = 0;
        self.next_pc = 0;
        self.nzp = 0;
    }

    pub fn pc(&self) -> u8 {
        self.pc
    }

    pub fn nzp(&self) -> u8 {
        self.nzp
    }

    /// EXECUTE: pick the next PC. `branch` is the decoder's next-PC mux.
    pub fn execute(&mut self, branch: bool, nzp_mask: u8, imm8: u8) {
        self.next_pc = if branch && (self.nzp & nzp_mask) != 0 {
            imm8
        } else {
            self.pc.wrapping_add(1)
        };
    }

    /// UPDATE: latch flags from the ALU output when a CMP retires.
    pub fn update(&mut self, nzp_write: bool, alu_out: u8) {
        if nzp_write {
            self.nzp = alu_out & 0b111;
        }
    }

    /// Commit the PC as the scheduler advances UPDATE→FETCH.
    pub fn commit(&mut self) {
        self.pc = self.next_pc;
    }
}

impl Default for PcNzp {
    fn default() -> PcNzp {
        PcNzp::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{NZP_N, NZP_P};

    #[test]
    fn sequential_flow_increments_and_wraps() {
        let mut pc = PcNzp::new();
        pc.execute(false, 0, 0);
        pc.commit();
        assert_eq!(pc.pc(), 1);

        let mut end = PcNzp::new();
        for _ in 0..=255 {
            end.execute(false, 0, 0);
            end.commit();
        }
        assert_eq!(end.pc(), 0); // 255 increments to 0, no fault
    }

    #[test]
    fn branch_taken_on_any_masked_flag() {
        let mut pc = PcNzp::new();
        pc.update(true, NZP_N);
        pc.execute(true, NZP_N | NZP_P, 9);
        pc.commit();
        assert_eq!(pc.pc(), 9);
    }

    #[test]
    fn branch_falls_through_when_mask_misses() {
        let mut pc = PcNzp::new();
        pc.update(true, NZP_N);
        pc.execute(true, NZP_P, 9);
        pc.commit();
        assert_eq!(pc.pc(), 1);
    }

    #[test]
    fn flags_hold_unless_write_enabled() {
        let mut pc = PcNzp::new();
        pc.update(true, NZP_P);
        pc.update(false, NZP_N);
        assert_eq!(pc.nzp(), NZP_P);
    }

    #[test]
    fn pc_only_moves_on_commit() {
        let mut pc = PcNzp::new();
        pc.execute(false, 0, 0);
        assert_eq!(pc.pc(), 0); // stalled UPDATE: pc stable
        pc.commit();
        assert_eq!(pc.pc(), 1);
    }
}
