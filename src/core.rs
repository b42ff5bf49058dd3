//! One SIMT core: a lockstep warp pipeline.
//!
//! A core bundles the scheduler, fetcher and decoder with one datapath per
//! hardware thread (register file, ALU, PC/NZP, LSU). Fetch and decode run
//! once per core; the decoded bundle is broadcast to all threads, which
//! execute it in lockstep over private state.
//!
//! `tick` models one clock edge with two-phase semantics: every signal a
//! sub-unit consumes is snapshotted from pre-tick state before any unit
//! updates, so evaluation order inside the tick cannot leak next-state
//! values — the hardware's "all registers update on the clock edge" rule.

use crate::alu::Alu;
use crate::controller::MemReply;
use crate::decoder::{Decoder, RegSource};
use crate::dispatcher::CoreControl;
use crate::fetcher::Fetcher;
use crate::lsu::{Lsu, LsuState};
use crate::pc::PcNzp;
use crate::program::Program;
use crate::regfile::RegisterFile;
use crate::scheduler::{CoreStage, Scheduler};

/// One thread's private datapath.
pub struct Thread {
    pub regs: RegisterFile,
    pub alu: Alu,
    pub pc: PcNzp,
    pub lsu: Lsu,
}

impl Thread {
    pub fn new(thread_id: u8) -> Thread {
        Thread {
            regs: RegisterFile::new(thread_id),
            alu: Alu::new(),
            pc: PcNzp::new(),
            lsu: Lsu::new(),
        }
    }

    pub fn reset(&mut self, thread_id: u8) {
        self.regs.reset(thread_id);
        self.alu.reset();
        self.pc.reset();
        self.lsu.reset();
    }
}

pub struct Core {
    pub id: usize,
    pub scheduler: Scheduler,
    pub fetcher: Fetcher,
    pub decoder: Decoder,
    pub threads: Vec<Thread>,
    /// Instructions retired by this core since reset.
    pub retired: u64,
}

impl Core {
    pub fn new(id: usize, threads_per_block: usize) -> Core {
        Core {
            id,
            scheduler: Scheduler::new(),
            fetcher: Fetcher::new(),
            decoder: Decoder::new(),
            threads: (0..threads_per_block).map(|j| Thread::new(j as u8)).collect(),
            retired: 0,
        }
    }

    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.fetcher.reset();
        self.decoder.reset();
        for (j, thread) in self.threads.iter_mut().enumerate() {
            thread.reset(j as u8);
        }
        self.retired = 0;
    }

    /// High while the latched block's RET has retired.
    pub fn done(&self) -> bool {
        self.scheduler.done()
    }

    /// One clock edge. `ctl` is the dispatcher's control lines, `replies`
    /// the controller's answer lines for this core's consumers, one per
    /// thread.
    pub fn tick(&mut self, ctl: CoreControl, rom: &Program, replies: &[MemReply]) {
        if ctl.reset {
            // Synchronous reset: back to IDLE, in-flight requests dropped.
            let retired = self.retired;
            self.reset();
            self.retired = retired;
            return;
        }

        // Pre-tick snapshot of every broadcast and per-thread signal.
        let stage = self.scheduler.stage();
        let instr = self.fetcher.instruction();
        let sig = self.decoder.signals();
        let pc0 = self.threads[0].pc.pc();
        let lsu_states: Vec<LsuState> =
            self.threads.iter().map(|t| t.lsu.state()).collect();
        let rs_vals: Vec<u8> = self.threads.iter().map(|t| t.regs.read(sig.rs)).collect();
        let rt_vals: Vec<u8> = self.threads.iter().map(|t| t.regs.read(sig.rt)).collect();
        let alu_outs: Vec<u8> = self.threads.iter().map(|t| t.alu.out()).collect();
        let lsu_outs: Vec<u8> = self.threads.iter().map(|t| t.lsu.out()).collect();

        let edge = self.scheduler.tick(
            ctl.start,
            ctl.block_id,
            ctl.thread_count,
            sig.ret,
            &lsu_states,
        );
        if edge.retired {
            self.retired += 1;
        }
        if edge.block_latched {
            for thread in &mut self.threads {
                thread.regs.bind_block(ctl.block_id, ctl.thread_count);
            }
        }

        self.fetcher.tick(stage, rom, pc0);
        self.decoder.tick(stage, instr);

        for (j, thread) in self.threads.iter_mut().enumerate() {
            if stage == CoreStage::Execute {
                thread.alu.execute(sig.alu_op, sig.alu_compare, rs_vals[j], rt_vals[j]);
                thread.pc.execute(sig.branch, sig.nzp_mask, sig.imm8);
            }
            if stage == CoreStage::Update {
                thread.pc.update(sig.nzp_write_enable, alu_outs[j]);
                if sig.reg_write_enable {
                    let value = match sig.reg_source {
                        RegSource::Alu => alu_outs[j],
                        RegSource::Lsu => lsu_outs[j],
                        RegSource::Immediate => sig.imm8,
                    };
                    thread.regs.write(sig.rd, value);
                }
            }
            if edge.pc_commit {
                thread.pc.commit();
            }
            thread.lsu.tick(
                stage,
                sig.mem_read_enable,
                sig.mem_write_enable,
                rs_vals[j],
                rt_vals[j],
                replies[j],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Instruction;

    fn idle_replies(n: usize) -> Vec<MemReply> {
        vec![MemReply::default(); n]
    }

    fn start_ctl(block_id: u8, thread_count: u8) -> CoreControl {
        CoreControl { start: true, reset: false, block_id, thread_count }
    }

    const RUN: CoreControl =
        CoreControl { start: false, reset: false, block_id: 0, thread_count: 0 };

    /// Drive a core with no memory traffic until its RET retires.
    fn run_to_done(core: &mut Core, rom: &Program, max_cycles: usize) {
        let replies = idle_replies(core.threads.len());
        for _ in 0..max_cycles {
            if core.done() {
                return;
            }
            core.tick(RUN, rom, &replies);
        }
        panic!("core did not finish within {max_cycles} cycles");
    }

    #[test]
    fn const_add_runs_in_lockstep_across_threads() {
        let rom = Program::from_instructions(&[
            Instruction::constant(1, 5),
            Instruction::constant(2, 7),
            Instruction::add(3, 1, 2),
            Instruction::ret(),
        ])
        .unwrap();
        let mut core = Core::new(0, 4);
        core.tick(start_ctl(0, 4), &rom, &idle_replies(4));
        run_to_done(&mut core, &rom, 64);

        for thread in &core.threads {
            assert_eq!(thread.regs.read(3), 12);
        }
        assert_eq!(core.retired, 4);
    }

    #[test]
    fn identity_registers_differ_per_thread() {
        let rom = Program::from_instructions(&[
            // R4 = block_id * threads + thread_id
            Instruction::mul(4, 13, 15),
            Instruction::add(4, 4, 14),
            Instruction::ret(),
        ])
        .unwrap();
        let mut core = Core::new(0, 4);
        core.tick(start_ctl(2, 4), &rom, &idle_replies(4));
        run_to_done(&mut core, &rom, 64);

        for (j, thread) in core.threads.iter().enumerate() {
            assert_eq!(thread.regs.read(4), 2 * 4 + j as u8);
        }
    }

    #[test]
    fn cmp_then_branch_follows_per_thread_flags() {
        // CMP R14, R1 with R1=2: threads 0,1 take the N branch to the RET
        // at 4; the fetcher follows thread 0, so the warp lands there.
        let rom = Program::from_instructions(&[
            Instruction::constant(1, 2),
            Instruction::cmp(14, 1),
            Instruction::branch(crate::isa::NZP_N, 4),
            Instruction::nop(),
            Instruction::ret(),
        ])
        .unwrap();
        let mut core = Core::new(0, 4);
        core.tick(start_ctl(0, 4), &rom, &idle_replies(4));
        run_to_done(&mut core, &rom, 128);

        // thread 0 (id 0 < 2) branched; its PC path skipped address 3
        assert_eq!(core.threads[0].pc.pc(), 4);
    }

    #[test]
    fn nops_only_advance_the_pc() {
        let rom = Program::from_instructions(&[
            Instruction::nop(),
            Instruction::nop(),
            Instruction::ret(),
        ])
        .unwrap();
        let mut core = Core::new(0, 4);
        core.tick(start_ctl(0, 4), &rom, &idle_replies(4));
        run_to_done(&mut core, &rom, 64);

        assert_eq!(core.retired, 3);
        for thread in &core.threads {
            // two NOPs are one NOP plus pc += 2: no other state moves
            assert_eq!(thread.pc.pc(), 2);
            assert_eq!(thread.pc.nzp(), 0);
            for r in 0..13 {
                assert_eq!(thread.regs.read(r), 0);
            }
        }
    }

    #[test]
    fn reset_control_line_returns_the_core_to_idle() {
        let rom = Program::from_instructions(&[Instruction::ret()]).unwrap();
        let mut core = Core::new(0, 2);
        core.tick(start_ctl(1, 2), &rom, &idle_replies(2));
        assert_eq!(core.scheduler.stage(), CoreStage::Fetch);

        let reset = CoreControl { start: false, reset: true, block_id: 0, thread_count: 0 };
        core.tick(reset, &rom, &idle_replies(2));
        assert_eq!(core.scheduler.stage(), CoreStage::Idle);
        assert!(!core.done());
    }
}
