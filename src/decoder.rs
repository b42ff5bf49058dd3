//! Per-core instruction decoder.
//!
//! Turns the fetched instruction into the control-signal bundle the rest
//! of the core consumes. The bundle is registered during DECODE and then
//! broadcast read-only to every thread for the remainder of the
//! instruction; signals default to inactive and only the ones the opcode
//! needs are asserted.

use crate::alu::AluOp;
use crate::isa::{Instruction, Opcode};
use crate::scheduler::CoreStage;

/// Write-back source for the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegSource {
    #[default]
    Alu,
    Lsu,
    Immediate,
}

/// The decoded control bundle for one instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSignals {
    pub reg_write_enable: bool,
    pub reg_source: RegSource,
    pub mem_read_enable: bool,
    pub mem_write_enable: bool,
    pub nzp_write_enable: bool,
    pub alu_op: AluOp,
    /// ALU output mux: true selects the packed NZP comparison.
    pub alu_compare: bool,
    /// Next-PC mux: true selects the branch target on a flag match.
    pub branch: bool,
    pub ret: bool,
    pub rd: u8,
    pub rs: u8,
    pub rt: u8,
    pub nzp_mask: u8,
    pub imm8: u8,
}

impl ControlSignals {
    /// Combinational decode of one instruction.
    pub fn decode(instr: Instruction) -> ControlSignals {
        let mut sig = ControlSignals {
            rd: instr.rd,
            rs: instr.rs,
            rt: instr.rt,
            nzp_mask: instr.nzp_mask,
            imm8: instr.imm8,
            ..ControlSignals::default()
        };
        match instr.opcode {
            Opcode::Nop => {}
            Opcode::Br => sig.branch = true,
            Opcode::Cmp => {
                sig.alu_op = AluOp::Sub;
                sig.alu_compare = true;
                sig.nzp_write_enable = true;
            }
            Opcode::Add => sig.set_arith(AluOp::Add),
            Opcode::Sub => sig.set_arith(AluOp::Sub),
            Opcode::Mul => sig.set_arith(AluOp::Mul),
            Opcode::Div => sig.set_arith(AluOp::Div),
            Opcode::Ldr => {
                sig.mem_read_enable = true;
                sig.reg_write_enable = true;
                sig.reg_source = RegSource::Lsu;
            }
            Opcode::Str => sig.mem_write_enable = true,
            Opcode::Const => {
                sig.reg_write_enable = true;
                sig.reg_source = RegSource::Immediate;
            }
            Opcode::Ret => sig.ret = true,
        }
        sig
    }

    fn set_arith(&mut self, op: AluOp) {
        self.alu_op = op;
        self.reg_write_enable = true;
        self.reg_source = RegSource::Alu;
    }
}

/// The registered decoder output for one core.
pub struct Decoder {
    signals: ControlSignals,
}

impl Decoder {
    pub fn new() -> Decoder {
        Decoder { signals: ControlSignals::default() }
    }

    pub fn reset(&mut self) {
        self.signals = ControlSignals::default();
    }

    pub fn signals(&self) -> ControlSignals {
        self.signals
    }

    /// One clock edge: register the control bundle during DECODE; hold it
    /// otherwise.
    pub fn tick(&mut self, stage: CoreStage, instr: Instruction) {
        if stage == CoreStage::Decode {
            self.signals = ControlSignals::decode(instr);
        }
    }
}

impl Default for Decoder {
    fn default() -> Decoder {
        Decoder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::NZP_N;

    #[test]
    fn nop_asserts_nothing() {
        let sig = ControlSignals::decode(Instruction::nop());
        assert_eq!(sig, ControlSignals::default());
    }

    #[test]
    fn arithmetic_writes_back_from_the_alu() {
        let sig = ControlSignals::decode(Instruction::add(3, 1, 2));
        assert!(sig.reg_write_enable);
        assert_eq!(sig.reg_source, RegSource::Alu);
        assert_eq!(sig.alu_op, AluOp::Add);
        assert!(!sig.alu_compare && !sig.mem_read_enable && !sig.mem_write_enable);
        assert_eq!((sig.rd, sig.rs, sig.rt), (3, 1, 2));

        assert_eq!(ControlSignals::decode(Instruction::sub(0, 1, 2)).alu_op, AluOp::Sub);
        assert_eq!(ControlSignals::decode(Instruction::mul(0, 1, 2)).alu_op, AluOp::Mul);
        assert_eq!(ControlSignals::decode(Instruction::div(0, 1, 2)).alu_op, AluOp::Div);
    }

    #[test]
    fn cmp_drives_the_nzp_path_not_the_register_file() {
        let sig = ControlSignals::decode(Instruction::cmp(1, 2));
        assert!(sig.alu_compare && sig.nzp_write_enable);
        assert_eq!(sig.alu_op, AluOp::Sub);
        assert!(!sig.reg_write_enable);
    }

    #[test]
    fn branch_extracts_mask_and_target_from_the_overlapped_fields() {
        let sig = ControlSignals::decode(Instruction::branch(NZP_N, 0x2a));
        assert!(sig.branch);
        assert_eq!(sig.nzp_mask, NZP_N);
        assert_eq!(sig.imm8, 0x2a);
    }

    #[test]
    fn memory_opcodes_drive_the_lsu() {
        let ldr = ControlSignals::decode(Instruction::load(1, 2));
        assert!(ldr.mem_read_enable && ldr.reg_write_enable);
        assert_eq!(ldr.reg_source, RegSource::Lsu);

        let str_ = ControlSignals::decode(Instruction::store(2, 3));
        assert!(str_.mem_write_enable);
        assert!(!str_.reg_write_enable && !str_.mem_read_enable);
    }

    #[test]
    fn const_selects_the_immediate() {
        let sig = ControlSignals::decode(Instruction::constant(4, 0x55));
        assert!(sig.reg_write_enable);
        assert_eq!(sig.reg_source, RegSource::Immediate);
        assert_eq!(sig.imm8, 0x55);
    }

    #[test]
    fn ret_only_raises_ret() {
        let sig = ControlSignals::decode(Instruction::ret());
        assert!(sig.ret);
        assert!(!sig.reg_write_enable && !sig.mem_read_enable && !sig.mem_write_enable);
    }

    #[test]
    fn decoder_registers_only_during_decode() {
        let mut dec = Decoder::new();
        let add = Instruction::add(3, 1, 2);
        dec.tick(CoreStage::Fetch, add);
        assert_eq!(dec.signals(), ControlSignals::default());
        dec.tick(CoreStage::Decode, add);
        assert!(dec.signals().reg_write_enable);
        // latched bundle holds through later stages
        dec.tick(CoreStage::Execute, Instruction::ret());
        assert!(!dec.signals().ret);
    }
}
