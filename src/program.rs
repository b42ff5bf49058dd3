//! Kernel programs and the instruction ROM image.
//!
//! A program is 256 sixteen-bit words; addresses past the loaded kernel
//! default to the all-zero word, which decodes as NOP. Programs come from
//! word slices, instruction lists, or a plain text listing with one 4-digit
//! hex word per line (`#` and `;` start comments).

use crate::isa::Instruction;
use thiserror::Error;

/// Number of instruction words the ROM holds (8-bit program counter).
pub const ROM_WORDS: usize = 256;

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("program has {0} words, ROM holds {ROM_WORDS}")]
    TooLong(usize),
    #[error("line {line}: malformed instruction word `{text}`")]
    BadWord { line: usize, text: String },
}

/// Read-only instruction store, one per simulated device.
#[derive(Clone, Debug)]
pub struct Program {
    words: [u16; ROM_WORDS],
}

impl Program {
    /// An empty program: every address decodes as NOP.
    pub fn new() -> Program {
        Program { words: [0; ROM_WORDS] }
    }

    pub fn from_words(words: &[u16]) -> Result<Program, ProgramError> {
        if words.len() > ROM_WORDS {
            return Err(ProgramError::TooLong(words.len()));
        }
        let mut rom = Program::new();
        rom.words[..words.len()].copy_from_slice(words);
        Ok(rom)
    }

    pub fn from_instructions(instrs: &[Instruction]) -> Result<Program, ProgramError> {
        let words: Vec<u16> = instrs.iter().map(Instruction::encode).collect();
        Program::from_words(&words)
    }

    /// Parse a text listing: one 16-bit hex word per line, in address order.
    /// Blank lines are skipped; `#` or `;` starts a comment.
    pub fn parse(text: &str) -> Result<Program, ProgramError> {
        let mut words = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw
                .split(&['#', ';'][..])
                .next()
                .unwrap_or("")
                .trim();
            if line.is_empty() {
                continue;
            }
            let word = u16::from_str_radix(line, 16).map_err(|_| ProgramError::BadWord {
                line: idx + 1,
                text: line.to_string(),
            })?;
            words.push(word);
        }
        Program::from_words(&words)
    }

    /// Raw word at `addr`.
    pub fn word(&self, addr: u8) -> u16 {
        self.words[usize::from(addr)]
    }

    /// Combinational ROM lookup: the decoded instruction at `addr`.
    pub fn fetch(&self, addr: u8) -> Instruction {
        Instruction::decode(self.word(addr))
    }
}

impl Default for Program {
    fn default() -> Program {
        Program::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Opcode;

    #[test]
    fn unloaded_addresses_fetch_nop() {
        let rom = Program::from_words(&[0x3312]).unwrap();
        assert_eq!(rom.fetch(0).opcode, Opcode::Add);
        assert_eq!(rom.fetch(1), Instruction::NOP);
        assert_eq!(rom.fetch(255), Instruction::NOP);
    }

    #[test]
    fn parse_listing_with_comments() {
        let rom = Program::parse(
            "# vec pieces\n\
             9105  ; CONST R1, #5\n\
             \n\
             9207\n\
             f000  # RET\n",
        )
        .unwrap();
        assert_eq!(rom.word(0), 0x9105);
        assert_eq!(rom.word(1), 0x9207);
        assert_eq!(rom.word(2), 0xf000);
        assert_eq!(rom.word(3), 0x0000);
    }

    #[test]
    fn parse_rejects_malformed_words() {
        let err = Program::parse("9105\nxyzw\n").unwrap_err();
        match err {
            ProgramError::BadWord { line, text } => {
                assert_eq!(line, 2);
                assert_eq!(text, "xyzw");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn oversized_programs_are_rejected() {
        let words = vec![0u16; ROM_WORDS + 1];
        assert!(matches!(
            Program::from_words(&words),
            Err(ProgramError::TooLong(_))
        ));
    }
}
