use std::fmt;
use byteorder::{ByteOrder, LittleEndian};
use rustc_hash::FxHashMap;
use serde::Serialize;
use thiserror::Error;
use crate::{OpCode, OperandKind};

/// A decoded operand field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Operand {
    Byte(u8),
    /// String bytes, without the terminator
    Bytes(Vec<u8>),
    Rel16(i16),
}

/// Represents a single decoded instruction with its operands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub offset: usize,
    pub size: usize,
    pub opcode: OpCode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    /// Offset of the byte immediately after this instruction
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Absolute target of a relative jump. The 16-bit field is always the last
    /// operand, so the instruction pointer after the field is `end()`.
    pub fn jump_target(&self) -> Option<i64> {
        self.operands.iter().rev().find_map(|operand| match operand {
            Operand::Rel16(rel) => Some(self.end() as i64 + i64::from(*rel)),
            _ => None,
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}: {}", self.offset, self.opcode.mnemonic())?;
        for (idx, operand) in self.operands.iter().enumerate() {
            let sep = if idx == 0 { " " } else { ", " };
            match operand {
                Operand::Byte(b) => write!(f, "{}{}", sep, b)?,
                Operand::Bytes(bytes) => write!(f, "{}\"{}\"", sep, bytes.escape_ascii())?,
                Operand::Rel16(rel) => write!(f, "{}{:+}", sep, rel)?,
            }
        }
        if let Some(target) = self.jump_target() {
            write!(f, " -> {:04X}", target)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown opcode 0x{byte:02X} at offset {offset}")]
    UnknownOpcode { offset: usize, byte: u8 },

    #[error("Truncated {opcode:?} instruction at offset {offset}")]
    Truncated { offset: usize, opcode: OpCode },

    #[error("Unterminated string operand at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("Jump at offset {offset} targets {target}, outside the code section")]
    JumpOutOfBounds { offset: usize, target: i64 },

    #[error("Jump at offset {offset} targets {target}, which is not an instruction boundary")]
    MisalignedJump { offset: usize, target: usize },
}

/// Disassembly of a code section
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub instructions: Vec<Instruction>,
    pub code_len: usize,
    #[serde(skip)]
    pub address_map: FxHashMap<usize, usize>,
}

impl Listing {
    pub fn instruction_at(&self, offset: usize) -> Option<&Instruction> {
        self.address_map
            .get(&offset)
            .and_then(|idx| self.instructions.get(*idx))
    }

    /// Check that every jump lands on an instruction boundary or at the end of code
    pub fn verify_jumps(&self) -> Result<(), DecodeError> {
        for instruction in &self.instructions {
            let Some(target) = instruction.jump_target() else {
                continue;
            };
            if target < 0 || target > self.code_len as i64 {
                return Err(DecodeError::JumpOutOfBounds {
                    offset: instruction.offset,
                    target,
                });
            }
            let target = target as usize;
            if target != self.code_len && !self.address_map.contains_key(&target) {
                return Err(DecodeError::MisalignedJump {
                    offset: instruction.offset,
                    target,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{}", instruction)?;
        }
        Ok(())
    }
}

/// Decode a code section into a listing. Strings end at the first zero byte,
/// the same way the virtual machine reads them.
pub fn decode(code: &[u8]) -> Result<Listing, DecodeError> {
    let mut instructions = Vec::new();
    let mut address_map = FxHashMap::default();
    let mut pos = 0;

    while pos < code.len() {
        let offset = pos;
        let byte = code[pos];
        let opcode = OpCode::from_byte(byte).ok_or(DecodeError::UnknownOpcode { offset, byte })?;
        pos += 1;

        let mut operands = Vec::with_capacity(opcode.operands().len());
        for kind in opcode.operands() {
            match kind {
                OperandKind::Byte => {
                    let b = *code.get(pos).ok_or(DecodeError::Truncated { offset, opcode })?;
                    operands.push(Operand::Byte(b));
                    pos += 1;
                }
                OperandKind::CString => {
                    let rest = &code[pos..];
                    let len = rest
                        .iter()
                        .position(|b| *b == 0)
                        .ok_or(DecodeError::UnterminatedString { offset: pos })?;
                    operands.push(Operand::Bytes(rest[..len].to_vec()));
                    pos += len + 1;
                }
                OperandKind::Rel16 => {
                    let field = code
                        .get(pos..pos + 2)
                        .ok_or(DecodeError::Truncated { offset, opcode })?;
                    operands.push(Operand::Rel16(LittleEndian::read_i16(field)));
                    pos += 2;
                }
            }
        }

        address_map.insert(offset, instructions.len());
        instructions.push(Instruction {
            offset,
            size: pos - offset,
            opcode,
            operands,
        });
    }

    Ok(Listing {
        instructions,
        code_len: code.len(),
        address_map,
    })
}
