//! Growable code buffer used as the emission target by the compiler

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;
use crate::OpCode;

/// Raised when the buffer cannot grow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to grow code buffer to {requested} bytes")]
pub struct AllocationError {
    pub requested: usize,
}

/// Append-only byte sequence with in-place patching of already emitted bytes.
///
/// The buffer remembers the last opcode pushed through [`CodeBuffer::push_opcode`],
/// so callers can ask whether the program ends in an `exit` instruction without
/// confusing an operand byte of 0xFF for the exit opcode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBuffer {
    bytes: Vec<u8>,
    last_opcode: Option<OpCode>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn ends_with_exit(&self) -> bool {
        self.last_opcode == Some(OpCode::Exit)
    }

    fn reserve(&mut self, additional: usize) -> Result<(), AllocationError> {
        self.bytes.try_reserve(additional).map_err(|_| AllocationError {
            requested: self.bytes.len().saturating_add(additional),
        })
    }

    /// Start a new instruction
    pub fn push_opcode(&mut self, opcode: OpCode) -> Result<(), AllocationError> {
        self.push(opcode.to_byte())?;
        self.last_opcode = Some(opcode);
        Ok(())
    }

    pub fn push(&mut self, byte: u8) -> Result<(), AllocationError> {
        self.reserve(1)?;
        self.bytes.push(byte);
        Ok(())
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), AllocationError> {
        self.reserve(bytes.len())?;
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    /// Push `bytes` followed by a 0x00 terminator. Embedded zero bytes are kept as-is.
    pub fn push_cstring(&mut self, bytes: &[u8]) -> Result<(), AllocationError> {
        self.reserve(bytes.len() + 1)?;
        self.bytes.extend_from_slice(bytes);
        self.bytes.push(0x00);
        Ok(())
    }

    pub fn push_i16(&mut self, value: i16) -> Result<(), AllocationError> {
        let mut field = [0u8; 2];
        LittleEndian::write_i16(&mut field, value);
        self.push_bytes(&field)
    }

    /// Overwrite the two bytes at `at` with `value` (little-endian).
    ///
    /// # Panics
    ///
    /// Panics if `at + 2` exceeds the buffer length.
    pub fn patch_i16(&mut self, at: usize, value: i16) {
        LittleEndian::write_i16(&mut self.bytes[at..at + 2], value);
    }

    /// Splice another buffer onto the end of this one
    pub fn append(&mut self, other: &CodeBuffer) -> Result<(), AllocationError> {
        self.push_bytes(other.as_slice())?;
        if other.last_opcode.is_some() {
            self.last_opcode = other.last_opcode;
        }
        Ok(())
    }
}
