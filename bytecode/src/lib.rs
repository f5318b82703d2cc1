// bx-bytecode - the BEXE module format shared by the bx compiler and tooling

mod buffer;
mod instruction;
mod opcode;
mod parser;
mod writer;

pub use buffer::{AllocationError, CodeBuffer};
pub use instruction::{decode, DecodeError, Instruction, Listing, Operand};
pub use opcode::{OpCode, OperandKind};
pub use parser::{ParseError, Parser};
pub use writer::{finish, write_module};

use bitflags::bitflags;

/// Magic bytes at the start of every module
pub const MAGIC: [u8; 4] = *b"BEXE";

/// The only module version this crate reads or writes
pub const FORMAT_VERSION: u8 = 1;

/// magic(4) + version(1) + flags(1) + code_length(4) + reserved(6)
pub const HEADER_SIZE: usize = 16;

bitflags! {
    /// Runtime features a module relies on. Informational only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u8 {
        const FILE_IO = 0x01;
        const CONSOLE = 0x02;
    }
}

/// A decoded BEXE module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub version: u8,
    pub flags: Flags,
    pub code: Vec<u8>,
}

impl Module {
    pub fn new(flags: Flags, code: Vec<u8>) -> Self {
        Self {
            version: FORMAT_VERSION,
            flags,
            code,
        }
    }
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
