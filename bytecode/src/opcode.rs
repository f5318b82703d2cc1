//! Opcodes understood by the BEXE virtual machine

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OpCode {
    // Console output
    PutChar = 0x01,    // Write one byte (1 byte operand)
    Print = 0x02,      // Write a zero-terminated string

    // File and buffer syscalls
    ReadFile = 0x10,   // Read file into the guest buffer (path)
    WriteFile = 0x11,  // Write data to a file (path, data)
    PrintBuf = 0x12,   // Print the whole guest buffer
    WriteBuf = 0x13,   // Write the guest buffer to a file (path)
    PrintLast = 0x14,  // Print the last byte of the guest buffer

    // Console control
    ReadKey = 0x20,    // Append one key press to the guest buffer
    Clear = 0x30,      // Clear the screen
    SetCursor = 0x31,  // Move the cursor (x byte, y byte)

    // Control flow
    JmpRel16 = 0x50,   // Unconditional relative jump (rel16)
    JeqLast = 0x51,    // Jump if last guest byte equals operand (byte, rel16)

    Noop = 0xF4,       // No operation
    Exit = 0xFF,       // End execution
}

/// Encoding of a single operand field following the opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// One raw byte
    Byte,
    /// Bytes up to and including a 0x00 terminator
    CString,
    /// Signed 16-bit little-endian offset, relative to the address after the field
    Rel16,
}

const PUTCHAR: u8 = OpCode::PutChar as u8;
const PRINT: u8 = OpCode::Print as u8;

const READFILE: u8 = OpCode::ReadFile as u8;
const WRITEFILE: u8 = OpCode::WriteFile as u8;
const PRINTBUF: u8 = OpCode::PrintBuf as u8;
const WRITEBUF: u8 = OpCode::WriteBuf as u8;
const PRINTLAST: u8 = OpCode::PrintLast as u8;

const READKEY: u8 = OpCode::ReadKey as u8;
const CLEAR: u8 = OpCode::Clear as u8;
const SETCURSOR: u8 = OpCode::SetCursor as u8;

const JMP_REL16: u8 = OpCode::JmpRel16 as u8;
const JEQ_LAST: u8 = OpCode::JeqLast as u8;

const NOOP: u8 = OpCode::Noop as u8;
const EXIT: u8 = OpCode::Exit as u8;

impl OpCode {
    /// Convert a byte to an opcode
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            PUTCHAR => Some(OpCode::PutChar),
            PRINT => Some(OpCode::Print),

            READFILE => Some(OpCode::ReadFile),
            WRITEFILE => Some(OpCode::WriteFile),
            PRINTBUF => Some(OpCode::PrintBuf),
            WRITEBUF => Some(OpCode::WriteBuf),
            PRINTLAST => Some(OpCode::PrintLast),

            READKEY => Some(OpCode::ReadKey),
            CLEAR => Some(OpCode::Clear),
            SETCURSOR => Some(OpCode::SetCursor),

            JMP_REL16 => Some(OpCode::JmpRel16),
            JEQ_LAST => Some(OpCode::JeqLast),

            NOOP => Some(OpCode::Noop),
            EXIT => Some(OpCode::Exit),

            _ => None,
        }
    }

    /// Convert an opcode to a byte
    pub fn to_byte(&self) -> u8 {
        *self as u8
    }

    /// Operand fields that follow the opcode byte, in order
    pub fn operands(&self) -> &'static [OperandKind] {
        use OperandKind::*;
        match self {
            OpCode::PutChar => &[Byte],
            OpCode::Print | OpCode::ReadFile | OpCode::WriteBuf => &[CString],
            OpCode::WriteFile => &[CString, CString],
            OpCode::SetCursor => &[Byte, Byte],
            OpCode::JmpRel16 => &[Rel16],
            OpCode::JeqLast => &[Byte, Rel16],
            OpCode::PrintBuf
            | OpCode::PrintLast
            | OpCode::ReadKey
            | OpCode::Clear
            | OpCode::Noop
            | OpCode::Exit => &[],
        }
    }

    /// Assembly-style mnemonic used by listings
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpCode::PutChar => "putchar",
            OpCode::Print => "print",
            OpCode::ReadFile => "readfile",
            OpCode::WriteFile => "writefile",
            OpCode::PrintBuf => "printbuf",
            OpCode::WriteBuf => "writebuf",
            OpCode::PrintLast => "printlast",
            OpCode::ReadKey => "readkey",
            OpCode::Clear => "clear",
            OpCode::SetCursor => "setcursor",
            OpCode::JmpRel16 => "jmp",
            OpCode::JeqLast => "jeq_last",
            OpCode::Noop => "noop",
            OpCode::Exit => "exit",
        }
    }

    pub fn is_jump(&self) -> bool {
        matches!(self, OpCode::JmpRel16 | OpCode::JeqLast)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OpCode::from_byte(byte).ok_or(byte)
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> Self {
        opcode.to_byte()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_byte_values() {
        assert_eq!(OpCode::PutChar.to_byte(), 0x01);
        assert_eq!(OpCode::Print.to_byte(), 0x02);
        assert_eq!(OpCode::ReadFile.to_byte(), 0x10);
        assert_eq!(OpCode::WriteFile.to_byte(), 0x11);
        assert_eq!(OpCode::PrintBuf.to_byte(), 0x12);
        assert_eq!(OpCode::WriteBuf.to_byte(), 0x13);
        assert_eq!(OpCode::PrintLast.to_byte(), 0x14);
        assert_eq!(OpCode::ReadKey.to_byte(), 0x20);
        assert_eq!(OpCode::Clear.to_byte(), 0x30);
        assert_eq!(OpCode::SetCursor.to_byte(), 0x31);
        assert_eq!(OpCode::JmpRel16.to_byte(), 0x50);
        assert_eq!(OpCode::JeqLast.to_byte(), 0x51);
        assert_eq!(OpCode::Noop.to_byte(), 0xF4);
        assert_eq!(OpCode::Exit.to_byte(), 0xFF);
    }

    #[test]
    fn test_byte_to_opcode_conversion() {
        assert_eq!(OpCode::from_byte(0x02), Some(OpCode::Print));
        assert_eq!(OpCode::from_byte(0x51), Some(OpCode::JeqLast));
        assert_eq!(OpCode::from_byte(0xFF), Some(OpCode::Exit));

        assert_eq!(OpCode::from_byte(0x00), None);
        assert_eq!(OpCode::from_byte(0x62), None);
    }

    #[test]
    fn test_try_from_reports_offending_byte() {
        assert_eq!(OpCode::try_from(0x31u8), Ok(OpCode::SetCursor));
        assert_eq!(OpCode::try_from(0x99u8), Err(0x99));

        let byte: u8 = OpCode::JmpRel16.into();
        assert_eq!(byte, 0x50);
    }

    #[test]
    fn test_operand_layouts() {
        assert!(OpCode::Exit.operands().is_empty());
        assert!(OpCode::Clear.operands().is_empty());
        assert_eq!(OpCode::PutChar.operands(), &[OperandKind::Byte]);
        assert_eq!(OpCode::WriteFile.operands(), &[OperandKind::CString, OperandKind::CString]);
        assert_eq!(OpCode::SetCursor.operands(), &[OperandKind::Byte, OperandKind::Byte]);
        assert_eq!(OpCode::JeqLast.operands(), &[OperandKind::Byte, OperandKind::Rel16]);
    }

    #[test]
    fn test_only_control_flow_opcodes_jump() {
        assert!(OpCode::JmpRel16.is_jump());
        assert!(OpCode::JeqLast.is_jump());
        assert!(!OpCode::Print.is_jump());
        assert!(!OpCode::Exit.is_jump());
    }
}
