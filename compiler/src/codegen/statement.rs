use bx_bytecode::{AllocationError, CodeBuffer, Flags, OpCode};

/// A parsed statement, with every operand already resolved to bytes or numbers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Print(Vec<u8>),
    PutChar(u8),
    Exit,
    Clear,
    SetCursor { x: u8, y: u8 },
    ReadKey,
    ReadFile(Vec<u8>),
    WriteFile { path: Vec<u8>, data: Vec<u8> },
    PrintBuf,
    PrintLast,
    WriteBuf(Vec<u8>),
    /// Only valid inside a loop body
    BreakIfLast(u8),
}

impl Statement {
    pub fn opcode(&self) -> OpCode {
        match self {
            Statement::Print(_) => OpCode::Print,
            Statement::PutChar(_) => OpCode::PutChar,
            Statement::Exit => OpCode::Exit,
            Statement::Clear => OpCode::Clear,
            Statement::SetCursor { .. } => OpCode::SetCursor,
            Statement::ReadKey => OpCode::ReadKey,
            Statement::ReadFile(_) => OpCode::ReadFile,
            Statement::WriteFile { .. } => OpCode::WriteFile,
            Statement::PrintBuf => OpCode::PrintBuf,
            Statement::PrintLast => OpCode::PrintLast,
            Statement::WriteBuf(_) => OpCode::WriteBuf,
            Statement::BreakIfLast(_) => OpCode::JeqLast,
        }
    }

    /// Header feature flags this statement turns on
    pub fn required_flags(&self) -> Flags {
        match self {
            Statement::Clear
            | Statement::SetCursor { .. }
            | Statement::ReadKey
            | Statement::PrintBuf
            | Statement::PrintLast => Flags::CONSOLE,
            Statement::ReadFile(_) | Statement::WriteFile { .. } | Statement::WriteBuf(_) => {
                Flags::FILE_IO
            }
            Statement::Print(_)
            | Statement::PutChar(_)
            | Statement::Exit
            | Statement::BreakIfLast(_) => Flags::empty(),
        }
    }

    /// Append the encoded instruction to `out`. For `BreakIfLast` the offset of
    /// the zeroed 16-bit placeholder is returned so it can be patched later.
    pub fn emit(&self, out: &mut CodeBuffer) -> Result<Option<usize>, AllocationError> {
        out.push_opcode(self.opcode())?;
        match self {
            Statement::Print(text) => out.push_cstring(text)?,
            Statement::PutChar(ch) => out.push(*ch)?,
            Statement::SetCursor { x, y } => out.push_bytes(&[*x, *y])?,
            Statement::ReadFile(path) | Statement::WriteBuf(path) => out.push_cstring(path)?,
            Statement::WriteFile { path, data } => {
                out.push_cstring(path)?;
                out.push_cstring(data)?;
            }
            Statement::BreakIfLast(value) => {
                out.push(*value)?;
                let placeholder = out.len();
                out.push_i16(0)?;
                return Ok(Some(placeholder));
            }
            Statement::Exit
            | Statement::Clear
            | Statement::ReadKey
            | Statement::PrintBuf
            | Statement::PrintLast => {}
        }
        Ok(None)
    }
}

/// Saturate a coordinate into the 0..=255 range
pub fn clamp_coordinate(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}
