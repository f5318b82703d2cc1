//! Module emitter: header + code section

use std::io::{self, Write};
use byteorder::{LittleEndian, WriteBytesExt};
use crate::{AllocationError, CodeBuffer, Flags, OpCode, FORMAT_VERSION, HEADER_SIZE, MAGIC};

/// Writes a complete module (header followed by `code`) to `writer`
pub fn write_module<W: Write>(writer: &mut W, flags: Flags, code: &[u8]) -> io::Result<()> {
    let code_length = u32::try_from(code.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Code section exceeds 4 GiB"))?;

    writer.write_all(&MAGIC)?;
    writer.write_u8(FORMAT_VERSION)?;
    writer.write_u8(flags.bits())?;
    writer.write_u32::<LittleEndian>(code_length)?;
    writer.write_all(&[0u8; 6])?;

    writer.write_all(code)?;
    Ok(())
}

/// Assemble the final module bytes, appending an `exit` instruction if the
/// code does not already end with one.
pub fn finish(mut code: CodeBuffer, flags: Flags) -> Result<Vec<u8>, AllocationError> {
    if !code.ends_with_exit() {
        tracing::debug!(code_len = code.len(), "appending implicit exit");
        code.push_opcode(OpCode::Exit)?;
    }

    let total = HEADER_SIZE + code.len();
    let mut module = Vec::new();
    module
        .try_reserve_exact(total)
        .map_err(|_| AllocationError { requested: total })?;

    // Writing into a Vec cannot fail once the code length fits in u32
    write_module(&mut module, flags, code.as_slice())
        .map_err(|_| AllocationError { requested: total })?;
    Ok(module)
}
