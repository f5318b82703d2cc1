use std::io::{Error as IoError, Read};
use byteorder::{ReadBytesExt, LittleEndian};
use thiserror::Error;
use crate::{Flags, Module, FORMAT_VERSION, MAGIC};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    IoError(#[from] IoError),

    #[error("Invalid module format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported module version: {0}")]
    UnsupportedVersion(u8),
}

pub struct Parser;

impl Parser {
    /// Parse a module from a reader (file, memory buffer, etc.)
    pub fn parse<R: Read>(reader: &mut R) -> Result<Module, ParseError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ParseError::InvalidFormat("Invalid magic number".to_string()));
        }

        let version = reader.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(ParseError::UnsupportedVersion(version));
        }

        // Flags are informational; bits this crate does not know are kept
        let flags = Flags::from_bits_retain(reader.read_u8()?);

        let code_length = reader.read_u32::<LittleEndian>()? as usize;

        // Reserved bytes are not checked
        let mut reserved = [0u8; 6];
        reader.read_exact(&mut reserved)?;

        let mut code = vec![0u8; code_length];
        reader.read_exact(&mut code)?;

        Ok(Module::new(flags, code))
    }

    /// Parse a module held entirely in memory
    pub fn parse_bytes(bytes: &[u8]) -> Result<Module, ParseError> {
        let mut reader = bytes;
        Self::parse(&mut reader)
    }
}
