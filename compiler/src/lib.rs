//! bx-lang - single-pass compiler from bx source to BEXE bytecode modules

pub mod cli;
pub mod codegen;
pub mod config;
pub mod error;
pub mod lexer;
pub mod symbols;

pub use codegen::{CodeGenerator, CompiledProgram, Context, Statement};
pub use config::CompilerConfig;
pub use error::{CompileError, CompileResult, Location};
pub use lexer::Scanner;
pub use symbols::{Value, VarKind, Variable, VariableTable};

use bx_bytecode::{finish, Flags};

/// Compile `source` with the default configuration, returning the code
/// section and the feature flags it uses
pub fn compile(source: &[u8]) -> CompileResult<(Vec<u8>, Flags)> {
    let program = compile_with_config(source, &CompilerConfig::default())?;
    Ok((program.code.into_bytes(), program.flags))
}

pub fn compile_with_config(source: &[u8], config: &CompilerConfig) -> CompileResult<CompiledProgram> {
    CodeGenerator::with_config(source, config.clone()).generate()
}

/// Compile `source` into a complete module, header included
pub fn compile_module(source: &[u8], config: &CompilerConfig) -> CompileResult<Vec<u8>> {
    let program = compile_with_config(source, config)?;
    Ok(finish(program.code, program.flags)?)
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
