use anyhow::{anyhow, Context, Result};
use bx_bytecode::{decode, finish, Flags};
use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use crate::config::CompilerConfig;
use crate::symbols::DEFAULT_CAPACITY;
use crate::{compile_with_config, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "bxcc",
    about = "Compile bx source into a BEXE bytecode module",
    version = VERSION
)]
pub struct Cli {
    /// Source file to compile
    pub input: PathBuf,

    /// Where to write the module
    pub output: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Fail instead of truncating jump offsets that do not fit in 16 bits
    #[arg(long)]
    pub checked_jumps: bool,

    /// Maximum number of variables a program may declare
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub max_variables: usize,

    /// Print a disassembly of the emitted code
    #[arg(long)]
    pub dump: bool,

    /// Print the disassembly as JSON
    #[arg(long, requires = "dump")]
    pub json: bool,
}

impl Cli {
    pub fn config(&self) -> CompilerConfig {
        CompilerConfig::new()
            .with_max_variables(self.max_variables)
            .with_checked_jumps(self.checked_jumps)
    }
}

/// What a successful build produced
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub output: PathBuf,
    pub code_bytes: usize,
    pub flags: Flags,
    /// Rendered disassembly when `--dump` was given
    pub dump: Option<String>,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wrote {} (code bytes: {}) flags=0x{:02X}",
            self.output.display(),
            self.code_bytes,
            self.flags.bits()
        )
    }
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn handle(&self, cli: Cli) -> Result<()> {
        let report = self.build(&cli).await?;
        if let Some(dump) = &report.dump {
            println!("{}", dump);
        }
        println!("{}", report);
        Ok(())
    }

    /// Read, compile and write one module. Nothing is written when
    /// compilation fails.
    pub async fn build(&self, cli: &Cli) -> Result<BuildReport> {
        let source = tokio::fs::read(&cli.input)
            .await
            .with_context(|| format!("Failed to read {}", cli.input.display()))?;

        let program = compile_with_config(&source, &cli.config())
            .map_err(|e| anyhow!("Compile error: {}", e))?;
        let code_bytes = program.code.len();
        let flags = program.flags;

        let dump = if cli.dump {
            let listing = decode(program.code.as_slice())?;
            if cli.json {
                Some(serde_json::to_string_pretty(&listing)?)
            } else {
                Some(listing.to_string())
            }
        } else {
            None
        };

        let module = finish(program.code, flags)?;
        tokio::fs::write(&cli.output, &module)
            .await
            .with_context(|| format!("Failed to write {}", cli.output.display()))?;
        info!(output = %cli.output.display(), code_bytes, "module written");

        Ok(BuildReport {
            output: cli.output.clone(),
            code_bytes,
            flags,
            dump,
        })
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "bx_lang=debug,bx_bytecode=debug"
    } else {
        "bx_lang=warn,bx_bytecode=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
