//! Compiler configuration options

use crate::symbols::DEFAULT_CAPACITY;

/// Configuration options for the bx compiler
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerConfig {
    pub max_variables: usize,
    /// Reject relative jumps that do not fit in 16 bits instead of truncating them
    pub checked_jumps: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_variables: DEFAULT_CAPACITY,
            checked_jumps: false,
        }
    }
}

impl CompilerConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the variable table capacity
    pub fn with_max_variables(mut self, max_variables: usize) -> Self {
        self.max_variables = max_variables;
        self
    }

    /// Enable or disable range checks on jump offsets
    pub fn with_checked_jumps(mut self, checked_jumps: bool) -> Self {
        self.checked_jumps = checked_jumps;
        self
    }
}
