use std::fmt;
use thiserror::Error;

/// Default number of variables a compilation unit may declare
pub const DEFAULT_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Int,
    Str,
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarKind::Int => write!(f, "an int"),
            VarKind::Str => write!(f, "a string"),
        }
    }
}

/// Compile-time value bound to a variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    Str(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub value: Value,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Variable table is full ({capacity} entries)")]
pub struct TableFull {
    pub capacity: usize,
}

/// Flat, unscoped, append-only variable table.
///
/// Redeclaring a name appends a second entry; lookups return the first one
/// declared, so the earlier value keeps winning.
#[derive(Debug, Clone)]
pub struct VariableTable {
    entries: Vec<Variable>,
    capacity: usize,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Add a variable. String values are stored up to their first zero byte,
    /// the way the loader keeps them as C strings.
    pub fn declare(&mut self, name: String, value: Value) -> Result<(), TableFull> {
        if self.is_full() {
            return Err(TableFull {
                capacity: self.capacity,
            });
        }

        let value = match value {
            Value::Str(mut bytes) => {
                if let Some(nul) = bytes.iter().position(|b| *b == 0) {
                    bytes.truncate(nul);
                }
                Value::Str(bytes)
            }
            int => int,
        };

        self.entries.push(Variable { name, value });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.entries.iter().find(|var| var.name == name)
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for VariableTable {
    fn default() -> Self {
        Self::new()
    }
}
