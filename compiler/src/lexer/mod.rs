use crate::error::{CompileError, CompileResult, Location};
use crate::symbols::{Value, VarKind, VariableTable};

/// Identifiers longer than this are cut short
pub const MAX_NAME_LEN: usize = 63;

const SNIPPET_LEN: usize = 20;

/// Forward-only cursor over the source bytes. Values are decoded on demand;
/// there is no token stream.
pub struct Scanner<'a> {
    input: &'a [u8],
    position: usize,
    line: usize,
    column: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn location(&self) -> Location {
        let rest = &self.input[self.position..];
        let end = rest
            .iter()
            .take(SNIPPET_LEN)
            .position(|b| *b == b'\n')
            .unwrap_or(rest.len().min(SNIPPET_LEN));
        Location {
            line: self.line,
            column: self.column,
            snippet: String::from_utf8_lossy(&rest[..end]).into_owned(),
        }
    }

    pub fn syntax_error(&self, message: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            message: message.into(),
            location: self.location(),
        }
    }

    /// Skip spaces, tabs, line breaks and `//` comments
    pub fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.advance();
                }
                b'/' if self.peek_next() == Some(b'/') => {
                    self.skip_line();
                }
                _ => break,
            }
        }
    }

    /// Skip up to (not including) the next newline
    pub fn skip_line(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == b'\n' {
                break;
            }
            self.advance();
        }
    }

    /// Next significant byte, after trivia
    pub fn peek_significant(&mut self) -> Option<u8> {
        self.skip_trivia();
        self.peek()
    }

    /// Consume `expected` if it is the next significant byte
    pub fn eat(&mut self, expected: u8) -> bool {
        if self.peek_significant() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, expected: u8, message: &str) -> CompileResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.syntax_error(message))
        }
    }

    /// Read a run of `[A-Za-z0-9_]`. The result is empty when no such byte
    /// follows; callers decide whether that is an error.
    pub fn read_identifier(&mut self) -> String {
        self.skip_trivia();
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if !(ch.is_ascii_alphanumeric() || ch == b'_') {
                break;
            }
            if name.len() < MAX_NAME_LEN {
                name.push(char::from(ch));
            }
            self.advance();
        }
        name
    }

    /// Read a double-quoted string literal. The result may contain zero bytes.
    pub fn read_string(&mut self) -> CompileResult<Vec<u8>> {
        if self.peek_significant() != Some(b'"') {
            return Err(self.syntax_error("Expected string literal"));
        }
        self.advance();

        let mut value = Vec::new();
        loop {
            match self.advance() {
                None => return Err(self.unterminated("string")),
                Some(b'"') => return Ok(value),
                Some(b'\\') => {
                    let escaped = self.advance().ok_or_else(|| self.unterminated("string"))?;
                    value.push(unescape(escaped));
                }
                Some(ch) => value.push(ch),
            }
        }
    }

    /// Read a single-quoted character literal such as `'A'` or `'\n'`
    pub fn read_char(&mut self) -> CompileResult<u8> {
        if self.peek_significant() != Some(b'\'') {
            return Err(self.syntax_error("Expected char literal"));
        }
        self.advance();

        let ch = match self.advance() {
            None => return Err(self.unterminated("char")),
            Some(b'\\') => unescape(self.advance().ok_or_else(|| self.unterminated("char"))?),
            Some(ch) => ch,
        };

        match self.peek() {
            Some(b'\'') => {
                self.advance();
                Ok(ch)
            }
            None => Err(self.unterminated("char")),
            Some(_) => Err(self.syntax_error("Expected closing ' in char literal")),
        }
    }

    /// Read an optionally negative decimal integer. Values wrap to 32 bits.
    pub fn read_int(&mut self) -> CompileResult<i32> {
        self.skip_trivia();
        let negative = self.peek() == Some(b'-');
        if negative {
            self.advance();
        }
        if !matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            return Err(self.syntax_error("Expected integer literal"));
        }

        let mut value: i64 = 0;
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            value = value.wrapping_mul(10).wrapping_add(i64::from(ch - b'0'));
            self.advance();
        }
        if negative {
            value = value.wrapping_neg();
        }
        Ok(value as i32)
    }

    /// A string literal, or the name of a string variable
    pub fn read_string_or_variable(&mut self, variables: &VariableTable) -> CompileResult<Vec<u8>> {
        if self.peek_significant() == Some(b'"') {
            return self.read_string();
        }
        let (name, location, value) =
            self.read_variable(variables, "Expected string literal or variable")?;
        match value {
            Value::Str(bytes) => Ok(bytes.clone()),
            Value::Int(_) => Err(CompileError::WrongVariableType {
                name,
                expected: VarKind::Str,
                location,
            }),
        }
    }

    /// An integer literal, or the name of an int variable
    pub fn read_int_or_variable(&mut self, variables: &VariableTable) -> CompileResult<i32> {
        match self.peek_significant() {
            Some(ch) if ch == b'-' || ch.is_ascii_digit() => return self.read_int(),
            _ => {}
        }
        let (name, location, value) =
            self.read_variable(variables, "Expected int literal or variable")?;
        match value {
            Value::Int(value) => Ok(*value),
            Value::Str(_) => Err(CompileError::WrongVariableType {
                name,
                expected: VarKind::Int,
                location,
            }),
        }
    }

    fn read_variable<'t>(
        &mut self,
        variables: &'t VariableTable,
        missing: &str,
    ) -> CompileResult<(String, Location, &'t Value)> {
        let location = self.location();
        let name = self.read_identifier();
        if name.is_empty() {
            return Err(self.syntax_error(missing));
        }
        match variables.lookup(&name) {
            Some(var) => Ok((name, location, &var.value)),
            None => Err(CompileError::UndefinedVariable { name, location }),
        }
    }

    fn unterminated(&self, literal: &'static str) -> CompileError {
        CompileError::UnterminatedLiteral {
            literal,
            location: self.location(),
        }
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = *self.input.get(self.position)?;
        self.position += 1;
        if ch == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.input.get(self.position + 1).copied()
    }
}

/// Shared escape table for string and char literals; unknown escapes stand for themselves
fn unescape(ch: u8) -> u8 {
    match ch {
        b'n' => b'\n',
        b't' => b'\t',
        b'r' => b'\r',
        b'0' => 0,
        other => other,
    }
}
