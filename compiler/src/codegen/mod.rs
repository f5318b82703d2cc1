mod statement;

pub use statement::{clamp_coordinate, Statement};

use bx_bytecode::{CodeBuffer, Flags, OpCode};
use tracing::{debug, trace};
use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileResult, Location};
use crate::lexer::Scanner;
use crate::symbols::{Value, VariableTable};

/// Where a statement is being compiled. Loop bodies accept `breakiflast`
/// but reject `var` and nested loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    TopLevel,
    LoopBody,
}

/// Result of compiling a whole source unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProgram {
    /// Code section, always ending in an `exit` instruction
    pub code: CodeBuffer,
    pub flags: Flags,
    /// Number of variables declared, including shadowed duplicates
    pub variables: usize,
}

/// Single-pass compiler from source text straight to bytecode
pub struct CodeGenerator<'a> {
    scanner: Scanner<'a>,
    variables: VariableTable,
    flags: Flags,
    config: CompilerConfig,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self::with_config(source, CompilerConfig::default())
    }

    pub fn with_config(source: &'a [u8], config: CompilerConfig) -> Self {
        Self {
            scanner: Scanner::new(source),
            variables: VariableTable::with_capacity(config.max_variables),
            flags: Flags::empty(),
            config,
        }
    }

    /// Compile the whole input. The first error aborts compilation and the
    /// partially built buffer is dropped.
    pub fn generate(mut self) -> CompileResult<CompiledProgram> {
        let mut code = CodeBuffer::new();

        loop {
            match self.scanner.peek_significant() {
                None => break,
                Some(b'#') => {
                    self.scanner.skip_line();
                    continue;
                }
                Some(_) => {}
            }

            let location = self.scanner.location();
            let keyword = self.scanner.read_identifier();
            match keyword.as_str() {
                "" => return Err(self.scanner.syntax_error("Expected identifier")),
                "var" => self.compile_var()?,
                "loop" => self.compile_loop(&mut code, location)?,
                _ => {
                    let statement = self.parse_statement(&keyword, location, Context::TopLevel)?;
                    self.emit(&statement, &mut code)?;
                }
            }
        }

        if !code.ends_with_exit() {
            Statement::Exit.emit(&mut code)?;
        }

        Ok(CompiledProgram {
            code,
            flags: self.flags,
            variables: self.variables.len(),
        })
    }

    /// Parse the operands and terminating semicolon of the statement named by `keyword`
    fn parse_statement(
        &mut self,
        keyword: &str,
        location: Location,
        context: Context,
    ) -> CompileResult<Statement> {
        let statement = match keyword {
            "print" => Statement::Print(self.scanner.read_string_or_variable(&self.variables)?),
            "putchar" => Statement::PutChar(self.scanner.read_char()?),
            "exit" => Statement::Exit,
            "clear" => Statement::Clear,
            "setcursor" => {
                let x = self.scanner.read_int_or_variable(&self.variables)?;
                self.scanner.eat(b',');
                let y = self.scanner.read_int_or_variable(&self.variables)?;
                Statement::SetCursor {
                    x: clamp_coordinate(x),
                    y: clamp_coordinate(y),
                }
            }
            "readkey" => Statement::ReadKey,
            "readfile" => Statement::ReadFile(self.scanner.read_string_or_variable(&self.variables)?),
            "writefile" => {
                let path = self.scanner.read_string_or_variable(&self.variables)?;
                self.scanner.expect(b',', "Expected ',' after path in writefile")?;
                let data = self.scanner.read_string_or_variable(&self.variables)?;
                Statement::WriteFile { path, data }
            }
            "printbuf" => Statement::PrintBuf,
            "printlast" => Statement::PrintLast,
            "writebuf" => Statement::WriteBuf(self.scanner.read_string_or_variable(&self.variables)?),
            "breakiflast" if context == Context::LoopBody => {
                let value = self.scanner.read_int_or_variable(&self.variables)?;
                Statement::BreakIfLast(value as u8)
            }
            "loop" if context == Context::LoopBody => {
                return Err(CompileError::UnsupportedNestedLoop { location });
            }
            _ => {
                return Err(CompileError::UnknownStatement {
                    name: keyword.to_string(),
                    location,
                })
            }
        };

        self.scanner
            .expect(b';', &format!("Expected ';' after {}", keyword))?;
        Ok(statement)
    }

    fn emit(&mut self, statement: &Statement, out: &mut CodeBuffer) -> CompileResult<Option<usize>> {
        trace!(?statement, at = out.len(), "emit");
        self.flags |= statement.required_flags();
        Ok(statement.emit(out)?)
    }

    /// `var NAME = <literal>;` binds a compile-time constant and emits nothing
    fn compile_var(&mut self) -> CompileResult<()> {
        let name = self.scanner.read_identifier();
        if name.is_empty() {
            return Err(self.scanner.syntax_error("Expected variable name after var"));
        }
        self.scanner.expect(b'=', "Expected '=' in var declaration")?;

        if self.variables.is_full() {
            return Err(CompileError::CapacityExceeded {
                limit: self.variables.capacity(),
                location: self.scanner.location(),
            });
        }

        let value = match self.scanner.peek_significant() {
            Some(b'"') => Value::Str(self.scanner.read_string()?),
            Some(b'\'') => Value::Int(i32::from(self.scanner.read_char()?)),
            _ => Value::Int(self.scanner.read_int()?),
        };
        self.scanner.expect(b';', "Expected ';' after var declaration")?;

        let location = self.scanner.location();
        self.variables
            .declare(name, value)
            .map_err(|full| CompileError::CapacityExceeded {
                limit: full.capacity,
                location,
            })
    }

    /// Compile `loop { ... }`: the body goes into its own buffer, gets spliced
    /// onto `out`, every `breakiflast` placeholder is patched to the end of the
    /// body, and a backward jump to the body start closes the loop.
    fn compile_loop(&mut self, out: &mut CodeBuffer, location: Location) -> CompileResult<()> {
        self.scanner.expect(b'{', "Expected '{' after loop")?;
        let (body, fixups) = self.compile_body()?;

        let body_start = out.len();
        out.append(&body)?;
        let end_of_body = out.len();

        for placeholder in &fixups {
            let at = body_start + placeholder;
            let rel = self.narrow(end_of_body as i64 - (at + 2) as i64, &location)?;
            out.patch_i16(at, rel);
        }

        out.push_opcode(OpCode::JmpRel16)?;
        let back = self.narrow(body_start as i64 - (out.len() + 2) as i64, &location)?;
        out.push_i16(back)?;

        debug!(
            body_start,
            body_len = body.len(),
            breaks = fixups.len(),
            "compiled loop"
        );
        Ok(())
    }

    /// Compile statements up to the closing `}`. Returns the body and the
    /// placeholder offsets (relative to the body start) that need patching.
    fn compile_body(&mut self) -> CompileResult<(CodeBuffer, Vec<usize>)> {
        let mut body = CodeBuffer::new();
        let mut fixups = Vec::new();

        loop {
            match self.scanner.peek_significant() {
                None => return Err(self.scanner.syntax_error("Unexpected end of input in loop body")),
                Some(b'}') => {
                    self.scanner.eat(b'}');
                    return Ok((body, fixups));
                }
                Some(_) => {}
            }

            let location = self.scanner.location();
            let keyword = self.scanner.read_identifier();
            if keyword.is_empty() {
                return Err(self.scanner.syntax_error("Expected identifier in loop body"));
            }

            let statement = self.parse_statement(&keyword, location, Context::LoopBody)?;
            if let Some(placeholder) = self.emit(&statement, &mut body)? {
                fixups.push(placeholder);
            }
        }
    }

    /// Fit a relative offset into 16 bits. Without `checked_jumps` the value
    /// silently wraps.
    fn narrow(&self, offset: i64, location: &Location) -> CompileResult<i16> {
        if self.config.checked_jumps {
            i16::try_from(offset).map_err(|_| CompileError::JumpOutOfRange {
                offset,
                location: location.clone(),
            })
        } else {
            Ok(offset as i16)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bx_bytecode::decode;

    fn compile(source: &str) -> CompileResult<CompiledProgram> {
        CodeGenerator::new(source.as_bytes()).generate()
    }

    fn code(source: &str) -> Vec<u8> {
        compile(source).unwrap().code.into_bytes()
    }

    #[test]
    fn test_empty_program_is_just_exit() {
        let program = compile("").unwrap();
        assert_eq!(program.code.as_slice(), &[0xFF]);
        assert_eq!(program.flags, Flags::empty());

        assert_eq!(code("  // nothing here\n"), vec![0xFF]);
    }

    #[test]
    fn test_print_and_putchar() {
        assert_eq!(
            code(r#"print "Hi"; putchar 'A';"#),
            vec![0x02, b'H', b'i', 0x00, 0x01, b'A', 0xFF]
        );
    }

    #[test]
    fn test_explicit_exit_is_not_duplicated() {
        assert_eq!(code("exit;"), vec![0xFF]);
        assert_eq!(code("exit; putchar 'x';"), vec![0xFF, 0x01, b'x', 0xFF]);
    }

    #[test]
    fn test_console_statements() {
        let program = compile("clear; setcursor 10, 300; readkey; printbuf; printlast;").unwrap();
        assert_eq!(
            program.code.as_slice(),
            &[0x30, 0x31, 10, 255, 0x20, 0x12, 0x14, 0xFF]
        );
        assert_eq!(program.flags, Flags::CONSOLE);
    }

    #[test]
    fn test_setcursor_clamps_and_comma_is_optional() {
        assert_eq!(code("setcursor -4 7;"), vec![0x31, 0, 7, 0xFF]);
        assert_eq!(code("var x = 1000; setcursor x, x;"), vec![0x31, 255, 255, 0xFF]);
    }

    #[test]
    fn test_file_statements() {
        let program =
            compile(r#"readfile "in.txt"; writefile "out.txt", "data"; writebuf "b";"#).unwrap();
        assert_eq!(
            program.code.as_slice(),
            b"\x10in.txt\0\x11out.txt\0data\0\x13b\0\xFF"
        );
        assert_eq!(program.flags, Flags::FILE_IO);
    }

    #[test]
    fn test_flags_accumulate() {
        let program = compile(r#"clear; readfile "x";"#).unwrap();
        assert_eq!(program.flags.bits(), 0x03);
    }

    #[test]
    fn test_variables_are_substituted() {
        let source = r#"
            var greeting = "hello";
            var row = 3;
            print greeting;
            setcursor 1, row;
        "#;
        assert_eq!(
            code(source),
            vec![0x02, b'h', b'e', b'l', b'l', b'o', 0x00, 0x31, 1, 3, 0xFF]
        );
    }

    #[test]
    fn test_char_variable_is_an_int() {
        assert_eq!(code("var c = 'A'; setcursor c, 0;"), vec![0x31, 65, 0, 0xFF]);
    }

    #[test]
    fn test_first_declaration_wins() {
        assert_eq!(
            code(r#"var s = "one"; var s = "two"; print s;"#),
            b"\x02one\0\xFF".to_vec()
        );
    }

    #[test]
    fn test_int_variable_in_string_position() {
        match compile("var X = 5; print X;") {
            Err(CompileError::WrongVariableType { name, .. }) => assert_eq!(name, "X"),
            other => panic!("Expected WrongVariableType, got {:?}", other),
        }
    }

    #[test]
    fn test_undefined_variable() {
        assert!(matches!(
            compile("print nobody;"),
            Err(CompileError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn test_unknown_statement() {
        match compile("  jump;") {
            Err(CompileError::UnknownStatement { name, location }) => {
                assert_eq!(name, "jump");
                assert_eq!(location.column, 3);
            }
            other => panic!("Expected UnknownStatement, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_semicolon() {
        match compile("print \"a\"\nclear;") {
            Err(CompileError::Syntax { message, location }) => {
                assert_eq!(message, "Expected ';' after print");
                assert_eq!(location.line, 2);
            }
            other => panic!("Expected Syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_writefile_requires_comma() {
        match compile(r#"writefile "a" "b";"#) {
            Err(CompileError::Syntax { message, .. }) => {
                assert_eq!(message, "Expected ',' after path in writefile")
            }
            other => panic!("Expected Syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_stray_symbol_is_a_syntax_error() {
        assert!(matches!(compile("; print \"x\";"), Err(CompileError::Syntax { .. })));
    }

    #[test]
    fn test_hash_line_is_skipped_at_top_level() {
        assert_eq!(code("#include whatever\nputchar 'a';"), vec![0x01, b'a', 0xFF]);
    }

    #[test]
    fn test_too_many_variables() {
        let mut source = String::new();
        for i in 0..=512 {
            source.push_str(&format!("var v{} = {};\n", i, i));
        }
        match compile(&source) {
            Err(CompileError::CapacityExceeded { limit, location }) => {
                assert_eq!(limit, 512);
                assert_eq!(location.line, 513);
            }
            other => panic!("Expected CapacityExceeded, got {:?}", other),
        }

        let config = CompilerConfig::default().with_max_variables(1);
        let result = CodeGenerator::with_config(b"var a = 1; var b = 2;", config).generate();
        assert!(matches!(result, Err(CompileError::CapacityExceeded { limit: 1, .. })));
    }

    #[test]
    fn test_512_variables_fit() {
        let mut source = String::new();
        for i in 0..512 {
            source.push_str(&format!("var v{} = {};\n", i, i));
        }
        let program = compile(&source).unwrap();
        assert_eq!(program.variables, 512);
    }

    #[test]
    fn test_loop_with_break() {
        assert_eq!(
            code("loop { breakiflast 3; }"),
            vec![0x51, 3, 0x00, 0x00, 0x50, 0xF9, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_loop_after_code() {
        let bytes = code("var q = 'q'; putchar 'a'; loop { readkey; breakiflast q; printlast; } exit;");
        assert_eq!(
            bytes,
            vec![
                0x01, b'a', // putchar
                0x20, // readkey at 2
                0x51, b'q', 0x01, 0x00, // jeq_last, lands on the jmp at 8
                0x14, // printlast
                0x50, 0xF7, 0xFF, // jmp back to 2
                0xFF,
            ]
        );
    }

    #[test]
    fn test_loop_jumps_land_on_instructions() {
        let source = r#"
            print "menu";
            loop {
                readkey;
                breakiflast 97;
                print "again";
                breakiflast 27;
            }
            print "bye";
        "#;
        let program = compile(source).unwrap();
        let listing = decode(program.code.as_slice()).unwrap();
        listing.verify_jumps().unwrap();

        let body_start = 6;
        let end_of_body = listing
            .instructions
            .iter()
            .find(|ins| ins.opcode == OpCode::JmpRel16)
            .map(|ins| ins.offset)
            .unwrap();

        for ins in &listing.instructions {
            match ins.opcode {
                OpCode::JeqLast => assert_eq!(ins.jump_target(), Some(end_of_body as i64)),
                OpCode::JmpRel16 => assert_eq!(ins.jump_target(), Some(body_start)),
                _ => {}
            }
        }
    }

    #[test]
    fn test_loop_without_break() {
        assert_eq!(code("loop { clear; }"), vec![0x30, 0x50, 0xFC, 0xFF, 0xFF]);
    }

    #[test]
    fn test_empty_loop_jumps_to_itself() {
        assert_eq!(code("loop { }"), vec![0x50, 0xFD, 0xFF, 0xFF]);
    }

    #[test]
    fn test_loop_sees_earlier_variables() {
        assert_eq!(
            code("var key = 'x'; loop { breakiflast key; }"),
            vec![0x51, b'x', 0x00, 0x00, 0x50, 0xF9, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_break_value_is_truncated_to_a_byte() {
        assert_eq!(code("loop { breakiflast 258; }")[1], 2);
    }

    #[test]
    fn test_nested_loop_is_rejected() {
        assert!(matches!(
            compile("loop { loop { exit; } }"),
            Err(CompileError::UnsupportedNestedLoop { .. })
        ));
    }

    #[test]
    fn test_var_inside_loop_is_unknown() {
        match compile("loop { var x = 1; }") {
            Err(CompileError::UnknownStatement { name, .. }) => assert_eq!(name, "var"),
            other => panic!("Expected UnknownStatement, got {:?}", other),
        }
    }

    #[test]
    fn test_breakiflast_outside_loop_is_unknown() {
        assert!(matches!(
            compile("breakiflast 1;"),
            Err(CompileError::UnknownStatement { .. })
        ));
    }

    #[test]
    fn test_unterminated_loop() {
        match compile("loop { clear;") {
            Err(CompileError::Syntax { message, .. }) => {
                assert_eq!(message, "Unexpected end of input in loop body")
            }
            other => panic!("Expected Syntax error, got {:?}", other),
        }
        assert!(matches!(compile("loop clear;"), Err(CompileError::Syntax { .. })));
    }

    #[test]
    fn test_hash_inside_loop_is_an_error() {
        assert!(matches!(compile("loop { # x\n }"), Err(CompileError::Syntax { .. })));
    }

    #[test]
    fn test_embedded_nul_is_emitted_verbatim() {
        assert_eq!(code(r#"print "a\0b";"#), vec![0x02, b'a', 0x00, b'b', 0x00, 0xFF]);
    }

    fn long_loop(prints: usize) -> String {
        let text = "x".repeat(250);
        let mut source = String::from("loop { breakiflast 1;");
        for _ in 0..prints {
            source.push_str(&format!(" print \"{}\";", text));
        }
        source.push_str(" }");
        source
    }

    #[test]
    fn test_long_jump_wraps_by_default() {
        // 140 prints of 252 bytes push the break distance past i16::MAX
        let program = compile(&long_loop(140)).unwrap();
        let distance = 140 * 252;
        let patched = i16::from_le_bytes([program.code.as_slice()[2], program.code.as_slice()[3]]);
        assert_eq!(patched, distance as i16);
    }

    #[test]
    fn test_long_jump_rejected_when_checked() {
        let source = long_loop(140);
        let config = CompilerConfig::default().with_checked_jumps(true);
        match CodeGenerator::with_config(source.as_bytes(), config).generate() {
            Err(CompileError::JumpOutOfRange { offset, .. }) => assert_eq!(offset, 140 * 252),
            other => panic!("Expected JumpOutOfRange, got {:?}", other),
        }

        let short = long_loop(10);
        let config = CompilerConfig::default().with_checked_jumps(true);
        assert!(CodeGenerator::with_config(short.as_bytes(), config).generate().is_ok());
    }
}
