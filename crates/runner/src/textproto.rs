// SPDX-FileCopyrightText: © 2025 FilterCheck Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Textproto reader for the suite schema.
//!
//! A schema-directed recursive-descent parser covering the subset of the
//! protobuf text format the suite documents use: scalar fields with `:`,
//! nested messages with optional `:` before `{`, repeated fields by
//! repetition, `#` comments, adjacent string concatenation, and `,`/`;`
//! separators. Unknown fields are schema errors carrying the line number.

use filtercheck_core::{FilterCheckError, Result};

use crate::suite::{
    ConfigLogLevel, Env, Expectation, HeaderPair, ImmediateExpectation, Input, Invocation,
    StringMatcher, Test, TestSuite,
};

/// Parses a whole suite document in textproto form.
///
/// # Errors
///
/// Returns a schema error (with line number) on any lexical or structural
/// problem.
pub fn parse_suite(text: &str) -> Result<TestSuite> {
    let mut lexer = Lexer::new(text);
    let mut suite = TestSuite::default();
    loop {
        lexer.skip_trivia();
        if lexer.at_end() {
            break;
        }
        let field = lexer.ident()?;
        match field.as_str() {
            "env" => {
                lexer.enter_message()?;
                parse_env(&mut lexer, &mut suite.env)?;
            }
            "test" => {
                lexer.enter_message()?;
                let mut test = Test::default();
                parse_test(&mut lexer, &mut test)?;
                suite.tests.push(test);
            }
            other => return Err(lexer.unknown_field(other, "TestSuite")),
        }
        lexer.eat_separator();
    }
    Ok(suite)
}

fn parse_env(lexer: &mut Lexer<'_>, env: &mut Env) -> Result<()> {
    while !lexer.leave_message()? {
        let field = lexer.ident()?;
        match field.as_str() {
            "test_path" => env.test_path = lexer.string_field()?,
            "wasm_path" => env.wasm_path = lexer.string_field()?,
            "config_path" => env.config_path = lexer.string_field()?,
            "log_path" => env.log_path = lexer.string_field()?,
            "log_level" => {
                let raw = lexer.enum_field()?;
                env.log_level = raw
                    .parse::<ConfigLogLevel>()
                    .map_err(|e| lexer.schema_err(&e.to_string()))?;
            }
            "time_secs" => env.time_secs = lexer.u64_field()?,
            "num_additional_streams" => env.num_additional_streams = lexer.u64_field()?,
            "additional_stream_advance_rate" => {
                env.additional_stream_advance_rate = lexer.u64_field()?;
            }
            other => return Err(lexer.unknown_field(other, "Env")),
        }
        lexer.eat_separator();
    }
    Ok(())
}

fn parse_test(lexer: &mut Lexer<'_>, test: &mut Test) -> Result<()> {
    while !lexer.leave_message()? {
        let field = lexer.ident()?;
        match field.as_str() {
            "name" => test.name = lexer.string_field()?,
            "benchmark" => test.benchmark = lexer.bool_field()?,
            "request_headers" => {
                lexer.enter_message()?;
                test.request_headers = Some(parse_invocation(lexer)?);
            }
            "request_body" => {
                lexer.enter_message()?;
                test.request_body.push(parse_invocation(lexer)?);
            }
            "response_headers" => {
                lexer.enter_message()?;
                test.response_headers = Some(parse_invocation(lexer)?);
            }
            "response_body" => {
                lexer.enter_message()?;
                test.response_body.push(parse_invocation(lexer)?);
            }
            "plugin_init" => {
                lexer.enter_message()?;
                parse_expectation(lexer, &mut test.plugin_init)?;
            }
            "stream_init" => {
                lexer.enter_message()?;
                parse_expectation(lexer, &mut test.stream_init)?;
            }
            "stream_destroy" => {
                lexer.enter_message()?;
                parse_expectation(lexer, &mut test.stream_destroy)?;
            }
            other => return Err(lexer.unknown_field(other, "Test")),
        }
        lexer.eat_separator();
    }
    Ok(())
}

fn parse_invocation(lexer: &mut Lexer<'_>) -> Result<Invocation> {
    let mut invocation = Invocation::default();
    while !lexer.leave_message()? {
        let field = lexer.ident()?;
        match field.as_str() {
            "input" => {
                lexer.enter_message()?;
                parse_input(lexer, &mut invocation.input)?;
            }
            "result" => {
                lexer.enter_message()?;
                parse_expectation(lexer, &mut invocation.result)?;
            }
            other => return Err(lexer.unknown_field(other, "Invocation")),
        }
        lexer.eat_separator();
    }
    Ok(invocation)
}

fn parse_input(lexer: &mut Lexer<'_>, input: &mut Input) -> Result<()> {
    while !lexer.leave_message()? {
        let field = lexer.ident()?;
        match field.as_str() {
            "file" => input.file = lexer.string_field()?,
            "content" => input.content = lexer.string_field()?,
            "header" => {
                lexer.enter_message()?;
                input.header.push(parse_header_pair(lexer)?);
            }
            other => return Err(lexer.unknown_field(other, "Input")),
        }
        lexer.eat_separator();
    }
    Ok(())
}

fn parse_header_pair(lexer: &mut Lexer<'_>) -> Result<HeaderPair> {
    let mut pair = HeaderPair::default();
    while !lexer.leave_message()? {
        let field = lexer.ident()?;
        match field.as_str() {
            "key" => pair.key = lexer.string_field()?,
            "value" => pair.value = lexer.string_field()?,
            other => return Err(lexer.unknown_field(other, "Header")),
        }
        lexer.eat_separator();
    }
    Ok(pair)
}

fn parse_expectation(lexer: &mut Lexer<'_>, expect: &mut Expectation) -> Result<()> {
    while !lexer.leave_message()? {
        let field = lexer.ident()?;
        match field.as_str() {
            "has_header" => {
                lexer.enter_message()?;
                expect.has_header.push(parse_header_pair(lexer)?);
            }
            "no_header" => {
                lexer.enter_message()?;
                expect.no_header.push(parse_header_pair(lexer)?);
            }
            "headers" => {
                lexer.enter_message()?;
                expect.headers.push(parse_matcher(lexer)?);
            }
            "body" => {
                lexer.enter_message()?;
                expect.body.push(parse_matcher(lexer)?);
            }
            "immediate" => {
                lexer.enter_message()?;
                expect.immediate = Some(parse_immediate(lexer)?);
            }
            "log" => {
                lexer.enter_message()?;
                expect.log.push(parse_matcher(lexer)?);
            }
            other => return Err(lexer.unknown_field(other, "Expectation")),
        }
        lexer.eat_separator();
    }
    Ok(())
}

fn parse_matcher(lexer: &mut Lexer<'_>) -> Result<StringMatcher> {
    let mut matcher = StringMatcher::default();
    while !lexer.leave_message()? {
        let field = lexer.ident()?;
        match field.as_str() {
            "exact" => matcher.exact = Some(lexer.string_field()?),
            "regex" => matcher.regex = Some(lexer.string_field()?),
            "file" => matcher.file = Some(lexer.string_field()?),
            "invert" => matcher.invert = lexer.bool_field()?,
            other => return Err(lexer.unknown_field(other, "StringMatcher")),
        }
        lexer.eat_separator();
    }
    Ok(matcher)
}

fn parse_immediate(lexer: &mut Lexer<'_>) -> Result<ImmediateExpectation> {
    let mut immediate = ImmediateExpectation::default();
    while !lexer.leave_message()? {
        let field = lexer.ident()?;
        match field.as_str() {
            "http_status" => {
                immediate.http_status = Some(u32::try_from(lexer.u64_field()?).map_err(|_| {
                    lexer.schema_err("http_status out of range")
                })?);
            }
            "grpc_status" => {
                immediate.grpc_status = Some(u32::try_from(lexer.u64_field()?).map_err(|_| {
                    lexer.schema_err("grpc_status out of range")
                })?);
            }
            "details" => immediate.details = Some(lexer.string_field()?),
            other => return Err(lexer.unknown_field(other, "Immediate")),
        }
        lexer.eat_separator();
    }
    Ok(immediate)
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    // Tracks message nesting so leave_message knows whether a closing
    // brace or end-of-input ends the current scope.
    depth: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self { chars: text.chars().peekable(), line: 1, depth: 0 }
    }

    fn schema_err(&self, msg: &str) -> FilterCheckError {
        FilterCheckError::Schema(format!("textproto line {}: {msg}", self.line))
    }

    fn unknown_field(&self, field: &str, message: &str) -> FilterCheckError {
        self.schema_err(&format!("unknown field '{field}' in {message}"))
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn skip_trivia(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    fn eat(&mut self, want: char) -> bool {
        self.skip_trivia();
        if self.chars.peek() == Some(&want) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_separator(&mut self) {
        let _ = self.eat(',') || self.eat(';');
    }

    fn ident(&mut self) -> Result<String> {
        self.skip_trivia();
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if out.is_empty() {
            let found = self.chars.peek().map_or("end of input".to_string(), char::to_string);
            return Err(self.schema_err(&format!("expected a field name, found {found}")));
        }
        Ok(out)
    }

    /// Consumes an optional `:` followed by the opening `{` of a nested
    /// message.
    fn enter_message(&mut self) -> Result<()> {
        let _ = self.eat(':');
        if self.eat('{') {
            self.depth += 1;
            Ok(())
        } else {
            Err(self.schema_err("expected '{'"))
        }
    }

    /// True when the current message scope ends (closing `}`, or end of
    /// input at top level).
    fn leave_message(&mut self) -> Result<bool> {
        self.skip_trivia();
        if self.depth == 0 {
            return Ok(self.at_end());
        }
        if self.eat('}') {
            self.depth -= 1;
            return Ok(true);
        }
        if self.at_end() {
            return Err(self.schema_err("unexpected end of input inside message"));
        }
        Ok(false)
    }

    fn expect_colon(&mut self) -> Result<()> {
        if self.eat(':') {
            Ok(())
        } else {
            Err(self.schema_err("expected ':'"))
        }
    }

    fn string_field(&mut self) -> Result<String> {
        self.expect_colon()?;
        self.string()
    }

    /// One or more adjacent quoted fragments, concatenated.
    fn string(&mut self) -> Result<String> {
        let mut out = String::new();
        let mut fragments = 0;
        loop {
            self.skip_trivia();
            let quote = match self.chars.peek() {
                Some(&c @ ('"' | '\'')) => c,
                _ if fragments > 0 => break,
                _ => return Err(self.schema_err("expected a quoted string")),
            };
            self.bump();
            loop {
                match self.bump() {
                    None => return Err(self.schema_err("unterminated string")),
                    Some(c) if c == quote => break,
                    Some('\\') => out.push(self.escape()?),
                    Some(c) => out.push(c),
                }
            }
            fragments += 1;
        }
        Ok(out)
    }

    fn escape(&mut self) -> Result<char> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some('0') => Ok('\0'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('x') => {
                let hi = self.hex_digit()?;
                let lo = self.hex_digit()?;
                char::from_u32(hi * 16 + lo)
                    .ok_or_else(|| self.schema_err("invalid \\x escape"))
            }
            Some(c) => Err(self.schema_err(&format!("unsupported escape '\\{c}'"))),
            None => Err(self.schema_err("unterminated escape")),
        }
    }

    fn hex_digit(&mut self) -> Result<u32> {
        self.bump()
            .and_then(|c| c.to_digit(16))
            .ok_or_else(|| self.schema_err("invalid hex digit in \\x escape"))
    }

    fn u64_field(&mut self) -> Result<u64> {
        self.expect_colon()?;
        self.skip_trivia();
        let mut digits = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.bump();
            } else {
                break;
            }
        }
        digits.parse().map_err(|_| self.schema_err("expected an unsigned integer"))
    }

    fn bool_field(&mut self) -> Result<bool> {
        self.expect_colon()?;
        self.skip_trivia();
        let word = self.ident()?;
        match word.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(self.schema_err(&format!("expected a bool, found '{other}'"))),
        }
    }

    /// Enum values appear as bare identifiers or quoted strings.
    fn enum_field(&mut self) -> Result<String> {
        self.expect_colon()?;
        self.skip_trivia();
        if matches!(self.chars.peek(), Some(&('"' | '\''))) {
            self.string()
        } else {
            self.ident()
        }
    }
}
