//! Recursive-descent JSON parser
//!
//! Works on the UTF-8 bytes of the input and reports byte offsets. Nesting
//! depth is bounded by [`CodecOptions::max_nesting_depth`] so adversarial
//! input cannot exhaust the call stack.

use tracing::trace;

use crate::error::ParseError;
use crate::options::CodecOptions;
use crate::value::{Map, Value};

/// Parse JSON text with default options
pub fn parse(text: &str) -> Result<Value, ParseError> {
    parse_with(text, &CodecOptions::default())
}

/// Parse JSON text with explicit options
pub fn parse_with(text: &str, opts: &CodecOptions) -> Result<Value, ParseError> {
    Parser::new(text, opts.max_nesting_depth).parse_document()
}

/// Parse JSON from raw bytes, validating UTF-8 first
pub fn parse_slice(bytes: &[u8], opts: &CodecOptions) -> Result<Value, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ParseError::InvalidUtf8 {
        offset: e.valid_up_to(),
    })?;
    parse_with(text, opts)
}

/// Parser state over a single document
pub struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a str, max_depth: usize) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    /// Parse exactly one value followed only by whitespace
    pub fn parse_document(mut self) -> Result<Value, ParseError> {
        let value = self.parse_value()?;
        self.skip_ws();
        if self.pos < self.bytes.len() {
            trace!(offset = self.pos, "trailing content after document");
            return Err(ParseError::TrailingContent { offset: self.pos });
        }
        Ok(value)
    }

    fn skip_ws(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Character at the cursor, for error reporting
    fn current_char(&self) -> char {
        self.text[self.pos..].chars().next().unwrap_or('\u{fffd}')
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        if self.pos >= self.bytes.len() {
            ParseError::UnexpectedEnd {
                offset: self.pos,
                expected,
            }
        } else {
            ParseError::UnexpectedToken {
                offset: self.pos,
                found: self.current_char(),
                expected,
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => self.parse_string().map(Value::String),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(b't') => self.parse_literal("true", Value::Bool(true)),
            Some(b'f') => self.parse_literal("false", Value::Bool(false)),
            Some(b'n') => self.parse_literal("null", Value::Null),
            _ => Err(self.unexpected("a JSON value")),
        }
    }

    fn parse_literal(&mut self, word: &'static str, value: Value) -> Result<Value, ParseError> {
        if self.bytes[self.pos..].starts_with(word.as_bytes()) {
            self.pos += word.len();
            Ok(value)
        } else {
            Err(ParseError::UnexpectedToken {
                offset: self.pos,
                found: self.current_char(),
                expected: word,
            })
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::NestingTooDeep {
                offset: self.pos,
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    fn parse_array(&mut self) -> Result<Value, ParseError> {
        self.enter()?;
        self.pos += 1;
        let mut items = Vec::new();

        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            self.depth -= 1;
            return Ok(Value::Array(items));
        }

        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.unexpected("',' or ']'")),
            }
        }

        self.depth -= 1;
        Ok(Value::Array(items))
    }

    fn parse_object(&mut self) -> Result<Value, ParseError> {
        self.enter()?;
        self.pos += 1;
        let mut map = Map::new();

        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            self.depth -= 1;
            return Ok(Value::Object(map));
        }

        loop {
            self.skip_ws();
            if self.peek() != Some(b'"') {
                return Err(self.unexpected("an object key"));
            }
            let key = self.parse_string()?;

            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(self.unexpected("':'"));
            }
            self.pos += 1;

            let value = self.parse_value()?;
            if map.insert(key, value).is_some() {
                trace!(offset = self.pos, "duplicate object key replaced");
            }

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.unexpected("',' or '}'")),
            }
        }

        self.depth -= 1;
        Ok(Value::Object(map))
    }

    /// Parse a quoted string starting at the opening quote
    fn parse_string(&mut self) -> Result<String, ParseError> {
        let open = self.pos;
        self.pos += 1;
        let mut out = String::new();
        let mut run_start = self.pos;

        loop {
            let Some(b) = self.peek() else {
                trace!(open, "string runs to end of input");
                return Err(ParseError::MalformedString {
                    offset: self.pos,
                    reason: "unterminated string",
                });
            };
            match b {
                b'"' => {
                    out.push_str(&self.text[run_start..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    out.push_str(&self.text[run_start..self.pos]);
                    self.parse_escape(&mut out)?;
                    run_start = self.pos;
                }
                b if b < 0x20 => {
                    return Err(ParseError::MalformedString {
                        offset: self.pos,
                        reason: "unescaped control character",
                    });
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Decode one escape sequence at the backslash under the cursor
    fn parse_escape(&mut self, out: &mut String) -> Result<(), ParseError> {
        let at = self.pos;
        let invalid = ParseError::MalformedString {
            offset: at,
            reason: "invalid escape sequence",
        };
        self.pos += 1;
        let Some(code) = self.peek() else {
            return Err(invalid);
        };
        self.pos += 1;

        let c = match code {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{08}',
            b'f' => '\u{0c}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => self.parse_unicode_escape(at)?,
            _ => return Err(invalid),
        };
        out.push(c);
        Ok(())
    }

    /// Decode the hex digits of `\uXXXX`, joining surrogate pairs
    fn parse_unicode_escape(&mut self, at: usize) -> Result<char, ParseError> {
        let lone = ParseError::MalformedString {
            offset: at,
            reason: "unpaired surrogate in \\u escape",
        };

        let first = self.read_hex4(at)?;
        match first {
            0xD800..=0xDBFF => {
                if !self.bytes[self.pos..].starts_with(b"\\u") {
                    return Err(lone);
                }
                self.pos += 2;
                let second = self.read_hex4(self.pos - 2)?;
                if !(0xDC00..=0xDFFF).contains(&second) {
                    return Err(lone);
                }
                let code = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
                char::from_u32(code).ok_or(lone)
            }
            0xDC00..=0xDFFF => Err(lone),
            _ => char::from_u32(first).ok_or(lone),
        }
    }

    fn read_hex4(&mut self, at: usize) -> Result<u32, ParseError> {
        let digits = self
            .bytes
            .get(self.pos..self.pos + 4)
            .ok_or(ParseError::MalformedString {
                offset: at,
                reason: "truncated \\u escape",
            })?;

        let mut code = 0u32;
        for &d in digits {
            let nibble = (d as char).to_digit(16).ok_or(ParseError::MalformedString {
                offset: at,
                reason: "non-hex digit in \\u escape",
            })?;
            code = code * 16 + nibble;
        }
        self.pos += 4;
        Ok(code)
    }

    fn parse_number(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        let malformed = |reason| ParseError::MalformedNumber {
            offset: start,
            reason,
        };

        if self.peek() == Some(b'-') {
            self.pos += 1;
        }

        match self.peek() {
            Some(b'0') => {
                self.pos += 1;
                if matches!(self.peek(), Some(b'0'..=b'9')) {
                    return Err(malformed("leading zero"));
                }
            }
            Some(b'1'..=b'9') => self.eat_digits(),
            _ => return Err(malformed("missing integer digits")),
        }

        let mut integral = true;

        if self.peek() == Some(b'.') {
            integral = false;
            self.pos += 1;
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(malformed("missing fraction digits"));
            }
            self.eat_digits();
        }

        if let Some(b'e' | b'E') = self.peek() {
            integral = false;
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(malformed("missing exponent digits"));
            }
            self.eat_digits();
        }

        let literal = &self.text[start..self.pos];
        if integral {
            if let Ok(n) = literal.parse::<i64>() {
                return Ok(Value::Int(n));
            }
        }

        match literal.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Value::Float(f)),
            _ => Err(malformed("number out of range")),
        }
    }

    fn eat_digits(&mut self) {
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
    }
}
