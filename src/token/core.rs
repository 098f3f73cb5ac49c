use std::fmt;

/// Token kinds produced by [`Tokenizer::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    /// A string literal value.
    Str,
    /// A string immediately followed by `:` — an object field name.
    FieldName,
    Number,
    Boolean,
    Null,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::StartObject => "start of object",
            TokenKind::EndObject => "end of object",
            TokenKind::StartArray => "start of array",
            TokenKind::EndArray => "end of array",
            TokenKind::Str => "string",
            TokenKind::FieldName => "field name",
            TokenKind::Number => "number",
            TokenKind::Boolean => "boolean",
            TokenKind::Null => "null",
        };
        write!(f, "{}", s)
    }
}

/// Structural violations that abort a parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Input ended where a value or the rest of a token was required.
    UnexpectedEnd { offset: usize },
    /// A byte that cannot start a value.
    ExpectedValue { byte: u8, offset: usize },
    /// Unknown escape byte after a backslash.
    InvalidEscape { byte: u8, offset: usize },
    /// Non-hex digit inside a `\uXXXX` escape.
    InvalidHexDigit { byte: u8, offset: usize },
    /// A `\uXXXX` escape naming an invalid code point.
    InvalidCodePoint { value: u32, offset: usize },
    /// Literal did not spell `true`, `false`, or `null` exactly.
    InvalidLiteral { offset: usize },
    /// A number token with no digits, or a bare exponent.
    InvalidNumber { offset: usize },
    /// String bytes were not valid UTF-8.
    InvalidUtf8 { offset: usize },
    /// `expect` saw a different token kind than required.
    UnexpectedToken {
        expected: TokenKind,
        found: TokenKind,
    },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::UnexpectedEnd { offset } => {
                write!(f, "unexpected end of input at byte {}", offset)
            }
            TokenError::ExpectedValue { byte, offset } => {
                write!(
                    f,
                    "expected a value at byte {}, found 0x{:02x}",
                    offset, byte
                )
            }
            TokenError::InvalidEscape { byte, offset } => {
                write!(
                    f,
                    "invalid escape character 0x{:02x} at byte {}",
                    byte, offset
                )
            }
            TokenError::InvalidHexDigit { byte, offset } => {
                write!(
                    f,
                    "invalid hex digit 0x{:02x} in unicode escape at byte {}",
                    byte, offset
                )
            }
            TokenError::InvalidCodePoint { value, offset } => {
                write!(
                    f,
                    "escape names invalid code point U+{:04X} at byte {}",
                    value, offset
                )
            }
            TokenError::InvalidLiteral { offset } => {
                write!(
                    f,
                    "expected 'true', 'false' or 'null' at byte {}",
                    offset
                )
            }
            TokenError::InvalidNumber { offset } => {
                write!(f, "malformed number at byte {}", offset)
            }
            TokenError::InvalidUtf8 { offset } => {
                write!(f, "string at byte {} is not valid UTF-8", offset)
            }
            TokenError::UnexpectedToken { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for TokenError {}

/// Streaming cursor producing literal tokens from a byte sequence.
///
/// One token per [`parse`](Tokenizer::parse) call; exactly one payload slot
/// is active at a time and is overwritten by the next call. Created per
/// parse and discarded at parse end or on the first error.
pub struct Tokenizer<'a> {
    input: &'a [u8],
    pos: usize,
    kind: Option<TokenKind>,
    bool_value: bool,
    number_value: f64,
    string_value: String,
}

impl<'a> Tokenizer<'a> {
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Tokenizer {
            input,
            pos: 0,
            kind: None,
            bool_value: false,
            number_value: 0.0,
            string_value: String::new(),
        }
    }

    /// The kind of the most recently parsed token.
    #[must_use]
    pub fn kind(&self) -> Option<TokenKind> {
        self.kind
    }

    /// Payload of the last `Boolean` token.
    #[must_use]
    pub fn boolean(&self) -> bool {
        self.bool_value
    }

    /// Payload of the last `Number` token.
    #[must_use]
    pub fn number(&self) -> f64 {
        self.number_value
    }

    /// Payload of the last `Str` or `FieldName` token.
    #[must_use]
    pub fn string(&self) -> &str {
        &self.string_value
    }

    /// Take ownership of the last string payload, leaving it empty.
    #[must_use]
    pub fn take_string(&mut self) -> String {
        std::mem::take(&mut self.string_value)
    }

    /// Whether the next non-whitespace byte is the given closing bracket.
    ///
    /// Does not consume anything. Required for empty-collection detection:
    /// without it an empty array's `]` would be misread as the start of a
    /// new value.
    #[must_use]
    pub fn peek_close(&mut self, bracket: u8) -> bool {
        self.skip_whitespace();
        self.input.get(self.pos).copied() == Some(bracket)
    }

    /// Parse the next token and assert its kind.
    ///
    /// A `Null` token satisfies any expected kind when `allow_null` is set;
    /// otherwise a kind mismatch is a structural error.
    pub fn expect(&mut self, expected: TokenKind, allow_null: bool) -> Result<TokenKind, TokenError> {
        let found = self.parse()?;
        if found == expected || (found == TokenKind::Null && allow_null) {
            Ok(found)
        } else {
            Err(TokenError::UnexpectedToken { expected, found })
        }
    }

    /// Produce the next token.
    pub fn parse(&mut self) -> Result<TokenKind, TokenError> {
        self.skip_whitespace();
        let start = self.pos;
        let byte = self.next_byte()?;
        let kind = match byte {
            b'{' => TokenKind::StartObject,
            b'}' => {
                self.consume_comma();
                TokenKind::EndObject
            }
            b'[' => TokenKind::StartArray,
            b']' => {
                self.consume_comma();
                TokenKind::EndArray
            }
            b'"' => self.parse_string()?,
            b'0'..=b'9' | b'+' | b'-' => {
                self.pos = start;
                self.parse_number()?;
                self.consume_comma();
                TokenKind::Number
            }
            b't' => {
                self.match_literal(start, b"rue")?;
                self.bool_value = true;
                self.consume_comma();
                TokenKind::Boolean
            }
            b'f' => {
                self.match_literal(start, b"alse")?;
                self.bool_value = false;
                self.consume_comma();
                TokenKind::Boolean
            }
            b'n' => {
                self.match_literal(start, b"ull")?;
                self.consume_comma();
                TokenKind::Null
            }
            other => {
                return Err(TokenError::ExpectedValue {
                    byte: other,
                    offset: start,
                })
            }
        };
        self.kind = Some(kind);
        Ok(kind)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.input.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn next_byte(&mut self) -> Result<u8, TokenError> {
        match self.input.get(self.pos) {
            Some(b) => {
                self.pos += 1;
                Ok(*b)
            }
            None => Err(TokenError::UnexpectedEnd { offset: self.pos }),
        }
    }

    /// Consume a comma separating this value from the next, if present.
    fn consume_comma(&mut self) {
        self.skip_whitespace();
        if self.input.get(self.pos) == Some(&b',') {
            self.pos += 1;
        }
    }

    /// Scan a string body (opening quote already consumed), decode escapes,
    /// and reclassify as a field name when a `:` follows.
    fn parse_string(&mut self) -> Result<TokenKind, TokenError> {
        let start = self.pos;
        let mut out: Vec<u8> = Vec::new();
        loop {
            let byte = self.next_byte()?;
            match byte {
                b'"' => break,
                b'\\' => {
                    let escape_at = self.pos - 1;
                    let esc = self.next_byte()?;
                    match esc {
                        b'"' => out.push(b'"'),
                        b'\\' => out.push(b'\\'),
                        b'/' => out.push(b'/'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'u' => {
                            let mut code: u32 = 0;
                            for _ in 0..4 {
                                let at = self.pos;
                                let digit = self.next_byte()?;
                                code = (code << 4)
                                    | hex_digit(digit).ok_or(TokenError::InvalidHexDigit {
                                        byte: digit,
                                        offset: at,
                                    })?;
                            }
                            let ch = char::from_u32(code).ok_or(TokenError::InvalidCodePoint {
                                value: code,
                                offset: escape_at,
                            })?;
                            let mut buf = [0u8; 4];
                            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                        }
                        other => {
                            return Err(TokenError::InvalidEscape {
                                byte: other,
                                offset: escape_at,
                            })
                        }
                    }
                }
                other => out.push(other),
            }
        }
        self.string_value =
            String::from_utf8(out).map_err(|_| TokenError::InvalidUtf8 { offset: start })?;

        // A string followed by ':' is an object key; the separator is
        // consumed as part of this token.
        self.skip_whitespace();
        if self.input.get(self.pos) == Some(&b':') {
            self.pos += 1;
            Ok(TokenKind::FieldName)
        } else {
            self.consume_comma();
            Ok(TokenKind::Str)
        }
    }

    /// Manual float scan: sign, integer run, optional fraction run scaled by
    /// a floating power of ten, optional exponent applied multiplicatively,
    /// sign applied last.
    fn parse_number(&mut self) -> Result<(), TokenError> {
        let start = self.pos;
        let mut sign = 1.0;
        match self.input.get(self.pos) {
            Some(b'-') => {
                sign = -1.0;
                self.pos += 1;
            }
            Some(b'+') => self.pos += 1,
            _ => {}
        }

        let mut value: f64 = 0.0;
        let mut int_digits = 0usize;
        while let Some(d) = self.peek_digit() {
            value = value * 10.0 + f64::from(d);
            int_digits += 1;
            self.pos += 1;
        }

        let mut frac_digits = 0usize;
        if self.input.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            let mut frac: f64 = 0.0;
            while let Some(d) = self.peek_digit() {
                frac = frac * 10.0 + f64::from(d);
                frac_digits += 1;
                self.pos += 1;
            }
            // Floating power, not fixed-point: long fractional runs keep
            // their magnitude.
            value += frac / 10f64.powi(frac_digits as i32);
        }

        if int_digits == 0 && frac_digits == 0 {
            return Err(TokenError::InvalidNumber { offset: start });
        }

        match self.input.get(self.pos) {
            Some(b'e') | Some(b'E') => {
                self.pos += 1;
                let mut exp_sign: i32 = 1;
                match self.input.get(self.pos) {
                    Some(b'-') => {
                        exp_sign = -1;
                        self.pos += 1;
                    }
                    Some(b'+') => self.pos += 1,
                    _ => {}
                }
                let mut exp: i32 = 0;
                let mut exp_digits = 0usize;
                while let Some(d) = self.peek_digit() {
                    // Saturate: anything past f64 range ends up ±inf or 0
                    // through powi regardless, and long digit runs must not
                    // overflow the accumulator.
                    exp = exp.saturating_mul(10).saturating_add(i32::from(d));
                    exp_digits += 1;
                    self.pos += 1;
                }
                if exp_digits == 0 {
                    return Err(TokenError::InvalidNumber { offset: start });
                }
                value *= 10f64.powi(exp_sign * exp);
            }
            _ => {}
        }

        self.number_value = sign * value;
        Ok(())
    }

    fn peek_digit(&self) -> Option<u8> {
        match self.input.get(self.pos) {
            Some(b @ b'0'..=b'9') => Some(b - b'0'),
            _ => None,
        }
    }

    /// Match the remainder of a keyword literal byte-for-byte.
    fn match_literal(&mut self, start: usize, rest: &[u8]) -> Result<(), TokenError> {
        for expected in rest {
            let byte = self
                .next_byte()
                .map_err(|_| TokenError::InvalidLiteral { offset: start })?;
            if byte != *expected {
                return Err(TokenError::InvalidLiteral { offset: start });
            }
        }
        Ok(())
    }
}

fn hex_digit(byte: u8) -> Option<u32> {
    match byte {
        b'0'..=b'9' => Some(u32::from(byte - b'0')),
        b'a'..=b'f' => Some(u32::from(byte - b'a') + 10),
        b'A'..=b'F' => Some(u32::from(byte - b'A') + 10),
        _ => None,
    }
}
