use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};

use super::varint;
use crate::descriptor::ParamType;
use crate::limits::DispatchLimits;
use crate::token::{TokenError, TokenKind, Tokenizer};

/// Errors raised while reading or writing a single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Input ran out before the value was complete.
    UnexpectedEof { needed: usize, remaining: usize },
    /// A varint ran past its maximum encoded length.
    VarintOverflow,
    /// An integer value outside the declared type's range.
    IntOutOfRange { ty: ParamType, value: i64 },
    /// String bytes were not valid UTF-8.
    InvalidUtf8,
    /// A declared length exceeding the configured limit.
    StringTooLong { len: usize, max: usize },
    /// Container nesting in a `json` payload past the configured limit.
    TooDeep { max: usize },
    /// A boolean byte that was neither 0 nor 1.
    InvalidBool { byte: u8 },
    /// A value whose shape does not match the declared type on encode.
    ValueMismatch { ty: ParamType },
    /// A structural violation inside a textual `json` payload.
    Token(TokenError),
    /// A token that cannot appear in value position of a `json` payload.
    UnexpectedToken { found: TokenKind },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnexpectedEof { needed, remaining } => {
                write!(
                    f,
                    "unexpected end of frame: needed {} more byte(s), {} remaining",
                    needed, remaining
                )
            }
            CodecError::VarintOverflow => write!(f, "variable-length integer overflow"),
            CodecError::IntOutOfRange { ty, value } => {
                write!(f, "value {} out of range for type '{}'", value, ty)
            }
            CodecError::InvalidUtf8 => write!(f, "string payload is not valid UTF-8"),
            CodecError::StringTooLong { len, max } => {
                write!(f, "string length {} exceeds limit of {} bytes", len, max)
            }
            CodecError::TooDeep { max } => {
                write!(f, "value nesting exceeds limit of {} levels", max)
            }
            CodecError::InvalidBool { byte } => {
                write!(f, "invalid boolean byte 0x{:02x}", byte)
            }
            CodecError::ValueMismatch { ty } => {
                write!(f, "value does not match declared type '{}'", ty)
            }
            CodecError::Token(err) => write!(f, "malformed textual value: {}", err),
            CodecError::UnexpectedToken { found } => {
                write!(f, "expected a value, found {}", found)
            }
        }
    }
}

impl std::error::Error for CodecError {}

impl From<TokenError> for CodecError {
    fn from(err: TokenError) -> Self {
        CodecError::Token(err)
    }
}

/// The per-type binary value codec seam.
///
/// The dispatcher decodes every path and query argument and encodes every
/// result through this trait, one value at a time. Implementations must be
/// total for all declared [`ParamType`]s: a failure surfaces as a decode
/// error and maps to an `InvalidArgs` response.
pub trait ValueCodec: Send + Sync {
    /// Decode one value of the given type off the wire.
    fn read_value(&self, ty: ParamType, buf: &mut Bytes) -> Result<Value, CodecError>;

    /// Encode one value of the given type onto the wire.
    fn write_value(&self, ty: ParamType, value: &Value, out: &mut BytesMut)
        -> Result<(), CodecError>;
}

/// In-tree binary value codec.
///
/// Encodings: `bool` = one byte; `int`/`long` = zigzag varints (with a
/// 32-bit range check for `int`); `float`/`double` = big-endian IEEE bits;
/// `str` = varint length + UTF-8; `json` = `str` framing whose payload is a
/// textual literal decoded through the streaming [`Tokenizer`].
pub struct BinaryCodec {
    limits: DispatchLimits,
}

impl BinaryCodec {
    #[must_use]
    pub fn new(limits: DispatchLimits) -> Self {
        BinaryCodec { limits }
    }

    fn read_string(&self, buf: &mut Bytes) -> Result<String, CodecError> {
        let len = varint::read_uvarint(buf)? as usize;
        if len > self.limits.max_string_len {
            return Err(CodecError::StringTooLong {
                len,
                max: self.limits.max_string_len,
            });
        }
        if buf.remaining() < len {
            return Err(CodecError::UnexpectedEof {
                needed: len,
                remaining: buf.remaining(),
            });
        }
        let raw = buf.copy_to_bytes(len);
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    fn write_string(&self, text: &str, out: &mut BytesMut) {
        varint::write_uvarint(out, text.len() as u64);
        out.put_slice(text.as_bytes());
    }
}

impl Default for BinaryCodec {
    fn default() -> Self {
        BinaryCodec::new(DispatchLimits::default())
    }
}

impl ValueCodec for BinaryCodec {
    fn read_value(&self, ty: ParamType, buf: &mut Bytes) -> Result<Value, CodecError> {
        match ty {
            ParamType::Bool => {
                if !buf.has_remaining() {
                    return Err(CodecError::UnexpectedEof {
                        needed: 1,
                        remaining: 0,
                    });
                }
                match buf.get_u8() {
                    0 => Ok(Value::Bool(false)),
                    1 => Ok(Value::Bool(true)),
                    byte => Err(CodecError::InvalidBool { byte }),
                }
            }
            ParamType::Int => {
                let value = varint::zigzag_decode(varint::read_uvarint(buf)?);
                if i32::try_from(value).is_err() {
                    return Err(CodecError::IntOutOfRange { ty, value });
                }
                Ok(Value::from(value))
            }
            ParamType::Long => {
                let value = varint::zigzag_decode(varint::read_uvarint(buf)?);
                Ok(Value::from(value))
            }
            ParamType::Float => {
                if buf.remaining() < 4 {
                    return Err(CodecError::UnexpectedEof {
                        needed: 4,
                        remaining: buf.remaining(),
                    });
                }
                Ok(Value::from(f64::from(f32::from_bits(buf.get_u32()))))
            }
            ParamType::Double => {
                if buf.remaining() < 8 {
                    return Err(CodecError::UnexpectedEof {
                        needed: 8,
                        remaining: buf.remaining(),
                    });
                }
                Ok(Value::from(f64::from_bits(buf.get_u64())))
            }
            ParamType::Str => Ok(Value::String(self.read_string(buf)?)),
            ParamType::Json => {
                let text = self.read_string(buf)?;
                let mut tokens = Tokenizer::new(text.as_bytes());
                let kind = tokens.parse()?;
                json_value(&mut tokens, kind, 0, self.limits.max_depth)
            }
        }
    }

    fn write_value(
        &self,
        ty: ParamType,
        value: &Value,
        out: &mut BytesMut,
    ) -> Result<(), CodecError> {
        match ty {
            ParamType::Bool => {
                let flag = value.as_bool().ok_or(CodecError::ValueMismatch { ty })?;
                out.put_u8(u8::from(flag));
            }
            ParamType::Int => {
                let int = value.as_i64().ok_or(CodecError::ValueMismatch { ty })?;
                if i32::try_from(int).is_err() {
                    return Err(CodecError::IntOutOfRange { ty, value: int });
                }
                varint::write_uvarint(out, varint::zigzag_encode(int));
            }
            ParamType::Long => {
                let int = value.as_i64().ok_or(CodecError::ValueMismatch { ty })?;
                varint::write_uvarint(out, varint::zigzag_encode(int));
            }
            ParamType::Float => {
                let num = value.as_f64().ok_or(CodecError::ValueMismatch { ty })?;
                out.put_u32((num as f32).to_bits());
            }
            ParamType::Double => {
                let num = value.as_f64().ok_or(CodecError::ValueMismatch { ty })?;
                out.put_u64(num.to_bits());
            }
            ParamType::Str => {
                let text = value.as_str().ok_or(CodecError::ValueMismatch { ty })?;
                if text.len() > self.limits.max_string_len {
                    return Err(CodecError::StringTooLong {
                        len: text.len(),
                        max: self.limits.max_string_len,
                    });
                }
                self.write_string(text, out);
            }
            ParamType::Json => {
                let text = value.to_string();
                if text.len() > self.limits.max_string_len {
                    return Err(CodecError::StringTooLong {
                        len: text.len(),
                        max: self.limits.max_string_len,
                    });
                }
                self.write_string(&text, out);
            }
        }
        Ok(())
    }
}

/// Build a structured value from the token just produced by `tokens`.
///
/// Drives the tokenizer recursively; `peek_close` guards the empty
/// collection cases. Recursion depth is capped by `max_depth` — stack
/// space must not scale with attacker-controlled nesting.
fn json_value(
    tokens: &mut Tokenizer<'_>,
    kind: TokenKind,
    depth: usize,
    max_depth: usize,
) -> Result<Value, CodecError> {
    match kind {
        TokenKind::Null => Ok(Value::Null),
        TokenKind::Boolean => Ok(Value::Bool(tokens.boolean())),
        TokenKind::Number => Ok(Value::from(tokens.number())),
        TokenKind::Str => Ok(Value::String(tokens.take_string())),
        TokenKind::StartArray => {
            if depth >= max_depth {
                return Err(CodecError::TooDeep { max: max_depth });
            }
            let mut items = Vec::new();
            while !tokens.peek_close(b']') {
                let next = tokens.parse()?;
                items.push(json_value(tokens, next, depth + 1, max_depth)?);
            }
            tokens.expect(TokenKind::EndArray, false)?;
            Ok(Value::Array(items))
        }
        TokenKind::StartObject => {
            if depth >= max_depth {
                return Err(CodecError::TooDeep { max: max_depth });
            }
            let mut map = Map::new();
            while !tokens.peek_close(b'}') {
                tokens.expect(TokenKind::FieldName, false)?;
                let key = tokens.take_string();
                let next = tokens.parse()?;
                map.insert(key, json_value(tokens, next, depth + 1, max_depth)?);
            }
            tokens.expect(TokenKind::EndObject, false)?;
            Ok(Value::Object(map))
        }
        found => Err(CodecError::UnexpectedToken { found }),
    }
}
