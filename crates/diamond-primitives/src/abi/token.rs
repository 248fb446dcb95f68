//! ABI values

use super::param::ParamType;
use super::AbiError;
use crate::bytes::Address;
use serde_json::Value;

/// A 32-byte big-endian word
pub type Word = [u8; 32];

/// An ABI value ready for encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `address`
    Address(Address),
    /// `bool`
    Bool(bool),
    /// `uintN` as a big-endian word
    Uint(Word),
    /// `intN` as a two's-complement big-endian word
    Int(Word),
    /// `bytesN`
    FixedBytes(Vec<u8>),
    /// `bytes`
    Bytes(Vec<u8>),
    /// `string`
    String(String),
    /// `T[]`
    Array(Vec<Token>),
    /// `T[N]`
    FixedArray(Vec<Token>),
    /// `(T1,T2,...)`
    Tuple(Vec<Token>),
}

impl Token {
    /// Unsigned integer token
    #[must_use]
    pub fn uint(value: u128) -> Self {
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&value.to_be_bytes());
        Self::Uint(word)
    }

    /// Signed integer token
    #[must_use]
    pub fn int(value: i128) -> Self {
        let fill = if value < 0 { 0xff } else { 0x00 };
        let mut word = [fill; 32];
        word[16..].copy_from_slice(&value.to_be_bytes());
        Self::Int(word)
    }

    /// Whether the value lives in the tail section when encoded
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes(_) | Self::String(_) | Self::Array(_) => true,
            Self::FixedArray(items) | Self::Tuple(items) => items.iter().any(Self::is_dynamic),
            _ => false,
        }
    }

    /// Check that this value is a valid instance of `kind`
    #[must_use]
    pub fn type_check(&self, kind: &ParamType) -> bool {
        match (self, kind) {
            (Self::Address(_), ParamType::Address) | (Self::Bool(_), ParamType::Bool) => true,
            (Self::Uint(word), ParamType::Uint(bits)) => uint_fits(word, *bits),
            (Self::Int(word), ParamType::Int(bits)) => int_fits(word, *bits),
            (Self::FixedBytes(bytes), ParamType::FixedBytes(n)) => bytes.len() == *n,
            (Self::Bytes(_), ParamType::Bytes) | (Self::String(_), ParamType::String) => true,
            (Self::Array(items), ParamType::Array(inner)) => items.iter().all(|t| t.type_check(inner)),
            (Self::FixedArray(items), ParamType::FixedArray(inner, n)) => {
                items.len() == *n && items.iter().all(|t| t.type_check(inner))
            }
            (Self::Tuple(items), ParamType::Tuple(params)) => {
                items.len() == params.len()
                    && items.iter().zip(params).all(|(t, p)| t.type_check(&p.kind))
            }
            _ => false,
        }
    }

    /// Tokenize a JSON value against an ABI type
    ///
    /// Integers accept JSON numbers and decimal or `0x` hex strings; byte
    /// types accept `0x` hex strings; tuples accept arrays (positional) or
    /// objects keyed by component name.
    ///
    /// # Errors
    /// Returns [`AbiError::InvalidValue`] when the value does not fit the type
    pub fn from_json(kind: &ParamType, value: &Value) -> Result<Self, AbiError> {
        let invalid = |reason: &str| AbiError::InvalidValue {
            expected: kind.canonical(),
            reason: reason.to_string(),
        };

        match kind {
            ParamType::Address => {
                let s = value.as_str().ok_or_else(|| invalid("expected a hex string"))?;
                s.parse().map(Self::Address).map_err(|e| invalid(&e.to_string()))
            }
            ParamType::Bool => match value {
                Value::Bool(b) => Ok(Self::Bool(*b)),
                Value::String(s) if s == "true" => Ok(Self::Bool(true)),
                Value::String(s) if s == "false" => Ok(Self::Bool(false)),
                _ => Err(invalid("expected a boolean")),
            },
            ParamType::Uint(bits) => {
                let word = match value {
                    Value::Number(n) => n
                        .as_u64()
                        .map(|v| word_from_u128(u128::from(v)))
                        .ok_or_else(|| invalid("expected a non-negative integer"))?,
                    Value::String(s) => parse_uint_word(s).ok_or_else(|| invalid("not an unsigned integer"))?,
                    _ => return Err(invalid("expected a number or numeric string")),
                };
                if !uint_fits(&word, *bits) {
                    return Err(invalid("value out of range"));
                }
                Ok(Self::Uint(word))
            }
            ParamType::Int(bits) => {
                let token = match value {
                    Value::Number(n) => n
                        .as_i64()
                        .map(|v| Self::int(i128::from(v)))
                        .ok_or_else(|| invalid("expected an integer"))?,
                    Value::String(s) => {
                        let (negative, digits) = match s.strip_prefix('-') {
                            Some(rest) => (true, rest),
                            None => (false, s.as_str()),
                        };
                        let magnitude = parse_uint_word(digits).ok_or_else(|| invalid("not an integer"))?;
                        Self::Int(if negative { negate(magnitude) } else { magnitude })
                    }
                    _ => return Err(invalid("expected a number or numeric string")),
                };
                if !token.type_check(kind) {
                    return Err(invalid("value out of range"));
                }
                Ok(token)
            }
            ParamType::FixedBytes(n) => {
                let bytes = decode_hex(value).ok_or_else(|| invalid("expected a hex string"))?;
                if bytes.len() != *n {
                    return Err(invalid("wrong byte length"));
                }
                Ok(Self::FixedBytes(bytes))
            }
            ParamType::Bytes => decode_hex(value)
                .map(Self::Bytes)
                .ok_or_else(|| invalid("expected a hex string")),
            ParamType::String => value
                .as_str()
                .map(|s| Self::String(s.to_string()))
                .ok_or_else(|| invalid("expected a string")),
            ParamType::Array(inner) => {
                let items = value.as_array().ok_or_else(|| invalid("expected an array"))?;
                items
                    .iter()
                    .map(|v| Self::from_json(inner, v))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Array)
            }
            ParamType::FixedArray(inner, n) => {
                let items = value.as_array().ok_or_else(|| invalid("expected an array"))?;
                if items.len() != *n {
                    return Err(invalid("wrong array length"));
                }
                items
                    .iter()
                    .map(|v| Self::from_json(inner, v))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::FixedArray)
            }
            ParamType::Tuple(params) => match value {
                Value::Array(items) => {
                    if items.len() != params.len() {
                        return Err(invalid("wrong number of tuple fields"));
                    }
                    params
                        .iter()
                        .zip(items)
                        .map(|(p, v)| Self::from_json(&p.kind, v))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Self::Tuple)
                }
                Value::Object(fields) => params
                    .iter()
                    .map(|p| {
                        let v = fields
                            .get(&p.name)
                            .ok_or_else(|| invalid(&format!("missing field `{}`", p.name)))?;
                        Self::from_json(&p.kind, v)
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Tuple),
                _ => Err(invalid("expected an array or object")),
            },
        }
    }
}

fn word_from_u128(value: u128) -> Word {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Parse a decimal or `0x` hex string into a 256-bit word
fn parse_uint_word(s: &str) -> Option<Word> {
    let s = s.trim();
    if let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if digits.is_empty() || digits.len() > 64 {
            return None;
        }
        let padded = format!("{digits:0>64}");
        let bytes = hex::decode(padded).ok()?;
        let mut word = [0u8; 32];
        word.copy_from_slice(&bytes);
        return Some(word);
    }

    if s.is_empty() {
        return None;
    }
    let mut word = [0u8; 32];
    for c in s.chars() {
        let digit = c.to_digit(10)?;
        // word = word * 10 + digit
        let mut carry = digit;
        for byte in word.iter_mut().rev() {
            let v = u32::from(*byte) * 10 + carry;
            *byte = (v & 0xff) as u8;
            carry = v >> 8;
        }
        if carry != 0 {
            return None;
        }
    }
    Some(word)
}

fn negate(word: Word) -> Word {
    let mut out = word.map(|b| !b);
    for byte in out.iter_mut().rev() {
        let (v, overflow) = byte.overflowing_add(1);
        *byte = v;
        if !overflow {
            break;
        }
    }
    out
}

fn uint_fits(word: &Word, bits: usize) -> bool {
    let used = bits / 8;
    word[..32 - used].iter().all(|b| *b == 0)
}

fn int_fits(word: &Word, bits: usize) -> bool {
    let used = bits / 8;
    let sign_extension = if word[32 - used] & 0x80 != 0 { 0xff } else { 0x00 };
    word[..32 - used].iter().all(|b| *b == sign_extension)
}

fn decode_hex(value: &Value) -> Option<Vec<u8>> {
    let s = value.as_str()?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uint_from_decimal_string_beyond_u128() {
        let t = Token::from_json(&ParamType::Uint(256), &json!("340282366920938463463374607431768211456")).unwrap();
        let Token::Uint(word) = t else { panic!("expected uint") };
        // 2^128
        assert_eq!(word[15], 1);
        assert!(word[16..].iter().all(|b| *b == 0));
    }

    #[test]
    fn uint_range_is_enforced() {
        assert!(Token::from_json(&ParamType::Uint(8), &json!(255)).is_ok());
        assert!(Token::from_json(&ParamType::Uint(8), &json!(256)).is_err());
        assert!(Token::from_json(&ParamType::Uint(8), &json!(-1)).is_err());
    }

    #[test]
    fn negative_int_from_string() {
        let t = Token::from_json(&ParamType::Int(256), &json!("-1")).unwrap();
        assert_eq!(t, Token::int(-1));
        assert_eq!(t, Token::Int([0xff; 32]));
    }

    #[test]
    fn int_range_is_enforced() {
        assert!(Token::from_json(&ParamType::Int(8), &json!(-128)).is_ok());
        assert!(Token::from_json(&ParamType::Int(8), &json!(127)).is_ok());
        assert!(Token::from_json(&ParamType::Int(8), &json!(128)).is_err());
        assert!(Token::from_json(&ParamType::Int(8), &json!(-129)).is_err());
    }

    #[test]
    fn tuple_from_object_requires_every_field() {
        let kind = ParamType::parse("(string domainName, string version)").unwrap();
        let err = Token::from_json(&kind, &json!({"domainName": "x"})).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn address_and_bytes() {
        let a = Token::from_json(&ParamType::Address, &json!("0x1fcf146989FDd0C7A928e124e869E3F91A17A8E4")).unwrap();
        assert!(matches!(a, Token::Address(_)));
        let b = Token::from_json(&ParamType::FixedBytes(4), &json!("0x80ac58cd")).unwrap();
        assert_eq!(b, Token::FixedBytes(vec![0x80, 0xac, 0x58, 0xcd]));
        assert!(Token::from_json(&ParamType::FixedBytes(4), &json!("0x80ac")).is_err());
    }

    #[test]
    fn dynamic_tokens() {
        assert!(Token::String(String::new()).is_dynamic());
        assert!(!Token::Tuple(vec![Token::Bool(true), Token::uint(1)]).is_dynamic());
        assert!(Token::Tuple(vec![Token::Bool(true), Token::Bytes(vec![])]).is_dynamic());
    }
}
