//! Parameter types and type-string parsing

use super::AbiError;
use std::fmt::{self, Display, Formatter};

/// Solidity ABI parameter type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// `address`
    Address,
    /// `bool`
    Bool,
    /// `uintN`, width in bits
    Uint(usize),
    /// `intN`, width in bits
    Int(usize),
    /// `bytesN`, width in bytes
    FixedBytes(usize),
    /// `bytes`
    Bytes,
    /// `string`
    String,
    /// `T[]`
    Array(Box<ParamType>),
    /// `T[N]`
    FixedArray(Box<ParamType>, usize),
    /// `(T1,T2,...)`
    Tuple(Vec<Param>),
}

/// A named parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    /// Parameter name (may be empty)
    pub name: String,
    /// Parameter type
    pub kind: ParamType,
}

impl Param {
    /// Create new parameter
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Parse a human-readable parameter such as `address to` or
    /// `(string domainName, string version) config`
    ///
    /// Data-location and modifier keywords are ignored.
    ///
    /// # Errors
    /// Returns error if the type cannot be parsed
    pub fn parse(s: &str) -> Result<Self, AbiError> {
        let s = s.trim();
        let (type_part, rest) = if s.starts_with('(') || s.starts_with("tuple(") {
            let open = s
                .find('(')
                .ok_or_else(|| AbiError::InvalidType(s.to_string()))?;
            let mut end = matching_paren(s, open)? + 1;
            while s[end..].starts_with('[') {
                let close = s[end..]
                    .find(']')
                    .ok_or_else(|| AbiError::InvalidType(s.to_string()))?;
                end += close + 1;
            }
            (&s[..end], s[end..].trim())
        } else {
            match s.split_once(char::is_whitespace) {
                Some((t, r)) => (t, r.trim()),
                None => (s, ""),
            }
        };

        let name = rest
            .split_whitespace()
            .filter(|w| !matches!(*w, "memory" | "calldata" | "storage" | "indexed" | "payable"))
            .last()
            .unwrap_or("")
            .to_string();

        Ok(Self {
            name,
            kind: ParamType::parse(type_part)?,
        })
    }
}

impl ParamType {
    /// Parse a type string (`uint256`, `address[]`, `(string,bool)[2]`, ...)
    ///
    /// # Errors
    /// Returns [`AbiError::InvalidType`] for unknown or malformed types
    pub fn parse(s: &str) -> Result<Self, AbiError> {
        let s = s.trim();
        let invalid = || AbiError::InvalidType(s.to_string());

        if let Some(stripped) = s.strip_suffix(']') {
            let open = stripped.rfind('[').ok_or_else(invalid)?;
            let inner = Self::parse(&stripped[..open])?;
            let dim = &stripped[open + 1..];
            return if dim.is_empty() {
                Ok(Self::Array(Box::new(inner)))
            } else {
                let n = dim.parse::<usize>().map_err(|_| invalid())?;
                Ok(Self::FixedArray(Box::new(inner), n))
            };
        }

        if let Some(body) = s.strip_prefix("tuple(").or_else(|| s.strip_prefix('(')) {
            let body = body.strip_suffix(')').ok_or_else(invalid)?;
            let params = if body.trim().is_empty() {
                Vec::new()
            } else {
                split_top_level(body)?
                    .into_iter()
                    .map(Param::parse)
                    .collect::<Result<Vec<_>, _>>()?
            };
            return Ok(Self::Tuple(params));
        }

        match s {
            "address" => Ok(Self::Address),
            "bool" => Ok(Self::Bool),
            "string" => Ok(Self::String),
            "bytes" => Ok(Self::Bytes),
            "uint" => Ok(Self::Uint(256)),
            "int" => Ok(Self::Int(256)),
            "function" => Ok(Self::FixedBytes(24)),
            other => {
                if let Some(bits) = other.strip_prefix("uint") {
                    parse_bits(bits).map(Self::Uint).ok_or_else(invalid)
                } else if let Some(bits) = other.strip_prefix("int") {
                    parse_bits(bits).map(Self::Int).ok_or_else(invalid)
                } else if let Some(width) = other.strip_prefix("bytes") {
                    match width.parse::<usize>() {
                        Ok(n) if (1..=32).contains(&n) => Ok(Self::FixedBytes(n)),
                        _ => Err(invalid()),
                    }
                } else {
                    Err(invalid())
                }
            }
        }
    }

    /// Build a type from a JSON ABI `type` string plus its `components`
    ///
    /// `tuple`, `tuple[]`, `tuple[2][]` take their fields from `components`.
    ///
    /// # Errors
    /// Returns error for malformed types or a tuple without components
    pub fn from_components(type_str: &str, components: Option<Vec<Param>>) -> Result<Self, AbiError> {
        let Some(suffix) = type_str.strip_prefix("tuple") else {
            return Self::parse(type_str);
        };
        let fields = components.ok_or_else(|| AbiError::InvalidType(type_str.to_string()))?;
        let mut kind = Self::Tuple(fields);

        let mut rest = suffix;
        while !rest.is_empty() {
            let inner = rest
                .strip_prefix('[')
                .and_then(|r| r.split_once(']'))
                .ok_or_else(|| AbiError::InvalidType(type_str.to_string()))?;
            let (dim, tail) = inner;
            kind = if dim.is_empty() {
                Self::Array(Box::new(kind))
            } else {
                let n = dim
                    .parse::<usize>()
                    .map_err(|_| AbiError::InvalidType(type_str.to_string()))?;
                Self::FixedArray(Box::new(kind), n)
            };
            rest = tail;
        }
        Ok(kind)
    }

    /// Canonical form used in signatures (`(string,string)`, `uint256[]`)
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Address => "address".to_string(),
            Self::Bool => "bool".to_string(),
            Self::Uint(bits) => format!("uint{bits}"),
            Self::Int(bits) => format!("int{bits}"),
            Self::FixedBytes(n) => format!("bytes{n}"),
            Self::Bytes => "bytes".to_string(),
            Self::String => "string".to_string(),
            Self::Array(inner) => format!("{}[]", inner.canonical()),
            Self::FixedArray(inner, n) => format!("{}[{n}]", inner.canonical()),
            Self::Tuple(params) => {
                let parts: Vec<String> = params.iter().map(|p| p.kind.canonical()).collect();
                format!("({})", parts.join(","))
            }
        }
    }

    /// Whether values of this type are encoded in the tail section
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes | Self::String | Self::Array(_) => true,
            Self::FixedArray(inner, _) => inner.is_dynamic(),
            Self::Tuple(params) => params.iter().any(|p| p.kind.is_dynamic()),
            _ => false,
        }
    }
}

impl Display for ParamType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn parse_bits(bits: &str) -> Option<usize> {
    let n = bits.parse::<usize>().ok()?;
    (n > 0 && n <= 256 && n % 8 == 0).then_some(n)
}

/// Index of the `)` that closes the `(` at `open`
pub(crate) fn matching_paren(s: &str, open: usize) -> Result<usize, AbiError> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(AbiError::InvalidSignature(s.to_string()))
}

/// Split on commas that are not nested inside parentheses
pub(crate) fn split_top_level(s: &str) -> Result<Vec<&str>, AbiError> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(AbiError::InvalidSignature(s.to_string()));
                }
            }
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(AbiError::InvalidSignature(s.to_string()));
    }
    parts.push(s[start..].trim());
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_elementary() {
        assert_eq!(ParamType::parse("address").unwrap(), ParamType::Address);
        assert_eq!(ParamType::parse("uint").unwrap(), ParamType::Uint(256));
        assert_eq!(ParamType::parse("uint8").unwrap(), ParamType::Uint(8));
        assert_eq!(ParamType::parse("int128").unwrap(), ParamType::Int(128));
        assert_eq!(ParamType::parse("bytes4").unwrap(), ParamType::FixedBytes(4));
        assert_eq!(ParamType::parse("bytes").unwrap(), ParamType::Bytes);
    }

    #[test]
    fn parse_rejects_bad_widths() {
        assert!(ParamType::parse("uint7").is_err());
        assert!(ParamType::parse("uint264").is_err());
        assert!(ParamType::parse("bytes33").is_err());
        assert!(ParamType::parse("mapping").is_err());
    }

    #[test]
    fn parse_arrays_wrap_left_to_right() {
        let t = ParamType::parse("uint256[][2]").unwrap();
        assert_eq!(
            t,
            ParamType::FixedArray(Box::new(ParamType::Array(Box::new(ParamType::Uint(256)))), 2)
        );
        assert_eq!(t.canonical(), "uint256[][2]");
    }

    #[test]
    fn parse_named_tuple() {
        let p = Param::parse("(string domainName, string version) config").unwrap();
        assert_eq!(p.name, "config");
        assert_eq!(p.kind.canonical(), "(string,string)");
        let ParamType::Tuple(fields) = &p.kind else {
            panic!("expected tuple");
        };
        assert_eq!(fields[0].name, "domainName");
    }

    #[test]
    fn parse_param_ignores_data_location() {
        let p = Param::parse("string memory name").unwrap();
        assert_eq!(p.name, "name");
        assert_eq!(p.kind, ParamType::String);
    }

    #[test]
    fn from_components_tuple_array() {
        let fields = vec![Param::new("a", ParamType::Address), Param::new("b", ParamType::Bool)];
        let t = ParamType::from_components("tuple[]", Some(fields)).unwrap();
        assert_eq!(t.canonical(), "(address,bool)[]");
    }

    #[test]
    fn dynamic_classification() {
        assert!(!ParamType::parse("(address,uint256)").unwrap().is_dynamic());
        assert!(ParamType::parse("(address,string)").unwrap().is_dynamic());
        assert!(!ParamType::parse("uint256[3]").unwrap().is_dynamic());
        assert!(ParamType::parse("string[3]").unwrap().is_dynamic());
    }

    #[test]
    fn split_respects_nesting() {
        let parts = split_top_level("address a, (uint256,bool) b, string c").unwrap();
        assert_eq!(parts, vec!["address a", "(uint256,bool) b", "string c"]);
    }
}
