//! Contract interfaces and selector extraction
//!
//! An [`Interface`] is the ordered list of externally callable functions of a
//! compiled contract. It is built from a JSON ABI (as emitted by solc or
//! Hardhat artifacts) or from human-readable fragments, and answers two
//! questions the upgrade flow needs: which selectors does this facet expose,
//! and how is a call to one of its functions encoded.

use super::encode::encode_tokens;
use super::param::{matching_paren, split_top_level, Param, ParamType};
use super::token::Token;
use super::AbiError;
use crate::bytes::Selector;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Function state mutability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    /// Reads no state
    Pure,
    /// Reads state
    View,
    /// Writes state
    #[default]
    Nonpayable,
    /// Writes state and accepts value
    Payable,
}

/// One callable function of an interface
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Input parameters
    pub inputs: Vec<Param>,
    /// Output parameters
    pub outputs: Vec<Param>,
    /// Mutability
    pub state_mutability: StateMutability,
}

impl Function {
    /// Canonical signature, e.g. `init((string,string))`
    #[must_use]
    pub fn signature(&self) -> String {
        let inputs: Vec<String> = self.inputs.iter().map(|p| p.kind.canonical()).collect();
        format!("{}({})", self.name, inputs.join(","))
    }

    /// Selector derived from the canonical signature
    #[inline]
    #[must_use]
    pub fn selector(&self) -> Selector {
        Selector::from_signature(&self.signature())
    }

    /// Whether a filter entry refers to this function
    ///
    /// Entries may be a bare name (matches every overload) or a full
    /// canonical signature.
    #[inline]
    #[must_use]
    pub fn matches(&self, entry: &str) -> bool {
        self.name == entry || self.signature() == entry
    }

    /// Parse a human-readable fragment
    ///
    /// Accepts `function mint(address to, uint256 id) external returns (bool)`
    /// as well as the bare `mint(address,uint256)` form.
    ///
    /// # Errors
    /// Returns [`AbiError::InvalidSignature`] when the fragment is malformed
    pub fn parse(fragment: &str) -> Result<Self, AbiError> {
        let invalid = || AbiError::InvalidSignature(fragment.to_string());
        let s = fragment.trim();
        let s = s.strip_prefix("function ").unwrap_or(s).trim();

        let open = s.find('(').ok_or_else(invalid)?;
        let name = s[..open].trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
            return Err(invalid());
        }
        let close = matching_paren(s, open)?;
        let inputs = parse_param_list(&s[open + 1..close])?;

        let tail = s[close + 1..].trim();
        let mut state_mutability = StateMutability::Nonpayable;
        for word in tail.split_whitespace() {
            match word {
                "view" => state_mutability = StateMutability::View,
                "pure" => state_mutability = StateMutability::Pure,
                "payable" => state_mutability = StateMutability::Payable,
                _ => {}
            }
        }
        let outputs = match tail.find("returns") {
            Some(at) => {
                let rest = &tail[at + "returns".len()..];
                let ret_open = rest.find('(').ok_or_else(invalid)?;
                let ret_close = matching_paren(rest, ret_open)?;
                parse_param_list(&rest[ret_open + 1..ret_close])?
            }
            None => Vec::new(),
        };

        Ok(Self {
            name: name.to_string(),
            inputs,
            outputs,
            state_mutability,
        })
    }
}

fn parse_param_list(body: &str) -> Result<Vec<Param>, AbiError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(body)?.into_iter().map(Param::parse).collect()
}

/// Include/exclude filter applied during selector extraction
///
/// With neither list set every function is selected. `include` takes
/// precedence: when it is set, `exclude` is only checked for resolvability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorFilter {
    /// Only these functions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    /// Every function except these
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

impl SelectorFilter {
    /// Filter that selects every function
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Select only the named functions
    #[must_use]
    pub fn include<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: Some(names.into_iter().map(Into::into).collect()),
            exclude: None,
        }
    }

    /// Select every function except the named ones
    #[must_use]
    pub fn exclude<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: None,
            exclude: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    fn admits(&self, function: &Function) -> bool {
        match (&self.include, &self.exclude) {
            (Some(include), _) => include.iter().any(|n| function.matches(n)),
            (None, Some(exclude)) => !exclude.iter().any(|n| function.matches(n)),
            (None, None) => true,
        }
    }

    fn entries(&self) -> impl Iterator<Item = &String> {
        self.include.iter().flatten().chain(self.exclude.iter().flatten())
    }
}

/// Ordered set of callable functions of a contract
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interface {
    functions: Vec<Function>,
}

impl Interface {
    /// Build from functions, dropping exact duplicate signatures
    #[must_use]
    pub fn new(functions: Vec<Function>) -> Self {
        let mut seen = IndexSet::new();
        let functions = functions
            .into_iter()
            .filter(|f| seen.insert(f.signature()))
            .collect();
        Self { functions }
    }

    /// Parse a JSON ABI document (array of items)
    ///
    /// # Errors
    /// Returns error if the JSON is malformed or contains unknown types
    pub fn from_json(json: &str) -> Result<Self, AbiError> {
        let items: Vec<RawItem> = serde_json::from_str(json)?;
        Self::try_from(items)
    }

    /// Parse an already-decoded JSON ABI value
    ///
    /// # Errors
    /// Returns error if the value is not a valid ABI array
    pub fn from_value(value: serde_json::Value) -> Result<Self, AbiError> {
        let items: Vec<RawItem> = serde_json::from_value(value)?;
        Self::try_from(items)
    }

    /// Build from human-readable function fragments
    ///
    /// Non-function fragments (`event ...`, `error ...`, `constructor ...`)
    /// are skipped.
    ///
    /// # Errors
    /// Returns error if a function fragment is malformed
    pub fn from_fragments<I, S>(fragments: I) -> Result<Self, AbiError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut functions = Vec::new();
        for fragment in fragments {
            let fragment = fragment.as_ref().trim();
            let keyword = fragment.split_whitespace().next().unwrap_or("");
            if matches!(keyword, "event" | "error" | "constructor" | "fallback" | "receive") {
                continue;
            }
            functions.push(Function::parse(fragment)?);
        }
        Ok(Self::new(functions))
    }

    /// All functions, in declaration order
    #[inline]
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Number of functions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the interface exposes no functions
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Look up a function by bare name or canonical signature
    ///
    /// A bare name that is overloaded resolves to its first declaration.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions
            .iter()
            .find(|f| f.signature() == name)
            .or_else(|| self.functions.iter().find(|f| f.name == name))
    }

    /// Extract the ordered, de-duplicated selectors admitted by `filter`
    ///
    /// # Errors
    /// Returns [`AbiError::UnresolvedSignature`] if a filter entry names no
    /// function of this interface
    pub fn selectors(&self, filter: &SelectorFilter) -> Result<Vec<Selector>, AbiError> {
        if let Some(missing) = filter
            .entries()
            .find(|entry| !self.functions.iter().any(|f| f.matches(entry)))
        {
            return Err(AbiError::UnresolvedSignature {
                name: missing.clone(),
            });
        }

        let selectors: IndexSet<Selector> = self
            .functions
            .iter()
            .filter(|f| filter.admits(f))
            .map(Function::selector)
            .collect();
        Ok(selectors.into_iter().collect())
    }

    /// Encode call data for `method` with positional arguments
    ///
    /// # Errors
    /// Returns error if the method is unknown or the arguments do not match
    /// its inputs
    pub fn encode_call(&self, method: &str, args: &[Token]) -> Result<Vec<u8>, AbiError> {
        let function = self
            .function(method)
            .ok_or_else(|| AbiError::UnknownFunction(method.to_string()))?;

        if function.inputs.len() != args.len() {
            return Err(AbiError::InvalidArguments {
                function: function.signature(),
                reason: format!("expected {} arguments, got {}", function.inputs.len(), args.len()),
            });
        }
        for (param, arg) in function.inputs.iter().zip(args) {
            if !arg.type_check(&param.kind) {
                return Err(AbiError::InvalidArguments {
                    function: function.signature(),
                    reason: format!("argument `{}` is not a valid {}", param.name, param.kind),
                });
            }
        }

        let mut data = function.selector().into_bytes().to_vec();
        data.extend(encode_tokens(args));
        Ok(data)
    }

    /// Encode call data for `method` from JSON arguments
    ///
    /// `args` is either an array (positional) or, for single-input methods,
    /// the value of that one input. A single array-typed input given as a
    /// one-element array is read positionally, so wrap it: `[[1, 2]]`.
    ///
    /// # Errors
    /// Returns error if the method is unknown or a value cannot be tokenized
    pub fn encode_call_json(&self, method: &str, args: &serde_json::Value) -> Result<Vec<u8>, AbiError> {
        let function = self
            .function(method)
            .ok_or_else(|| AbiError::UnknownFunction(method.to_string()))?;

        let arity = function.inputs.len();
        let values: Vec<&serde_json::Value> = match args {
            serde_json::Value::Null if arity == 0 => Vec::new(),
            serde_json::Value::Array(items) if items.len() == arity => items.iter().collect(),
            value if arity == 1 => vec![value],
            serde_json::Value::Array(items) => items.iter().collect(),
            _ => {
                return Err(AbiError::InvalidArguments {
                    function: function.signature(),
                    reason: "arguments must be a JSON array".to_string(),
                })
            }
        };
        if values.len() != function.inputs.len() {
            return Err(AbiError::InvalidArguments {
                function: function.signature(),
                reason: format!("expected {} arguments, got {}", function.inputs.len(), values.len()),
            });
        }

        let tokens = function
            .inputs
            .iter()
            .zip(values)
            .map(|(param, value)| Token::from_json(&param.kind, value))
            .collect::<Result<Vec<_>, _>>()?;
        self.encode_call(&function.signature(), &tokens)
    }
}

impl TryFrom<Vec<RawItem>> for Interface {
    type Error = AbiError;

    fn try_from(items: Vec<RawItem>) -> Result<Self, Self::Error> {
        let mut functions = Vec::new();
        for item in items {
            if item.kind != "function" {
                continue;
            }
            let name = item
                .name
                .ok_or_else(|| AbiError::InvalidSignature("function without a name".to_string()))?;
            functions.push(Function {
                name,
                inputs: convert_params(item.inputs)?,
                outputs: convert_params(item.outputs)?,
                state_mutability: item.state_mutability.unwrap_or_default(),
            });
        }
        Ok(Self::new(functions))
    }
}

impl<'de> Deserialize<'de> for Interface {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let items = Vec::<RawItem>::deserialize(deserializer)?;
        Self::try_from(items).map_err(serde::de::Error::custom)
    }
}

fn convert_params(raw: Vec<RawParam>) -> Result<Vec<Param>, AbiError> {
    raw.into_iter()
        .map(|p| {
            let components = p.components.map(convert_params).transpose()?;
            Ok(Param {
                name: p.name,
                kind: ParamType::from_components(&p.kind, components)?,
            })
        })
        .collect()
}

/// JSON ABI item as emitted by the compiler
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    #[serde(rename = "type", default = "default_item_kind")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    inputs: Vec<RawParam>,
    #[serde(default)]
    outputs: Vec<RawParam>,
    #[serde(default)]
    state_mutability: Option<StateMutability>,
}

fn default_item_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct RawParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    components: Option<Vec<RawParam>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token_interface() -> Interface {
        Interface::from_fragments([
            "function mint(address to, uint256 id, string uri)",
            "function burn(uint256 id)",
            "function transfer(address to, uint256 id)",
            "event Transfer(address indexed from, address indexed to, uint256 id)",
        ])
        .unwrap()
    }

    #[test]
    fn fragment_signature_is_canonical() {
        let f = Function::parse("function init((string domainName, string version) config) external").unwrap();
        assert_eq!(f.signature(), "init((string,string))");
    }

    #[test]
    fn fragment_parses_outputs_and_mutability() {
        let f = Function::parse("function balanceOf(address owner) external view returns (uint256)").unwrap();
        assert_eq!(f.state_mutability, StateMutability::View);
        assert_eq!(f.outputs.len(), 1);
        assert_eq!(f.selector().to_string(), "0x70a08231");
    }

    #[test]
    fn events_are_skipped() {
        assert_eq!(token_interface().len(), 3);
    }

    #[test]
    fn selectors_without_filter_cover_every_function() {
        let iface = token_interface();
        let all = iface.selectors(&SelectorFilter::all()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], Selector::from_signature("mint(address,uint256,string)"));
        assert_eq!(all[2], Selector::from_signature("transfer(address,uint256)"));
    }

    #[test]
    fn include_selects_only_named() {
        let iface = token_interface();
        let only_mint = iface.selectors(&SelectorFilter::include(["mint"])).unwrap();
        assert_eq!(only_mint, vec![Selector::from_signature("mint(address,uint256,string)")]);
    }

    #[test]
    fn exclude_drops_named() {
        let iface = token_interface();
        let rest = iface.selectors(&SelectorFilter::exclude(["burn"])).unwrap();
        assert_eq!(rest.len(), 2);
        assert!(!rest.contains(&Selector::from_signature("burn(uint256)")));
    }

    #[test]
    fn include_takes_precedence_over_exclude() {
        let iface = token_interface();
        let filter = SelectorFilter {
            include: Some(vec!["burn".to_string()]),
            exclude: Some(vec!["burn".to_string()]),
        };
        assert_eq!(iface.selectors(&filter).unwrap(), vec![Selector::from_signature("burn(uint256)")]);
    }

    #[test]
    fn filter_by_full_signature() {
        let iface = token_interface();
        let sel = iface.selectors(&SelectorFilter::include(["burn(uint256)"])).unwrap();
        assert_eq!(sel.len(), 1);
    }

    #[test]
    fn unknown_filter_name_is_unresolved() {
        let iface = token_interface();
        let err = iface.selectors(&SelectorFilter::exclude(["approve"])).unwrap_err();
        assert!(matches!(err, AbiError::UnresolvedSignature { ref name } if name == "approve"));
    }

    #[test]
    fn overloads_share_a_name() {
        let iface = Interface::from_fragments([
            "function safeTransferFrom(address from, address to, uint256 id)",
            "function safeTransferFrom(address from, address to, uint256 id, bytes data)",
        ])
        .unwrap();
        let both = iface.selectors(&SelectorFilter::include(["safeTransferFrom"])).unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both[0].to_string(), "0x42842e0e");
        assert_eq!(both[1].to_string(), "0xb88d4fde");
    }

    #[test]
    fn duplicate_fragments_are_deduplicated() {
        let iface = Interface::from_fragments(["function burn(uint256)", "function burn(uint256 id)"]).unwrap();
        assert_eq!(iface.len(), 1);
    }

    #[test]
    fn json_abi_with_tuple_components() {
        let json = r#"[
            {"type":"constructor","inputs":[]},
            {"type":"function","name":"init","stateMutability":"nonpayable",
             "inputs":[{"name":"_args","type":"tuple","components":[
                {"name":"domainName","type":"string"},
                {"name":"version","type":"string"}]}],
             "outputs":[]},
            {"type":"event","name":"Initialized","inputs":[],"anonymous":false}
        ]"#;
        let iface = Interface::from_json(json).unwrap();
        assert_eq!(iface.len(), 1);
        assert_eq!(iface.functions()[0].signature(), "init((string,string))");
    }

    #[test]
    fn json_abi_item_without_type_is_a_function() {
        let json = r#"[{"name":"owner","inputs":[],"outputs":[{"name":"","type":"address"}]}]"#;
        let iface = Interface::from_json(json).unwrap();
        assert_eq!(iface.functions()[0].selector().to_string(), "0x8da5cb5b");
    }

    #[test]
    fn encode_call_rejects_wrong_arity() {
        let iface = token_interface();
        let err = iface.encode_call("burn", &[]).unwrap_err();
        assert!(matches!(err, AbiError::InvalidArguments { .. }));
    }

    #[test]
    fn encode_call_prefixes_selector() {
        let iface = token_interface();
        let data = iface.encode_call("burn", &[Token::uint(7)]).unwrap();
        assert_eq!(&data[..4], Selector::from_signature("burn(uint256)").as_bytes());
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(data[35], 7);
    }

    #[test]
    fn encode_call_json_single_struct_argument() {
        let iface = Interface::from_fragments(["function init((string domainName, string version) args)"]).unwrap();
        let object = serde_json::json!({"domainName": "bizverse-vrLands", "version": "1"});
        let positional = serde_json::json!([["bizverse-vrLands", "1"]]);
        let a = iface.encode_call_json("init", &object).unwrap();
        let b = iface.encode_call_json("init", &positional).unwrap();
        assert_eq!(a, b);
    }
}
