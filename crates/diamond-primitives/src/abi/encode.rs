//! Standard ABI head/tail encoding

use super::token::Token;

/// Encode a sequence of tokens as the arguments of a call
#[must_use]
pub fn encode_tokens(tokens: &[Token]) -> Vec<u8> {
    encode_sequence(tokens)
}

fn encode_sequence(tokens: &[Token]) -> Vec<u8> {
    let head_len: usize = tokens
        .iter()
        .map(|t| if t.is_dynamic() { 32 } else { static_len(t) })
        .sum();

    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend(encode_token(token));
        } else {
            head.extend(encode_token(token));
        }
    }
    head.extend(tail);
    head
}

fn static_len(token: &Token) -> usize {
    match token {
        Token::FixedArray(items) | Token::Tuple(items) => items.iter().map(static_len).sum(),
        _ => 32,
    }
}

fn encode_token(token: &Token) -> Vec<u8> {
    match token {
        Token::Address(address) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(address.as_bytes());
            word.to_vec()
        }
        Token::Bool(b) => usize_word(usize::from(*b)).to_vec(),
        Token::Uint(word) | Token::Int(word) => word.to_vec(),
        Token::FixedBytes(bytes) => pad_right(bytes),
        Token::Bytes(bytes) => {
            let mut out = usize_word(bytes.len()).to_vec();
            out.extend(pad_right(bytes));
            out
        }
        Token::String(s) => {
            let mut out = usize_word(s.len()).to_vec();
            out.extend(pad_right(s.as_bytes()));
            out
        }
        Token::Array(items) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode_sequence(items));
            out
        }
        Token::FixedArray(items) | Token::Tuple(items) => encode_sequence(items),
    }
}

fn usize_word(value: usize) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

fn pad_right(bytes: &[u8]) -> Vec<u8> {
    let padded_len = bytes.len().div_ceil(32) * 32;
    let mut out = bytes.to_vec();
    out.resize(padded_len, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::Address;

    fn words(hex_str: &str) -> Vec<u8> {
        hex::decode(hex_str.split_whitespace().collect::<String>()).unwrap()
    }

    #[test]
    fn static_arguments_are_inline() {
        let addr = Address::new([0x11; 20]);
        let out = encode_tokens(&[Token::Address(addr), Token::uint(1)]);
        let expected = words(
            "0000000000000000000000001111111111111111111111111111111111111111
             0000000000000000000000000000000000000000000000000000000000000001",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn tuple_of_two_strings() {
        let out = encode_tokens(&[Token::Tuple(vec![
            Token::String("ab".to_string()),
            Token::String("1".to_string()),
        ])]);
        let expected = words(
            "0000000000000000000000000000000000000000000000000000000000000020
             0000000000000000000000000000000000000000000000000000000000000040
             0000000000000000000000000000000000000000000000000000000000000080
             0000000000000000000000000000000000000000000000000000000000000002
             6162000000000000000000000000000000000000000000000000000000000000
             0000000000000000000000000000000000000000000000000000000000000001
             3100000000000000000000000000000000000000000000000000000000000000",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn dynamic_array_of_uints() {
        let out = encode_tokens(&[Token::Array(vec![Token::uint(1), Token::uint(2)])]);
        let expected = words(
            "0000000000000000000000000000000000000000000000000000000000000020
             0000000000000000000000000000000000000000000000000000000000000002
             0000000000000000000000000000000000000000000000000000000000000001
             0000000000000000000000000000000000000000000000000000000000000002",
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn empty_bytes_is_length_only() {
        let out = encode_tokens(&[Token::Bytes(vec![])]);
        assert_eq!(out.len(), 64);
        assert_eq!(out[31], 0x20);
        assert!(out[32..].iter().all(|b| *b == 0));
    }
}
