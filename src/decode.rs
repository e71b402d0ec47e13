use std::collections::BTreeMap;

use nom::{
    character::complete::{char, i64, u64},
    error::{Error, ErrorKind},
    sequence::{delimited, terminated},
    IResult, Parser,
};

use crate::bencode::BencodeValue;
use crate::error::BencodeError;

/// Containers nested deeper than this are rejected rather than recursed into
const MAX_DEPTH: usize = 64;

/// Decode the first bencoded value in `input`
///
/// Returns the value and the number of bytes it occupied. Bytes following the value are
/// left untouched, so a caller walking a stream can slide forward by the returned count.
pub fn decode(input: &[u8]) -> Result<(BencodeValue, usize), BencodeError> {
    match value(input, 0) {
        Ok((rest, value)) => Ok((value, input.len() - rest.len())),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(BencodeError::MalformedInput {
            offset: input.len() - e.input.len(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(BencodeError::MalformedInput {
            offset: input.len(),
        }),
    }
}

/// Decode a value, dispatching on its first byte
fn value(input: &[u8], depth: usize) -> IResult<&[u8], BencodeValue> {
    if depth > MAX_DEPTH {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
    }
    match input.first() {
        Some(b'0'..=b'9') => {
            let (rest, bytes) = byte_string(input)?;
            Ok((rest, BencodeValue::ByteString(bytes)))
        }
        Some(b'i') => {
            let (rest, int) = integer(input)?;
            Ok((rest, BencodeValue::Integer(int)))
        }
        Some(b'l') => {
            let (rest, items) = list(input, depth)?;
            Ok((rest, BencodeValue::List(items)))
        }
        Some(b'd') => {
            let (rest, dict) = dictionary(input, depth)?;
            Ok((rest, BencodeValue::Dictionary(dict)))
        }
        _ => Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    }
}

/// `<len>:`
fn length_prefix(input: &[u8]) -> IResult<&[u8], u64> {
    terminated(u64, char(':')).parse(input)
}

/// `<len>:<bytes>`
fn byte_string(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (input, len) = length_prefix(input)?;
    let len = match usize::try_from(len) {
        Ok(len) if len <= input.len() => len,
        _ => return Err(nom::Err::Failure(Error::new(input, ErrorKind::Eof))),
    };
    let (bytes, rest) = input.split_at(len);
    Ok((rest, bytes.to_vec()))
}

/// `i<signed decimal>e`
fn integer(input: &[u8]) -> IResult<&[u8], i64> {
    delimited(char('i'), i64, char('e')).parse(input)
}

/// `l<value>*e`
fn list(input: &[u8], depth: usize) -> IResult<&[u8], Vec<BencodeValue>> {
    let mut input = &input[1..];
    let mut items = Vec::new();
    loop {
        if let Some((b'e', rest)) = input.split_first() {
            return Ok((rest, items));
        }
        let (rest, item) = value(input, depth + 1)?;
        items.push(item);
        input = rest;
    }
}

/// `d(<byte string><value>)*e`
fn dictionary(input: &[u8], depth: usize) -> IResult<&[u8], BTreeMap<Vec<u8>, BencodeValue>> {
    let mut input = &input[1..];
    let mut dict = BTreeMap::new();
    loop {
        if let Some((b'e', rest)) = input.split_first() {
            return Ok((rest, dict));
        }
        // Keys must be byte strings, anything else is a malformed dictionary
        let (rest, key) = byte_string(input)?;
        let (rest, value) = match value(rest, depth + 1) {
            Err(nom::Err::Error(e)) => return Err(nom::Err::Failure(e)),
            res => res?,
        };
        dict.insert(key, value);
        input = rest;
    }
}
