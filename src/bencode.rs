use std::collections::BTreeMap;

use crate::error::BencodeError;

/// A decoded bencode value
///
/// Dictionaries are kept in a [`BTreeMap`] so iteration, and therefore encoding, always
/// follows ascending byte order of the keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BencodeValue {
    ByteString(Vec<u8>),
    Integer(i64),
    List(Vec<BencodeValue>),
    Dictionary(BTreeMap<Vec<u8>, BencodeValue>),
}

impl BencodeValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BencodeValue::ByteString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Byte string contents, if they are valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            BencodeValue::Integer(int) => Some(*int),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BencodeValue]> {
        match self {
            BencodeValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, BencodeValue>> {
        match self {
            BencodeValue::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    /// Look up a key if this value is a dictionary
    pub fn get(&self, key: &str) -> Option<&BencodeValue> {
        self.as_dict().and_then(|dict| dict.get(key.as_bytes()))
    }
}

impl From<i64> for BencodeValue {
    fn from(int: i64) -> BencodeValue {
        BencodeValue::Integer(int)
    }
}

impl From<&str> for BencodeValue {
    fn from(string: &str) -> BencodeValue {
        BencodeValue::ByteString(string.as_bytes().to_vec())
    }
}

impl From<&[u8]> for BencodeValue {
    fn from(bytes: &[u8]) -> BencodeValue {
        BencodeValue::ByteString(bytes.to_vec())
    }
}

impl From<Vec<BencodeValue>> for BencodeValue {
    fn from(items: Vec<BencodeValue>) -> BencodeValue {
        BencodeValue::List(items)
    }
}

impl<K: Into<Vec<u8>>> FromIterator<(K, BencodeValue)> for BencodeValue {
    fn from_iter<I: IntoIterator<Item = (K, BencodeValue)>>(iter: I) -> BencodeValue {
        BencodeValue::Dictionary(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Render as JSON, with byte strings shown as (lossy) UTF-8 text
impl From<&BencodeValue> for serde_json::Value {
    fn from(value: &BencodeValue) -> serde_json::Value {
        match value {
            BencodeValue::ByteString(bytes) => {
                serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
            }
            BencodeValue::Integer(int) => serde_json::Value::from(*int),
            BencodeValue::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            BencodeValue::Dictionary(dict) => serde_json::Value::Object(
                dict.iter()
                    .map(|(key, value)| {
                        (
                            String::from_utf8_lossy(key).into_owned(),
                            serde_json::Value::from(value),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

impl TryFrom<&serde_json::Value> for BencodeValue {
    type Error = BencodeError;

    fn try_from(value: &serde_json::Value) -> Result<BencodeValue, BencodeError> {
        match value {
            serde_json::Value::String(string) => Ok(BencodeValue::from(string.as_str())),
            serde_json::Value::Number(num) => num
                .as_i64()
                .map(BencodeValue::Integer)
                .ok_or_else(|| BencodeError::UnsupportedType(format!("number {}", num))),
            serde_json::Value::Array(items) => items
                .iter()
                .map(BencodeValue::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(BencodeValue::List),
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(key, value)| {
                    BencodeValue::try_from(value).map(|value| (key.as_bytes().to_vec(), value))
                })
                .collect::<Result<BTreeMap<_, _>, BencodeError>>()
                .map(BencodeValue::Dictionary),
            serde_json::Value::Bool(b) => Err(BencodeError::UnsupportedType(format!("bool {}", b))),
            serde_json::Value::Null => Err(BencodeError::UnsupportedType("null".to_string())),
        }
    }
}
