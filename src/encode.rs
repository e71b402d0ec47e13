use crate::bencode::BencodeValue;

/// Encode [`BencodeValue`] to bytes
///
/// Dictionary keys are written in ascending byte order whatever order they were inserted
/// in, so equal values always produce identical output.
pub fn encode(value: &BencodeValue) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_into(value, &mut buf);
    buf
}

fn encode_into(value: &BencodeValue, buf: &mut Vec<u8>) {
    match value {
        BencodeValue::Integer(int) => buf.extend_from_slice(format!("i{}e", int).as_bytes()),
        BencodeValue::ByteString(bytes) => encode_byte_string(bytes, buf),
        BencodeValue::List(items) => {
            buf.push(b'l');
            for item in items {
                encode_into(item, buf);
            }
            buf.push(b'e');
        }
        BencodeValue::Dictionary(dict) => {
            buf.push(b'd');
            // BTreeMap iterates in ascending key order
            for (key, value) in dict {
                encode_byte_string(key, buf);
                encode_into(value, buf);
            }
            buf.push(b'e');
        }
    }
}

fn encode_byte_string(bytes: &[u8], buf: &mut Vec<u8>) {
    buf.extend_from_slice(format!("{}:", bytes.len()).as_bytes());
    buf.extend_from_slice(bytes);
}
