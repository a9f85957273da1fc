use crate::HashError;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

fn nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decode `hex` into `buf`. The caller checks the length first.
pub(crate) fn decode_into(hex: &str, buf: &mut [u8]) -> Result<(), HashError> {
    let raw = hex.as_bytes();
    debug_assert_eq!(raw.len(), buf.len() * 2);
    for (i, out) in buf.iter_mut().enumerate() {
        let mut value = 0u8;
        for position in [i * 2, i * 2 + 1] {
            let n = nibble(raw[position]).ok_or(HashError::InvalidHex {
                position,
                character: hex[position..].chars().next().unwrap_or('?'),
            })?;
            value = (value << 4) | n;
        }
        *out = value;
    }
    Ok(())
}

/// Lowercase hex rendering of `bytes`.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0x0f) as usize] as char);
    }
    out
}
