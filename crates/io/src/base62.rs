use crate::error::DecodeError;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn digit(b: u8) -> Option<u64> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u64),
        b'A'..=b'Z' => Some((b - b'A') as u64 + 10),
        b'a'..=b'z' => Some((b - b'a') as u64 + 36),
        _ => None,
    }
}

/// Big-endian base-62 over `0-9A-Za-z`.
pub fn decode(encoded: &[u8]) -> Option<u64> {
    encoded.iter().try_fold(0u64, |acc, &b| {
        let d = digit(b)?;
        acc.checked_mul(62)?.checked_add(d)
    })
}

/// Decode a worker-share slot. Blank slots are zero.
pub fn decode_cents(encoded: &[u8], offset: usize, field: &str) -> Result<f64, DecodeError> {
    let trimmed = encoded.trim_ascii();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    decode(trimmed)
        .map(|n| n as f64 / 100.0)
        .ok_or_else(|| {
            DecodeError::new(
                offset,
                field,
                format!("'{}' is not base-62", String::from_utf8_lossy(encoded)),
            )
        })
}

/// Inverse of [`decode`], padded with leading zeros to `width`.
pub fn encode(mut value: u64, width: usize) -> String {
    let mut out = Vec::new();
    while value > 0 {
        out.push(ALPHABET[(value % 62) as usize]);
        value /= 62;
    }
    while out.len() < width {
        out.push(b'0');
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
