//! Text-comment codec for inbound transfers.
//!
//! A plain-text comment is a message body starting with a 32-bit zero
//! opcode followed by byte-aligned UTF-8. Anything else (binary payloads,
//! truncated bodies, non-zero opcodes) yields no comment.

/// Extracts the trimmed text comment from a message body, if any.
pub fn extract_comment(body: &[u8]) -> Option<String> {
    if body.len() < 4 {
        return None;
    }
    let opcode = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
    if opcode != 0 {
        return None;
    }
    let text = std::str::from_utf8(&body[4..]).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Builds the wire form of a text comment (zero opcode + UTF-8).
pub fn encode_comment(text: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + text.len());
    body.extend_from_slice(&0u32.to_be_bytes());
    body.extend_from_slice(text.as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let memo = "deal:a9bb2b0f-8e63-4f6a-9d35-0a6f61e95c3e";
        assert_eq!(extract_comment(&encode_comment(memo)), Some(memo.to_string()));
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(
            extract_comment(&encode_comment("  deal:1 \n")),
            Some("deal:1".to_string())
        );
    }

    #[test]
    fn rejects_non_zero_opcode() {
        let mut body = encode_comment("deal:1");
        body[3] = 0x05;
        assert_eq!(extract_comment(&body), None);
    }

    #[test]
    fn rejects_short_and_empty_bodies() {
        assert_eq!(extract_comment(&[]), None);
        assert_eq!(extract_comment(&[0, 0, 0]), None);
        assert_eq!(extract_comment(&encode_comment("")), None);
        assert_eq!(extract_comment(&encode_comment("   ")), None);
    }

    #[test]
    fn rejects_invalid_utf8() {
        let mut body = encode_comment("x");
        body.push(0xFF);
        body.push(0xFE);
        assert_eq!(extract_comment(&body), None);
    }
}
