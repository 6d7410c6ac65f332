// Captured output helpers

/// Length of the longest prefix of `bytes` that does not end inside a
/// multi-byte UTF-8 sequence.
///
/// Destructive partial reads hand out only this prefix; the incomplete tail
/// stays buffered until the rest of the character arrives. Invalid bytes are
/// not held back (lossy decoding replaces them).
pub fn complete_utf8_len(bytes: &[u8]) -> usize {
    let len = bytes.len();

    for back in 1..=len.min(3) {
        let byte = bytes[len - back];

        // Continuation byte: keep looking for the lead byte
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }

        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };

        return if width > back { len - back } else { len };
    }

    len
}

/// Decode bytes for callers, replacing invalid sequences
pub fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
