//! Helpers for the adapter's free-form hex text
//!
//! With spaces disabled an answer line looks like `410C1AF8`, possibly
//! preceded by bus headers and followed by more lines. Nothing here fails:
//! anything that cannot be read is `None`.

/// Strip whitespace and upper-case one line
pub(crate) fn compact(line: &str) -> String {
    line.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Response split into compacted, non-empty lines
pub(crate) fn compact_lines(response: &str) -> impl Iterator<Item = String> + '_ {
    response
        .split(['\r', '\n'])
        .map(compact)
        .filter(|line| !line.is_empty())
}

/// Parse a run of hex digit pairs
pub(crate) fn parse_hex_pairs(digits: &str) -> Option<Vec<u8>> {
    if digits.len() % 2 != 0 || !digits.is_ascii() {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}

/// `count` data bytes following the first occurrence of `marker`
pub(crate) fn bytes_after_marker(response: &str, marker: &str, count: usize) -> Option<Vec<u8>> {
    compact_lines(response).find_map(|line| {
        let start = line.find(marker)? + marker.len();
        let digits = line.get(start..start + count * 2)?;
        parse_hex_pairs(digits)
    })
}

/// Whether `line` opens with an 11-bit ECU response id (`7E8`..`7EF`)
fn has_can11_id(line: &str) -> bool {
    line.get(..3).is_some_and(|id| {
        id.starts_with("7E") && matches!(id.as_bytes()[2], b'8'..=b'9' | b'A'..=b'F')
    })
}

/// Data after `marker` on one compacted frame, bus header removed
///
/// With headers on a frame may open with an 11-bit CAN id and length byte
/// (`7E806`), a 29-bit CAN id and length byte (`18DAF11006`), or a
/// priority/target/source header (`486B10`) whose frame ends in a checksum
/// byte. Anything else yields `None`.
fn frame_data<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    if let Some(data) = line.strip_prefix(marker) {
        return Some(data);
    }

    if has_can11_id(line) {
        if let Some(data) = line.get(5..).and_then(|rest| rest.strip_prefix(marker)) {
            return Some(data);
        }
    }

    if line.starts_with("18DAF1") {
        if let Some(data) = line.get(10..).and_then(|rest| rest.strip_prefix(marker)) {
            return Some(data);
        }
    }

    let header = line.get(..6)?;
    if !header.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let data = line.get(6..)?.strip_prefix(marker)?;
    data.get(..data.len().checked_sub(2)?)
}

/// Data following `marker` on every frame of a response, in order
///
/// Bus headers and checksums are removed. Lines that do not carry the
/// marker are skipped.
pub fn frame_payloads(response: &str, marker: &str) -> Vec<String> {
    compact_lines(response)
        .filter_map(|line| frame_data(&line, marker).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_payloads_header_shapes() {
        assert_eq!(frame_payloads("43 01 33 00 00", "43"), ["01330000"]);
        assert_eq!(frame_payloads("7E8 06 43 01 33 00 00\r", "43"), ["01330000"]);
        assert_eq!(frame_payloads("18DAF110 06 43 01 33 00 00\r", "43"), ["01330000"]);
        // checksum byte 45 dropped
        assert_eq!(frame_payloads("48 6B 10 43 01 33 00 00 00 00 45\r", "43"), ["013300000000"]);
    }

    #[test]
    fn test_frame_payloads_skip_noise() {
        let noisy = String::from_utf8_lossy(b"7E8\xFF430301\r7E806430133\r").into_owned();
        assert_eq!(frame_payloads(&noisy, "43"), ["0133"]);
        assert!(frame_payloads("SEARCHING...\rNO DATA\r", "43").is_empty());
        assert!(frame_payloads("\u{FFFD}\u{FFFD}430301", "43").is_empty());
    }

    #[test]
    fn test_bytes_after_marker_tolerates_spacing_and_headers() {
        assert_eq!(
            bytes_after_marker("41 0C 1A F8\r\r", "410C", 2),
            Some(vec![0x1A, 0xF8])
        );
        assert_eq!(
            bytes_after_marker("7E804410C1AF8", "410C", 2),
            Some(vec![0x1A, 0xF8])
        );
    }

    #[test]
    fn test_bytes_after_marker_misses() {
        assert_eq!(bytes_after_marker("NO DATA", "410C", 2), None);
        assert_eq!(bytes_after_marker("410C1A", "410C", 2), None);
        assert_eq!(bytes_after_marker("410CZZF8", "410C", 2), None);
        assert_eq!(bytes_after_marker("", "410C", 1), None);
    }

    #[test]
    fn test_marker_on_later_line() {
        let raw = "SEARCHING...\r410D37\r";
        assert_eq!(bytes_after_marker(raw, "410D", 1), Some(vec![0x37]));
    }
}
