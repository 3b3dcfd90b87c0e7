//! RFC 5322 header handling: unfolding, lookup, and RFC 2047 encoded-word
//! decoding. Also decodes IMAP modified UTF-7 mailbox names.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use tracing::warn;

/// Encoded words and mailbox names are often emitted without padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const MUTF7_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::IMAP_MUTF7,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Unfolded header fields of one message, in source order.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// First value for `name` (case-insensitive), if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value for `name` with encoded words decoded; `""` if absent.
    pub fn decoded(&self, name: &str) -> String {
        self.get(name).map(decode_header).unwrap_or_default()
    }

    /// First value for `name` verbatim; `""` if absent.
    pub fn raw(&self, name: &str) -> String {
        self.get(name).unwrap_or_default().to_string()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parse a raw header block (everything before the first blank line).
pub fn parse_header_block(raw: &[u8]) -> Headers {
    Headers {
        fields: unfold_headers(&bytes_to_text(raw)),
    }
}

/// Decode a header given as raw bytes.
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub fn decode_header_bytes(raw: &[u8]) -> String {
    decode_header(&bytes_to_text(raw))
}

fn bytes_to_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Join continuation lines (starting with space or tab) onto the previous
/// header. Returns `(lowercase_name, value)` pairs.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                if !last.1.is_empty() {
                    last.1.push(' ');
                }
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
    }

    result
}

/// A run of header text, before charset decoding.
#[derive(Debug)]
enum Segment {
    Plain(String),
    Encoded { charset: String, bytes: Vec<u8> },
}

/// Decode RFC 2047 encoded words in a header value.
///
/// Adjacent encoded words in the same charset are merged before decoding
/// (so a multi-byte character split across two words survives). The
/// decoded runs are then joined with a single space:
///
/// `"=?UTF-8?B?SG9sYQ==?= =?ISO-8859-1?Q?caf=E9?="` → `"Hola café"`
///
/// A value with no encoded words is returned unchanged. Malformed encoded
/// words are kept as literal text.
pub fn decode_header(input: &str) -> String {
    if !input.contains("=?") {
        return input.to_string();
    }

    let segments = split_segments(input);
    if !segments
        .iter()
        .any(|s| matches!(s, Segment::Encoded { .. }))
    {
        return input.to_string();
    }

    segments
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Plain(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Segment::Encoded { charset, bytes } => Some(decode_charset(&charset, &bytes)),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_segments(input: &str) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut plain = String::new();
    let mut remaining = input;

    while let Some(start) = remaining.find("=?") {
        plain.push_str(&remaining[..start]);
        let after_start = &remaining[start + 2..];

        match try_decode_one_word(after_start) {
            Some(word) => {
                // Whitespace between two encoded words is not part of the text (RFC 2047 §6.2)
                let gap_is_blank = plain.trim().is_empty();
                let joins_previous = gap_is_blank
                    && matches!(
                        segments.last(),
                        Some(Segment::Encoded { charset, .. }) if charset.eq_ignore_ascii_case(&word.charset)
                    );

                if joins_previous {
                    plain.clear();
                    if let Some(Segment::Encoded { bytes, .. }) = segments.last_mut() {
                        bytes.extend_from_slice(&word.bytes);
                    }
                } else {
                    let follows_encoded =
                        matches!(segments.last(), Some(Segment::Encoded { .. }));
                    if !(gap_is_blank && follows_encoded) && !plain.is_empty() {
                        segments.push(Segment::Plain(std::mem::take(&mut plain)));
                    }
                    plain.clear();
                    segments.push(Segment::Encoded {
                        charset: word.charset,
                        bytes: word.bytes,
                    });
                }
                remaining = &after_start[word.consumed..];
            }
            None => {
                plain.push_str("=?");
                remaining = after_start;
            }
        }
    }

    plain.push_str(remaining);
    if !plain.is_empty() {
        segments.push(Segment::Plain(plain));
    }
    segments
}

struct EncodedWord {
    charset: String,
    bytes: Vec<u8>,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<EncodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];
    if encoded_text.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => LENIENT_BASE64.decode(encoded_text).ok()?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    // RFC 2231 language suffix: "utf-8*en"
    let charset = charset.split('*').next().unwrap_or(charset).to_string();

    Some(EncodedWord {
        charset,
        bytes,
        consumed: first_q + 1 + second_q + 1 + end + 2,
    })
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match hex_pair(bytes[i + 1], bytes[i + 2]) {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Decode bytes using a named charset, falling back to lossy UTF-8.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    if charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8") {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    match encoding_rs::Encoding::for_label(charset.as_bytes()) {
        Some(encoding) => {
            let (decoded, _, _) = encoding.decode(bytes);
            decoded.into_owned()
        }
        None => {
            warn!(charset = charset, "Unknown charset, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Decode an IMAP mailbox name from modified UTF-7 (RFC 3501 §5.1.3).
///
/// `"Entw&APw-rfe"` → `"Entwürfe"`, `"R&AOk-sum&AOk-"` → `"Résumé"`.
/// Malformed shifted sections are kept verbatim.
pub fn decode_mailbox_name(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut remaining = raw;

    while let Some(amp) = remaining.find('&') {
        result.push_str(&remaining[..amp]);
        let after = &remaining[amp + 1..];
        let Some(dash) = after.find('-') else {
            result.push_str(&remaining[amp..]);
            return result;
        };

        let shifted = &after[..dash];
        if shifted.is_empty() {
            result.push('&');
        } else {
            match decode_utf16_base64(shifted) {
                Some(text) => result.push_str(&text),
                None => {
                    result.push('&');
                    result.push_str(shifted);
                    result.push('-');
                }
            }
        }
        remaining = &after[dash + 1..];
    }

    result.push_str(remaining);
    result
}

fn decode_utf16_base64(shifted: &str) -> Option<String> {
    let bytes = MUTF7_BASE64.decode(shifted).ok()?;
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ascii_is_unchanged() {
        for input in ["Normal subject", "  padded  ", "a=b ?c", "Price =? maybe", ""] {
            assert_eq!(decode_header(input), input);
        }
    }

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_header("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_unpadded_base64() {
        assert_eq!(decode_header("=?UTF-8?B?SG9sYQ?="), "Hola");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_header("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_same_charset_words_merge() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_header(input), "Hola mundo");
    }

    #[test]
    fn test_split_multibyte_character_across_words() {
        // "é" is C3 A9 in UTF-8; each half sits in its own encoded word.
        let input = "=?UTF-8?Q?caf=C3?= =?UTF-8?Q?=A9?=";
        assert_eq!(decode_header(input), "café");
    }

    #[test]
    fn test_different_charsets_join_with_single_space() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?ISO-8859-1?Q?caf=E9?=";
        assert_eq!(decode_header(input), "Hola café");
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        let input = "Re: =?UTF-8?B?SG9sYQ==?= there";
        assert_eq!(decode_header(input), "Re: Hola there");
    }

    #[test]
    fn test_decode_encoded_display_name_with_address() {
        let input = "=?ISO-8859-1?Q?Fran=E7ois?= <francois@example.fr>";
        assert_eq!(decode_header(input), "François <francois@example.fr>");
    }

    #[test]
    fn test_unknown_charset_falls_back_to_utf8() {
        assert_eq!(decode_header("=?x-klingon?Q?Qapla'?="), "Qapla'");
    }

    #[test]
    fn test_unknown_encoding_kept_verbatim() {
        let input = "=?UTF-8?X?abc?=";
        assert_eq!(decode_header(input), input);
    }

    #[test]
    fn test_decode_windows1252_encoded_word() {
        assert_eq!(decode_header("=?Windows-1252?Q?M=FCller?="), "Müller");
    }

    #[test]
    fn test_decode_utf8_base64_japanese() {
        assert_eq!(decode_header("=?UTF-8?B?5bGx55Sw5aSq6YOO?="), "山田太郎");
    }

    #[test]
    fn test_decode_header_bytes_replaces_invalid_utf8() {
        let raw = b"Caf\xE9 menu";
        assert_eq!(decode_header_bytes(raw), "Caf\u{FFFD} menu");
    }

    #[test]
    fn test_unfold_and_lookup() {
        let block = b"Subject: This is a long\r\n\tsubject line\r\nFROM: user@example.com\r\nSubject: second\r\n";
        let headers = parse_header_block(block);
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("subject"), Some("This is a long subject line"));
        assert_eq!(headers.raw("From"), "user@example.com");
        assert_eq!(headers.decoded("cc"), "");
    }

    #[test]
    fn test_decode_mailbox_name() {
        assert_eq!(decode_mailbox_name("INBOX"), "INBOX");
        assert_eq!(decode_mailbox_name("Entw&APw-rfe"), "Entwürfe");
        assert_eq!(decode_mailbox_name("Tom &- Jerry"), "Tom & Jerry");
        assert_eq!(decode_mailbox_name("&ZeVnLIqe-"), "日本語");
        assert_eq!(decode_mailbox_name("broken&"), "broken&");
    }
}
