//! Message normalization: header decoding plus plain-text body extraction.
//!
//! This is the single path every backend uses to turn raw RFC 5322 bytes
//! into a [`Message`].

use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};

use crate::error::{MailError, Result};
use crate::model::message::Message;
use crate::parser::header;

/// Maximum depth for recursive multipart descent (to prevent stack
/// overflow on adversarial input).
const MAX_DEPTH: usize = 10;

/// Normalize one raw message (optionally still carrying its mbox `From `
/// separator line).
///
/// A message with no content past the separator yields a record whose
/// fields are all empty.
pub fn normalize(raw: &[u8]) -> Result<Message> {
    let message_bytes = skip_from_line(raw);
    if message_bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Message::default());
    }

    let header_end = find_header_end(message_bytes).unwrap_or(message_bytes.len());
    let headers = header::parse_header_block(&message_bytes[..header_end]);

    let parsed = MessageParser::default()
        .parse(message_bytes)
        .ok_or_else(|| MailError::Parse("message could not be parsed as RFC 5322".into()))?;
    let (body, _) = extract_plain_body(&parsed);

    Ok(Message {
        subject: headers.decoded("subject"),
        from: headers.decoded("from"),
        to: headers.decoded("to"),
        date: headers.raw("date"),
        message_id: headers.raw("message-id"),
        body,
    })
}

/// Return the first `text/plain` part, walking the MIME tree depth-first.
///
/// The flag is `false` (and the text empty) when the message has no plain
/// text part at all, e.g. an HTML-only newsletter.
pub fn extract_plain_body(message: &mail_parser::Message<'_>) -> (String, bool) {
    match find_plain_part(message, 0, 0) {
        Some(text) => (text, true),
        None => (String::new(), false),
    }
}

fn find_plain_part(message: &mail_parser::Message<'_>, part_id: usize, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }
    let part = message.parts.get(part_id)?;
    match &part.body {
        PartType::Multipart(children) => children
            .iter()
            .find_map(|&child| find_plain_part(message, child, depth + 1)),
        PartType::Text(text) if is_plain_text(part) => Some(text.to_string()),
        _ => None,
    }
}

/// A part without a `Content-Type` header defaults to `text/plain`.
fn is_plain_text(part: &MessagePart<'_>) -> bool {
    match part.content_type() {
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct
                    .subtype()
                    .map_or(true, |sub| sub.eq_ignore_ascii_case("plain"))
        }
        None => true,
    }
}

/// Skip the `From ` separator line at the start of mbox messages.
pub(crate) fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
        return &[];
    }
    data
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    if data.starts_with(b"\n") || data.starts_with(b"\r\n") {
        return Some(0);
    }
    (0..data.len()).find(|&i| data[i..].starts_with(b"\n\n") || data[i..].starts_with(b"\r\n\r\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> (String, bool) {
        let msg = MessageParser::default().parse(raw.as_bytes()).unwrap();
        extract_plain_body(&msg)
    }

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
    }

    #[test]
    fn test_skip_from_line_no_from() {
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"From: a@b.com\nSubject: Hi\n\nBody\n"), Some(25));
        assert_eq!(
            find_header_end(b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n"),
            Some(26)
        );
        assert_eq!(find_header_end(b"Subject: no body"), None);
    }

    #[test]
    fn test_single_part_plain() {
        let (body, found) = parse("Subject: Hi\r\n\r\nJust text.\r\n");
        assert!(found);
        assert_eq!(body.trim(), "Just text.");
    }

    #[test]
    fn test_multipart_prefers_plain_over_html() {
        let raw = concat!(
            "Subject: Mixed\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
            "\r\n",
            "--b1\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>HTML version</p>\r\n",
            "--b1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Plain version\r\n",
            "--b1--\r\n",
        );
        let (body, found) = parse(raw);
        assert!(found);
        assert_eq!(body.trim(), "Plain version");
    }

    #[test]
    fn test_nested_multipart_is_walked_depth_first() {
        let raw = concat!(
            "Subject: Nested\r\n",
            "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=\"inner\"\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<b>hi</b>\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "inner plain\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "outer plain\r\n",
            "--outer--\r\n",
        );
        let (body, _) = parse(raw);
        assert_eq!(body.trim(), "inner plain");
    }

    #[test]
    fn test_html_only_yields_empty_body() {
        let raw = "Subject: News\r\nContent-Type: text/html\r\n\r\n<h1>Sale</h1>\r\n";
        let (body, found) = parse(raw);
        assert!(!found);
        assert!(body.is_empty());
    }

    #[test]
    fn test_quoted_printable_latin1_body_is_decoded() {
        let raw = concat!(
            "Subject: QP\r\n",
            "Content-Type: text/plain; charset=iso-8859-1\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "Caf=E9 cr=E8me\r\n",
        );
        let (body, _) = parse(raw);
        assert_eq!(body.trim(), "Café crème");
    }

    #[test]
    fn test_normalize_fills_missing_headers_with_empty_strings() {
        let msg = normalize(b"Subject: Only subject\n\nBody text\n").unwrap();
        assert_eq!(msg.subject, "Only subject");
        assert_eq!(msg.from, "");
        assert_eq!(msg.to, "");
        assert_eq!(msg.date, "");
        assert_eq!(msg.message_id, "");
        assert_eq!(msg.body.trim(), "Body text");
    }

    #[test]
    fn test_normalize_decodes_headers_and_keeps_raw_date() {
        let raw = concat!(
            "From sender@example.com Thu Jan 04 10:00:00 2024\n",
            "From: =?UTF-8?B?Sm9zw6k=?= <jose@example.com>\n",
            "To: you@example.com\n",
            "Subject: =?UTF-8?Q?Caf=C3=A9?=\n",
            "Date: Thu, 04 Jan 2024 10:00:00 +0000\n",
            "Message-ID: <abc@example.com>\n",
            "\n",
            "Hola\n",
        );
        let msg = normalize(raw.as_bytes()).unwrap();
        assert_eq!(msg.from, "José <jose@example.com>");
        assert_eq!(msg.subject, "Café");
        assert_eq!(msg.date, "Thu, 04 Jan 2024 10:00:00 +0000");
        assert_eq!(msg.message_id, "<abc@example.com>");
        assert_eq!(msg.body.trim(), "Hola");
    }

    #[test]
    fn test_normalize_empty_input_is_blank_record() {
        assert_eq!(normalize(b"").unwrap(), Message::default());
        assert_eq!(
            normalize(b"From someone Thu Jan 04 10:00:00 2024\n\n").unwrap(),
            Message::default()
        );
    }
}
