//! Mail source abstraction.
//!
//! The classifier only needs three things from an email: whether it is
//! multipart, the content type of each part, and a part's decoded bytes.
//! `MailMessage` captures exactly that; `ParsedEmail` adapts `mail-parser`.

pub mod imap;

use mail_parser::{MessageParser, MimeHeaders, PartType};
use uuid::Uuid;

pub use imap::ImapMailbox;

/// Which payload to read from a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartRef {
    /// The body of a single-part message.
    Whole,
    /// The n-th leaf part, indexed like `content_types()`.
    Part(usize),
}

/// Read-only view of one email.
pub trait MailMessage: Send + Sync {
    fn is_multipart(&self) -> bool;

    /// Content type of every leaf part, in walk order, lowercased.
    fn content_types(&self) -> Vec<&str>;

    /// Transfer-decoded bytes of a part, or of the whole single-part body.
    fn payload(&self, part: PartRef) -> Option<&[u8]>;
}

/// The HTML body of a message: the first `text/html` part of a multipart
/// message, otherwise the whole single-part body. Empty when absent.
pub fn html_body<M: MailMessage + ?Sized>(message: &M) -> String {
    let payload = if message.is_multipart() {
        message
            .content_types()
            .iter()
            .position(|ct| *ct == "text/html")
            .and_then(|index| message.payload(PartRef::Part(index)))
    } else {
        message.payload(PartRef::Whole)
    };

    payload
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}

// ── mail-parser adapter ─────────────────────────────────────────────

#[derive(Debug, Clone)]
struct EmailPart {
    content_type: String,
    payload: Vec<u8>,
}

/// An owned, parsed email.
#[derive(Debug, Clone)]
pub struct ParsedEmail {
    /// `Message-ID` header, or a generated `gen-<uuid>` when absent.
    pub message_id: String,
    pub subject: String,
    multipart: bool,
    parts: Vec<EmailPart>,
    body: Vec<u8>,
}

impl ParsedEmail {
    /// Parse raw RFC 822 bytes. Returns `None` if the bytes are not an email.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let message = MessageParser::default().parse(raw)?;

        let multipart = matches!(
            message.parts.first().map(|p| &p.body),
            Some(PartType::Multipart(_))
        );

        let parts: Vec<EmailPart> = message
            .parts
            .iter()
            .filter(|p| !matches!(p.body, PartType::Multipart(_)))
            .map(|p| EmailPart {
                content_type: part_content_type(p),
                payload: p.contents().to_vec(),
            })
            .collect();

        let body = if multipart {
            Vec::new()
        } else {
            parts.first().map(|p| p.payload.clone()).unwrap_or_default()
        };

        Some(Self {
            message_id: message
                .message_id()
                .map(str::to_string)
                .unwrap_or_else(generated_id),
            subject: message.subject().unwrap_or_default().to_string(),
            multipart,
            parts,
            body,
        })
    }

    /// A multipart message built from `(content_type, payload)` pairs.
    pub fn multipart<I, C, P>(subject: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = (C, P)>,
        C: Into<String>,
        P: Into<Vec<u8>>,
    {
        Self {
            message_id: generated_id(),
            subject: subject.into(),
            multipart: true,
            parts: parts
                .into_iter()
                .map(|(ct, payload)| EmailPart {
                    content_type: ct.into().to_ascii_lowercase(),
                    payload: payload.into(),
                })
                .collect(),
            body: Vec::new(),
        }
    }

    /// A single-part message.
    pub fn single_part(
        subject: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        let body = body.into();
        Self {
            message_id: generated_id(),
            subject: subject.into(),
            multipart: false,
            parts: vec![EmailPart {
                content_type: content_type.into().to_ascii_lowercase(),
                payload: body.clone(),
            }],
            body,
        }
    }
}

impl MailMessage for ParsedEmail {
    fn is_multipart(&self) -> bool {
        self.multipart
    }

    fn content_types(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.content_type.as_str()).collect()
    }

    fn payload(&self, part: PartRef) -> Option<&[u8]> {
        match part {
            PartRef::Whole if !self.multipart => Some(&self.body),
            PartRef::Whole => None,
            PartRef::Part(index) => self.parts.get(index).map(|p| p.payload.as_slice()),
        }
    }
}

fn generated_id() -> String {
    format!("gen-{}", Uuid::new_v4())
}

fn part_content_type(part: &mail_parser::MessagePart<'_>) -> String {
    match MimeHeaders::content_type(part) {
        Some(ct) => match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub).to_ascii_lowercase(),
            None => ct.ctype().to_ascii_lowercase(),
        },
        None => "text/plain".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART_RAW: &str = "From: Google Scholar Alerts <scholaralerts-noreply@google.com>\r\n\
To: me@example.com\r\n\
Subject: New results for LLM serving\r\n\
Message-ID: <alert-1@google.com>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=UTF-8\r\n\
\r\n\
Plain fallback\r\n\
--XYZ\r\n\
Content-Type: text/html; charset=UTF-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
<h3><a href=3D\"https://x.org\">Title</a></h3>\r\n\
--XYZ--\r\n";

    const SINGLE_RAW: &str = "From: alerts@example.com\r\n\
Subject: Single\r\n\
Content-Type: text/html; charset=UTF-8\r\n\
\r\n\
<div>Only part</div>\r\n";

    #[test]
    fn parse_multipart_prefers_html_part() {
        let email = ParsedEmail::parse(MULTIPART_RAW.as_bytes()).unwrap();
        assert!(email.is_multipart());
        assert_eq!(email.subject, "New results for LLM serving");
        assert_eq!(email.message_id, "alert-1@google.com");
        assert_eq!(email.content_types(), vec!["text/plain", "text/html"]);

        let html = html_body(&email);
        assert!(html.contains(r#"<a href="https://x.org">Title</a>"#));
        assert!(!html.contains("Plain fallback"));
    }

    #[test]
    fn parse_single_part_uses_whole_body() {
        let email = ParsedEmail::parse(SINGLE_RAW.as_bytes()).unwrap();
        assert!(!email.is_multipart());
        assert!(email.message_id.starts_with("gen-"));
        assert!(html_body(&email).contains("<div>Only part</div>"));
    }

    #[test]
    fn multipart_without_html_is_empty() {
        let email = ParsedEmail::multipart("s", [("text/plain", "hello")]);
        assert_eq!(html_body(&email), "");
    }

    #[test]
    fn multipart_whole_payload_is_none() {
        let email = ParsedEmail::multipart("s", [("text/html", "<p>x</p>")]);
        assert!(email.payload(PartRef::Whole).is_none());
        assert_eq!(email.payload(PartRef::Part(0)), Some(&b"<p>x</p>"[..]));
        assert!(email.payload(PartRef::Part(5)).is_none());
    }

    #[test]
    fn content_types_are_lowercased() {
        let email = ParsedEmail::multipart("s", [("Text/HTML", "<p>x</p>")]);
        assert_eq!(email.content_types(), vec!["text/html"]);
        assert_eq!(html_body(&email), "<p>x</p>");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let email = ParsedEmail::single_part("s", "text/html", vec![b'<', b'p', 0xff, b'>']);
        assert_eq!(html_body(&email), "<p\u{fffd}>");
    }
}
