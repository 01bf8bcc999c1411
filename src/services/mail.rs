//! Mail host snapshot built from a raw RFC 5322 message.

use std::path::Path;

use mail_parser::{MessageParser, MimeHeaders};
use serde::{Deserialize, Serialize};

use crate::error::MailError;
use crate::folders::model::Attachment;

/// Everything the panel reads from the open message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailItem {
    pub subject: String,
    pub sender_name: String,
    pub sender_email: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl MailItem {
    /// Parse a raw message.
    pub fn parse(raw: &[u8]) -> Result<Self, MailError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or(MailError::Unparseable)?;

        let sender = parsed.from().and_then(|addr| addr.first());
        let attachments = parsed
            .attachments()
            .enumerate()
            .map(|(idx, part)| Attachment {
                id: format!("att-{idx}"),
                name: MimeHeaders::attachment_name(part)
                    .unwrap_or("attachment")
                    .to_string(),
                size: part.contents().len() as u64,
            })
            .collect();

        Ok(Self {
            subject: parsed.subject().unwrap_or_default().to_string(),
            sender_name: sender
                .and_then(|a| a.name())
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            sender_email: sender
                .and_then(|a| a.address())
                .map(|s| s.to_string())
                .unwrap_or_default(),
            body: extract_body(&parsed),
            attachments,
        })
    }

    /// Read and parse a message file.
    pub fn from_file(path: &Path) -> Result<Self, MailError> {
        let raw = std::fs::read(path)?;
        Self::parse(&raw)
    }
}

/// Text body. mail-parser renders HTML-only messages to text itself.
fn extract_body(parsed: &mail_parser::Message) -> String {
    parsed
        .body_text(0)
        .map(|text| text.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = concat!(
        "From: John Smith <john@example.com>\r\n",
        "To: desk@acme.com\r\n",
        "Subject: Offer 2024-117\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"XX\"\r\n",
        "\r\n",
        "--XX\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "Hi,\r\n\r\nJohn Smith\r\n+31 6 1234 5678\r\n",
        "--XX\r\n",
        "Content-Type: application/pdf\r\n",
        "Content-Disposition: attachment; filename=\"offer.pdf\"\r\n",
        "\r\n",
        "PDFDATA\r\n",
        "--XX\r\n",
        "Content-Type: image/png\r\n",
        "Content-Disposition: attachment; filename=\"image001.png\"\r\n",
        "\r\n",
        "PNG\r\n",
        "--XX--\r\n",
    );

    #[test]
    fn parses_headers_body_and_attachments() {
        let item = MailItem::parse(RAW.as_bytes()).unwrap();
        assert_eq!(item.subject, "Offer 2024-117");
        assert_eq!(item.sender_name, "John Smith");
        assert_eq!(item.sender_email, "john@example.com");
        assert!(item.body.contains("+31 6 1234 5678"));

        let names: Vec<&str> = item.attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["offer.pdf", "image001.png"]);
        assert_eq!(item.attachments[0].id, "att-0");
    }

    #[test]
    fn html_only_message_yields_text_lines() {
        let raw = concat!(
            "From: Jane Doe <jane@acme.com>\r\n",
            "Subject: Hello\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<html><body><p>Hello&nbsp;there</p>",
            "<p>Jane Doe<br>+31 20 123 4567</p></body></html>\r\n",
        );
        let item = MailItem::parse(raw.as_bytes()).unwrap();

        assert!(!item.body.contains('<'), "tags are stripped: {:?}", item.body);
        let lines: Vec<&str> = item.body.lines().map(str::trim).collect();
        assert!(lines.contains(&"Jane Doe"), "{lines:?}");
        assert!(lines.contains(&"+31 20 123 4567"), "{lines:?}");
    }

    #[test]
    fn missing_sender_yields_empty_fields() {
        let item = MailItem::parse(b"Subject: hi\r\n\r\nbody\r\n").unwrap();
        assert_eq!(item.sender_email, "");
        assert_eq!(item.sender_name, "");
        assert!(item.attachments.is_empty());
    }
}
