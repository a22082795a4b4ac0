//! Content extraction from raw message bodies.
//!
//! A received message is reduced to a header view and a map from media type
//! to decoded text. Extraction never fails: anything `mailparse` cannot make
//! sense of is delivered as `text/plain`, and the verbatim input is always
//! available under the raw (`multipart`) kind.

use ahash::AHashMap;
use mailparse::{MailHeaderMap, ParsedMail};

use crate::{internal, rule::ContentKind};

const PLAIN: &str = "text/plain";
const HTML: &str = "text/html";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    /// Header fields keyed by lowercased name, first occurrence wins
    headers: AHashMap<String, String>,
    /// Decoded bodies keyed by media type
    parts: AHashMap<String, String>,
}

impl Content {
    /// Extract every usable representation of `raw`.
    #[must_use]
    pub fn extract(raw: &[u8]) -> Self {
        let mut content = Self::default();

        if !has_header_block(raw) {
            internal!(level = DEBUG, "Message has no header block, treating it as plain text");
        } else {
            match mailparse::parse_mail(raw) {
                Ok(parsed) => {
                    content.collect_headers(&parsed);
                    content.collect_parts(&parsed);
                }
                Err(err) => {
                    internal!(
                        level = DEBUG,
                        "Unable to parse message ({err}), treating it as plain text"
                    );
                }
            }
        }

        if !content.parts.contains_key(PLAIN) {
            content
                .parts
                .insert(PLAIN.to_string(), String::from_utf8_lossy(raw).into_owned());
        }

        content.parts.insert(
            ContentKind::Raw.as_str().to_string(),
            String::from_utf8_lossy(raw).into_owned(),
        );

        content
    }

    fn collect_headers(&mut self, parsed: &ParsedMail<'_>) {
        for header in &parsed.headers {
            self.headers
                .entry(header.get_key().to_ascii_lowercase())
                .or_insert_with(|| header.get_value());
        }
    }

    fn collect_parts(&mut self, parsed: &ParsedMail<'_>) {
        let declared = parsed.headers.get_first_value("Content-Type");
        let mimetype = parsed.ctype.mimetype.to_ascii_lowercase();

        if declared.is_some() && !mimetype.contains('/') {
            internal!(
                level = DEBUG,
                "Unusable Content-Type {declared:?}, treating body as plain text"
            );
            self.parts.insert(PLAIN.to_string(), decoded_body(parsed));
            return;
        }

        if mimetype.starts_with("multipart/") {
            self.collect_subparts(parsed);

            if !self.parts.contains_key(PLAIN) {
                self.parts.insert(PLAIN.to_string(), decoded_body(parsed));
            }
        } else {
            if mimetype != PLAIN {
                // Keep a plain rendition available for text rules
                self.parts.insert(PLAIN.to_string(), decoded_body(parsed));
            }
            self.parts.insert(mimetype, decoded_body(parsed));
        }
    }

    fn collect_subparts(&mut self, parsed: &ParsedMail<'_>) {
        for part in &parsed.subparts {
            let mimetype = part.ctype.mimetype.to_ascii_lowercase();

            if mimetype.starts_with("multipart/") {
                self.collect_subparts(part);
            } else if mimetype.starts_with(PLAIN) {
                self.parts.insert(PLAIN.to_string(), decoded_body(part));
            } else if mimetype.starts_with(HTML) {
                self.parts.insert(HTML.to_string(), decoded_body(part));
            }
        }
    }

    /// Decoded text for the given kind, if the message had that representation
    #[must_use]
    pub fn get(&self, kind: ContentKind) -> Option<&str> {
        self.get_media(kind.as_str())
    }

    /// Decoded text for an arbitrary media type
    #[must_use]
    pub fn get_media(&self, media: &str) -> Option<&str> {
        self.parts
            .get(&media.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// First value of the named header, case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `Subject` header, or an empty string
    #[must_use]
    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or_default()
    }

}

/// Whether `raw` starts with a header section closed by a blank line.
///
/// `mailparse` accepts a line without a colon as a header with an empty value,
/// and accepts headers running to the end of input, either of which would
/// swallow a bare body, so the header section is checked first.
fn has_header_block(raw: &[u8]) -> bool {
    let mut seen = false;

    for line in raw.split_inclusive(|&b| b == b'\n') {
        // An unterminated last line means the header section never closed
        let Some(line) = line.strip_suffix(b"\n") else {
            return false;
        };
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        match line.first() {
            None => return seen,
            Some(b' ' | b'\t') if seen => {}
            Some(_) => match line.iter().position(|&b| b == b':') {
                Some(ix) if ix > 0 && line[..ix].iter().all(u8::is_ascii_graphic) => seen = true,
                _ => return false,
            },
        }
    }

    false
}

fn decoded_body(part: &ParsedMail<'_>) -> String {
    part.get_body().unwrap_or_else(|err| {
        internal!(level = DEBUG, "Unable to decode body ({err}), using raw bytes");
        String::from_utf8_lossy(part.get_body_raw().unwrap_or_default().as_slice()).into_owned()
    })
}
