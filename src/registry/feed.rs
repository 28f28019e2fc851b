//! Parser for the extension repository's `extensions.xml`.
//!
//! ```xml
//! <extensions>
//!   <extension extensionkey="news">
//!     <version version="1.0.0">
//!       <reviewstate>-1</reviewstate>
//!       ...
//!     </version>
//!   </extension>
//! </extensions>
//! ```
//!
//! The repository publishes the file gzip-compressed; [`parse_feed`] accepts
//! either form.

use crate::error::{AuditError, Result};
use flate2::read::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::Read;
use tracing::debug;

/// Review state the repository assigns to versions with a known
/// vulnerability.
pub const INSECURE_REVIEW_STATE: i32 = -1;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedVersion {
    pub version: String,
    pub review_state: i32,
}

impl FeedVersion {
    pub fn new(version: impl Into<String>, review_state: i32) -> Self {
        Self {
            version: version.into(),
            review_state,
        }
    }

    pub fn is_insecure(&self) -> bool {
        self.review_state == INSECURE_REVIEW_STATE
    }
}

/// One extension record; `versions` keeps document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedExtension {
    pub key: String,
    pub versions: Vec<FeedVersion>,
}

impl FeedExtension {
    pub fn new(key: impl Into<String>, versions: Vec<FeedVersion>) -> Self {
        Self {
            key: key.into(),
            versions,
        }
    }
}

/// Inflates the payload if it is gzip data, otherwise passes it through.
pub fn decode_payload(bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(Cow::Borrowed(bytes));
    }

    let mut out = Vec::with_capacity(bytes.len() * 8);
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| AuditError::FeedParse(format!("gzip stream: {e}")))?;
    Ok(Cow::Owned(out))
}

/// Parses a (possibly compressed) `extensions.xml` document.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedExtension>> {
    let xml = decode_payload(bytes)?;
    let mut reader = Reader::from_reader(xml.as_ref());
    reader.trim_text(true);

    let mut extensions = Vec::new();
    let mut current: Option<FeedExtension> = None;
    let mut current_version: Option<FeedVersion> = None;
    let mut in_review_state = false;
    let mut seen_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"extensions" => seen_root = true,
                b"extension" => {
                    current = Some(FeedExtension::new(
                        attribute(&e, b"extensionkey").unwrap_or_default(),
                        Vec::new(),
                    ));
                }
                b"version" if current.is_some() && current_version.is_none() => {
                    current_version = Some(FeedVersion::new(
                        attribute(&e, b"version").unwrap_or_default(),
                        0,
                    ));
                }
                b"reviewstate" => in_review_state = current_version.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"extensions" => seen_root = true,
                b"extension" => {
                    push_extension(
                        &mut extensions,
                        FeedExtension::new(
                            attribute(&e, b"extensionkey").unwrap_or_default(),
                            Vec::new(),
                        ),
                    );
                }
                b"version" if current_version.is_none() => {
                    if let Some(ext) = current.as_mut() {
                        ext.versions.push(FeedVersion::new(
                            attribute(&e, b"version").unwrap_or_default(),
                            0,
                        ));
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_review_state => {
                let text = t
                    .unescape()
                    .map_err(|e| AuditError::FeedParse(e.to_string()))?;
                if let Some(version) = current_version.as_mut() {
                    version.review_state = text.trim().parse().unwrap_or(0);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"reviewstate" => in_review_state = false,
                b"version" => {
                    if let (Some(ext), Some(version)) = (current.as_mut(), current_version.take()) {
                        ext.versions.push(version);
                    }
                }
                b"extension" => {
                    if let Some(ext) = current.take() {
                        push_extension(&mut extensions, ext);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AuditError::FeedParse(format!(
                    "error at position {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(AuditError::FeedParse(
            "no <extensions> root element".to_string(),
        ));
    }

    if current.is_some() {
        return Err(AuditError::FeedParse(
            "document ended inside an <extension> element".to_string(),
        ));
    }

    debug!(extensions = extensions.len(), "Parsed registry feed");
    Ok(extensions)
}

fn push_extension(extensions: &mut Vec<FeedExtension>, ext: FeedExtension) {
    if ext.key.is_empty() {
        debug!("Dropping feed record without extension key");
        return;
    }
    extensions.push(ext);
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}
