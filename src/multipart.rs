//! Multipart form payloads sent by the submission pipeline.

use bytes::Bytes;

use crate::capabilities::http::HttpError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartKind {
    Text(String),
    Binary {
        bytes: Bytes,
        file_name: String,
        mime_type: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub kind: PartKind,
}

/// Ordered list of form parts. Text values are trimmed on insertion and
/// blank values are dropped, so the backend never receives empty fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartPayload {
    parts: Vec<Part>,
}

impl MultipartPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a trimmed text part. Returns `false` when the value was blank
    /// and nothing was added.
    pub fn push_text(&mut self, name: impl Into<String>, value: &str) -> bool {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.parts.push(Part {
            name: name.into(),
            kind: PartKind::Text(trimmed.to_string()),
        });
        true
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: &str) -> Self {
        self.push_text(name, value);
        self
    }

    pub fn push_binary(
        &mut self,
        name: impl Into<String>,
        bytes: Bytes,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) {
        self.parts.push(Part {
            name: name.into(),
            kind: PartKind::Binary {
                bytes,
                file_name: file_name.into(),
                mime_type: mime_type.into(),
            },
        });
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name == name)
    }

    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|p| match &p.kind {
            PartKind::Text(v) if p.name == name => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn binary(&self, name: &str) -> Option<(&Bytes, &str, &str)> {
        self.parts.iter().find_map(|p| match &p.kind {
            PartKind::Binary {
                bytes,
                file_name,
                mime_type,
            } if p.name == name => Some((bytes, file_name.as_str(), mime_type.as_str())),
            _ => None,
        })
    }

    /// Rough body size, used for request size limits.
    pub fn size_hint(&self) -> usize {
        self.parts
            .iter()
            .map(|p| {
                p.name.len()
                    + match &p.kind {
                        PartKind::Text(v) => v.len(),
                        PartKind::Binary {
                            bytes, file_name, ..
                        } => bytes.len() + file_name.len(),
                    }
            })
            .sum()
    }

    pub fn to_form(&self) -> Result<reqwest::multipart::Form, HttpError> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match &part.kind {
                PartKind::Text(value) => form.text(part.name.clone(), value.clone()),
                PartKind::Binary {
                    bytes,
                    file_name,
                    mime_type,
                } => {
                    let file_part = reqwest::multipart::Part::bytes(bytes.to_vec())
                        .file_name(file_name.clone())
                        .mime_str(mime_type)
                        .map_err(|e| HttpError::InvalidRequest {
                            reason: format!("invalid MIME type '{mime_type}': {e}"),
                        })?;
                    form.part(part.name.clone(), file_part)
                }
            };
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_is_omitted_and_values_trimmed() {
        let payload = MultipartPayload::new()
            .text("first_name", "  Lan ")
            .text("address", "   ")
            .text("email_address", "");

        assert_eq!(payload.len(), 1);
        assert_eq!(payload.text_value("first_name"), Some("Lan"));
        assert!(!payload.contains("address"));
        assert!(!payload.contains("email_address"));
    }

    #[test]
    fn test_binary_parts_keep_name_and_mime() {
        let mut payload = MultipartPayload::new();
        payload.push_binary("avatar", Bytes::from_static(b"\x89PNG"), "emp-avatar", "image/png");

        let (bytes, file_name, mime) = payload.binary("avatar").unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(file_name, "emp-avatar");
        assert_eq!(mime, "image/png");
        assert_eq!(payload.text_value("avatar"), None);
    }

    #[test]
    fn test_size_hint_counts_names_and_values() {
        let payload = MultipartPayload::new().text("ab", "cde");
        assert_eq!(payload.size_hint(), 5);
    }

    #[test]
    fn test_invalid_mime_is_rejected_when_building_form() {
        let mut payload = MultipartPayload::new();
        payload.push_binary("avatar", Bytes::from_static(b"x"), "a", "not a mime");
        assert!(matches!(
            payload.to_form(),
            Err(HttpError::InvalidRequest { .. })
        ));
    }
}
