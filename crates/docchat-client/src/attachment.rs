//! File attachments: the bytes a user is about to send, or the descriptor
//! of a document the backend already processed.

use std::path::Path;

use serde::{Deserialize, Serialize};

use docchat_common::ClientError;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "type", alias = "mime_type", default = "default_mime")]
    pub mime_type: String,
    /// Local preview handle (a file path for images picked from disk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Raw bytes, present only until the attachment is sent.
    #[serde(skip)]
    payload: Option<Vec<u8>>,
}

fn default_mime() -> String {
    OCTET_STREAM.to_string()
}

impl Attachment {
    /// A not-yet-sent attachment carrying its bytes.
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, payload: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_type
            .map(String::from)
            .unwrap_or_else(|| guess_mime(&name).to_string());
        Self {
            name,
            mime_type,
            preview: None,
            payload: Some(payload),
        }
    }

    /// A name/type pair with no bytes, as restored from history.
    pub fn descriptor(name: impl Into<String>, mime_type: Option<&str>) -> Self {
        let name = name.into();
        let mime_type = mime_type
            .filter(|m| !m.is_empty())
            .map(String::from)
            .unwrap_or_else(|| guess_mime(&name).to_string());
        Self {
            name,
            mime_type,
            preview: None,
            payload: None,
        }
    }

    /// Read a file from disk. Images keep their path as preview handle.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let payload = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let mut attachment = Self::new(name, None, payload);
        if attachment.is_image() {
            attachment.preview = Some(path.display().to_string());
        }
        Ok(attachment)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map_or(0, Vec::len)
    }

    /// Move the bytes out. Subsequent calls return `None`.
    pub fn take_payload(&mut self) -> Option<Vec<u8>> {
        self.payload.take()
    }

    /// Copy of the descriptor without the bytes, for message history.
    pub fn without_payload(&self) -> Self {
        Self {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            preview: self.preview.clone(),
            payload: None,
        }
    }
}

/// MIME type from the file extension; unknown extensions are octet-stream.
pub fn guess_mime(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_is_guessed_from_extension() {
        assert_eq!(guess_mime("report.PDF"), "application/pdf");
        assert_eq!(guess_mime("scan.jpeg"), "image/jpeg");
        assert_eq!(guess_mime("notes"), OCTET_STREAM);
        assert_eq!(guess_mime("archive.tar.zst"), OCTET_STREAM);
    }

    #[test]
    fn payload_is_taken_once() {
        let mut attachment = Attachment::new("report.pdf", None, b"%PDF-1.7".to_vec());
        assert_eq!(attachment.mime_type, "application/pdf");
        assert_eq!(attachment.payload_len(), 8);

        assert_eq!(attachment.take_payload().unwrap(), b"%PDF-1.7");
        assert!(attachment.take_payload().is_none());
        assert!(!attachment.has_payload());
        assert_eq!(attachment.name, "report.pdf");
    }

    #[test]
    fn without_payload_keeps_descriptor() {
        let attachment = Attachment::new("chart.png", Some("image/png"), vec![1, 2, 3]);
        let descriptor = attachment.without_payload();
        assert!(!descriptor.has_payload());
        assert_eq!(descriptor.name, "chart.png");
        assert!(descriptor.is_image());
    }

    #[test]
    fn descriptor_deserializes_from_history_shape() {
        let json = r#"{"name":"q3.xlsx","type":"application/vnd.ms-excel"}"#;
        let attachment: Attachment = serde_json::from_str(json).unwrap();
        assert_eq!(attachment.mime_type, "application/vnd.ms-excel");
        assert!(!attachment.has_payload());

        let json = r#"{"name":"q3.bin"}"#;
        let attachment: Attachment = serde_json::from_str(json).unwrap();
        assert_eq!(attachment.mime_type, OCTET_STREAM);
    }

    #[tokio::test]
    async fn from_path_reads_bytes_and_sets_preview_for_images() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");
        let png = dir.path().join("figure.png");
        std::fs::write(&pdf, b"%PDF").unwrap();
        std::fs::write(&png, b"\x89PNG").unwrap();

        let doc = Attachment::from_path(&pdf).await.unwrap();
        assert_eq!(doc.name, "report.pdf");
        assert_eq!(doc.payload_len(), 4);
        assert!(doc.preview.is_none());

        let image = Attachment::from_path(&png).await.unwrap();
        assert_eq!(image.preview.as_deref(), Some(png.display().to_string().as_str()));
    }

    #[tokio::test]
    async fn from_path_missing_file_is_io_error() {
        let err = Attachment::from_path("/tmp/docchat-definitely-missing.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }
}
