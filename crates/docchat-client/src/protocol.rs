//! Wire formats: event-stream payloads and history responses.

use serde::{Deserialize, Deserializer};

use crate::attachment::Attachment;

/// One decoded unit from the reply stream. Applied, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of the assistant's text, in delivery order.
    Chunk(String),
    /// The server-confirmed conversation id and documents in context.
    Session {
        session_id: String,
        active_documents: Vec<Attachment>,
    },
    Done,
    Error(String),
}

impl StreamEvent {
    /// Terminal events end the stream; nothing after them is applied.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }
}

/// A document reference as the backend sends it: a bare name/hash or an
/// object with a name and type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireDocument {
    Named(String),
    Described {
        #[serde(alias = "filename", alias = "file_name")]
        name: String,
        #[serde(default, rename = "type", alias = "mime_type", alias = "content_type")]
        mime_type: Option<String>,
    },
}

impl From<WireDocument> for Attachment {
    fn from(doc: WireDocument) -> Self {
        match doc {
            WireDocument::Named(name) => Attachment::descriptor(name, None),
            WireDocument::Described { name, mime_type } => {
                Attachment::descriptor(name, mime_type.as_deref())
            }
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(default)]
    chunk: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    active_documents: Vec<WireDocument>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Decode the JSON body of one `data:` record.
///
/// A record may carry several keys at once (e.g. a final `done` that also
/// confirms the session id); events come out in application order:
/// chunk, session, done. An `error` key short-circuits everything else.
pub fn decode_record(data: &str) -> Result<Vec<StreamEvent>, String> {
    let payload: WirePayload =
        serde_json::from_str(data).map_err(|e| format!("invalid JSON payload: {e}"))?;

    if let Some(error) = payload.error {
        let message = match error {
            serde_json::Value::String(s) if !s.trim().is_empty() => s,
            serde_json::Value::String(_) | serde_json::Value::Null => {
                "the server reported an unspecified error".to_string()
            }
            other => other.to_string(),
        };
        return Ok(vec![StreamEvent::Error(message)]);
    }

    let mut events = Vec::new();
    if let Some(chunk) = payload.chunk.filter(|c| !c.is_empty()) {
        events.push(StreamEvent::Chunk(chunk));
    }
    if let Some(session_id) = payload.session_id.filter(|s| !s.trim().is_empty()) {
        events.push(StreamEvent::Session {
            session_id,
            active_documents: payload.active_documents.into_iter().map(Into::into).collect(),
        });
    }
    if payload.done == Some(true) {
        events.push(StreamEvent::Done);
    }

    if events.is_empty() {
        return Err(format!("unrecognised payload: {data}"));
    }
    Ok(events)
}

/// Body of the history endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chat_history: Vec<HistoryExchange>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active_documents: Vec<WireDocument>,
}

/// One persisted prompt/response pair.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryExchange {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub response: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub document_metadata: Option<DocumentMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub original_files: Vec<WireDocument>,
}
