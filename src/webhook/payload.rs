//! Instagram webhook payload types.
//!
//! The platform's payloads are untrusted: collections may be missing or
//! `null`, and only `comments` changes are inspected further. Parsing happens
//! in one pass before any side effect so a malformed body never dispatches
//! halfway through.

use serde::Deserialize;
use serde_json::Value;

/// Normalized comment text that triggers a dispatch.
pub const TRIGGER_PHRASE: &str = "FUN FACT";

/// The only `field` value we act on.
pub const COMMENTS_FIELD: &str = "comments";

/// Top-level webhook delivery.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookEnvelope {
    /// Subscription object type, e.g. "instagram"
    #[serde(default)]
    pub object: Option<Value>,
    #[serde(rename = "entry", default, deserialize_with = "null_as_empty")]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub changes: Vec<Change>,
}

/// A single change notification. Both parts stay raw until we know the
/// field is one we understand; a non-string `field` is simply not `comments`.
#[derive(Debug, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: Value,
    #[serde(default)]
    pub value: Option<Value>,
}

impl Change {
    pub fn is_comment(&self) -> bool {
        self.field.as_str() == Some(COMMENTS_FIELD)
    }
}

/// Comment notification body.
///
/// Ids are forwarded exactly as the platform sent them, string or number.
/// `from` and `media` are only looked into when they are objects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentEvent {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<Value>,
    #[serde(default)]
    pub media: Option<Value>,
}

impl CommentEvent {
    pub fn comment_id(&self) -> Option<&Value> {
        self.id.as_ref().filter(|id| !id.is_null())
    }

    pub fn from_user_id(&self) -> Option<&Value> {
        nested_id(self.from.as_ref())
    }

    pub fn media_id(&self) -> Option<&Value> {
        nested_id(self.media.as_ref())
    }

    /// Trimmed, upper-cased text, or `None` when the comment has no text.
    pub fn normalized_text(&self) -> Option<String> {
        self.text.as_deref().map(normalize)
    }

    pub fn is_trigger(&self) -> bool {
        self.normalized_text().as_deref() == Some(TRIGGER_PHRASE)
    }
}

fn nested_id(object: Option<&Value>) -> Option<&Value> {
    object
        .and_then(|o| o.get("id"))
        .filter(|id| !id.is_null())
}

/// Trim surrounding whitespace and upper-case.
pub fn normalize(text: &str) -> String {
    text.trim().to_uppercase()
}

/// Failure while reading a webhook body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// The body is not JSON, or its shape does not fit the envelope.
    #[error("invalid webhook body: {0}")]
    InvalidBody(String),

    /// A comments change arrived without a usable `value`.
    #[error("comment change {index} has no value")]
    MissingValue { index: usize },

    /// A comment object whose `text` is present but not a string.
    #[error("comment change {index} is malformed: {reason}")]
    MalformedComment { index: usize, reason: String },
}

impl WebhookEnvelope {
    /// Parse a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(body).map_err(|e| PayloadError::InvalidBody(e.to_string()))
    }

    /// All changes across all entries, in delivery order.
    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.entries.iter().flat_map(|entry| entry.changes.iter())
    }

    /// Extract every comment event, in delivery order.
    ///
    /// Changes for other fields are skipped. A comments change with a missing
    /// or `null` value, or with non-string text, fails the whole envelope.
    /// A value that is not an object carries no comment fields at all.
    pub fn comment_events(&self) -> Result<Vec<CommentEvent>, PayloadError> {
        self.changes()
            .filter(|change| change.is_comment())
            .enumerate()
            .map(|(index, change)| match &change.value {
                None | Some(Value::Null) => Err(PayloadError::MissingValue { index }),
                Some(value @ Value::Object(_)) => {
                    CommentEvent::deserialize(value).map_err(|e| PayloadError::MalformedComment {
                        index,
                        reason: e.to_string(),
                    })
                }
                Some(_) => Ok(CommentEvent::default()),
            })
            .collect()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
