//! Responses delivered by the connection layer.

use std::collections::HashMap;

use crate::bolt::packstream::PackStreamValue;

/// All response messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// SUCCESS - request completed, with metadata
    Success(SuccessMessage),
    /// RECORD - one result row
    Record(RecordMessage),
    /// FAILURE - request rejected by the server
    Failure(FailureMessage),
    /// IGNORED - request skipped because the connection is in a failed state
    Ignored,
}

impl Response {
    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Response::Success(_) => "SUCCESS",
            Response::Record(_) => "RECORD",
            Response::Failure(_) => "FAILURE",
            Response::Ignored => "IGNORED",
        }
    }

    /// Success metadata, if this is a SUCCESS message.
    pub fn as_success(&self) -> Option<&SuccessMessage> {
        match self {
            Response::Success(s) => Some(s),
            _ => None,
        }
    }

    /// Record fields, if this is a RECORD message.
    pub fn as_record(&self) -> Option<&RecordMessage> {
        match self {
            Response::Record(r) => Some(r),
            _ => None,
        }
    }
}

/// SUCCESS message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuccessMessage {
    /// Response metadata
    pub metadata: HashMap<String, PackStreamValue>,
}

impl SuccessMessage {
    /// Create a SUCCESS message with metadata.
    pub fn with_metadata(metadata: HashMap<String, PackStreamValue>) -> Self {
        Self { metadata }
    }

    /// Add metadata entry.
    pub fn add(mut self, key: &str, value: impl Into<PackStreamValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Get metadata entry.
    pub fn get(&self, key: &str) -> Option<&PackStreamValue> {
        self.metadata.get(key)
    }

    /// Field names from a RUN success.
    pub fn fields(&self) -> Option<Vec<String>> {
        self.metadata.get("fields").and_then(|v| v.as_string_list())
    }

    /// Update counters from a PULL_ALL success.
    pub fn stats(&self) -> Option<&HashMap<String, PackStreamValue>> {
        self.metadata.get("stats").and_then(|v| v.as_map())
    }

    /// Bookmark issued after a transaction boundary.
    pub fn bookmark(&self) -> Option<&str> {
        self.metadata.get("bookmark").and_then(|v| v.as_str())
    }

    /// Milliseconds until the first record was available.
    pub fn result_available_after(&self) -> Option<i64> {
        self.metadata
            .get("result_available_after")
            .or_else(|| self.metadata.get("t_first"))
            .and_then(|v| v.as_int())
    }

    /// Milliseconds until the last record was consumed.
    pub fn result_consumed_after(&self) -> Option<i64> {
        self.metadata
            .get("result_consumed_after")
            .or_else(|| self.metadata.get("t_last"))
            .and_then(|v| v.as_int())
    }

    /// Statement type ("r", "w", "rw", "s").
    pub fn query_type(&self) -> Option<&str> {
        self.metadata.get("type").and_then(|v| v.as_str())
    }
}

/// RECORD message.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMessage {
    /// Positional values, aligned with the RUN field names
    pub fields: Vec<PackStreamValue>,
}

impl RecordMessage {
    /// Create a new record.
    pub fn new(fields: Vec<PackStreamValue>) -> Self {
        Self { fields }
    }
}

/// FAILURE message.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureMessage {
    /// Server error code
    pub code: String,
    /// Human readable message
    pub message: String,
}

impl FailureMessage {
    /// Create a new failure.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Outcome of one request: the `(success, records)` pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseBatch {
    /// True when the request completed with SUCCESS
    pub success: bool,
    /// Every message received for the request, in arrival order
    pub responses: Vec<Response>,
}

impl ResponseBatch {
    /// Successful batch.
    pub fn success(responses: Vec<Response>) -> Self {
        Self {
            success: true,
            responses,
        }
    }

    /// Rejected batch carrying a single FAILURE.
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            responses: vec![Response::Failure(FailureMessage::new(code, message))],
        }
    }

    /// Batch with a single empty SUCCESS.
    pub fn empty_success() -> Self {
        Self::success(vec![Response::Success(SuccessMessage::default())])
    }

    /// RECORD messages of the batch.
    pub fn records(&self) -> impl Iterator<Item = &RecordMessage> {
        self.responses.iter().filter_map(Response::as_record)
    }

    /// SUCCESS messages of the batch.
    pub fn summaries(&self) -> impl Iterator<Item = &SuccessMessage> {
        self.responses.iter().filter_map(Response::as_success)
    }

    /// First FAILURE of the batch.
    pub fn failure_message(&self) -> Option<&FailureMessage> {
        self.responses.iter().find_map(|r| match r {
            Response::Failure(f) => Some(f),
            _ => None,
        })
    }

    /// First bookmark found in the batch metadata.
    pub fn bookmark(&self) -> Option<&str> {
        self.summaries().find_map(SuccessMessage::bookmark)
    }
}
