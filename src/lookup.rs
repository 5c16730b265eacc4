use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Result, XsmbError};

/// Text-in, text-out search for one draw date.
///
/// `search_date` is in `dd/mm/yyyy` form. The reply is free text that should
/// contain a single JSON object with the prize fields.
#[async_trait]
pub trait ResultLookup: Send + Sync {
    async fn lookup(&self, search_date: &str) -> Result<String>;
}

/// What came back from a lookup, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupPayload {
    Parsed(Map<String, Value>),
    Malformed(String),
    NoJsonFound,
}

impl LookupPayload {
    /// Parses the span from the first `{` to the last `}`.
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
            return LookupPayload::NoJsonFound;
        };
        if end < start {
            return LookupPayload::NoJsonFound;
        }

        match serde_json::from_str::<Value>(&text[start..=end]) {
            Ok(Value::Object(record)) => LookupPayload::Parsed(record),
            Ok(other) => LookupPayload::Malformed(format!("expected an object, got {}", other)),
            Err(e) => LookupPayload::Malformed(e.to_string()),
        }
    }

    /// Only a parsed record can be normalized; the rest are retryable.
    pub fn into_record(self) -> Result<Map<String, Value>> {
        match self {
            LookupPayload::Parsed(record) => Ok(record),
            LookupPayload::Malformed(reason) => Err(XsmbError::MalformedPayload(reason)),
            LookupPayload::NoJsonFound => Err(XsmbError::NoJsonFound),
        }
    }
}
