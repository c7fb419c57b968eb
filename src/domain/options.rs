//! Typed option sections carried by bags and envelopes. Each worker that
//! consumes a section resolves its own keys; here we only guarantee the
//! sections exist and are objects.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type OptionSection = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentOptions {
    pub builder: OptionSection,
    pub normalizer: OptionSection,
    pub parser: OptionSection,
    pub renderer: OptionSection,
    pub sanitizer: OptionSection,
    pub validator: OptionSection,
}

impl DocumentOptions {
    /// Validates a raw options object once; unknown sections or non-object
    /// sections are rejected.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        serde_json::from_value(value).map_err(|e| DocumentError::InvalidOptions(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvelopeOptions {
    pub dispatcher: OptionSection,
}

impl EnvelopeOptions {
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        serde_json::from_value(value).map_err(|e| DocumentError::InvalidOptions(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_sections_default_to_empty() {
        let options = DocumentOptions::from_value(json!({ "normalizer": { "strict": true } })).unwrap();
        assert_eq!(options.normalizer.get("strict"), Some(&json!(true)));
        assert!(options.builder.is_empty());
    }

    #[test]
    fn unknown_or_malformed_sections_are_rejected() {
        assert!(DocumentOptions::from_value(json!({ "printer": {} })).is_err());
        assert!(DocumentOptions::from_value(json!({ "parser": "csv" })).is_err());
        assert!(EnvelopeOptions::from_value(json!({ "dispatcher": [] })).is_err());
    }
}
