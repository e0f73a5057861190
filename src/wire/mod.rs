//! Versioned envelope for shipping an extract to another process.
//!
//! The engine itself only produces and consumes [`TransactionExtract`]
//! values. This module wraps one in an envelope carrying a format version,
//! an id and a timestamp, and offers JSON (readable) and bincode (compact)
//! encodings.

use crate::delta::TransactionExtract;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;

pub use error::ExtractCodecError;

/// Version identifier for the envelope format
pub const EXTRACT_FORMAT_VERSION: u32 = 1;

/// Serializable wrapper around a [`TransactionExtract`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractEnvelope {
    /// Envelope format version
    pub version: u32,

    /// Unique envelope identifier
    pub id: Uuid,

    /// When the extract was exported
    pub exported_at: DateTime<Utc>,

    /// The deltas themselves
    pub extract: TransactionExtract,
}

impl ExtractEnvelope {
    /// Wrap an extract with a fresh id and the current time.
    pub fn new(extract: TransactionExtract) -> Self {
        Self {
            version: EXTRACT_FORMAT_VERSION,
            id: Uuid::new_v4(),
            exported_at: Utc::now(),
            extract,
        }
    }

    /// Unwrap the extract.
    pub fn into_extract(self) -> TransactionExtract {
        self.extract
    }

    pub fn to_json(&self) -> Result<String, ExtractCodecError> {
        serde_json::to_string(self).map_err(|e| ExtractCodecError::encode("json", e))
    }

    pub fn to_json_pretty(&self) -> Result<String, ExtractCodecError> {
        serde_json::to_string_pretty(self).map_err(|e| ExtractCodecError::encode("json", e))
    }

    pub fn from_json(json: &str) -> Result<Self, ExtractCodecError> {
        let envelope: Self =
            serde_json::from_str(json).map_err(|e| ExtractCodecError::decode("json", e))?;
        envelope.check_version()
    }

    pub fn to_binary(&self) -> Result<Vec<u8>, ExtractCodecError> {
        bincode::serialize(self).map_err(|e| ExtractCodecError::encode("binary", e))
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Self, ExtractCodecError> {
        let envelope: Self =
            bincode::deserialize(bytes).map_err(|e| ExtractCodecError::decode("binary", e))?;
        envelope.check_version()
    }

    fn check_version(self) -> Result<Self, ExtractCodecError> {
        if self.version == EXTRACT_FORMAT_VERSION {
            Ok(self)
        } else {
            Err(ExtractCodecError::UnsupportedVersion {
                found: self.version,
                supported: EXTRACT_FORMAT_VERSION,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntryState, ObjectId, ObjectState};
    use crate::delta::{ChangeValue, TransactionDelta};

    fn sample_extract() -> TransactionExtract {
        let kunde = ObjectId::new("kunde", "kundennr", "42");
        let vertrag = ObjectId::surrogate("vertrag");

        let mut delta = TransactionDelta::new(kunde, ObjectState::Modified, Some("1".into()));
        delta.set_single("nachname", "Smith".into()).unwrap();
        delta.set_single("umsatz", ChangeValue::Float(12.5)).unwrap();
        delta
            .push_entry("vertrag", vertrag.clone(), EntryState::Added)
            .unwrap();

        let mut extract = TransactionExtract::new();
        extract.add_delta(delta);
        extract.add_clean_object(vertrag, Some("3".into()));
        extract
    }

    #[test]
    fn json_envelope_preserves_extract() {
        let envelope = ExtractEnvelope::new(sample_extract());
        let json = envelope.to_json().unwrap();
        let back = ExtractEnvelope::from_json(&json).unwrap();

        assert_eq!(back.id, envelope.id);
        assert_eq!(back.into_extract(), envelope.extract);
    }

    #[test]
    fn binary_envelope_preserves_extract() {
        let envelope = ExtractEnvelope::new(sample_extract());
        let bytes = envelope.to_binary().unwrap();
        let back = ExtractEnvelope::from_binary(&bytes).unwrap();

        assert_eq!(back.exported_at, envelope.exported_at);
        assert_eq!(back.extract, envelope.extract);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut envelope = ExtractEnvelope::new(TransactionExtract::new());
        envelope.version = 99;
        let json = envelope.to_json().unwrap();

        match ExtractEnvelope::from_json(&json) {
            Err(ExtractCodecError::UnsupportedVersion { found, supported }) => {
                assert_eq!(found, 99);
                assert_eq!(supported, EXTRACT_FORMAT_VERSION);
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_input_fails_to_decode() {
        let err = ExtractEnvelope::from_json("{not json").unwrap_err();
        assert!(matches!(err, ExtractCodecError::Decode { format: "json", .. }));
        assert!(err.to_string().starts_with("cannot read extract envelope from json"));

        assert!(matches!(
            ExtractEnvelope::from_binary(&[1, 2, 3]),
            Err(ExtractCodecError::Decode { format: "binary", .. })
        ));
    }
}
