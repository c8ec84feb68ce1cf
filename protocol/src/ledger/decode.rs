//! Named-field decoding of `get_certificate_issuance` view results.
//!
//! The view function returns a positional list. Indexing into it by number
//! means a reordered or truncated response silently yields the wrong
//! fields, so the layout is written down once in [`CERTIFICATE_FIELDS`] and
//! both sides go through it: [`LedgerCertificateRecord::decode`] checks the
//! count and every type before mapping, and
//! [`LedgerCertificateRecord::to_view_values`] produces the same layout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON type a view field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Bool,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Bool => "bool",
        }
    }
}

/// Positional layout of the certificate view response.
pub const CERTIFICATE_FIELDS: [(&str, FieldKind); 10] = [
    ("certificate_id", FieldKind::Str),
    ("fingerprint", FieldKind::Str),
    ("recipient_name", FieldKind::Str),
    ("recipient_email", FieldKind::Str),
    ("recipient_photo_url", FieldKind::Str),
    ("certificate_url", FieldKind::Str),
    ("description", FieldKind::Str),
    ("issuance_date", FieldKind::Str),
    ("issuer", FieldKind::Str),
    ("is_valid", FieldKind::Bool),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected} fields, got {got}")]
    FieldCount { expected: usize, got: usize },

    #[error("field '{field}' should be a {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },
}

/// The authoritative, committed certificate as the ledger reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCertificateRecord {
    pub certificate_id: String,
    pub fingerprint: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub recipient_photo_url: String,
    pub certificate_url: String,
    pub description: String,
    pub issuance_date: String,
    pub issuer: String,
    pub is_valid: bool,
}

impl LedgerCertificateRecord {
    /// Validates `values` against [`CERTIFICATE_FIELDS`] and maps them.
    pub fn decode(values: &[Value]) -> Result<Self, DecodeError> {
        if values.len() != CERTIFICATE_FIELDS.len() {
            return Err(DecodeError::FieldCount {
                expected: CERTIFICATE_FIELDS.len(),
                got: values.len(),
            });
        }
        for ((name, kind), value) in CERTIFICATE_FIELDS.iter().zip(values) {
            let matches_kind = matches!(
                (kind, value),
                (FieldKind::Str, Value::String(_)) | (FieldKind::Bool, Value::Bool(_))
            );
            if !matches_kind {
                return Err(DecodeError::FieldType {
                    field: name,
                    expected: kind.name(),
                });
            }
        }

        // Shape checked above.
        let text = |i: usize| values[i].as_str().unwrap_or_default().to_string();
        Ok(Self {
            certificate_id: text(0),
            fingerprint: text(1),
            recipient_name: text(2),
            recipient_email: text(3),
            recipient_photo_url: text(4),
            certificate_url: text(5),
            description: text(6),
            issuance_date: text(7),
            issuer: text(8),
            is_valid: values[9].as_bool().unwrap_or(false),
        })
    }

    /// Encodes the record in view-response order.
    pub fn to_view_values(&self) -> Vec<Value> {
        vec![
            Value::String(self.certificate_id.clone()),
            Value::String(self.fingerprint.clone()),
            Value::String(self.recipient_name.clone()),
            Value::String(self.recipient_email.clone()),
            Value::String(self.recipient_photo_url.clone()),
            Value::String(self.certificate_url.clone()),
            Value::String(self.description.clone()),
            Value::String(self.issuance_date.clone()),
            Value::String(self.issuer.clone()),
            Value::Bool(self.is_valid),
        ]
    }
}
