//! Vendor XML record decoding.
//!
//! Two encodings are supported:
//!
//! * [`EcgSchema::Resting`]: a resting-ECG export where each lead carries a
//!   base64 little-endian `i16` buffer and its own amplitude gain.
//! * [`EcgSchema::Annotated`]: an HL7 annotated-ECG document where each lead
//!   is a whitespace-separated digit string with a shared scale and a
//!   per-lead baseline.
//!
//! The schema is resolved once into an [`EcgRecord`] (enum + payload); every
//! later step works on that value instead of probing XML fields again.

mod annotated;
mod resting;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use annotated::{AnnotatedChannel, AnnotatedSeries, ANNOTATED_LEAD_SLOTS};
pub use resting::{RestingLead, RestingRecord};

use crate::error::FormatError;
use crate::lead::Lead;
use crate::samples::LeadSampleMap;

/// Which XML encoding an inbound record uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EcgSchema {
    /// Binary-waveform resting ECG export (`RestingECG` root).
    Resting,
    /// HL7 annotated ECG (`AnnotatedECG` root).
    Annotated,
}

impl EcgSchema {
    pub fn as_str(self) -> &'static str {
        match self {
            EcgSchema::Resting => "resting",
            EcgSchema::Annotated => "annotated",
        }
    }
}

impl fmt::Display for EcgSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ECG schema `{0}` (expected resting|muse|annotated|aecg|hl7)")]
pub struct UnknownSchema(pub String);

impl FromStr for EcgSchema {
    type Err = UnknownSchema;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resting" | "muse" | "a" => Ok(EcgSchema::Resting),
            "annotated" | "aecg" | "hl7" | "b" => Ok(EcgSchema::Annotated),
            other => Err(UnknownSchema(other.to_string())),
        }
    }
}

/// A parsed record, still in its schema-native representation.
#[derive(Debug, Clone, PartialEq)]
pub enum EcgRecord {
    Resting(RestingRecord),
    Annotated(AnnotatedSeries),
}

impl EcgRecord {
    /// Parse raw bytes according to `schema`.
    pub fn parse(bytes: &[u8], schema: EcgSchema) -> Result<Self, FormatError> {
        let text = xml_text(bytes)?;
        let doc = roxmltree::Document::parse(text)?;
        match schema {
            EcgSchema::Resting => resting::parse(&doc).map(EcgRecord::Resting),
            EcgSchema::Annotated => annotated::parse(&doc).map(EcgRecord::Annotated),
        }
    }

    pub fn schema(&self) -> EcgSchema {
        match self {
            EcgRecord::Resting(_) => EcgSchema::Resting,
            EcgRecord::Annotated(_) => EcgSchema::Annotated,
        }
    }

    /// Scale every lead to millivolts and derive the computed leads.
    pub fn into_decoded(self) -> Result<DecodedRecord, FormatError> {
        let (recorded, machine_statements) = match self {
            EcgRecord::Resting(record) => (record.to_millivolts()?, record.statements),
            EcgRecord::Annotated(series) => (series.to_millivolts()?, Vec::new()),
        };
        if recorded.is_empty() {
            return Err(FormatError::NoLeads);
        }
        Ok(DecodedRecord {
            samples: LeadSampleMap::from_recorded(recorded),
            machine_statements,
        })
    }
}

/// Output of the decoder: the lead map plus record-level metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub samples: LeadSampleMap,
    /// Diagnosis statements written by the acquiring device, if any.
    pub machine_statements: Vec<String>,
}

impl DecodedRecord {
    /// Whether the device's own interpretation mentions STEMI.
    pub fn machine_flags_stemi(&self) -> bool {
        self.machine_statements.iter().any(|s| s.contains("STEMI"))
    }
}

/// Decode a record into its lead map.
pub fn decode(bytes: &[u8], schema: EcgSchema) -> Result<DecodedRecord, FormatError> {
    let record = EcgRecord::parse(bytes, schema)?;
    let decoded = record.into_decoded()?;
    log::debug!(
        "decoded {schema} record: {} leads ({} missing)",
        decoded.samples.len(),
        decoded.samples.missing().len()
    );
    Ok(decoded)
}

fn xml_text(bytes: &[u8]) -> Result<&str, FormatError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes).map_err(|e| FormatError::Xml(format!("record is not UTF-8: {e}")))
}

pub(crate) type RecordedLeads = BTreeMap<Lead, Vec<f64>>;

/// Element children of `node` with local name `name`, ignoring namespaces.
pub(crate) fn children_named<'a, 'input: 'a>(
    node: roxmltree::Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = roxmltree::Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

pub(crate) fn child_named<'a, 'input: 'a>(
    node: roxmltree::Node<'a, 'input>,
    name: &'a str,
) -> Option<roxmltree::Node<'a, 'input>> {
    children_named(node, name).next()
}

pub(crate) fn require_child<'a, 'input: 'a>(
    node: roxmltree::Node<'a, 'input>,
    name: &'a str,
) -> Result<roxmltree::Node<'a, 'input>, FormatError> {
    child_named(node, name).ok_or_else(|| FormatError::missing(name))
}

pub(crate) fn child_text<'a, 'input: 'a>(
    node: roxmltree::Node<'a, 'input>,
    name: &'a str,
) -> Option<&'a str> {
    child_named(node, name)
        .and_then(|child| child.text())
        .map(str::trim)
}
