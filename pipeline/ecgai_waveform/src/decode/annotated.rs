use super::{child_named, children_named, require_child, RecordedLeads};
use crate::error::FormatError;
use crate::lead::Lead;

/// Sequence-set component slot of each lead in an annotated-ECG export.
///
/// Slot 0 holds the time axis. The exporting device writes the limb leads,
/// the precordial leads, then III and the augmented leads, so III sits in
/// slot 9 rather than next to I and II.
pub const ANNOTATED_LEAD_SLOTS: [(usize, Lead); 12] = [
    (1, Lead::I),
    (2, Lead::II),
    (3, Lead::V1),
    (4, Lead::V2),
    (5, Lead::V3),
    (6, Lead::V4),
    (7, Lead::V5),
    (8, Lead::V6),
    (9, Lead::III),
    (10, Lead::AVR),
    (11, Lead::AVL),
    (12, Lead::AVF),
];

/// The slot whose `scale` applies to every lead.
const SCALE_SLOT: usize = 1;

/// Only every second code is kept to reach the canonical sample count.
const DECIMATION: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedChannel {
    pub lead: Lead,
    /// Baseline offset in raw code units (`origin@value`).
    pub origin: f64,
    pub digits: Vec<i64>,
}

impl AnnotatedChannel {
    /// `trunc((code + origin) * scale)`, decimated and normalised to millivolts.
    fn millivolts(&self, scale: f64) -> Vec<f64> {
        self.digits
            .iter()
            .step_by(DECIMATION)
            .map(|&code| ((code as f64 + self.origin) * scale).trunc() / 1_000_000.0)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedSeries {
    /// Shared scale, already multiplied by 1000 (`scale@value * 1000`).
    pub scale: f64,
    pub channels: Vec<AnnotatedChannel>,
}

impl AnnotatedSeries {
    pub(crate) fn to_millivolts(&self) -> Result<RecordedLeads, FormatError> {
        Ok(self
            .channels
            .iter()
            .map(|channel| (channel.lead, channel.millivolts(self.scale)))
            .collect())
    }
}

pub(super) fn parse(doc: &roxmltree::Document<'_>) -> Result<AnnotatedSeries, FormatError> {
    let root = doc.root_element();
    if root.tag_name().name() != "AnnotatedECG" {
        return Err(FormatError::missing("AnnotatedECG"));
    }

    let series = require_child(require_child(root, "component")?, "series")?;
    let sequence_set = children_named(series, "component")
        .find_map(|component| child_named(component, "sequenceSet"))
        .ok_or_else(|| FormatError::missing("sequenceSet"))?;
    let slots: Vec<_> = children_named(sequence_set, "component").collect();

    let scale_value = slots
        .get(SCALE_SLOT)
        .and_then(|slot| sequence_value(*slot).ok())
        .and_then(|value| child_named(value, "scale"))
        .ok_or_else(|| FormatError::missing("scale"))?;
    let scale = numeric_attribute(scale_value, "scale")? * 1000.0;

    let mut channels = Vec::with_capacity(ANNOTATED_LEAD_SLOTS.len());
    for (slot, lead) in ANNOTATED_LEAD_SLOTS {
        let component = slots.get(slot).copied().ok_or_else(|| {
            FormatError::missing(format!("sequenceSet/component[{slot}] ({lead})"))
        })?;
        channels.push(parse_channel(component, lead)?);
    }

    Ok(AnnotatedSeries { scale, channels })
}

fn parse_channel(
    component: roxmltree::Node<'_, '_>,
    lead: Lead,
) -> Result<AnnotatedChannel, FormatError> {
    let sequence = require_child(component, "sequence")?;
    if let Some(code) = child_named(sequence, "code").and_then(|c| c.attribute("code")) {
        match Lead::from_mdc_code(code) {
            Some(declared) if declared != lead => log::warn!(
                "sequence declares {code} but slot table maps it to {lead}; using {lead}"
            ),
            _ => {}
        }
    }

    let value = sequence_value(component)?;
    let origin = match child_named(value, "origin") {
        Some(node) => numeric_attribute(node, "origin")?,
        None => return Err(FormatError::missing(format!("origin ({lead})"))),
    };

    let digits_text = require_child(value, "digits")?.text().unwrap_or_default();
    let digits = digits_text
        .split_whitespace()
        .map(|token| {
            token.parse::<i64>().map_err(|_| {
                FormatError::invalid("digits", format!("lead {lead}: `{token}` is not an integer"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if digits.is_empty() {
        return Err(FormatError::invalid("digits", format!("lead {lead} has no samples")));
    }

    Ok(AnnotatedChannel {
        lead,
        origin,
        digits,
    })
}

fn sequence_value<'a, 'input>(
    component: roxmltree::Node<'a, 'input>,
) -> Result<roxmltree::Node<'a, 'input>, FormatError> {
    require_child(require_child(component, "sequence")?, "value")
}

fn numeric_attribute(node: roxmltree::Node<'_, '_>, field: &str) -> Result<f64, FormatError> {
    let raw = node
        .attribute("value")
        .ok_or_else(|| FormatError::missing(format!("{field}@value")))?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            FormatError::invalid(format!("{field}@value"), format!("`{raw}` is not a number"))
        })
}
