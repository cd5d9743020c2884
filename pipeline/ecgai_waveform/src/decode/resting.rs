use base64::Engine;

use super::{child_named, child_text, children_named, require_child, RecordedLeads};
use crate::error::FormatError;
use crate::lead::Lead;

/// One `LeadData` block of a resting-ECG export.
#[derive(Debug, Clone, PartialEq)]
pub struct RestingLead {
    pub lead: Lead,
    /// Microvolts per raw code (`LeadAmplitudeUnitsPerBit`).
    pub units_per_bit: f64,
    pub codes: Vec<i16>,
}

impl RestingLead {
    pub fn millivolts(&self) -> Vec<f64> {
        let gain = self.units_per_bit / 1000.0;
        self.codes.iter().map(|&code| f64::from(code) * gain).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RestingRecord {
    pub leads: Vec<RestingLead>,
    pub statements: Vec<String>,
}

impl RestingRecord {
    pub(crate) fn to_millivolts(&self) -> Result<RecordedLeads, FormatError> {
        let mut recorded = RecordedLeads::new();
        for lead in &self.leads {
            if recorded.insert(lead.lead, lead.millivolts()).is_some() {
                return Err(FormatError::invalid(
                    "LeadID",
                    format!("lead {} appears more than once", lead.lead),
                ));
            }
        }
        Ok(recorded)
    }
}

pub(super) fn parse(doc: &roxmltree::Document<'_>) -> Result<RestingRecord, FormatError> {
    let root = doc.root_element();
    if root.tag_name().name() != "RestingECG" {
        return Err(FormatError::missing("RestingECG"));
    }

    let waveform = select_waveform(root)?;
    let mut leads = Vec::new();
    for block in children_named(waveform, "LeadData") {
        leads.push(parse_lead(block)?);
    }
    if leads.is_empty() {
        return Err(FormatError::NoLeads);
    }

    Ok(RestingRecord {
        leads,
        statements: diagnosis_statements(root),
    })
}

/// Prefer the block typed `Rhythm`; untyped exports put the median beat
/// first and the rhythm second.
fn select_waveform<'a, 'input>(
    root: roxmltree::Node<'a, 'input>,
) -> Result<roxmltree::Node<'a, 'input>, FormatError> {
    let blocks: Vec<_> = children_named(root, "Waveform").collect();
    if let Some(rhythm) = blocks
        .iter()
        .find(|block| child_text(**block, "WaveformType") == Some("Rhythm"))
    {
        return Ok(*rhythm);
    }
    match blocks.as_slice() {
        [] => Err(FormatError::missing("Waveform")),
        [only] => Ok(*only),
        [_, second, ..] => Ok(*second),
    }
}

fn parse_lead(block: roxmltree::Node<'_, '_>) -> Result<RestingLead, FormatError> {
    let id = child_text(block, "LeadID").ok_or_else(|| FormatError::missing("LeadID"))?;
    let lead: Lead = id
        .parse()
        .map_err(|e: crate::lead::UnknownLead| FormatError::invalid("LeadID", e.to_string()))?;

    let gain_text = child_text(block, "LeadAmplitudeUnitsPerBit")
        .ok_or_else(|| FormatError::missing("LeadAmplitudeUnitsPerBit"))?;
    let units_per_bit: f64 = gain_text.parse().map_err(|_| {
        FormatError::invalid(
            "LeadAmplitudeUnitsPerBit",
            format!("`{gain_text}` is not a number"),
        )
    })?;
    if !units_per_bit.is_finite() {
        return Err(FormatError::invalid(
            "LeadAmplitudeUnitsPerBit",
            "gain must be finite",
        ));
    }

    let payload = require_child(block, "WaveFormData")?.text().unwrap_or_default();
    let codes = decode_waveform(payload)
        .map_err(|detail| FormatError::invalid("WaveFormData", format!("lead {lead}: {detail}")))?;

    Ok(RestingLead {
        lead,
        units_per_bit,
        codes,
    })
}

/// Base64 payload of little-endian `i16` codes; exports wrap lines.
fn decode_waveform(payload: &str) -> Result<Vec<i16>, String> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| e.to_string())?;
    if bytes.len() % 2 != 0 {
        return Err(format!("odd byte count {}", bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

fn diagnosis_statements(root: roxmltree::Node<'_, '_>) -> Vec<String> {
    let Some(diagnosis) = child_named(root, "OriginalDiagnosis") else {
        return Vec::new();
    };
    children_named(diagnosis, "DiagnosisStatement")
        .filter_map(|stmt| child_text(stmt, "StmtText"))
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode, EcgSchema};
    use base64::engine::general_purpose::STANDARD;

    fn encode(codes: &[i16]) -> String {
        let bytes: Vec<u8> = codes.iter().flat_map(|c| c.to_le_bytes()).collect();
        STANDARD.encode(bytes)
    }

    fn lead_xml(id: &str, gain: &str, codes: &[i16]) -> String {
        format!(
            "<LeadData><LeadID>{id}</LeadID>\
             <LeadAmplitudeUnitsPerBit>{gain}</LeadAmplitudeUnitsPerBit>\
             <WaveFormData>{}</WaveFormData></LeadData>",
            encode(codes)
        )
    }

    #[test]
    fn scales_codes_by_gain() {
        let xml = format!(
            "<RestingECG><Waveform><WaveformType>Rhythm</WaveformType>{}{}</Waveform></RestingECG>",
            lead_xml("I", "4.88", &[100, -200]),
            lead_xml("II", "4.88", &[0, 1000])
        );
        let decoded = decode(xml.as_bytes(), EcgSchema::Resting).unwrap();
        let one = decoded.samples.get(Lead::I).unwrap();
        approx::assert_relative_eq!(one[0], 0.488, epsilon = 1e-12);
        approx::assert_relative_eq!(one[1], -0.976, epsilon = 1e-12);
        assert_eq!(decoded.samples.len(), 6);
    }

    #[test]
    fn picks_second_untyped_waveform() {
        let xml = format!(
            "<RestingECG><Waveform>{}</Waveform><Waveform>{}</Waveform></RestingECG>",
            lead_xml("V1", "1000", &[1]),
            lead_xml("V2", "1000", &[2])
        );
        let decoded = decode(xml.as_bytes(), EcgSchema::Resting).unwrap();
        assert!(decoded.samples.contains(Lead::V2));
        assert!(!decoded.samples.contains(Lead::V1));
    }

    #[test]
    fn wrapped_base64_is_accepted() {
        let payload = encode(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let (head, tail) = payload.split_at(8);
        let xml = format!(
            "<RestingECG><Waveform><LeadData><LeadID>V3</LeadID>\
             <LeadAmplitudeUnitsPerBit>1000</LeadAmplitudeUnitsPerBit>\
             <WaveFormData>{head}\n  {tail}</WaveFormData></LeadData></Waveform></RestingECG>"
        );
        let decoded = decode(xml.as_bytes(), EcgSchema::Resting).unwrap();
        assert_eq!(decoded.samples.get(Lead::V3).unwrap().len(), 8);
    }

    #[test]
    fn missing_gain_names_field() {
        let xml = "<RestingECG><Waveform><LeadData><LeadID>I</LeadID>\
                   <WaveFormData>AAA=</WaveFormData></LeadData></Waveform></RestingECG>";
        let err = decode(xml.as_bytes(), EcgSchema::Resting).unwrap_err();
        assert_eq!(err.field(), Some("LeadAmplitudeUnitsPerBit"));
    }

    #[test]
    fn non_numeric_gain_is_rejected() {
        let xml = format!(
            "<RestingECG><Waveform>{}</Waveform></RestingECG>",
            lead_xml("I", "abc", &[1])
        );
        let err = decode(xml.as_bytes(), EcgSchema::Resting).unwrap_err();
        assert_eq!(err.field(), Some("LeadAmplitudeUnitsPerBit"));
    }

    #[test]
    fn odd_payload_is_rejected() {
        let xml = format!(
            "<RestingECG><Waveform><LeadData><LeadID>I</LeadID>\
             <LeadAmplitudeUnitsPerBit>1</LeadAmplitudeUnitsPerBit>\
             <WaveFormData>{}</WaveFormData></LeadData></Waveform></RestingECG>",
            STANDARD.encode([1u8, 2, 3])
        );
        let err = decode(xml.as_bytes(), EcgSchema::Resting).unwrap_err();
        assert_eq!(err.field(), Some("WaveFormData"));
    }

    #[test]
    fn empty_waveform_has_no_leads() {
        let err = decode(
            b"<RestingECG><Waveform></Waveform></RestingECG>",
            EcgSchema::Resting,
        )
        .unwrap_err();
        assert_eq!(err, FormatError::NoLeads);
    }

    #[test]
    fn collects_machine_statements() {
        let xml = format!(
            "<RestingECG><OriginalDiagnosis>\
             <DiagnosisStatement><StmtText>Sinus rhythm</StmtText></DiagnosisStatement>\
             <DiagnosisStatement><StmtText>** ACUTE MI / STEMI **</StmtText></DiagnosisStatement>\
             </OriginalDiagnosis><Waveform>{}</Waveform></RestingECG>",
            lead_xml("I", "1", &[0])
        );
        let decoded = decode(xml.as_bytes(), EcgSchema::Resting).unwrap();
        assert_eq!(decoded.machine_statements.len(), 2);
        assert!(decoded.machine_flags_stemi());
    }
}
