//! Canonical 12-lead identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the standard 12 ECG channels.
///
/// The declaration order is the conventional clinical order
/// (limb leads, augmented leads, precordial leads), so `Ord` on `Lead`
/// sorts a map the way a reader expects to see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Lead {
    I,
    II,
    III,
    AVR,
    AVL,
    AVF,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
}

impl Lead {
    pub const ALL: [Lead; 12] = [
        Lead::I,
        Lead::II,
        Lead::III,
        Lead::AVR,
        Lead::AVL,
        Lead::AVF,
        Lead::V1,
        Lead::V2,
        Lead::V3,
        Lead::V4,
        Lead::V5,
        Lead::V6,
    ];

    /// Leads computed from I and II rather than recorded.
    pub const DERIVED: [Lead; 4] = [Lead::III, Lead::AVR, Lead::AVL, Lead::AVF];

    /// Display name as printed on ECG paper.
    pub fn name(self) -> &'static str {
        match self {
            Lead::I => "I",
            Lead::II => "II",
            Lead::III => "III",
            Lead::AVR => "aVR",
            Lead::AVL => "aVL",
            Lead::AVF => "aVF",
            Lead::V1 => "V1",
            Lead::V2 => "V2",
            Lead::V3 => "V3",
            Lead::V4 => "V4",
            Lead::V5 => "V5",
            Lead::V6 => "V6",
        }
    }

    pub fn is_derived(self) -> bool {
        Lead::DERIVED.contains(&self)
    }

    /// Resolve an HL7 aECG MDC lead code such as `MDC_ECG_LEAD_AVR`.
    pub fn from_mdc_code(code: &str) -> Option<Lead> {
        code.strip_prefix("MDC_ECG_LEAD_")
            .and_then(|rest| rest.parse().ok())
    }
}

impl fmt::Display for Lead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lead identifier `{0}`")]
pub struct UnknownLead(pub String);

impl FromStr for Lead {
    type Err = UnknownLead;

    /// Vendor files spell augmented leads `AVR`, `aVR` or `avr`; all are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Lead::ALL
            .iter()
            .copied()
            .find(|lead| lead.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownLead(trimmed.to_string()))
    }
}

impl TryFrom<String> for Lead {
    type Error = UnknownLead;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Lead> for String {
    fn from(lead: Lead) -> Self {
        lead.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vendor_spellings() {
        assert_eq!("AVR".parse::<Lead>().unwrap(), Lead::AVR);
        assert_eq!("aVL".parse::<Lead>().unwrap(), Lead::AVL);
        assert_eq!(" v6 ".parse::<Lead>().unwrap(), Lead::V6);
        assert!("V7".parse::<Lead>().is_err());
    }

    #[test]
    fn mdc_codes_resolve() {
        assert_eq!(Lead::from_mdc_code("MDC_ECG_LEAD_III"), Some(Lead::III));
        assert_eq!(Lead::from_mdc_code("MDC_ECG_LEAD_AVF"), Some(Lead::AVF));
        assert_eq!(Lead::from_mdc_code("MDC_ECG_TIME_PD_RR"), None);
    }

    #[test]
    fn derived_set() {
        assert!(Lead::AVR.is_derived());
        assert!(!Lead::V1.is_derived());
        assert_eq!(Lead::ALL.iter().filter(|l| l.is_derived()).count(), 4);
    }
}
