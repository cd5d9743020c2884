use std::collections::BTreeMap;

use crate::lead::Lead;

/// Nominal acquisition rate of a resting 12-lead record.
pub const SAMPLE_RATE_HZ: u32 = 500;

/// Nominal samples per lead (10 seconds at [`SAMPLE_RATE_HZ`]).
pub const NOMINAL_SAMPLES: usize = 5000;

/// Per-lead millivolt samples for one record.
///
/// Built once from the directly recorded leads; the augmented leads and III
/// are derived during construction and the map is read-only afterwards.
/// When I or II is missing the map holds no derived lead at all, recorded
/// or fabricated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LeadSampleMap {
    leads: BTreeMap<Lead, Vec<f64>>,
}

impl LeadSampleMap {
    /// Build the map from recorded leads, deriving III, aVR, aVL and aVF
    /// whenever both I and II are present and dropping them otherwise.
    ///
    /// Derived values always come from I and II, replacing any copy the
    /// record carried, so `III = II - I` holds for every map with I and II.
    pub fn from_recorded(mut recorded: BTreeMap<Lead, Vec<f64>>) -> Self {
        let derived = match (recorded.get(&Lead::I), recorded.get(&Lead::II)) {
            (Some(one), Some(two)) => Some(derive_limb_leads(one, two)),
            _ => {
                let dropped: Vec<&str> = Lead::DERIVED
                    .iter()
                    .filter(|lead| recorded.remove(lead).is_some())
                    .map(|lead| lead.name())
                    .collect();
                log::warn!("lead I or II absent; limb leads not derived");
                if !dropped.is_empty() {
                    log::warn!("dropping recorded {} without I and II", dropped.join(", "));
                }
                None
            }
        };

        if let Some(derived) = derived {
            for (lead, samples) in derived {
                if recorded.insert(lead, samples).is_some() {
                    log::debug!("recorded lead {lead} superseded by derived values");
                }
            }
        }

        Self { leads: recorded }
    }

    pub fn get(&self, lead: Lead) -> Option<&[f64]> {
        self.leads.get(&lead).map(Vec::as_slice)
    }

    pub fn contains(&self, lead: Lead) -> bool {
        self.leads.contains_key(&lead)
    }

    pub fn len(&self) -> usize {
        self.leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }

    /// Leads present, in canonical order.
    pub fn leads(&self) -> impl Iterator<Item = Lead> + '_ {
        self.leads.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lead, &[f64])> {
        self.leads.iter().map(|(lead, samples)| (*lead, samples.as_slice()))
    }

    /// Canonical leads this map does not carry.
    pub fn missing(&self) -> Vec<Lead> {
        Lead::ALL
            .iter()
            .copied()
            .filter(|lead| !self.leads.contains_key(lead))
            .collect()
    }
}

/// Einthoven and Goldberger relations over the common prefix of I and II.
fn derive_limb_leads(one: &[f64], two: &[f64]) -> [(Lead, Vec<f64>); 4] {
    if one.len() != two.len() {
        log::warn!(
            "lead I has {} samples, lead II has {}; deriving over the shorter",
            one.len(),
            two.len()
        );
    }
    let pairs = || one.iter().zip(two.iter());
    [
        (Lead::III, pairs().map(|(i, ii)| ii - i).collect()),
        (Lead::AVR, pairs().map(|(i, ii)| -(i + ii) / 2.0).collect()),
        (Lead::AVL, pairs().map(|(i, ii)| i - ii / 2.0).collect()),
        (Lead::AVF, pairs().map(|(i, ii)| ii - i / 2.0).collect()),
    ]
}
