//! Model input assembly.
//!
//! Unlike the decoder, which refuses to invent derived leads, the builder
//! zero-fills any lead a model asks for but the record lacks: several
//! deployed models tolerate an empty channel, and the caller logs it.

use ndarray::{s, Array3, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::lead::Lead;
use crate::samples::{LeadSampleMap, NOMINAL_SAMPLES};

/// Ordered channel list a model was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Lead>", into = "Vec<Lead>")]
pub struct LeadLayout(Vec<Lead>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("lead layout is empty")]
    Empty,
    #[error("lead {0} listed twice in layout")]
    Duplicate(Lead),
}

impl LeadLayout {
    pub fn new(leads: Vec<Lead>) -> Result<Self, LayoutError> {
        if leads.is_empty() {
            return Err(LayoutError::Empty);
        }
        for (i, lead) in leads.iter().enumerate() {
            if leads[..i].contains(lead) {
                return Err(LayoutError::Duplicate(*lead));
            }
        }
        Ok(Self(leads))
    }

    /// All twelve leads in clinical order (ST-elevation detector).
    pub fn stemi() -> Self {
        Self(Lead::ALL.to_vec())
    }

    /// Limb leads I, II and the precordial leads (rhythm classifier).
    pub fn rhythm() -> Self {
        Self(vec![
            Lead::I,
            Lead::II,
            Lead::V1,
            Lead::V2,
            Lead::V3,
            Lead::V4,
            Lead::V5,
            Lead::V6,
        ])
    }

    pub fn leads(&self) -> &[Lead] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<Lead>> for LeadLayout {
    type Error = LayoutError;

    fn try_from(leads: Vec<Lead>) -> Result<Self, Self::Error> {
        LeadLayout::new(leads)
    }
}

impl From<LeadLayout> for Vec<Lead> {
    fn from(layout: LeadLayout) -> Self {
        layout.0
    }
}

/// `(1, samples, leads)` float32 tensor for a single inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInputTensor {
    data: Array3<f32>,
    layout: LeadLayout,
    missing: Vec<Lead>,
}

impl ModelInputTensor {
    pub fn shape(&self) -> [usize; 3] {
        let (batch, samples, leads) = self.data.dim();
        [batch, samples, leads]
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn layout(&self) -> &LeadLayout {
        &self.layout
    }

    /// Leads that were absent and zero-filled.
    pub fn missing(&self) -> &[Lead] {
        &self.missing
    }

    /// Channel `index` of the layout as a sample column.
    pub fn channel(&self, index: usize) -> ArrayView1<'_, f32> {
        self.data.slice(s![0, .., index])
    }

    /// Row-major values, the wire order of the tensor protocol.
    pub fn to_flat_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

/// Arrange `samples` into the channel order of `layout`, truncating or
/// right-padding each lead with zeros to `target_len`.
pub fn build_tensor(
    samples: &LeadSampleMap,
    layout: &LeadLayout,
    target_len: usize,
) -> ModelInputTensor {
    let mut data = Array3::<f32>::zeros((1, target_len, layout.len()));
    let mut missing = Vec::new();

    for (channel, &lead) in layout.leads().iter().enumerate() {
        let Some(values) = samples.get(lead) else {
            missing.push(lead);
            continue;
        };
        let take = values.len().min(target_len);
        if values.len() < target_len {
            log::debug!(
                "lead {lead}: {} samples, zero-padding to {target_len}",
                values.len()
            );
        }
        let mut column = data.slice_mut(s![0, ..take, channel]);
        for (dst, &src) in column.iter_mut().zip(values.iter()) {
            *dst = src as f32;
        }
    }

    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|lead| lead.name()).collect();
        log::warn!("zero-filling absent leads: {}", names.join(", "));
    }

    ModelInputTensor {
        data,
        layout: layout.clone(),
        missing,
    }
}

/// [`build_tensor`] at the nominal 10-second length.
pub fn build_nominal_tensor(samples: &LeadSampleMap, layout: &LeadLayout) -> ModelInputTensor {
    build_tensor(samples, layout, NOMINAL_SAMPLES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn map(leads: &[(Lead, Vec<f64>)]) -> LeadSampleMap {
        LeadSampleMap::from_recorded(leads.iter().cloned().collect::<BTreeMap<_, _>>())
    }

    #[test]
    fn truncates_and_pads() {
        let samples = map(&[(Lead::V1, vec![1.0; 10]), (Lead::V2, vec![2.0; 3])]);
        let layout = LeadLayout::new(vec![Lead::V2, Lead::V1]).unwrap();
        let tensor = build_tensor(&samples, &layout, 5);
        assert_eq!(tensor.shape(), [1, 5, 2]);
        assert_eq!(tensor.channel(0).to_vec(), vec![2.0, 2.0, 2.0, 0.0, 0.0]);
        assert_eq!(tensor.channel(1).to_vec(), vec![1.0; 5]);
        assert!(tensor.missing().is_empty());
    }

    #[test]
    fn absent_lead_is_zero_channel() {
        let samples = map(&[(Lead::V1, vec![1.0; 4])]);
        let tensor = build_tensor(&samples, &LeadLayout::rhythm(), 4);
        assert_eq!(tensor.shape(), [1, 4, 8]);
        assert_eq!(tensor.channel(0).to_vec(), vec![0.0; 4]);
        assert_eq!(tensor.missing().len(), 7);
    }

    #[test]
    fn flat_order_is_sample_major() {
        let samples = map(&[(Lead::V1, vec![1.0, 3.0]), (Lead::V2, vec![2.0, 4.0])]);
        let layout = LeadLayout::new(vec![Lead::V1, Lead::V2]).unwrap();
        let tensor = build_tensor(&samples, &layout, 2);
        assert_eq!(tensor.to_flat_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn layout_rejects_duplicates() {
        assert_eq!(
            LeadLayout::new(vec![Lead::I, Lead::I]),
            Err(LayoutError::Duplicate(Lead::I))
        );
        assert_eq!(LeadLayout::new(vec![]), Err(LayoutError::Empty));
    }

    #[test]
    fn layouts_differ_per_model() {
        assert_eq!(LeadLayout::stemi().len(), 12);
        assert_eq!(LeadLayout::rhythm().leads()[2], Lead::V1);
        assert_ne!(LeadLayout::stemi(), LeadLayout::rhythm());
    }
}
