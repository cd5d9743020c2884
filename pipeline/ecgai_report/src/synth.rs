//! Report synthesis: merges the two sub-model results into one report.
//!
//! The ST-elevation prediction is required. The rhythm result may be
//! missing, in which case the report carries only the ST-elevation section
//! and records a [`Degradation::PartialAnalysisUnavailable`].

use ecgai_infer::Prediction;
use ecgai_waveform::Lead;
use serde::Serialize;

use crate::calibration::{round2, Threshold, Verdict};
use crate::coding::{Coding, CodingTables};
use crate::narrative::{compose, Language, RhythmSection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Interpretation {
    Abnormal,
    Normal,
}

impl Interpretation {
    pub fn code(self) -> &'static str {
        match self {
            Interpretation::Abnormal => "A",
            Interpretation::Normal => "N",
        }
    }

    fn at_least_half(value: f64) -> Self {
        if value >= 0.5 {
            Interpretation::Abnormal
        } else {
            Interpretation::Normal
        }
    }
}

/// One coded observation per sub-model, for the document-assembly step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub model: String,
    pub label: String,
    pub codings: Vec<Coding>,
    pub interpretation: Interpretation,
    pub value_percent: f64,
}

/// A non-fatal gap in the analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Degradation {
    PartialAnalysisUnavailable { model: String, reason: String },
    RenderingDegraded { missing: Vec<Lead> },
}

/// Decides the emergency alert flag.
pub trait AlertPolicy: Send + Sync {
    fn should_alert(&self, findings: &[Finding]) -> bool;
}

/// Never raises the alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAlert;

impl AlertPolicy for NoAlert {
    fn should_alert(&self, _findings: &[Finding]) -> bool {
        false
    }
}

/// Outcome of the secondary sub-model.
#[derive(Debug, Clone, PartialEq)]
pub enum RhythmOutcome {
    Classified { model: String, prediction: Prediction },
    Unavailable { model: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StemiOutcome {
    pub model: String,
    pub prediction: Prediction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    /// Encoded PNG; empty when rendering failed.
    #[serde(skip)]
    pub image: Vec<u8>,
    pub narrative: String,
    /// Raw (label, confidence) of every sub-model that answered, rhythm first.
    pub results: Vec<Prediction>,
    pub alert: bool,
    pub stemi: Verdict,
    pub findings: Vec<Finding>,
    pub degradations: Vec<Degradation>,
}

impl DiagnosticReport {
    /// `(image, narrative, results, alert)` for the document-assembly step.
    pub fn into_parts(self) -> (Vec<u8>, String, Vec<Prediction>, bool) {
        (self.image, self.narrative, self.results, self.alert)
    }

    pub fn rhythm_available(&self) -> bool {
        !self
            .degradations
            .iter()
            .any(|d| matches!(d, Degradation::PartialAnalysisUnavailable { .. }))
    }

    /// Attach the rendered trace, recording leads it could not draw.
    pub fn attach_image(&mut self, png: Vec<u8>, missing: Vec<Lead>) {
        self.image = png;
        if !missing.is_empty() {
            self.degradations.push(Degradation::RenderingDegraded { missing });
        }
    }
}

/// Read-only inputs shared by every synthesis.
pub struct ReportContext<'a> {
    pub tables: &'a CodingTables,
    pub threshold: Threshold,
    pub language: Language,
    pub alert: &'a dyn AlertPolicy,
}

pub fn synthesize(
    ctx: &ReportContext<'_>,
    stemi: StemiOutcome,
    rhythm: RhythmOutcome,
) -> DiagnosticReport {
    let verdict = ctx.threshold.recalibrate(stemi.prediction.confidence);
    let mut findings = Vec::with_capacity(2);
    let mut results = Vec::with_capacity(2);
    let mut degradations = Vec::new();

    let section = match &rhythm {
        RhythmOutcome::Classified { model, prediction } => {
            findings.push(rhythm_finding(ctx.tables, model, prediction));
            results.push(prediction.clone());
            RhythmSection::Classified {
                label: &prediction.label,
                confidence: prediction.confidence,
            }
        }
        RhythmOutcome::Unavailable { model, reason } => {
            log::warn!("rhythm analysis unavailable ({model}): {reason}");
            degradations.push(Degradation::PartialAnalysisUnavailable {
                model: model.clone(),
                reason: reason.clone(),
            });
            RhythmSection::Unavailable { reason }
        }
    };
    let narrative = compose(ctx.language, ctx.tables, section, &verdict);

    findings.push(Finding {
        model: stemi.model,
        label: stemi.prediction.label.clone(),
        codings: Vec::new(),
        interpretation: if verdict.positive {
            Interpretation::Abnormal
        } else {
            Interpretation::Normal
        },
        value_percent: verdict.percent(),
    });
    results.push(stemi.prediction);

    let alert = ctx.alert.should_alert(&findings);
    DiagnosticReport {
        image: Vec::new(),
        narrative,
        results,
        alert,
        stemi: verdict,
        findings,
        degradations,
    }
}

fn rhythm_finding(tables: &CodingTables, model: &str, prediction: &Prediction) -> Finding {
    let normal = tables.is_normal(&prediction.label);
    let value_percent = prediction.confidence * 100.0;
    Finding {
        model: model.to_string(),
        label: prediction.label.clone(),
        codings: tables.codings(&prediction.label),
        interpretation: if normal {
            Interpretation::Normal
        } else {
            Interpretation::at_least_half(prediction.confidence)
        },
        value_percent: if normal { round2(value_percent) } else { value_percent },
    }
}
