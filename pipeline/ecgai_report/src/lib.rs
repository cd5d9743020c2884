//! Turns sub-model predictions into a calibrated, coded, bilingual report.

pub mod calibration;
pub mod coding;
pub mod error;
pub mod narrative;
pub mod synth;

pub use calibration::{
    format_percent, format_rhythm_confidence, Threshold, Verdict, RHYTHM_DISPLAY_CLAMP,
};
pub use coding::{Coding, CodingTables, RhythmEntry, ICD10_SYSTEM, LOINC_SYSTEM};
pub use error::{CalibrationError, TableError};
pub use narrative::{compose, Language, RhythmSection, UnknownLanguage};
pub use synth::{
    synthesize, AlertPolicy, Degradation, DiagnosticReport, Finding, Interpretation, NoAlert,
    ReportContext, RhythmOutcome, StemiOutcome,
};
