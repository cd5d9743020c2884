//! Rhythm label lookup tables: external codes and display names.
//!
//! The tables are loaded once at startup (built in, or replaced from a JSON
//! file) and passed by reference; nothing here is global.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::narrative::Language;

pub const ICD10_SYSTEM: &str = "http://hl7.org/fhir/sid/icd-10";
pub const LOINC_SYSTEM: &str = "http://loinc.org";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    pub system: String,
    pub code: String,
    pub display: String,
}

impl Coding {
    pub fn icd10(code: &str, display: &str) -> Self {
        Self {
            system: ICD10_SYSTEM.to_string(),
            code: code.to_string(),
            display: display.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhythmEntry {
    pub name_en: String,
    pub name_zh: String,
    #[serde(default)]
    pub codes: Vec<Coding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingTables {
    /// Label of the normal class, coded with `normal_coding` only.
    pub normal_label: String,
    pub normal_coding: Coding,
    pub rhythms: BTreeMap<String, RhythmEntry>,
}

impl CodingTables {
    pub fn builtin() -> Self {
        let icd = Coding::icd10;
        let entries = [
            (
                "AFIB",
                "Atrial Fibrillation",
                "心房顫動",
                vec![
                    icd("I48.0", "Paroxysmal atrial fibrillation"),
                    icd("I48.1", "Persistent atrial fibrillation"),
                    icd("I48.2", "Chronic atrial fibrillation"),
                ],
            ),
            (
                "AFL",
                "Atrial Flutter",
                "心房撲動",
                vec![
                    icd("I48.3", "Typical atrial flutter"),
                    icd("I48.4", "Atypical atrial flutter"),
                ],
            ),
            (
                "APB",
                "Atrial Premature Beat",
                "心房早期收縮",
                vec![icd("I49.1", "Atrial fibrillation and flutter")],
            ),
            (
                "BIGEMINY",
                "Ventricular Bigeminy",
                "心室二聯律",
                vec![icd("R00.8", "Other abnormalities of heart beat")],
            ),
            (
                "CHB",
                "Complete Heart Block",
                "完全性房室傳導阻滯",
                vec![icd("I44.2", "Atrioventricular block, complete")],
            ),
            (
                "EAR",
                "Ectopic Atrial Rhythm",
                "異位性心房節律",
                vec![icd("I49.8", "Other specified cardiac arrhythmias")],
            ),
            (
                "FRAV",
                "First Degree AV Block",
                "一度房室傳導阻滯",
                vec![icd("I44.0", "Atrioventricular block, first degree")],
            ),
            ("NSR", "Normal Sinus Rhythm", "正常竇性心律", Vec::new()),
            (
                "PSVT",
                "Paroxysmal Supraventricular Tachycardia",
                "陣發性上心室頻脈",
                vec![
                    icd("I47.1", "Supraventricular tachycardia"),
                    icd("I47.2", "Ventricular tachycardia"),
                    icd("I47.9", "Paroxysmal tachycardia, unspecified"),
                ],
            ),
            (
                "SAV",
                "Second Degree AV Block",
                "二度房室傳導阻滯",
                vec![icd("I44.1", "Atrioventricular block, second degree")],
            ),
            (
                "ST",
                "Sinus Tachycardia",
                "竇性頻脈",
                vec![icd("R00.0", "Tachycardia, unspecified")],
            ),
            (
                "VPB",
                "Ventricular Premature Beat",
                "心室早期收縮",
                vec![icd("I49.3", "Ventricular premature depolarization")],
            ),
            (
                "SECAV1",
                "Second Degree AV Block Type 1",
                "二度一型房室傳導阻滯",
                vec![icd("I44.1", "Atrioventricular block, second degree")],
            ),
        ];

        let rhythms = entries
            .into_iter()
            .map(|(label, en, zh, codes)| {
                (
                    label.to_string(),
                    RhythmEntry {
                        name_en: en.to_string(),
                        name_zh: zh.to_string(),
                        codes,
                    },
                )
            })
            .collect();

        Self {
            normal_label: "NSR".into(),
            normal_coding: Coding {
                system: LOINC_SYSTEM.into(),
                code: "LA25095-3".into(),
                display: "Normal Sinus Rhythm".into(),
            },
            rhythms,
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, TableError> {
        let tables: CodingTables = serde_json::from_str(text)?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tables = Self::from_json_str(&text)?;
        log::info!("loaded {} rhythm entries from {}", tables.rhythms.len(), path.display());
        Ok(tables)
    }

    fn validate(&self) -> Result<(), TableError> {
        if self.normal_label.trim().is_empty() {
            return Err(TableError::Invalid("normal_label is empty".into()));
        }
        for (label, entry) in &self.rhythms {
            if label != &self.normal_label && entry.codes.is_empty() {
                return Err(TableError::Invalid(format!("rhythm `{label}` has no codes")));
            }
        }
        Ok(())
    }

    pub fn is_normal(&self, label: &str) -> bool {
        label == self.normal_label
    }

    /// External codes for `label`: the normal-rhythm code for the normal
    /// class, the ordered code list otherwise, empty if unknown.
    pub fn codings(&self, label: &str) -> Vec<Coding> {
        if self.is_normal(label) {
            return vec![self.normal_coding.clone()];
        }
        self.rhythms
            .get(label)
            .map(|entry| entry.codes.clone())
            .unwrap_or_default()
    }

    /// Reader-facing name; unknown labels are shown as-is.
    pub fn display_name<'a>(&'a self, label: &'a str, language: Language) -> &'a str {
        match self.rhythms.get(label) {
            Some(entry) => match language {
                Language::English => &entry.name_en,
                Language::TraditionalChinese => &entry.name_zh,
            },
            None => label,
        }
    }
}

impl Default for CodingTables {
    fn default() -> Self {
        Self::builtin()
    }
}
