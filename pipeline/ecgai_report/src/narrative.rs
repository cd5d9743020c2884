//! Reader-facing report text in English or Traditional Chinese.
//!
//! Output is a pure function of its inputs: no timestamps, no locale
//! lookups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calibration::{format_percent, format_rhythm_confidence, Verdict};
use crate::coding::CodingTables;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "zh-TW")]
    TraditionalChinese,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::TraditionalChinese => "zh-TW",
        }
    }

    fn phrases(self) -> &'static Phrases {
        match self {
            Language::English => &ENGLISH,
            Language::TraditionalChinese => &CHINESE,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported report language `{0}` (expected en or zh-TW)")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "en" | "en-us" | "english" => Ok(Language::English),
            "zh" | "zh-tw" | "zh-hant" | "tw" => Ok(Language::TraditionalChinese),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

struct Phrases {
    title: &'static str,
    rhythm_heading: &'static str,
    rhythm: &'static str,
    rhythm_unavailable: &'static str,
    stemi_heading: &'static str,
    result: &'static str,
    confidence: &'static str,
    recommendation: &'static str,
    stemi_positive: &'static str,
    stemi_negative: &'static str,
    advice_positive: &'static str,
    advice_negative: &'static str,
    notes_heading: &'static str,
    disclaimers: [&'static str; 3],
}

static ENGLISH: Phrases = Phrases {
    title: "ECG AI-Assisted Analysis Report",
    rhythm_heading: "=== Rhythm Analysis ===",
    rhythm: "Rhythm",
    rhythm_unavailable: "Rhythm analysis unavailable",
    stemi_heading: "=== STEMI Analysis ===",
    result: "Result",
    confidence: "Confidence",
    recommendation: "Recommendation",
    stemi_positive: "Suspected ST-Elevation Myocardial Infarction (STEMI)",
    stemi_negative: "No ST-Elevation Myocardial Infarction (STEMI) detected",
    advice_positive: "Immediate cardiac catheterization recommended",
    advice_negative: "Please correlate with clinical symptoms and other examinations",
    notes_heading: "=== Notes ===",
    disclaimers: [
        "This result is for reference only and is not a basis for final diagnosis",
        "Interpret together with the patient's clinical symptoms",
        "Final diagnosis should be made by a qualified physician",
    ],
};

static CHINESE: Phrases = Phrases {
    title: "ECG AI 輔助分析報告",
    rhythm_heading: "=== 心律分析 ===",
    rhythm: "心律分析結果",
    rhythm_unavailable: "心律分析暫時無法提供",
    stemi_heading: "=== STEMI 分析 ===",
    result: "診斷結果",
    confidence: "信心度",
    recommendation: "建議",
    stemi_positive: "疑似急性ST段抬高型心肌梗塞 (STEMI)",
    stemi_negative: "未偵測到急性ST段抬高型心肌梗塞 (STEMI)",
    advice_positive: "建議立即進行心導管檢查和治療",
    advice_negative: "請結合臨床症狀和其他檢查進行綜合判斷",
    notes_heading: "=== 注意事項 ===",
    disclaimers: [
        "此結果僅供參考，不可作為最終診斷依據",
        "請結合患者臨床症狀進行綜合判斷",
        "建議由專業醫師進行最終診斷",
    ],
};

/// What the rhythm section reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RhythmSection<'a> {
    Classified { label: &'a str, confidence: f64 },
    Unavailable { reason: &'a str },
}

pub fn compose(
    language: Language,
    tables: &CodingTables,
    rhythm: RhythmSection<'_>,
    stemi: &Verdict,
) -> String {
    let p = language.phrases();
    let mut lines = vec![p.title.to_string(), String::new(), p.rhythm_heading.to_string()];

    match rhythm {
        RhythmSection::Classified { label, confidence } => {
            lines.push(format!(
                "{}: {} ({label})",
                p.rhythm,
                tables.display_name(label, language)
            ));
            lines.push(format!("{}: {}", p.confidence, format_rhythm_confidence(confidence)));
        }
        RhythmSection::Unavailable { reason } => {
            lines.push(format!("{}: {reason}", p.rhythm_unavailable));
        }
    }

    let (diagnosis, advice) = if stemi.positive {
        (p.stemi_positive, p.advice_positive)
    } else {
        (p.stemi_negative, p.advice_negative)
    };
    lines.push(String::new());
    lines.push(p.stemi_heading.to_string());
    lines.push(format!("{}: {diagnosis}", p.result));
    lines.push(format!("{}: {}", p.confidence, format_percent(stemi.display)));
    lines.push(format!("{}: {advice}", p.recommendation));

    lines.push(String::new());
    lines.push(p.notes_heading.to_string());
    lines.extend(p.disclaimers.iter().map(|line| format!("- {line}")));

    lines.join("\n")
}
