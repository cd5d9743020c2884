//! Pipeline configuration: TOML file, then environment overrides.
//!
//! Every field has a default matching the deployed models, so an empty
//! file (or no file) is a valid configuration.

use std::path::{Path, PathBuf};

use ecgai_infer::{ModelSpec, OutputDecoding, OutputSpec};
use ecgai_render::{LabelFont, RenderOptions};
use ecgai_report::{CodingTables, Language, Threshold};
use ecgai_waveform::{Lead, LeadLayout, NOMINAL_SAMPLES};
use serde::{Deserialize, Serialize};

pub const ENV_INFERENCE_URL: &str = "ECGAI_INFERENCE_URL";
pub const ENV_TIMEOUT_SECS: &str = "ECGAI_TIMEOUT_SECS";
pub const ENV_STEMI_THRESHOLD: &str = "ECGAI_STEMI_THRESHOLD";
pub const ENV_FONT_PATH: &str = "ECGAI_FONT_PATH";
pub const ENV_TABLES_PATH: &str = "ECGAI_TABLES_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// Base URL of the KServe v2 endpoint.
    pub url: String,
    pub timeout_secs: Option<u64>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".into(),
            timeout_secs: Some(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub input: String,
    pub output: String,
    pub decoding: OutputDecoding,
    pub leads: Vec<Lead>,
    #[serde(default = "default_target_len")]
    pub target_len: usize,
}

fn default_target_len() -> usize {
    NOMINAL_SAMPLES
}

impl ModelConfig {
    pub fn stemi() -> Self {
        Self {
            name: "ecg_stemi_by".into(),
            version: String::new(),
            input: "input_1".into(),
            output: "dense_1/Sigmoid".into(),
            decoding: OutputDecoding::FixedLabel { label: "STEMI".into() },
            leads: LeadLayout::stemi().into(),
            target_len: NOMINAL_SAMPLES,
        }
    }

    pub fn rhythm() -> Self {
        let labels = [
            "AFIB", "BIGEMINY", "EAR", "AFL", "CHB", "NSR", "FRAV", "SECAV1", "VPB", "APB", "ST",
            "PSVT",
        ];
        Self {
            name: "ecg_multicat12".into(),
            version: String::new(),
            input: "input_1".into(),
            output: "dense_1/Softmax".into(),
            decoding: OutputDecoding::Labeled {
                labels: labels.iter().map(|s| s.to_string()).collect(),
            },
            leads: LeadLayout::rhythm().into(),
            target_len: NOMINAL_SAMPLES,
        }
    }

    pub fn spec(&self) -> ModelSpec {
        ModelSpec {
            name: self.name.clone(),
            version: self.version.clone(),
            inputs: vec![self.input.clone()],
            outputs: vec![OutputSpec {
                name: self.output.clone(),
                decoding: self.decoding.clone(),
            }],
        }
    }

    pub fn layout(&self) -> Result<LeadLayout, ConfigError> {
        LeadLayout::new(self.leads.clone())
            .map_err(|e| ConfigError::Invalid(format!("model `{}`: {e}", self.name)))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("model name is empty".into()));
        }
        if self.target_len == 0 {
            return Err(ConfigError::Invalid(format!(
                "model `{}`: target_len must be positive",
                self.name
            )));
        }
        if let OutputDecoding::Labeled { labels } = &self.decoding {
            if labels.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "model `{}`: label table is empty",
                    self.name
                )));
            }
        }
        self.layout().map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub threshold: f64,
    pub language: Language,
    /// JSON coding tables replacing the built-in ones.
    pub tables_path: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            threshold: Threshold::DEFAULT.value(),
            language: Language::default(),
            tables_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// TrueType font for lead labels and the report sheet, replacing the
    /// bundled DejaVu Sans.
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub inference: InferenceConfig,
    pub stemi: ModelConfig,
    pub rhythm: ModelConfig,
    pub report: ReportConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inference: InferenceConfig::default(),
            stemi: ModelConfig::stemi(),
            rhythm: ModelConfig::rhythm(),
            report: ReportConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// File (if any), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `ECGAI_*` overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = var(ENV_INFERENCE_URL) {
            self.inference.url = url;
        }
        if let Some(raw) = var(ENV_TIMEOUT_SECS) {
            let secs = raw.parse::<u64>().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_TIMEOUT_SECS}=`{raw}` is not a whole number"))
            })?;
            self.inference.timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(raw) = var(ENV_STEMI_THRESHOLD) {
            self.report.threshold = raw.parse::<f64>().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_STEMI_THRESHOLD}=`{raw}` is not a number"))
            })?;
        }
        if let Some(path) = var(ENV_FONT_PATH) {
            self.render.font_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var(ENV_TABLES_PATH) {
            self.report.tables_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inference.url.trim().is_empty() {
            return Err(ConfigError::Invalid("inference.url is empty".into()));
        }
        self.threshold()?;
        self.stemi.validate()?;
        self.rhythm.validate()?;
        if self.stemi.name == self.rhythm.name && self.stemi.version == self.rhythm.version {
            return Err(ConfigError::Invalid(format!(
                "stemi and rhythm both name model `{}`",
                self.stemi.name
            )));
        }
        Ok(())
    }

    pub fn threshold(&self) -> Result<Threshold, ConfigError> {
        Threshold::new(self.report.threshold)
            .map_err(|e| ConfigError::Invalid(format!("report.threshold: {e}")))
    }

    pub fn load_tables(&self) -> Result<CodingTables, ConfigError> {
        match &self.report.tables_path {
            Some(path) => CodingTables::from_json_path(path)
                .map_err(|e| ConfigError::Invalid(e.to_string())),
            None => Ok(CodingTables::builtin()),
        }
    }

    /// The configured font, or the bundled one when no path is set.
    pub fn load_font(&self) -> Result<Option<LabelFont>, ConfigError> {
        match &self.render.font_path {
            Some(path) => LabelFont::from_path(path)
                .map(Some)
                .map_err(|e| ConfigError::Invalid(e.to_string())),
            None => Ok(LabelFont::bundled()
                .map_err(|e| log::warn!("{e}; lead labels disabled"))
                .ok()),
        }
    }

    pub fn render_options(&self) -> Result<RenderOptions, ConfigError> {
        Ok(RenderOptions {
            font: self.load_font()?,
        })
    }
}
