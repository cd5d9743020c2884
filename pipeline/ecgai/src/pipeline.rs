//! One record in, one report out.
//!
//! The ST-elevation detector is the primary path: its failure, or a record
//! that does not decode, aborts the run. The rhythm classifier and the
//! renderer are secondary and only ever degrade the report.

use std::time::Duration;

use ecgai_infer::{
    Classifier, HttpTransport, InferError, InferenceClient, InferenceTransport, SubModel,
};
use ecgai_render::{render, RenderOptions};
use ecgai_report::{
    synthesize, AlertPolicy, CodingTables, DiagnosticReport, Language, NoAlert, ReportContext,
    RhythmOutcome, StemiOutcome, Threshold,
};
use ecgai_waveform::{decode, DecodedRecord, EcgSchema, FormatError, Lead};

use crate::config::{Config, ConfigError, ModelConfig};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid ECG record: {0}")]
    Format(#[from] FormatError),

    #[error("model `{model}`: {source}")]
    Inference {
        model: String,
        #[source]
        source: InferError,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl PipelineError {
    /// Stable identifier for terminal handling upstream.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Format(_) => "format",
            PipelineError::Inference { source, .. } if source.is_service_unavailable() => {
                "service-unavailable"
            }
            PipelineError::Inference { .. } => "inference",
            PipelineError::Configuration(_) => "configuration",
        }
    }

    /// The input itself is at fault; resubmitting it cannot succeed.
    pub fn is_entered_in_error(&self) -> bool {
        matches!(self, PipelineError::Format(_))
    }
}

/// The secondary classifier, or why it could not be set up.
pub enum RhythmStage {
    Ready(Box<dyn Classifier>),
    Unavailable { model: String, reason: String },
}

impl RhythmStage {
    pub fn is_ready(&self) -> bool {
        matches!(self, RhythmStage::Ready(_))
    }
}

pub struct EcgPipeline {
    stemi: Box<dyn Classifier>,
    rhythm: RhythmStage,
    tables: CodingTables,
    threshold: Threshold,
    render: RenderOptions,
    alert: Box<dyn AlertPolicy>,
}

impl EcgPipeline {
    pub fn new(
        stemi: Box<dyn Classifier>,
        rhythm: RhythmStage,
        tables: CodingTables,
        threshold: Threshold,
    ) -> Self {
        Self {
            stemi,
            rhythm,
            tables,
            threshold,
            render: RenderOptions::default(),
            alert: Box::new(NoAlert),
        }
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    pub fn with_alert_policy(mut self, alert: Box<dyn AlertPolicy>) -> Self {
        self.alert = alert;
        self
    }

    /// Connect both sub-models over HTTP as configured.
    pub fn connect(config: &Config) -> Result<Self, PipelineError> {
        let timeout = config.inference.timeout_secs.map(Duration::from_secs);
        let transport = HttpTransport::new(&config.inference.url, timeout)
            .map_err(|e| ConfigError::Invalid(format!("inference.url: {e}")))?;
        log::info!("inference endpoint {}", transport.base_url());
        Self::connect_with(config, transport)
    }

    /// Connect both sub-models through `transport`.
    ///
    /// A readiness failure of the ST-elevation model is an error; one of
    /// the rhythm model leaves the pipeline running without it.
    pub fn connect_with<T>(config: &Config, transport: T) -> Result<Self, PipelineError>
    where
        T: InferenceTransport + Clone + 'static,
    {
        config.validate()?;
        let tables = config.load_tables()?;
        let render = config.render_options()?;

        let stemi = sub_model(&config.stemi, transport.clone())?.map_err(|source| {
            PipelineError::Inference {
                model: config.stemi.name.clone(),
                source,
            }
        })?;

        let rhythm = match sub_model(&config.rhythm, transport)? {
            Ok(model) => RhythmStage::Ready(model),
            Err(e) => {
                log::warn!("rhythm model `{}` unavailable: {e}", config.rhythm.name);
                RhythmStage::Unavailable {
                    model: config.rhythm.name.clone(),
                    reason: e.to_string(),
                }
            }
        };

        Ok(Self::new(stemi, rhythm, tables, config.threshold()?).with_render_options(render))
    }

    pub fn rhythm_stage(&self) -> &RhythmStage {
        &self.rhythm
    }

    /// Decode `bytes` and analyse the record.
    pub fn run(
        &self,
        bytes: &[u8],
        schema: EcgSchema,
        language: Language,
    ) -> Result<DiagnosticReport, PipelineError> {
        let record = decode(bytes, schema)?;
        self.analyze(&record, language)
    }

    pub fn analyze(
        &self,
        record: &DecodedRecord,
        language: Language,
    ) -> Result<DiagnosticReport, PipelineError> {
        if record.machine_flags_stemi() {
            log::info!("acquiring device flagged STEMI in its own interpretation");
        }

        let stemi = self
            .stemi
            .classify(&record.samples)
            .map_err(|source| PipelineError::Inference {
                model: self.stemi.model_name().to_string(),
                source,
            })?;

        let rhythm = match &self.rhythm {
            RhythmStage::Ready(model) => match model.classify(&record.samples) {
                Ok(prediction) => RhythmOutcome::Classified {
                    model: model.model_name().to_string(),
                    prediction,
                },
                Err(e) => RhythmOutcome::Unavailable {
                    model: model.model_name().to_string(),
                    reason: e.to_string(),
                },
            },
            RhythmStage::Unavailable { model, reason } => RhythmOutcome::Unavailable {
                model: model.clone(),
                reason: reason.clone(),
            },
        };

        let ctx = ReportContext {
            tables: &self.tables,
            threshold: self.threshold,
            language,
            alert: self.alert.as_ref(),
        };
        let mut report = synthesize(
            &ctx,
            StemiOutcome {
                model: self.stemi.model_name().to_string(),
                prediction: stemi,
            },
            rhythm,
        );

        match render(&record.samples, &self.render) {
            Ok(rendered) => report.attach_image(rendered.png, rendered.missing),
            Err(e) => {
                log::warn!("rendering failed, report carries no image: {e}");
                report.attach_image(Vec::new(), Lead::ALL.to_vec());
            }
        }
        Ok(report)
    }
}

/// Handshake one model. The outer error is configuration, the inner one
/// the remote service.
fn sub_model<T>(
    config: &ModelConfig,
    transport: T,
) -> Result<Result<Box<dyn Classifier>, InferError>, ConfigError>
where
    T: InferenceTransport + 'static,
{
    let layout = config.layout()?;
    Ok(InferenceClient::connect(transport, config.spec()).map(|client| {
        Box::new(SubModel::new(client, layout, config.target_len)) as Box<dyn Classifier>
    }))
}
