//! Served model descriptions and output decoding.

use serde::{Deserialize, Serialize};

use crate::error::InferError;
use crate::protocol::{ModelMetadata, OutputTensor, TensorMetadata};

/// How an output tensor is turned into a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputDecoding {
    /// Argmax over the flattened output, mapped through an ordered label table.
    Labeled { labels: Vec<String> },
    /// Binary detector: the confidence at the argmax is reported under one
    /// clinically fixed label, whatever the index.
    FixedLabel { label: String },
    /// Returned as numbers, unmodified.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    pub decoding: OutputDecoding,
}

/// Everything the client needs to address and interpret one served model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    /// Empty means the server's default version.
    #[serde(default)]
    pub version: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<OutputSpec>,
}

impl ModelSpec {
    /// Single-input model with one labeled classification output.
    pub fn labeled(
        name: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        labels: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            inputs: vec![input.into()],
            outputs: vec![OutputSpec {
                name: output.into(),
                decoding: OutputDecoding::Labeled { labels },
            }],
        }
    }

    /// Single-input binary detector reporting under `label`.
    pub fn fixed_label(
        name: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            inputs: vec![input.into()],
            outputs: vec![OutputSpec {
                name: output.into(),
                decoding: OutputDecoding::FixedLabel { label: label.into() },
            }],
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Align tensor names with what the server declares for this model.
    ///
    /// Configured names the server declares are kept. A list the server
    /// does not recognise is replaced by the served names in order when the
    /// counts agree, and rejected otherwise. An empty served list declares
    /// nothing and leaves the configured names as they are.
    pub fn bind_served(&mut self, served: &ModelMetadata) -> Result<(), InferError> {
        if let Some(names) = reconcile(&self.name, "input", &self.inputs, &served.inputs)? {
            self.inputs = names;
        }
        let configured: Vec<String> =
            self.outputs.iter().map(|output| output.name.clone()).collect();
        if let Some(names) = reconcile(&self.name, "output", &configured, &served.outputs)? {
            for (output, name) in self.outputs.iter_mut().zip(names) {
                output.name = name;
            }
        }
        Ok(())
    }
}

fn reconcile(
    model: &str,
    kind: &str,
    configured: &[String],
    served: &[TensorMetadata],
) -> Result<Option<Vec<String>>, InferError> {
    if served.is_empty() || configured.iter().all(|name| served.iter().any(|t| &t.name == name)) {
        return Ok(None);
    }
    let served: Vec<String> = served.iter().map(|tensor| tensor.name.clone()).collect();
    if served.len() != configured.len() {
        return Err(InferError::Protocol(format!(
            "model `{model}` serves {kind}s [{}] but [{}] are configured",
            served.join(", "),
            configured.join(", ")
        )));
    }
    log::warn!(
        "model `{model}` serves {kind}s [{}], using them instead of [{}]",
        served.join(", "),
        configured.join(", ")
    );
    Ok(Some(served))
}

/// A single (label, confidence) classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Prediction(Prediction),
    Raw {
        name: String,
        shape: Vec<usize>,
        data: Vec<f64>,
    },
}

impl ModelOutput {
    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            ModelOutput::Prediction(prediction) => Some(prediction),
            ModelOutput::Raw { .. } => None,
        }
    }
}

/// Index and value of the first maximum.
fn argmax(name: &str, values: &[f64]) -> Result<(usize, f64), InferError> {
    if values.is_empty() {
        return Err(InferError::Protocol(format!("output `{name}` is empty")));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(InferError::Protocol(format!("output `{name}` contains NaN")));
    }
    let mut best = (0, values[0]);
    for (index, &value) in values.iter().enumerate().skip(1) {
        if value > best.1 {
            best = (index, value);
        }
    }
    Ok(best)
}

pub(crate) fn decode_output(
    spec: &OutputSpec,
    tensor: OutputTensor,
) -> Result<ModelOutput, InferError> {
    match &spec.decoding {
        OutputDecoding::Raw => Ok(ModelOutput::Raw {
            name: tensor.name,
            shape: tensor.shape,
            data: tensor.data,
        }),
        OutputDecoding::FixedLabel { label } => {
            let (_, confidence) = argmax(&spec.name, &tensor.data)?;
            Ok(ModelOutput::Prediction(Prediction {
                label: label.clone(),
                confidence,
            }))
        }
        OutputDecoding::Labeled { labels } => {
            if labels.len() != tensor.data.len() {
                log::warn!(
                    "output `{}` has width {} but {} labels are configured",
                    spec.name,
                    tensor.data.len(),
                    labels.len()
                );
            }
            let (index, confidence) = argmax(&spec.name, &tensor.data)?;
            let label = labels
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("Class_{index}"));
            Ok(ModelOutput::Prediction(Prediction { label, confidence }))
        }
    }
}
