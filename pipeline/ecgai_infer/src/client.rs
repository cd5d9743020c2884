//! One client per served model.
//!
//! Construction performs the readiness handshake (server, then model) and
//! binds the configured tensor names to the served model declaration; a
//! client that exists has passed both once. Every later call is a single
//! blocking round trip with no retry.
//!
//! # Concurrency
//!
//! `InferenceClient<T>` is `Send + Sync` whenever `T` is, and holds no
//! mutable state. With [`HttpTransport`](crate::HttpTransport) concurrent
//! calls to [`InferenceClient::infer`] on one instance are allowed: the
//! pooled HTTP client issues them as independent requests. Transports that
//! cannot multiplex must serialise internally.

use ecgai_waveform::{build_tensor, LeadLayout, LeadSampleMap, ModelInputTensor};

use crate::error::{InferError, ReadinessStage};
use crate::model::{decode_output, ModelOutput, ModelSpec, Prediction};
use crate::protocol::{InferRequest, InputTensor, ModelMetadata, RequestedOutput};
use crate::transport::InferenceTransport;

#[derive(Debug)]
pub struct InferenceClient<T> {
    transport: T,
    spec: ModelSpec,
}

impl<T: InferenceTransport> InferenceClient<T> {
    /// Check that the server and then the model are ready, then reconcile
    /// the spec's tensor names with the served metadata.
    pub fn connect(transport: T, spec: ModelSpec) -> Result<Self, InferError> {
        if spec.inputs.is_empty() || spec.outputs.is_empty() {
            return Err(InferError::InvalidRequest(format!(
                "model `{}` declares no inputs or no outputs",
                spec.name
            )));
        }

        let unavailable = |stage, reason: String| InferError::ServiceUnavailable {
            model: spec.name.clone(),
            stage,
            reason,
        };

        match transport.server_ready() {
            Ok(true) => {}
            Ok(false) => {
                return Err(unavailable(ReadinessStage::Server, "server reports not ready".into()))
            }
            Err(e) => return Err(unavailable(ReadinessStage::Server, e.to_string())),
        }
        match transport.model_ready(&spec.name, &spec.version) {
            Ok(true) => {}
            Ok(false) => {
                return Err(unavailable(ReadinessStage::Model, "model reports not ready".into()))
            }
            Err(e) => return Err(unavailable(ReadinessStage::Model, e.to_string())),
        }

        let served = transport
            .model_metadata(&spec.name, &spec.version)
            .map_err(|e| unavailable(ReadinessStage::Model, format!("metadata unavailable: {e}")))?;
        let mut spec = spec;
        spec.bind_served(&served)?;

        log::info!("model `{}` ready", spec.name);
        Ok(Self { transport, spec })
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn metadata(&self) -> Result<ModelMetadata, InferError> {
        self.transport.model_metadata(&self.spec.name, &self.spec.version)
    }

    /// Send one tensor per declared input slot and decode every declared
    /// output, in declaration order.
    pub fn infer(&self, inputs: Vec<InputTensor>) -> Result<Vec<ModelOutput>, InferError> {
        for slot in &self.spec.inputs {
            if !inputs.iter().any(|input| &input.name == slot) {
                return Err(InferError::InvalidRequest(format!(
                    "model `{}` expects input `{slot}`",
                    self.spec.name
                )));
            }
        }
        if let Some(extra) = inputs.iter().find(|input| !self.spec.inputs.contains(&input.name)) {
            return Err(InferError::InvalidRequest(format!(
                "model `{}` has no input `{}`",
                self.spec.name, extra.name
            )));
        }

        let request = InferRequest {
            inputs,
            outputs: self
                .spec
                .outputs
                .iter()
                .map(|output| RequestedOutput {
                    name: output.name.clone(),
                })
                .collect(),
        };
        let mut response = self.transport.infer(&self.spec.name, &self.spec.version, &request)?;
        if !response.model_name.is_empty() && response.model_name != self.spec.name {
            log::warn!(
                "response names model `{}`, expected `{}`",
                response.model_name,
                self.spec.name
            );
        }

        self.spec
            .outputs
            .iter()
            .map(|output| {
                let at = response
                    .outputs
                    .iter()
                    .position(|tensor| tensor.name == output.name)
                    .ok_or_else(|| {
                        InferError::Protocol(format!(
                            "model `{}` returned no output `{}`",
                            self.spec.name, output.name
                        ))
                    })?;
                decode_output(output, response.outputs.swap_remove(at))
            })
            .collect()
    }

    /// Run a single-input model on `tensor` and return its first prediction.
    pub fn classify(&self, tensor: &ModelInputTensor) -> Result<Prediction, InferError> {
        let [input] = self.spec.inputs.as_slice() else {
            return Err(InferError::InvalidRequest(format!(
                "model `{}` takes {} inputs, classify needs exactly one",
                self.spec.name,
                self.spec.inputs.len()
            )));
        };
        let input = InputTensor::new(input.clone(), tensor.shape().to_vec(), tensor.to_flat_vec())?;
        self.infer(vec![input])?
            .into_iter()
            .find_map(|output| match output {
                ModelOutput::Prediction(prediction) => Some(prediction),
                ModelOutput::Raw { .. } => None,
            })
            .ok_or_else(|| {
                InferError::InvalidRequest(format!(
                    "model `{}` has no classification output",
                    self.spec.name
                ))
            })
    }
}

/// A sub-model that turns a lead map into a single prediction.
pub trait Classifier: Send + Sync {
    fn model_name(&self) -> &str;

    fn classify(&self, samples: &LeadSampleMap) -> Result<Prediction, InferError>;
}

/// A connected client plus the lead layout and length it was trained on.
#[derive(Debug)]
pub struct SubModel<T> {
    client: InferenceClient<T>,
    layout: LeadLayout,
    target_len: usize,
}

impl<T: InferenceTransport> SubModel<T> {
    pub fn new(client: InferenceClient<T>, layout: LeadLayout, target_len: usize) -> Self {
        Self {
            client,
            layout,
            target_len,
        }
    }

    pub fn client(&self) -> &InferenceClient<T> {
        &self.client
    }

    pub fn layout(&self) -> &LeadLayout {
        &self.layout
    }
}

impl<T: InferenceTransport> Classifier for SubModel<T> {
    fn model_name(&self) -> &str {
        &self.client.spec().name
    }

    fn classify(&self, samples: &LeadSampleMap) -> Result<Prediction, InferError> {
        let tensor = build_tensor(samples, &self.layout, self.target_len);
        if !tensor.missing().is_empty() {
            log::warn!(
                "`{}` input has {} zero-filled channels",
                self.model_name(),
                tensor.missing().len()
            );
        }
        let prediction = self.client.classify(&tensor)?;
        log::debug!(
            "`{}` -> {} ({:.4})",
            self.model_name(),
            prediction.label,
            prediction.confidence
        );
        Ok(prediction)
    }
}
