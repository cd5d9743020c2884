//! Fixtures shared by the end-to-end scenarios: synthetic ECG exports in
//! both XML encodings and an in-memory KServe server.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use base64::Engine;
use ecgai::infer::{
    InferError, InferRequest, InferResponse, InferenceTransport, ModelMetadata, OutputTensor,
    ReadinessStage, TensorData, TensorMetadata,
};
use ecgai::waveform::Lead;

pub const STEMI_MODEL: &str = "ecg_stemi_by";
pub const RHYTHM_MODEL: &str = "ecg_multicat12";

/// The eight leads a resting export stores; the rest are derived.
pub const RECORDED_LEADS: [Lead; 8] = [
    Lead::I,
    Lead::II,
    Lead::V1,
    Lead::V2,
    Lead::V3,
    Lead::V4,
    Lead::V5,
    Lead::V6,
];

/// A 10 s sawtooth, offset per lead so I and II differ.
pub fn sawtooth(offset: i16, samples: usize) -> Vec<i16> {
    (0..samples).map(|i| (i % 250) as i16 - 125 + offset).collect()
}

/// Resting export with `leads`, each `samples` long at 4.88 uV per bit.
pub fn resting_record(leads: &[Lead], samples: usize) -> Vec<u8> {
    let blocks: String = leads
        .iter()
        .enumerate()
        .map(|(i, lead)| {
            let bytes: Vec<u8> = sawtooth(i as i16 * 10, samples)
                .iter()
                .flat_map(|code| code.to_le_bytes())
                .collect();
            format!(
                "<LeadData><LeadID>{lead}</LeadID>\
                 <LeadAmplitudeUnitsPerBit>4.88</LeadAmplitudeUnitsPerBit>\
                 <WaveFormData>{}</WaveFormData></LeadData>",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <RestingECG><OriginalDiagnosis><DiagnosisStatement><StmtText>Sinus rhythm</StmtText>\
         </DiagnosisStatement></OriginalDiagnosis>\
         <Waveform><WaveformType>Median</WaveformType></Waveform>\
         <Waveform><WaveformType>Rhythm</WaveformType>{blocks}</Waveform></RestingECG>"
    )
    .into_bytes()
}

/// Annotated export with all 12 leads, `codes` raw codes per lead before
/// decimation.
pub fn annotated_record(codes: usize) -> Vec<u8> {
    let mut components = String::from(
        "<component><sequence><code code=\"TIME_ABSOLUTE\"/><value/></sequence></component>",
    );
    let slots: BTreeMap<usize, Lead> = ecgai::waveform::decode::ANNOTATED_LEAD_SLOTS.into();
    for (slot, lead) in slots {
        let digits: Vec<String> =
            sawtooth(slot as i16, codes).iter().map(|c| c.to_string()).collect();
        components.push_str(&format!(
            "<component><sequence><code code=\"MDC_ECG_LEAD_{}\"/>\
             <value><origin value=\"0\" unit=\"uV\"/><scale value=\"5\" unit=\"uV\"/>\
             <digits>{}</digits></value></sequence></component>",
            lead.name().to_ascii_uppercase(),
            digits.join(" ")
        ));
    }
    format!(
        "<AnnotatedECG xmlns=\"urn:hl7-org:v3\"><component><series>\
         <component><sequenceSet>{components}</sequenceSet></component>\
         </series></component></AnnotatedECG>"
    )
    .into_bytes()
}

/// How one model on the fake server behaves.
#[derive(Debug, Clone, PartialEq)]
pub enum Behaviour {
    Answers(Vec<f64>),
    Loading,
    /// Ready at handshake, then the call itself fails.
    DropsCalls,
}

/// One inference call as the server saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct SeenCall {
    pub model: String,
    pub shape: Vec<usize>,
    pub data: TensorData,
}

pub struct FakeServer {
    /// Model name to `(input, output, behaviour)`.
    models: BTreeMap<String, (String, String, Behaviour)>,
    /// Models whose tensor names appear in their metadata and are enforced.
    declared: BTreeSet<String>,
    calls: Mutex<Vec<SeenCall>>,
}

impl FakeServer {
    pub fn new(stemi: Behaviour, rhythm: Behaviour) -> Self {
        let models = [
            (
                STEMI_MODEL.to_string(),
                ("input_1".to_string(), "dense_1/Sigmoid".to_string(), stemi),
            ),
            (
                RHYTHM_MODEL.to_string(),
                ("input_1".to_string(), "dense_1/Softmax".to_string(), rhythm),
            ),
        ]
        .into();
        Self {
            models,
            declared: BTreeSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serve `model` under its own tensor names, declared in its metadata.
    /// Requests naming anything else are refused.
    pub fn with_served_names(mut self, model: &str, input: &str, output: &str) -> Self {
        if let Some(entry) = self.models.get_mut(model) {
            entry.0 = input.to_string();
            entry.1 = output.to_string();
            self.declared.insert(model.to_string());
        }
        self
    }

    /// `(model, input shape)` of every inference call so far.
    pub fn requests(&self) -> Vec<(String, Vec<usize>)> {
        self.calls()
            .into_iter()
            .map(|call| (call.model, call.shape))
            .collect()
    }

    /// Every inference call so far, input payload included.
    pub fn calls(&self) -> Vec<SeenCall> {
        self.calls.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    fn behaviour(&self, model: &str) -> Result<&(String, String, Behaviour), InferError> {
        self.models
            .get(model)
            .ok_or_else(|| InferError::Protocol(format!("no model `{model}`")))
    }
}

fn declare(name: &str, shape: Vec<i64>) -> Vec<TensorMetadata> {
    vec![TensorMetadata {
        name: name.to_string(),
        datatype: "FP32".into(),
        shape,
    }]
}

/// Rhythm probabilities peaking at `index` of the twelve classes.
pub fn one_hot(index: usize, confidence: f64) -> Vec<f64> {
    let rest = (1.0 - confidence) / 11.0;
    (0..12).map(|i| if i == index { confidence } else { rest }).collect()
}

impl InferenceTransport for FakeServer {
    fn server_ready(&self) -> Result<bool, InferError> {
        Ok(true)
    }

    fn model_ready(&self, model: &str, _version: &str) -> Result<bool, InferError> {
        Ok(self.behaviour(model)?.2 != Behaviour::Loading)
    }

    fn model_metadata(&self, model: &str, _version: &str) -> Result<ModelMetadata, InferError> {
        let (input, output, _) = self.behaviour(model)?;
        let (inputs, outputs) = if self.declared.contains(model) {
            (declare(input, vec![-1, 5000, 8]), declare(output, vec![-1, 12]))
        } else {
            (Vec::new(), Vec::new())
        };
        Ok(ModelMetadata {
            name: model.to_string(),
            versions: vec!["1".into()],
            platform: Some("tensorflow_savedmodel".into()),
            inputs,
            outputs,
        })
    }

    fn infer(
        &self,
        model: &str,
        _version: &str,
        request: &InferRequest,
    ) -> Result<InferResponse, InferError> {
        if let (Ok(mut seen), Some(tensor)) = (self.calls.lock(), request.inputs.first()) {
            seen.push(SeenCall {
                model: model.to_string(),
                shape: tensor.shape.clone(),
                data: tensor.data.clone(),
            });
        }
        let (input, output, behaviour) = self.behaviour(model)?;
        if self.declared.contains(model) {
            let refused = |what: &str| {
                InferError::Protocol(format!("400 Bad Request: `{model}` has no such {what}"))
            };
            if request.inputs.iter().any(|tensor| &tensor.name != input) {
                return Err(refused("input"));
            }
            if request.outputs.iter().any(|requested| &requested.name != output) {
                return Err(refused("output"));
            }
        }
        match behaviour {
            Behaviour::Answers(data) => Ok(InferResponse {
                model_name: model.to_string(),
                model_version: Some("1".into()),
                outputs: vec![OutputTensor {
                    name: output.clone(),
                    shape: vec![1, data.len()],
                    datatype: "FP32".into(),
                    data: data.clone(),
                }],
            }),
            Behaviour::Loading | Behaviour::DropsCalls => Err(InferError::ServiceUnavailable {
                model: model.to_string(),
                stage: ReadinessStage::Model,
                reason: "503 Service Unavailable".into(),
            }),
        }
    }
}
