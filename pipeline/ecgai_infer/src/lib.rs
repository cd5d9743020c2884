//! Remote tensor-inference client for the ECG sub-models.
//!
//! The client speaks the KServe v2 protocol through an
//! [`InferenceTransport`]; [`HttpTransport`] is the production
//! implementation and tests substitute an in-memory one.

pub mod client;
pub mod dtype;
pub mod error;
pub mod model;
pub mod protocol;
pub mod transport;

pub use client::{Classifier, InferenceClient, SubModel};
pub use dtype::{Datatype, TensorData, TensorElement};
pub use error::{InferError, ReadinessStage};
pub use model::{ModelOutput, ModelSpec, OutputDecoding, OutputSpec, Prediction};
pub use protocol::{
    InferRequest, InferResponse, InputTensor, ModelMetadata, OutputTensor, TensorMetadata,
};
pub use transport::{HttpTransport, InferenceTransport};
