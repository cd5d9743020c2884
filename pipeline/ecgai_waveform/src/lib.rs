//! ECG waveform decoding and model input assembly.
//!
//! ```text
//! raw XML bytes --decode--> LeadSampleMap --build_tensor--> ModelInputTensor
//! ```

pub mod decode;
pub mod error;
pub mod lead;
pub mod samples;
pub mod tensor;

pub use decode::{decode, DecodedRecord, EcgRecord, EcgSchema, UnknownSchema};
pub use error::FormatError;
pub use lead::{Lead, UnknownLead};
pub use samples::{LeadSampleMap, NOMINAL_SAMPLES, SAMPLE_RATE_HZ};
pub use tensor::{build_nominal_tensor, build_tensor, LayoutError, LeadLayout, ModelInputTensor};
