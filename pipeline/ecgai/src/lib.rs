//! ECG signal-to-diagnosis pipeline.
//!
//! ```text
//! XML bytes -> decode -> { ST-elevation model, rhythm model } -> synthesize -> report
//!                    \-> render -----------------------------------------------/
//! ```
//!
//! The component crates are re-exported so callers need only this one.

pub mod config;
pub mod logging;
pub mod pipeline;

pub use config::{Config, ConfigError, ModelConfig};
pub use pipeline::{EcgPipeline, PipelineError, RhythmStage};

pub use ecgai_infer as infer;
pub use ecgai_render as render;
pub use ecgai_report as report;
pub use ecgai_waveform as waveform;
