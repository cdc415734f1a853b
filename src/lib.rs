pub mod cards;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod runtime;

pub use cards::{AttributeClassifier, CardAttributes, ClassifiedCard, classify_all, find_sets};
pub use config::{DetectionConfig, ThresholdPolicy};
pub use detection::{CardDetector, Detection, RetryState, Timings, build_card_pipeline};
pub use error::{DetectError, Result};
pub use models::{CardRegion, Crop, RawImage, Rect, ScaleContext};
pub use pipeline::{
    DebugConfig, MetadataValue, Pipeline, PipelineContext, PipelineData, PipelineStep,
};
