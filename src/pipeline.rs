use crate::config::DetectionConfig;
use crate::models::{Rect, ScaleContext};
use anyhow::Result;
use image::DynamicImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Data that flows through the pipeline.
///
/// Until region extraction there is a single item holding the current working
/// frame; afterwards each item is one candidate card region.
#[derive(Clone)]
pub struct PipelineData {
    /// Current frame (working resolution) or, after cropping, the card crop
    pub image: DynamicImage,

    /// Oriented full-resolution source, shared by every item of the run
    pub original: Arc<DynamicImage>,

    /// Scale of this run; identity until the normalizer downsamples
    pub scale: ScaleContext,

    /// Candidate region at working resolution (None means whole frame)
    pub bbox: Option<Rect>,

    /// Per-item tags (e.g. "synthetic", "ordinal")
    pub metadata: HashMap<String, MetadataValue>,
}

/// Metadata value types
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Bool(bool),
    Int(i32),
}

impl PipelineData {
    /// Create PipelineData for a full image
    pub fn from_image(image: DynamicImage) -> Self {
        let original = Arc::new(image.clone());
        let scale = ScaleContext::identity(image.width(), image.height());
        Self {
            image,
            original,
            scale,
            bbox: None,
            metadata: HashMap::new(),
        }
    }

    /// Create PipelineData for a candidate region of the same run
    pub fn from_region(
        image: DynamicImage,
        original: Arc<DynamicImage>,
        scale: ScaleContext,
        bbox: Rect,
    ) -> Self {
        Self {
            image,
            original,
            scale,
            bbox: Some(bbox),
            metadata: HashMap::new(),
        }
    }

    /// Replace the frame, keeping the rest of the item
    pub fn with_image(mut self, image: DynamicImage) -> Self {
        self.image = image;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.metadata.get(key) {
            Some(MetadataValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.metadata.get(key) {
            Some(MetadataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<DetectionConfig>,
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Steps can split data (1 → many), filter (many → fewer), augment
    /// (many → more) or transform (many → many)
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>>;

    /// Human-readable name for this step (used in logs and debug output)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
#[derive(Clone)]
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self::with_config(DetectionConfig::default())
    }

    pub fn with_config(config: DetectionConfig) -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext {
                config: Arc::new(config),
                debug: None,
            },
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.context.config
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });

        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step on an (already oriented) input image.
    ///
    /// `tag` prefixes the debug directories so that a retry pass does not
    /// overwrite the frames of the primary pass.
    pub fn run(&self, input: DynamicImage, tag: &str) -> Result<Vec<PipelineData>> {
        self.run_partial(input, self.steps.len(), tag)
    }

    /// Run the pipeline but stop after `num_steps` steps (useful for debugging)
    pub fn run_partial(&self, input: DynamicImage, num_steps: usize, tag: &str) -> Result<Vec<PipelineData>> {
        self.save_debug_frames(tag, 0, "input", std::slice::from_ref(&PipelineData::from_image(input.clone())))?;

        let mut data = vec![PipelineData::from_image(input)];

        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            debug!(step = step.name(), items = data.len(), "Running step");
            data = step.process(data, &self.context)?;
            debug!(step = step.name(), items = data.len(), "Step finished");

            self.save_debug_frames(tag, step_idx + 1, step.name(), &data)?;
        }

        Ok(data)
    }

    fn save_debug_frames(&self, tag: &str, index: usize, step_name: &str, data: &[PipelineData]) -> Result<()> {
        let Some(debug_config) = &self.context.debug else {
            return Ok(());
        };

        let step_dir_name = format!("{}{:02}_{}", tag, index,
            step_name.to_lowercase().replace(' ', "_"));
        let step_dir = debug_config.output_dir.join(&step_dir_name);
        std::fs::create_dir_all(&step_dir)?;

        for (idx, item) in data.iter().enumerate() {
            let output_path = step_dir.join(format!("{:02}.png", idx + 1));
            item.image.save(&output_path)
                .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
        }

        debug!(dir = %step_dir_name, frames = data.len(), "Saved debug frames");
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
