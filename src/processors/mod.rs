pub mod pdf;
pub mod transfer;
pub mod video;

pub use pdf::PdfProcessor;
pub use transfer::{Material, download_to_file, fetch_materials};
pub use video::VideoProcessor;

use crate::processor::{CourseProcessor, ProcessorFactory, ProcessorSpec, SharedResources};

/// Builds the crate's own processors from a spec
#[derive(Debug, Default)]
pub struct DefaultProcessorFactory;

impl ProcessorFactory for DefaultProcessorFactory {
    fn create(&self, spec: &ProcessorSpec, shared: &SharedResources) -> Box<dyn CourseProcessor> {
        match spec {
            ProcessorSpec::Pdf { dest_dir, variant } => Box::new(PdfProcessor::new(
                dest_dir.clone(),
                *variant,
                shared.clone(),
            )),
            ProcessorSpec::Video {
                dest_dir,
                resolution,
                download_extras,
                extras_only,
            } => Box::new(VideoProcessor::new(
                dest_dir.clone(),
                resolution.clone(),
                *download_extras,
                *extras_only,
                shared.clone(),
            )),
        }
    }
}
