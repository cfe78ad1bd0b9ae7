//! External collaborators and the enrichment pass

pub mod classifier;
pub mod enrichment;
pub mod geocode;
pub mod vision;

pub use classifier::{Classifier, ClassifierError, SidecarClassifier};
pub use enrichment::{enrich_image, enrich_today, EnrichmentOutcome};
pub use vision::{OpenAiVision, VisionAnalyzer, VisionError};
