// Insight annotation: optional free-text commentary on a reporting
// snapshot. The pipeline core only depends on the Annotator capability;
// a null or failing provider never blocks the reporting stage.

pub mod gemini;
pub mod null;

pub use gemini::GeminiAnnotator;
pub use null::NullAnnotator;

use async_trait::async_trait;

use crate::domain::{InsightAnnotation, ReportingSnapshot};
use crate::error::Result;

/// Capability interface for commentary providers.
#[async_trait]
pub trait Annotator: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Produce commentary for a snapshot, or None when the provider has
    /// nothing to say. Errors are isolated by the caller; implementations
    /// should not retry internally.
    async fn annotate(&self, snapshot: &ReportingSnapshot) -> Result<Option<InsightAnnotation>>;
}
