// Ingest adapters: where observations come from. The pipeline core only
// depends on the Source port; swapping the SARB download facility for a
// fixture set is a construction-time choice.

pub mod fixture;
pub mod sarb_http;

pub use fixture::FixtureSource;
pub use sarb_http::{SarbHttpSource, SeriesSpec};

use async_trait::async_trait;

use crate::domain::Observation;
use crate::error::Result;

/// A provider of raw observations. No ordering requirement on the returned
/// batch; dedup and date ordering are pipeline concerns.
#[async_trait]
pub trait Source: Send + Sync {
    /// Tag recorded against every record landed from this source.
    fn source_tag(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<Observation>>;
}
