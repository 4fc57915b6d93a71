use sha2::{Digest, Sha256};

use crate::domain::Observation;

/// Computes the content hash used for idempotent re-ingestion detection.
///
/// The digest covers the identity fields of the observation only, so a
/// re-delivery of the same fact from a later fetch hashes identically
/// regardless of when it was ingested.
pub fn content_hash(observation: &Observation) -> String {
    // Simple canonical string; can be evolved later
    let mut s = String::new();
    s.push_str(&observation.indicator_name);
    s.push('|');
    s.push_str(&observation.observed_date.to_string());
    s.push('|');
    if let Some(value) = observation.value {
        s.push_str(&format!("{value:.6}"));
    }

    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}
