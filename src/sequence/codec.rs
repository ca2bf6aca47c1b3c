use super::model::{PoseSequence, SequenceMetadata};
use crate::error::{PosecoachError, Result};
use crate::pose::Pose;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Format version written by [`serialize`]. Files without a version field
/// are the legacy unversioned shape and read the same way.
pub const SEQUENCE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SequenceDocumentRef<'a> {
    version: u32,
    name: &'a str,
    poses: &'a [Pose],
    timing: &'a [f64],
    metadata: &'a SequenceMetadata,
}

#[derive(Deserialize)]
struct SequenceDocument {
    #[serde(default)]
    version: Option<u32>,
    name: String,
    poses: Vec<Pose>,
    timing: Vec<f64>,
    metadata: SequenceMetadata,
}

/// Encode a sequence as a JSON document
pub fn serialize(sequence: &PoseSequence) -> Result<Vec<u8>> {
    let document = SequenceDocumentRef {
        version: SEQUENCE_FORMAT_VERSION,
        name: sequence.name(),
        poses: sequence.poses(),
        timing: sequence.timing(),
        metadata: sequence.metadata(),
    };
    Ok(serde_json::to_vec(&document)?)
}

/// Decode and validate a sequence document.
///
/// Every failure, structural or semantic, is reported as
/// `MalformedSequenceFile`.
pub fn deserialize(bytes: &[u8]) -> Result<PoseSequence> {
    let document: SequenceDocument = serde_json::from_slice(bytes)
        .map_err(|e| PosecoachError::malformed(format!("invalid document: {}", e)))?;

    match document.version {
        None => debug!("Reading legacy unversioned sequence '{}'", document.name),
        Some(version) if version > SEQUENCE_FORMAT_VERSION => {
            return Err(PosecoachError::malformed(format!(
                "unsupported format version {} (newest supported is {})",
                version, SEQUENCE_FORMAT_VERSION
            )));
        }
        Some(_) => {}
    }

    PoseSequence::new(
        document.name,
        document.poses,
        document.timing,
        document.metadata,
    )
}
