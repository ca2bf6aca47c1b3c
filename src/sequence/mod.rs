mod codec;
mod model;
mod store;

pub use codec::{deserialize, serialize, SEQUENCE_FORMAT_VERSION};
pub use model::{frame_timestamps, PoseSequence, SequenceMetadata};
pub use store::{file_name_for, load_file, SequenceStore};
