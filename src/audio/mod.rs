//! Audio handling for uploaded recordings
//!
//! Uploads land in a scratch directory, get normalized to the canonical
//! transcription format, and are removed when the request finishes.

mod normalize;
mod upload;

pub use normalize::{
    AudioNormalizer, FfmpegNormalizer, TARGET_BITS_PER_SAMPLE, TARGET_CHANNELS,
    TARGET_SAMPLE_RATE, verify_normalized,
};
pub use upload::{ScratchFiles, UploadDir, extension_for};
