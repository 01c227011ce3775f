use thiserror::Error;

use super::types::FrameId;

/// Errors raised when a caller breaks the contract of the page table or replacer.
///
/// Absence (a missing key, nothing to evict) is not an error and is reported
/// through `Option`/`bool` results instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufCoreError {
    #[error("Invalid frame ID: {frame_id} (replacer tracks at most {replacer_size} frames)")]
    InvalidFrameId {
        frame_id: FrameId,
        replacer_size: usize,
    },

    #[error("Frame {0} is not evictable")]
    FrameNotEvictable(FrameId),

    #[error("Directory index {index} out of range (directory size {size})")]
    InvalidDirectoryIndex { index: usize, size: usize },

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),
}

pub type Result<T> = std::result::Result<T, BufCoreError>;
