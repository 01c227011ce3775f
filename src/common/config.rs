use super::types::PageId;

/// Invalid page ID constant
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Default K value for LRU-K replacement policy
pub const DEFAULT_LRUK_K: usize = 2;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 10;

/// Default number of entries a hash table bucket holds before it splits
pub const DEFAULT_BUCKET_SIZE: usize = 4;
