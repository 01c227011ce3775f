//! Bufcore - page lookup and eviction core for a disk-oriented buffer pool
//!
//! A buffer pool keeps a fixed number of frames in memory and needs two
//! things from its bookkeeping: a fast map from page ids to the frames that
//! hold them, and a policy that picks a frame to reuse when memory runs out.
//! This crate provides both, as in-memory structures that know nothing about
//! disk I/O or page contents.
//!
//! # Architecture
//!
//! - **Container** (`container`): `ExtendibleHashTable`, a latched extendible
//!   hash table that grows by splitting buckets and doubling its directory.
//! - **Buffer** (`buffer`): `LruKReplacer`, an LRU-K replacement policy with a
//!   FIFO history tier for frames seen fewer than k times.
//! - **Common** (`common`): identifiers, errors and default configuration.
//!
//! # Example
//!
//! ```rust
//! use bufcore::buffer::LruKReplacer;
//! use bufcore::common::{FrameId, PageId};
//! use bufcore::container::ExtendibleHashTable;
//!
//! let page_table: ExtendibleHashTable<PageId, FrameId> = ExtendibleHashTable::new(4);
//! let replacer = LruKReplacer::new(2, 8);
//!
//! let frame_id = FrameId::new(0);
//! page_table.insert(PageId::new(42), frame_id);
//! replacer.record_access(frame_id).unwrap();
//! replacer.set_evictable(frame_id, true).unwrap();
//!
//! assert_eq!(page_table.find(&PageId::new(42)), Some(frame_id));
//! assert_eq!(replacer.evict(), Some(frame_id));
//! ```

pub mod buffer;
pub mod common;
pub mod container;

// Re-export commonly used types at the crate root
pub use common::{BufCoreError, FrameId, PageId, Result};
