use std::collections::VecDeque;

use log::info;

use bufcore::buffer::LruKReplacer;
use bufcore::common::{
    FrameId, PageId, DEFAULT_BUCKET_SIZE, DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K,
    INVALID_PAGE_ID,
};
use bufcore::container::ExtendibleHashTable;
use bufcore::Result;

/// Page-to-frame bookkeeping of a buffer pool, without any page data
struct FrameDirectory {
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// Reverse map so an evicted frame can be unlinked from the page table;
    /// INVALID_PAGE_ID marks an empty frame
    resident: Vec<PageId>,
    free_list: VecDeque<FrameId>,
    replacer: LruKReplacer,
}

impl FrameDirectory {
    fn new(pool_size: usize, k: usize) -> Self {
        Self {
            page_table: ExtendibleHashTable::new(DEFAULT_BUCKET_SIZE),
            resident: vec![INVALID_PAGE_ID; pool_size],
            free_list: (0..pool_size as u32).map(FrameId::new).collect(),
            replacer: LruKReplacer::new(k, pool_size),
        }
    }

    /// Pins `page_id` into a frame and immediately unpins it.
    /// Returns the frame and whether the page was already resident.
    fn touch(&mut self, page_id: PageId) -> Result<Option<(FrameId, bool)>> {
        if let Some(frame_id) = self.page_table.find(&page_id) {
            self.replacer.record_access(frame_id)?;
            return Ok(Some((frame_id, true)));
        }

        let frame_id = match self.free_list.pop_front() {
            Some(frame_id) => frame_id,
            None => match self.replacer.evict() {
                Some(victim) => {
                    let old_page = std::mem::replace(
                        &mut self.resident[victim.as_usize()],
                        INVALID_PAGE_ID,
                    );
                    if old_page != INVALID_PAGE_ID {
                        self.page_table.remove(&old_page);
                        info!("evicted {} from {}", old_page, victim);
                    }
                    victim
                }
                None => return Ok(None),
            },
        };

        self.page_table.insert(page_id, frame_id);
        self.resident[frame_id.as_usize()] = page_id;
        self.replacer.record_access(frame_id)?;
        self.replacer.set_evictable(frame_id, true)?;
        Ok(Some((frame_id, false)))
    }
}

fn main() -> Result<()> {
    env_logger::init();

    println!("Bufcore - buffer pool page table and LRU-K replacer");
    println!("===================================================\n");

    let mut frames = FrameDirectory::new(DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K);
    println!(
        "Created {} frames with LRU-{} replacement\n",
        DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K
    );

    // A hot set of pages touched repeatedly, interleaved with a one-off scan
    let hot: Vec<u32> = (0..4).collect();
    let scan: Vec<u32> = (100..116).collect();
    let mut workload = Vec::new();
    for chunk in scan.chunks(4) {
        workload.extend(hot.iter().copied());
        workload.extend(chunk.iter().copied());
    }

    let mut hits = 0;
    for &page in &workload {
        match frames.touch(PageId::new(page))? {
            Some((frame_id, true)) => {
                hits += 1;
                println!("  hit  page {:>3} in {}", page, frame_id);
            }
            Some((frame_id, false)) => println!("  miss page {:>3} -> {}", page, frame_id),
            None => println!("  page {:>3} could not be placed: all frames pinned", page),
        }
    }

    println!("\nAccesses: {}, hits: {}", workload.len(), hits);
    println!(
        "Page table: global depth {}, {} buckets, {} entries",
        frames.page_table.global_depth(),
        frames.page_table.num_buckets(),
        frames.page_table.len()
    );
    frames.page_table.verify_integrity()?;

    for page in hot {
        let resident = frames.page_table.contains_key(&PageId::new(page));
        println!("  hot page {} resident: {}", page, resident);
    }

    Ok(())
}
