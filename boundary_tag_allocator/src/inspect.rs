//! Read-only views of an [`Arena`]'s tag structure.

use log::trace;

use crate::{
    arena::Arena,
    error::ArenaError,
    tag::{self, BlockState, END_TAG, TAG_OVERHEAD},
};

/// One block of the arena, as recorded by its begin tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    /// Offset of the begin tag from the start of the arena.
    pub offset: usize,
    /// Payload bytes, excluding the tags.
    pub size: usize,
    pub state: BlockState,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub free_blocks: usize,
    pub used_blocks: usize,
    pub free_bytes: usize,
    pub used_bytes: usize,
    pub largest_free: usize,
}

impl Stats {
    /// Bytes spent on tags.
    pub fn overhead(&self) -> usize {
        (self.free_blocks + self.used_blocks) * TAG_OVERHEAD
    }
}

/// Iterator over blocks in address order. See [`Arena::blocks`].
pub struct Blocks<'r, 'a> {
    arena: &'r Arena<'a>,
    at: usize,
}

impl Iterator for Blocks<'_, '_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let block = self.arena.block_at(self.at)?;
        self.at = tag::next_block(block.offset, block.size);
        Some(block)
    }
}

/// Iterator over the free list in list order. See [`Arena::free_list`].
pub struct FreeList<'r, 'a> {
    arena: &'r Arena<'a>,
    cursor: Option<usize>,
    // a corrupted list may be cyclic; never walk more entries than fit
    budget: usize,
}

impl Iterator for FreeList<'_, '_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let at = self.cursor?;
        self.budget = self.budget.checked_sub(1)?;
        let block = self.arena.block_at(at)?;
        self.cursor = self.arena.begin_tag(at).next();
        Some(block)
    }
}

impl<'a> Arena<'a> {
    /// Reads the block whose begin tag is at `at`, if the whole block lies
    /// inside the arena.
    fn block_at(&self, at: usize) -> Option<Block> {
        if !self.fits(at, TAG_OVERHEAD) {
            return None;
        }
        let begin = self.begin_tag(at);
        let end = tag::end_of(at, begin.size);
        if end.checked_add(END_TAG).map_or(true, |end| end > self.capacity()) {
            return None;
        }
        Some(Block {
            offset: at,
            size: begin.size,
            state: begin.state()?,
        })
    }

    /// Walks every block in address order.
    ///
    /// Stops early if it meets a tag that is unreadable or runs past the end of
    /// the arena, which only happens once the arena has been corrupted.
    pub fn blocks(&self) -> Blocks<'_, 'a> {
        Blocks { arena: self, at: 0 }
    }

    /// Walks the free list from its head, in the order allocation searches it.
    pub fn free_list(&self) -> FreeList<'_, 'a> {
        FreeList {
            arena: self,
            cursor: self.head(),
            budget: self.capacity() / TAG_OVERHEAD,
        }
    }

    pub fn stats(&self) -> Stats {
        self.blocks().fold(Stats::default(), |mut stats, block| {
            match block.state {
                BlockState::Free => {
                    stats.free_blocks += 1;
                    stats.free_bytes += block.size;
                    stats.largest_free = stats.largest_free.max(block.size);
                }
                BlockState::Used => {
                    stats.used_blocks += 1;
                    stats.used_bytes += block.size;
                }
            }
            stats
        })
    }

    /// Verifies the arena's structure.
    ///
    /// Checks that the blocks tile the arena exactly, that both tags of every
    /// block agree, that no two free blocks are adjacent, and that the free
    /// list holds every free block exactly once with consistent back links.
    pub fn check(&self) -> Result<(), ArenaError> {
        let mut at = 0;
        let mut free = 0;
        let mut prev_free: Option<usize> = None;
        while at < self.capacity() {
            let overrun = ArenaError::Overrun { offset: at };
            if !self.fits(at, TAG_OVERHEAD) {
                return Err(overrun);
            }
            let begin = self.begin_tag(at);
            let end_at = tag::end_of(at, begin.size);
            if end_at.checked_add(END_TAG).map_or(true, |end| end > self.capacity()) {
                return Err(overrun);
            }
            let end = self.end_tag(end_at);
            if begin.state().is_none() || end.state().is_none() {
                return Err(ArenaError::BadState { offset: at });
            }
            if !end.mirrors(&begin) {
                return Err(ArenaError::TagMismatch { offset: at });
            }

            if begin.is_free() {
                if let Some(prev) = prev_free {
                    return Err(ArenaError::Uncoalesced {
                        offset: prev,
                        next: at,
                    });
                }
                free += 1;
                prev_free = Some(at);
            } else {
                if begin.next().is_some() || begin.prev().is_some() {
                    return Err(ArenaError::BrokenLink { offset: at });
                }
                prev_free = None;
            }
            at = tag::next_block(at, begin.size);
        }

        let mut listed = 0;
        let mut prev = None;
        let mut cursor = self.head();
        while let Some(entry) = cursor {
            listed += 1;
            if listed > free {
                return Err(ArenaError::ListLength { listed, free });
            }
            if !self.is_block_start(entry) {
                return Err(ArenaError::StrayListEntry { offset: entry });
            }
            let begin = self.begin_tag(entry);
            if !begin.is_free() {
                return Err(ArenaError::StrayListEntry { offset: entry });
            }
            if begin.prev() != prev {
                return Err(ArenaError::BrokenLink { offset: entry });
            }
            prev = Some(entry);
            cursor = begin.next();
        }
        if listed != free {
            return Err(ArenaError::ListLength { listed, free });
        }

        trace!("check: {free} free blocks, all listed");
        Ok(())
    }

    fn is_block_start(&self, offset: usize) -> bool {
        self.blocks()
            .map(|block| block.offset)
            .take_while(|&at| at <= offset)
            .any(|at| at == offset)
    }
}
