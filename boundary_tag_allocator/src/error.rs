use thiserror::Error;

/// Failures reported by [`Arena`](crate::Arena) construction and by
/// [`Arena::check`](crate::Arena::check).
///
/// Offsets are byte offsets of a block's begin tag from the start of the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("arena of {size} bytes cannot hold a {overhead} byte tag pair")]
    TooSmall { size: usize, overhead: usize },

    #[error("block at offset {offset} runs past the end of the arena")]
    Overrun { offset: usize },

    #[error("block at offset {offset} has an unrecognised state word")]
    BadState { offset: usize },

    #[error("begin and end tags of block at offset {offset} disagree")]
    TagMismatch { offset: usize },

    #[error("free blocks at offsets {offset} and {next} were not merged")]
    Uncoalesced { offset: usize, next: usize },

    #[error("free list entry at offset {offset} is not a free block")]
    StrayListEntry { offset: usize },

    #[error("free list links around offset {offset} are inconsistent")]
    BrokenLink { offset: usize },

    #[error("free list holds {listed} blocks but the arena has {free} free blocks")]
    ListLength { listed: usize, free: usize },
}
