use core::mem;

use static_assertions::{const_assert, const_assert_eq};

/// Size of the tag written in front of every payload.
pub const BEGIN_TAG: usize = mem::size_of::<BeginTag>();
/// Size of the tag written after every payload.
pub const END_TAG: usize = mem::size_of::<EndTag>();
/// Bytes of bookkeeping each block costs on top of its payload.
pub const TAG_OVERHEAD: usize = BEGIN_TAG + END_TAG;

// Tags are written straight into the caller's buffer, so they must not carry
// padding: every byte written has to be initialised.
const_assert_eq!(BEGIN_TAG, 4 * mem::size_of::<usize>());
const_assert_eq!(END_TAG, 2 * mem::size_of::<usize>());
const_assert!(END_TAG <= BEGIN_TAG);

/// Sentinel stored in a link field that points nowhere.
pub(crate) const NIL: usize = usize::MAX;

const FREE: usize = 0x4652_4545;
const USED: usize = 0x5553_4544;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockState {
    Free,
    Used,
}

impl BlockState {
    fn encode(self) -> usize {
        match self {
            BlockState::Free => FREE,
            BlockState::Used => USED,
        }
    }

    pub(crate) fn decode(word: usize) -> Option<BlockState> {
        match word {
            FREE => Some(BlockState::Free),
            USED => Some(BlockState::Used),
            _ => None,
        }
    }
}

// begin: BeginTag sits at the first byte of a block. `next` and `prev` are
// arena offsets of other free blocks' begin tags and are NIL for used blocks.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct BeginTag {
    pub size: usize,
    state: usize,
    pub next: usize,
    pub prev: usize,
}

impl BeginTag {
    pub fn new(size: usize, state: BlockState) -> Self {
        Self {
            size,
            state: state.encode(),
            next: NIL,
            prev: NIL,
        }
    }

    pub fn state(&self) -> Option<BlockState> {
        BlockState::decode(self.state)
    }

    pub fn is_free(&self) -> bool {
        self.state == FREE
    }

    pub fn set_state(&mut self, state: BlockState) {
        self.state = state.encode();
    }

    pub fn next(&self) -> Option<usize> {
        link(self.next)
    }

    pub fn prev(&self) -> Option<usize> {
        link(self.prev)
    }
}

// end: EndTag occupies the last END_TAG bytes of a block and mirrors the
// begin tag so the previous block can be found from the next one.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct EndTag {
    pub size: usize,
    state: usize,
}

impl EndTag {
    pub fn new(size: usize, state: BlockState) -> Self {
        Self {
            size,
            state: state.encode(),
        }
    }

    pub fn state(&self) -> Option<BlockState> {
        BlockState::decode(self.state)
    }

    pub fn is_free(&self) -> bool {
        self.state == FREE
    }

    pub fn mirrors(&self, begin: &BeginTag) -> bool {
        self.size == begin.size && self.state == begin.state
    }
}

pub(crate) fn link(offset: usize) -> Option<usize> {
    (offset != NIL).then_some(offset)
}

pub(crate) fn link_word(offset: Option<usize>) -> usize {
    offset.unwrap_or(NIL)
}

/// Offset of the payload of the block whose begin tag is at `at`.
pub(crate) const fn payload(at: usize) -> usize {
    at + BEGIN_TAG
}

/// Offset of the end tag of a block at `at` holding `size` payload bytes.
pub(crate) const fn end_of(at: usize, size: usize) -> usize {
    at + BEGIN_TAG + size
}

/// Offset of the block that follows a block at `at` holding `size` bytes.
pub(crate) const fn next_block(at: usize, size: usize) -> usize {
    at + TAG_OVERHEAD + size
}
