use core::{fmt, marker::PhantomData, ptr::NonNull};

use log::{debug, trace, warn};
use ptr_ext::PtrExt;

use crate::{
    error::ArenaError,
    tag::{self, BeginTag, BlockState, EndTag, BEGIN_TAG, END_TAG, TAG_OVERHEAD},
};

/// A boundary-tag allocator over a single caller-supplied byte region.
///
/// Every block in the region is bracketed by a begin tag and an end tag, both
/// recording its payload size and state, and the blocks tile the region with
/// no gaps. Free blocks are additionally threaded into a doubly linked list
/// through their begin tags, most recently released first.
pub struct Arena<'a> {
    base: NonNull<u8>,
    len: usize,
    head: Option<usize>,
    _region: PhantomData<&'a mut [u8]>,
}

impl<'a> Arena<'a> {
    /// Takes over `buffer` and turns it into one free block.
    pub fn new(buffer: &'a mut [u8]) -> Result<Self, ArenaError> {
        // SAFETY: the exclusive borrow outlives the arena
        unsafe { Self::from_raw(NonNull::from(buffer)) }
    }

    /// Takes over the memory described by `region`.
    ///
    /// # Safety
    ///
    /// `region` must be valid for reads and writes for `'a`, and nothing else
    /// may access it while the arena is alive, except through pointers handed
    /// out by [`allocate`](crate::Allocator::allocate).
    pub unsafe fn from_raw(region: NonNull<[u8]>) -> Result<Self, ArenaError> {
        let len = region.len();
        let Some(size) = len.checked_sub(TAG_OVERHEAD) else {
            return Err(ArenaError::TooSmall {
                size: len,
                overhead: TAG_OVERHEAD,
            });
        };

        let mut arena = Arena {
            base: region.cast(),
            len,
            head: None,
            _region: PhantomData,
        };
        arena.write_block(0, size, BlockState::Free);
        arena.head = Some(0);
        debug!("arena of {len} bytes at {:p}, {size} bytes free", arena.base);
        Ok(arena)
    }

    /// Total size of the managed region in bytes.
    pub fn capacity(&self) -> usize {
        self.len
    }

    pub(crate) fn region(&self) -> NonNull<[u8]> {
        NonNull::slice_from_raw_parts(self.base, self.len)
    }

    pub(crate) fn head(&self) -> Option<usize> {
        self.head
    }

    /// Whether a tag `width` bytes wide starting at `at` lies inside the arena.
    pub(crate) fn fits(&self, at: usize, width: usize) -> bool {
        at.checked_add(width).is_some_and(|end| end <= self.len)
    }

    pub(crate) fn begin_tag(&self, at: usize) -> BeginTag {
        debug_assert!(self.fits(at, BEGIN_TAG), "begin tag at {at} out of bounds");
        // SAFETY: tags lie inside the region, and are read unaligned
        unsafe { self.base.add(at).cast::<BeginTag>().read_unaligned() }
    }

    pub(crate) fn end_tag(&self, at: usize) -> EndTag {
        debug_assert!(self.fits(at, END_TAG), "end tag at {at} out of bounds");
        // SAFETY: as above
        unsafe { self.base.add(at).cast::<EndTag>().read_unaligned() }
    }

    fn set_begin_tag(&mut self, at: usize, tag: BeginTag) {
        debug_assert!(self.fits(at, BEGIN_TAG), "begin tag at {at} out of bounds");
        // SAFETY: as above; tags have no padding so every byte is initialised
        unsafe { self.base.add(at).cast::<BeginTag>().write_unaligned(tag) }
    }

    fn set_end_tag(&mut self, at: usize, tag: EndTag) {
        debug_assert!(self.fits(at, END_TAG), "end tag at {at} out of bounds");
        // SAFETY: as above
        unsafe { self.base.add(at).cast::<EndTag>().write_unaligned(tag) }
    }

    /// Writes a fresh, unlinked tag pair for a block at `at`.
    fn write_block(&mut self, at: usize, size: usize, state: BlockState) {
        self.set_begin_tag(at, BeginTag::new(size, state));
        self.set_end_tag(tag::end_of(at, size), EndTag::new(size, state));
    }

    fn payload(&self, at: usize, size: usize) -> NonNull<[u8]> {
        // SAFETY: the payload of a block lies inside the region
        let data = unsafe { self.base.add(tag::payload(at)) };
        NonNull::slice_from_raw_parts(data, size)
    }

    /// Pushes the free block at `at` onto the head of the free list.
    fn push_free(&mut self, at: usize) {
        let mut tag = self.begin_tag(at);
        tag.prev = tag::link_word(None);
        tag.next = tag::link_word(self.head);
        if let Some(head) = self.head {
            let mut head_tag = self.begin_tag(head);
            head_tag.prev = at;
            self.set_begin_tag(head, head_tag);
        }
        self.set_begin_tag(at, tag);
        self.head = Some(at);
        trace!("free list: pushed {at}");
    }

    /// Removes the block at `at` from the free list and clears its links.
    fn unlink_free(&mut self, at: usize) {
        let mut tag = self.begin_tag(at);
        if self.head == Some(at) {
            self.head = tag.next();
        }
        if let Some(prev) = tag.prev() {
            let mut prev_tag = self.begin_tag(prev);
            prev_tag.next = tag.next;
            self.set_begin_tag(prev, prev_tag);
        }
        if let Some(next) = tag.next() {
            let mut next_tag = self.begin_tag(next);
            next_tag.prev = tag.prev;
            self.set_begin_tag(next, next_tag);
        }
        tag.next = tag::link_word(None);
        tag.prev = tag::link_word(None);
        self.set_begin_tag(at, tag);
        trace!("free list: unlinked {at}");
    }

    fn allocate_block(&mut self, size: usize) -> Option<NonNull<[u8]>> {
        if size == 0 {
            return None;
        }
        // None only for requests too large to ever be split off
        let with_tags = size.checked_add(TAG_OVERHEAD);

        let mut cursor = self.head;
        while let Some(at) = cursor {
            let mut tag = self.begin_tag(at);

            if tag.size == size || Some(tag.size) == with_tags {
                self.unlink_free(at);
                self.write_block(at, tag.size, BlockState::Used);
                trace!("allocate({size}): took block {at} of {} bytes", tag.size);
                return Some(self.payload(at, tag.size));
            }

            if let Some(needed) = with_tags.filter(|&needed| needed < tag.size) {
                // carve the used block off the tail; the free remainder stays linked
                let remainder = tag.size - needed;
                tag.size = remainder;
                self.set_begin_tag(at, tag);
                self.set_end_tag(
                    tag::end_of(at, remainder),
                    EndTag::new(remainder, BlockState::Free),
                );

                let carved = tag::next_block(at, remainder);
                self.write_block(carved, size, BlockState::Used);
                trace!("allocate({size}): split block {at}, {remainder} bytes left free, used block at {carved}");
                return Some(self.payload(carved, size));
            }

            cursor = tag.next();
        }

        trace!("allocate({size}): no fitting free block");
        None
    }

    /// # Safety
    ///
    /// See [`Allocator::release`](crate::Allocator::release).
    unsafe fn release_block(&mut self, ptr: NonNull<u8>) {
        let Some(at) = ptr
            .offset_in(self.region())
            .and_then(|offset| offset.checked_sub(BEGIN_TAG))
        else {
            warn!("release({ptr:p}): pointer does not belong to this arena, ignored");
            return;
        };

        let mut tag = self.begin_tag(at);
        if tag.is_free() {
            debug!("release({ptr:p}): block {at} is already free");
            return;
        }
        // flag this block's own tag first, so it still reads free once merged away
        tag.set_state(BlockState::Free);
        self.set_begin_tag(at, tag);

        let mut at = at;
        let mut size = tag.size;

        if at > 0 {
            let prev_end = self.end_tag(at - END_TAG);
            if prev_end.is_free() {
                let prev = at - TAG_OVERHEAD - prev_end.size;
                self.unlink_free(prev);
                size += prev_end.size + TAG_OVERHEAD;
                trace!("release: merged block {at} into previous block {prev}");
                at = prev;
            }
        }

        let next = tag::next_block(at, size);
        if next < self.len {
            let next_tag = self.begin_tag(next);
            if next_tag.is_free() {
                self.unlink_free(next);
                size += next_tag.size + TAG_OVERHEAD;
                trace!("release: merged next block {next} into block {at}");
            }
        }

        self.write_block(at, size, BlockState::Free);
        self.push_free(at);
        trace!("release({ptr:p}): block {at} of {size} bytes is free");
    }
}

unsafe impl crate::Allocator for Arena<'_> {
    fn allocate(&mut self, size: usize) -> Option<NonNull<[u8]>> {
        self.allocate_block(size)
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>) {
        // SAFETY: forwarded from the caller
        unsafe { self.release_block(ptr) }
    }
}

impl fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("base", &self.base)
            .field("capacity", &self.len)
            .field("head", &self.head)
            .field("stats", &self.stats())
            .finish()
    }
}
