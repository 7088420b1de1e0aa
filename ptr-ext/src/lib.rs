#![cfg_attr(not(test), no_std)]
#![warn(clippy::as_conversions)]

use core::ptr::NonNull;

pub trait PtrExt: Sized {
    /// Byte offset of `self` from the start of `region`, or `None` if the
    /// pointer does not point into it.
    fn offset_in(self, region: NonNull<[u8]>) -> Option<usize>;
}

impl PtrExt for *mut u8 {
    fn offset_in(self, region: NonNull<[u8]>) -> Option<usize> {
        let offset = self.addr().checked_sub(region.cast::<u8>().as_ptr().addr())?;
        (offset < region.len()).then_some(offset)
    }
}

impl PtrExt for NonNull<u8> {
    fn offset_in(self, region: NonNull<[u8]>) -> Option<usize> {
        self.as_ptr().offset_in(region)
    }
}
