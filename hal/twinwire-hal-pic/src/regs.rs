//! Handle to a memory-mapped register block

#![allow(unsafe_code)]

use core::ops::Deref;
use core::ptr::NonNull;

/// Pointer to a register block that is valid for the life of the program.
///
/// Dereferences to the `register_structs!` type describing the block, so
/// fields read as `regs.con.is_set(CON::SEN)`.
pub struct StaticRef<T> {
    ptr: NonNull<T>,
}

impl<T> StaticRef<T> {
    /// Wrap the register block at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` MUST be non-null, aligned and point at registers (or plain
    /// memory) laid out as `T` for as long as the handle or any copy of it
    /// is used.
    pub const unsafe fn new(ptr: *const T) -> Self {
        Self {
            ptr: NonNull::new_unchecked(ptr as *mut T),
        }
    }
}

impl<T> Clone for StaticRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StaticRef<T> {}

impl<T> Deref for StaticRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: validity of `ptr` is the constructor's contract
        unsafe { self.ptr.as_ref() }
    }
}
