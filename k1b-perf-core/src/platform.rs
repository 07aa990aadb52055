//! Access to the performance monitor registers of the executing processing unit.

use crate::pmc::Slot;
use std::fmt::Debug;

/// Raw register access used by [`PerfMonitors`](crate::PerfMonitors).
///
/// On the K1B each method is a single `get`/`set` instruction on `$pmc` or `$pm0`..`$pm3`.
/// Implementors must not add any logic beyond the register access itself: masking, validation and
/// sequencing all happen in the controller.
///
/// All methods take `&mut self`. Holding the unique borrow of the platform is what gives the
/// controller exclusive use of the register for the duration of a read-modify-write. Anything else
/// that writes `pmc` on the same processing unit (an interrupt handler, say) must be excluded by
/// the caller, otherwise its update can be lost between the read and the write.
pub trait PerfAccess: Debug {
    /// Read the whole pmc control word.
    fn read_pmc(&mut self) -> u32;

    /// Write the whole pmc control word.
    fn write_pmc(&mut self, value: u32);

    /// Read the raw 32-bit value of a counter slot.
    fn read_counter(&mut self, slot: Slot) -> u32;
}

impl<P: PerfAccess + ?Sized> PerfAccess for &mut P {
    #[inline]
    fn read_pmc(&mut self) -> u32 {
        (**self).read_pmc()
    }

    #[inline]
    fn write_pmc(&mut self, value: u32) {
        (**self).write_pmc(value)
    }

    #[inline]
    fn read_counter(&mut self, slot: Slot) -> u32 {
        (**self).read_counter(slot)
    }
}

impl<P: PerfAccess + ?Sized> PerfAccess for Box<P> {
    #[inline]
    fn read_pmc(&mut self) -> u32 {
        (**self).read_pmc()
    }

    #[inline]
    fn write_pmc(&mut self, value: u32) {
        (**self).write_pmc(value)
    }

    #[inline]
    fn read_counter(&mut self, slot: Slot) -> u32 {
        (**self).read_counter(slot)
    }
}
