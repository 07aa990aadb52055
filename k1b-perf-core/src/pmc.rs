//! Encoding of the performance monitor control register (`pmc`).
//!
//! The low 16 bits hold one 4-bit command nibble per counter slot. A nibble value in
//! `0..EVENTS_NUM` starts the slot counting that event, [`STOP`] freezes it, and [`RESET`] zeroes
//! it and leaves it idle. The bits above the nibbles are global flags, see [`idx`].
//!
//! The register is write-only from the point of view of the protocol: counts are read through the
//! slot registers, never through `pmc`. [`Pmc::command`] decodes a nibble for diagnostics only.

use crate::event::{Event, EVENTS_NUM};
use crate::Monitor;
use bitvec::{order::Lsb0, view::BitView};
use std::fmt;

/// Number of physical counter slots.
pub const SLOTS_NUM: u8 = 4;

/// Width in bits of a slot's command nibble.
pub const NIBBLE_BITS: u32 = 4;

/// Command nibble that stops a slot, keeping its count.
pub const STOP: u32 = 0xE;

/// Command nibble that zeroes a slot and leaves it idle.
pub const RESET: u32 = 0xF;

/// Mask of a single command nibble, before shifting it into place.
pub const NIBBLE_MASK: u32 = 0xF;

// Every event must be encodable without colliding with the stop/reset sentinels.
const_assert!((EVENTS_NUM as u32) <= STOP);
const_assert!(STOP < RESET);
const_assert_eq!(RESET, NIBBLE_MASK);
// The flags sit above the last nibble.
const_assert!(idx::CHAIN_0_1 >= (SLOTS_NUM as usize) * (NIBBLE_BITS as usize));

/// Bit indices for the global flags of the pmc register.
pub mod idx {
    /// Enable PM0 and PM1 chaining.
    pub const CHAIN_0_1: usize = 16;
    /// Enable PM2 and PM3 chaining.
    pub const CHAIN_2_3: usize = 17;
    /// Disengage monitors timer.
    pub const DMC: usize = 18;
    /// Stop monitors in privileged mode.
    pub const SMP: usize = 19;
    /// Stop monitors in debug.
    pub const SMD: usize = 20;
}

/// The global flags as bit masks.
pub mod flag {
    use super::idx;

    pub const CHAIN_0_1: u32 = 1 << idx::CHAIN_0_1;
    pub const CHAIN_2_3: u32 = 1 << idx::CHAIN_2_3;
    pub const DMC: u32 = 1 << idx::DMC;
    pub const SMP: u32 = 1 << idx::SMP;
    pub const SMD: u32 = 1 << idx::SMD;
}

/// A physical 32-bit counter slot, `pm0` up to `pm3`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Slot(u8);

impl Slot {
    pub const PM0: Self = Self(0);
    pub const PM1: Self = Self(1);
    pub const PM2: Self = Self(2);
    pub const PM3: Self = Self(3);

    /// Create a slot from its index, returning `None` if `index >= SLOTS_NUM`.
    pub fn new<U: TryInto<u8>>(index: U) -> Option<Self> {
        let index = index.try_into().ok()?;
        (index < SLOTS_NUM).then_some(Self(index))
    }

    /// Convert a 2-bit value into a slot.
    /// Panics if the value doesn't fit in 2 bits (`0..=3`).
    pub fn from_u2(value_u2: u8) -> Self {
        if value_u2 >= SLOTS_NUM {
            panic!("out of range u2 used");
        }
        Self(value_u2)
    }

    /// Return an iterator over all slots, starting at `pm0` up to `pm3`.
    pub fn iter_all() -> impl Iterator<Item = Self> {
        (0..SLOTS_NUM).map(Self)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Position of this slot's nibble within the pmc register.
    fn shift(self) -> u32 {
        (self.0 as u32) * NIBBLE_BITS
    }
}

impl From<Slot> for u8 {
    fn from(value: Slot) -> Self {
        value.0
    }
}

impl From<Slot> for usize {
    fn from(value: Slot) -> Self {
        value.0 as usize
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pm{}", self.0)
    }
}

/// Start command for `slot`, counting `event`.
pub fn encode_start(slot: Slot, event: Event) -> u32 {
    u32::from(event) << slot.shift()
}

/// Stop command for `slot`.
pub fn encode_stop(slot: Slot) -> u32 {
    STOP << slot.shift()
}

/// Reset command for `slot`.
pub fn encode_reset(slot: Slot) -> u32 {
    RESET << slot.shift()
}

/// Mask covering the command nibble of `slot`.
pub fn mask(slot: Slot) -> u32 {
    NIBBLE_MASK << slot.shift()
}

/// A decoded command nibble.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SlotCommand {
    /// The slot counts the given event.
    Start(Event),
    /// The slot is frozen.
    Stop,
    /// The slot is held at zero.
    Reset,
}

/// Value of the pmc register.
///
/// All `with_*` builders only touch the nibble of the slot they are given; every other bit is
/// carried over unchanged.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct Pmc(u32);

impl Pmc {
    /// Value written by setup before the monitors are reset: every slot stopped, both pairs
    /// chained, and counting suspended outside of user mode.
    pub const SETUP: Self = Self(
        STOP | STOP << 4
            | STOP << 8
            | STOP << 12
            | flag::SMD
            | flag::SMP
            | flag::DMC
            | flag::CHAIN_0_1
            | flag::CHAIN_2_3,
    );

    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn with_start(self, slot: Slot, event: Event) -> Self {
        Self(self.0 & !mask(slot) | encode_start(slot, event))
    }

    pub fn with_stop(self, slot: Slot) -> Self {
        Self(self.0 & !mask(slot) | encode_stop(slot))
    }

    pub fn with_reset(self, slot: Slot) -> Self {
        Self(self.0 & !mask(slot) | encode_reset(slot))
    }

    /// Decode the command nibble of `slot`.
    pub fn command(self, slot: Slot) -> SlotCommand {
        let nibble = (self.0 & mask(slot)) >> slot.shift();
        match nibble {
            STOP => SlotCommand::Stop,
            RESET => SlotCommand::Reset,
            // Nibbles below STOP are exactly the event encodings.
            event => match Event::from_u8(event as u8) {
                Some(event) => SlotCommand::Start(event),
                None => unreachable!("nibble {event:#x} is neither an event nor a sentinel"),
            },
        }
    }

    /// Returns `true` if both slots of `monitor` are counting.
    pub fn is_running(self, monitor: Monitor) -> bool {
        let (low, high) = monitor.slots();
        matches!(self.command(low), SlotCommand::Start(_))
            && matches!(self.command(high), SlotCommand::Start(_))
    }

    /// Returns `true` if the slot pair backing `monitor` is chained.
    pub fn chained(self, monitor: Monitor) -> bool {
        match u8::from(monitor) {
            0 => self.chain_0_1(),
            _ => self.chain_2_3(),
        }
    }

    pub fn chain_0_1(self) -> bool {
        self.0.view_bits::<Lsb0>()[idx::CHAIN_0_1]
    }

    pub fn set_chain_0_1(&mut self, value: bool) {
        self.0.view_bits_mut::<Lsb0>().set(idx::CHAIN_0_1, value);
    }

    pub fn chain_2_3(self) -> bool {
        self.0.view_bits::<Lsb0>()[idx::CHAIN_2_3]
    }

    pub fn set_chain_2_3(&mut self, value: bool) {
        self.0.view_bits_mut::<Lsb0>().set(idx::CHAIN_2_3, value);
    }

    pub fn dmc(self) -> bool {
        self.0.view_bits::<Lsb0>()[idx::DMC]
    }

    pub fn set_dmc(&mut self, value: bool) {
        self.0.view_bits_mut::<Lsb0>().set(idx::DMC, value);
    }

    pub fn smp(self) -> bool {
        self.0.view_bits::<Lsb0>()[idx::SMP]
    }

    pub fn set_smp(&mut self, value: bool) {
        self.0.view_bits_mut::<Lsb0>().set(idx::SMP, value);
    }

    pub fn smd(self) -> bool {
        self.0.view_bits::<Lsb0>()[idx::SMD]
    }

    pub fn set_smd(&mut self, value: bool) {
        self.0.view_bits_mut::<Lsb0>().set(idx::SMD, value);
    }
}

impl From<u32> for Pmc {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Pmc> for u32 {
    fn from(value: Pmc) -> Self {
        value.0
    }
}

impl fmt::Display for Pmc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(0x0001_0000, flag::CHAIN_0_1);
        assert_eq!(0x0002_0000, flag::CHAIN_2_3);
        assert_eq!(0x0004_0000, flag::DMC);
        assert_eq!(0x0008_0000, flag::SMP);
        assert_eq!(0x0010_0000, flag::SMD);
        assert_eq!(0x001F_EEEE, Pmc::SETUP.raw());
    }

    #[test]
    fn test_encodings() {
        assert_eq!(0x0000_0005, encode_start(Slot::PM0, Event::DcacheMisses));
        assert_eq!(0x0000_0D00, encode_start(Slot::PM2, Event::StreamStalls));
        assert_eq!(0x0000_0000, encode_start(Slot::PM3, Event::Cycles));
        assert_eq!(0x0000_00E0, encode_stop(Slot::PM1));
        assert_eq!(0x0000_F000, encode_reset(Slot::PM3));
        assert_eq!(0x0000_0F00, mask(Slot::PM2));
    }

    #[test]
    fn test_masks_are_disjoint() {
        let mut seen = 0;
        for slot in Slot::iter_all() {
            assert_eq!(0, seen & mask(slot));
            seen |= mask(slot);
        }
        assert_eq!(0xFFFF, seen);
        let flags = flag::CHAIN_0_1 | flag::CHAIN_2_3 | flag::DMC | flag::SMP | flag::SMD;
        assert_eq!(0, seen & flags);
    }

    #[test]
    fn test_builders_preserve_other_bits() {
        let pmc = Pmc::from_raw(0xDEAD_BEEF);
        assert_eq!(0xDEAD_BE3F, pmc.with_start(Slot::PM1, Event::IcacheStalls).raw());
        assert_eq!(0xDEAD_EEEF, pmc.with_stop(Slot::PM3).raw());
        assert_eq!(0xDEAD_BEEF, pmc.with_reset(Slot::PM0).raw());
        assert_eq!(0xDEAD_BFEF, pmc.with_reset(Slot::PM2).raw());
    }

    #[test]
    fn test_command() {
        let pmc = Pmc::SETUP
            .with_start(Slot::PM0, Event::Bundles)
            .with_reset(Slot::PM1);
        assert_eq!(SlotCommand::Start(Event::Bundles), pmc.command(Slot::PM0));
        assert_eq!(SlotCommand::Reset, pmc.command(Slot::PM1));
        assert_eq!(SlotCommand::Stop, pmc.command(Slot::PM2));
        assert_eq!(SlotCommand::Start(Event::Cycles), Pmc::default().command(Slot::PM3));
    }

    #[test]
    fn test_is_running() {
        let pmc = Pmc::SETUP.with_start(Slot::PM0, Event::Cycles);
        assert!(!pmc.is_running(Monitor::PM_0_1));
        let pmc = pmc.with_start(Slot::PM1, Event::Cycles);
        assert!(pmc.is_running(Monitor::PM_0_1));
        assert!(!pmc.is_running(Monitor::PM_2_3));
    }

    #[test]
    fn test_flags() {
        let mut pmc = Pmc::default();
        assert!(!pmc.chained(Monitor::PM_0_1));
        pmc.set_chain_2_3(true);
        assert!(!pmc.chained(Monitor::PM_0_1));
        assert!(pmc.chained(Monitor::PM_2_3));
        pmc.set_smp(true);
        pmc.set_smd(true);
        pmc.set_dmc(true);
        pmc.set_chain_0_1(true);
        assert_eq!(Pmc::SETUP.raw() & !0xFFFF, pmc.raw());
        pmc.set_smp(false);
        assert!(!pmc.smp());
        assert!(pmc.smd() && pmc.dmc() && pmc.chain_0_1());
    }

    #[test]
    #[should_panic(expected = "out of range u2 used")]
    fn test_slot_from_u2_out_of_range() {
        Slot::from_u2(4);
    }
}
