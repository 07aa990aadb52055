//! Hardware events a performance monitor can count.

use crate::PerfError;
use std::fmt;
use std::str::FromStr;

/// Number of performance events.
pub const EVENTS_NUM: u8 = 14;

/// An event selector, as written into a slot's command nibble.
///
/// The discriminants are the hardware encodings and must not change.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Event {
    /// Timer cycles.
    Cycles = 0,
    /// Instruction cache hits.
    IcacheHits = 1,
    /// Instruction cache misses.
    IcacheMisses = 2,
    /// Instruction cache miss stalls.
    IcacheStalls = 3,
    /// Data cache hits.
    DcacheHits = 4,
    /// Data cache misses.
    DcacheMisses = 5,
    /// Data cache miss stalls.
    DcacheStalls = 6,
    /// Bundles executed.
    Bundles = 7,
    /// Branches taken.
    BranchTaken = 8,
    /// Branches stalled.
    BranchStalls = 9,
    /// Register dependence stalls.
    RegStalls = 10,
    /// Instruction TLB stalls.
    ItlbStalls = 11,
    /// Data TLB stalls.
    DtlbStalls = 12,
    /// Stream buffer stalls.
    StreamStalls = 13,
}

const_assert_eq!(Event::ALL.len(), EVENTS_NUM as usize);

impl Event {
    /// All events, indexed by their encoding.
    pub const ALL: [Event; EVENTS_NUM as usize] = [
        Event::Cycles,
        Event::IcacheHits,
        Event::IcacheMisses,
        Event::IcacheStalls,
        Event::DcacheHits,
        Event::DcacheMisses,
        Event::DcacheStalls,
        Event::Bundles,
        Event::BranchTaken,
        Event::BranchStalls,
        Event::RegStalls,
        Event::ItlbStalls,
        Event::DtlbStalls,
        Event::StreamStalls,
    ];

    /// Convert an event encoding into an [`Event`], returning `None` if it is out of range.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Short name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Event::Cycles => "cycles",
            Event::IcacheHits => "icache-hits",
            Event::IcacheMisses => "icache-misses",
            Event::IcacheStalls => "icache-stalls",
            Event::DcacheHits => "dcache-hits",
            Event::DcacheMisses => "dcache-misses",
            Event::DcacheStalls => "dcache-stalls",
            Event::Bundles => "bundles",
            Event::BranchTaken => "branch-taken",
            Event::BranchStalls => "branch-stalls",
            Event::RegStalls => "reg-stalls",
            Event::ItlbStalls => "itlb-stalls",
            Event::DtlbStalls => "dtlb-stalls",
            Event::StreamStalls => "stream-stalls",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Event::Cycles => "Timer Cycles",
            Event::IcacheHits => "Instruction Cache Hits",
            Event::IcacheMisses => "Instruction Cache Misses",
            Event::IcacheStalls => "Instruction Cache Misses Stalls",
            Event::DcacheHits => "Data Cache Hits",
            Event::DcacheMisses => "Data Cache Misses",
            Event::DcacheStalls => "Data Cache Misses Stalls",
            Event::Bundles => "Bundles Executed",
            Event::BranchTaken => "Branches Taken",
            Event::BranchStalls => "Branches Stalled",
            Event::RegStalls => "Register Dependence Stalls",
            Event::ItlbStalls => "Instruction TLB Stalls",
            Event::DtlbStalls => "Data TLB Stalls",
            Event::StreamStalls => "Stream Buffer Stalls",
        }
    }
}

impl From<Event> for u8 {
    fn from(value: Event) -> Self {
        value as u8
    }
}

impl From<Event> for u32 {
    fn from(value: Event) -> Self {
        value as u32
    }
}

impl TryFrom<u8> for Event {
    type Error = PerfError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(PerfError::InvalidEvent)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses either the short name (`dcache-misses`) or the numeric encoding (`5`).
impl FromStr for Event {
    type Err = PerfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(value) = s.parse::<u8>() {
            return Self::try_from(value);
        }
        Self::ALL
            .into_iter()
            .find(|event| event.name().eq_ignore_ascii_case(s))
            .ok_or(PerfError::InvalidEvent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodings() {
        for (i, event) in Event::ALL.into_iter().enumerate() {
            assert_eq!(i as u8, u8::from(event));
            assert_eq!(Some(event), Event::from_u8(i as u8));
        }
        assert_eq!(0, u8::from(Event::Cycles));
        assert_eq!(13, u8::from(Event::StreamStalls));
        assert_eq!(None, Event::from_u8(EVENTS_NUM));
        assert_eq!(Err(PerfError::InvalidEvent), Event::try_from(0xEu8));
    }

    #[test]
    fn test_parse() {
        assert_eq!(Ok(Event::Cycles), "cycles".parse::<Event>());
        assert_eq!(Ok(Event::DcacheMisses), "DCACHE-MISSES".parse::<Event>());
        assert_eq!(Ok(Event::Bundles), "7".parse::<Event>());
        assert_eq!(Err(PerfError::InvalidEvent), "14".parse::<Event>());
        assert_eq!(Err(PerfError::InvalidEvent), "l2-misses".parse::<Event>());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for event in Event::ALL {
            assert_eq!(Ok(event), event.to_string().parse::<Event>());
        }
    }
}
