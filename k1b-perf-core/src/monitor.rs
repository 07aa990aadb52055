//! Lifecycle of the chained performance monitors.

use crate::event::Event;
use crate::platform::PerfAccess;
use crate::pmc::Pmc;
use crate::{Monitor, PerfError, PerfResult};
use log::{debug, trace, warn};

/// Value returned by [`PerfMonitors::read`] for an invalid monitor.
///
/// It is also a representable count, so callers must compare against it explicitly.
pub const READ_FAILED: u64 = u64::MAX;

/// The performance monitors of one processing unit.
///
/// Owns the platform access for that unit. Every control-register update is a read of the whole
/// `pmc` word, a change of only the nibbles that belong to the addressed monitor, and a write of
/// the whole word back. The `&mut self` receivers serialize these sequences against each other;
/// see [`PerfAccess`] for what the caller must exclude on top of that.
///
/// [`setup`](Self::setup) must run once before the monitors are used.
#[derive(Debug)]
pub struct PerfMonitors<P: PerfAccess> {
    platform: P,
}

impl<P: PerfAccess> PerfMonitors<P> {
    /// Take over the performance monitors reachable through `platform`.
    ///
    /// This does not touch any register; call [`setup`](Self::setup) afterwards.
    pub fn new(platform: P) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn into_inner(self) -> P {
        self.platform
    }

    /// Initialize the performance monitors.
    ///
    /// Stops every slot, chains both slot pairs, suspends counting in privileged and debug mode,
    /// disengages the monitors timer, and then resets both monitors to zero. Running it again
    /// re-establishes the same state.
    pub fn setup(&mut self) {
        debug!("setting up performance monitors");
        self.write_pmc(Pmc::SETUP);
        for monitor in Monitor::iter_all() {
            self.reset(monitor);
        }
    }

    /// Start counting `event` on `monitor`, discarding any previous count.
    ///
    /// Both arguments accept the typed values ([`Monitor`], [`Event`]) as well as raw indices.
    /// Nothing is written if either one is out of range.
    pub fn start<M, E>(&mut self, monitor: M, event: E) -> PerfResult
    where
        M: TryInto<u8>,
        E: TryInto<u8>,
    {
        let monitor = Self::validate_monitor(monitor)?;
        let event = Self::validate_event(event)?;
        debug!("starting monitor {monitor} on {event}");

        let (low, high) = monitor.slots();
        let pmc = self.reset(monitor);
        self.write_pmc(pmc.with_start(low, event).with_start(high, event));
        Ok(())
    }

    /// Stop `monitor`, keeping its count readable.
    ///
    /// Stopping a monitor that is already stopped is harmless.
    pub fn stop<M: TryInto<u8>>(&mut self, monitor: M) -> PerfResult {
        let monitor = Self::validate_monitor(monitor)?;
        debug!("stopping monitor {monitor}");

        let (low, high) = monitor.slots();
        self.modify_pmc(|pmc| pmc.with_stop(low).with_stop(high));
        Ok(())
    }

    /// Read the 64-bit count of `monitor`, or [`READ_FAILED`] if the monitor is invalid.
    ///
    /// See [`try_read`](Self::try_read) for the caveats of the read itself.
    pub fn read<M: TryInto<u8>>(&mut self, monitor: M) -> u64 {
        self.try_read(monitor).unwrap_or(READ_FAILED)
    }

    /// Read the 64-bit count of `monitor`.
    ///
    /// The low slot is read first and the high slot second. The two reads are not atomic: if the
    /// low half of a running monitor wraps in between, the carry is already in the high half and
    /// the result is `2^32` too large. The hardware offers no way to read both halves at once, so
    /// this is a limitation of the read and is not retried. Reading a stopped monitor is exact.
    pub fn try_read<M: TryInto<u8>>(&mut self, monitor: M) -> PerfResult<u64> {
        let monitor = Self::validate_monitor(monitor)?;
        let (low, high) = monitor.slots();
        let lo = self.platform.read_counter(low);
        let hi = self.platform.read_counter(high);
        Ok(combine(hi, lo))
    }

    /// Read the current control word.
    pub fn pmc(&mut self) -> Pmc {
        Pmc::from_raw(self.platform.read_pmc())
    }

    /// Returns `true` if `monitor` is counting.
    pub fn is_running(&mut self, monitor: Monitor) -> bool {
        self.pmc().is_running(monitor)
    }

    /// Zero both slots of `monitor` and leave them idle.
    ///
    /// Returns the control word that was written, so that a following start can build on it
    /// without reading the register again.
    fn reset(&mut self, monitor: Monitor) -> Pmc {
        let (low, high) = monitor.slots();
        self.modify_pmc(|pmc| pmc.with_reset(low).with_reset(high))
    }

    /// Read-modify-write of the control word. Returns the value written.
    fn modify_pmc(&mut self, f: impl FnOnce(Pmc) -> Pmc) -> Pmc {
        let before = self.pmc();
        let after = f(before);
        trace!(before = before.raw(), after = after.raw(); "modifying pmc");
        self.platform.write_pmc(after.raw());
        after
    }

    fn write_pmc(&mut self, pmc: Pmc) {
        trace!(value = pmc.raw(); "writing pmc");
        self.platform.write_pmc(pmc.raw());
    }

    fn validate_monitor<M: TryInto<u8>>(monitor: M) -> PerfResult<Monitor> {
        Monitor::new(monitor).ok_or_else(|| {
            warn!("rejecting invalid performance monitor");
            PerfError::InvalidMonitor
        })
    }

    fn validate_event<E: TryInto<u8>>(event: E) -> PerfResult<Event> {
        event
            .try_into()
            .ok()
            .and_then(Event::from_u8)
            .ok_or_else(|| {
                warn!("rejecting invalid performance event");
                PerfError::InvalidEvent
            })
    }
}

/// Concatenate the two halves of a chained count.
fn combine(hi: u32, lo: u32) -> u64 {
    (hi as u64) << 32 | lo as u64
}
