//! A model of the K1B performance monitor block.
//!
//! [`SimulatedPmu`] implements [`PerfAccess`] on top of a plain control word and four counter
//! slots, and interprets the command nibbles the way the hardware does. It is the backing store the
//! tests and the command line tool run the controller against; events are delivered explicitly
//! with [`SimulatedPmu::record`].
//!
//! The "disengage monitors timer" flag has no observable effect here.

use crate::event::Event;
use crate::platform::PerfAccess;
use crate::pmc::{Pmc, Slot, SlotCommand, SLOTS_NUM};
use crate::Monitor;
use log::trace;

/// Execution mode of the simulated processing unit.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ExecutionMode {
    #[default]
    User,
    /// Counting is suspended here when the SMP flag is set.
    Privileged,
    /// Counting is suspended here when the SMD flag is set.
    Debug,
}

#[derive(Debug, Default, Clone)]
pub struct Config {
    /// Cycles elapsed for every register access, delivered as [`Event::Cycles`].
    ///
    /// This is how the cost of the measurement itself shows up in a running monitor.
    pub access_cost: u32,
    /// Mode the processing unit starts in.
    pub mode: ExecutionMode,
}

#[derive(Debug, Clone)]
pub struct SimulatedPmu {
    config: Config,
    mode: ExecutionMode,
    pmc: Pmc,
    counters: [u32; SLOTS_NUM as usize],
    pmc_reads: u64,
    pmc_writes: u64,
    counter_reads: u64,
}

impl Default for SimulatedPmu {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl SimulatedPmu {
    /// Create a block in its power-on state: every slot stopped, nothing chained, counts at zero.
    pub fn new(config: Config) -> Self {
        let pmc = Slot::iter_all().fold(Pmc::default(), |pmc, slot| pmc.with_stop(slot));
        Self {
            mode: config.mode,
            config,
            pmc,
            counters: [0; SLOTS_NUM as usize],
            pmc_reads: 0,
            pmc_writes: 0,
            counter_reads: 0,
        }
    }

    /// Provide a read-only view of this block's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ExecutionMode) {
        self.mode = mode;
    }

    /// Returns the control word without performing a register access.
    pub fn pmc(&self) -> Pmc {
        self.pmc
    }

    /// Returns the value of a counter slot without performing a register access.
    pub fn counter(&self, slot: Slot) -> u32 {
        self.counters[usize::from(slot)]
    }

    /// Overwrite the value of a counter slot.
    pub fn set_counter(&mut self, slot: Slot, value: u32) {
        self.counters[usize::from(slot)] = value;
    }

    /// Number of reads of the control word so far.
    pub fn pmc_reads(&self) -> u64 {
        self.pmc_reads
    }

    /// Number of writes to the control word so far.
    pub fn pmc_writes(&self) -> u64 {
        self.pmc_writes
    }

    /// Number of counter slot reads so far.
    pub fn counter_reads(&self) -> u64 {
        self.counter_reads
    }

    /// Let `cycles` cycles elapse.
    pub fn busy_wait(&mut self, cycles: u64) {
        self.record(Event::Cycles, cycles);
    }

    /// Deliver `n` occurrences of `event` to every monitor counting it.
    pub fn record(&mut self, event: Event, n: u64) {
        if n == 0 || self.is_suspended() {
            return;
        }
        for monitor in Monitor::iter_all() {
            self.advance(monitor, event, n);
        }
    }

    fn is_suspended(&self) -> bool {
        match self.mode {
            ExecutionMode::User => false,
            ExecutionMode::Privileged => self.pmc.smp(),
            ExecutionMode::Debug => self.pmc.smd(),
        }
    }

    fn advance(&mut self, monitor: Monitor, event: Event, n: u64) {
        let (low, high) = monitor.slots();
        let counts = |slot: Slot| self.pmc.command(slot) == SlotCommand::Start(event);

        if self.pmc.chained(monitor) {
            // The high slot only counts carries out of the low slot.
            if !counts(low) {
                return;
            }
            let high_running = matches!(self.pmc.command(high), SlotCommand::Start(_));
            let total = self.counters[usize::from(low)] as u128 + n as u128;
            self.counters[usize::from(low)] = total as u32;
            if high_running {
                let carry = (total >> 32) as u32;
                let high = &mut self.counters[usize::from(high)];
                *high = high.wrapping_add(carry);
            }
        } else {
            for slot in [low, high] {
                if counts(slot) {
                    let counter = &mut self.counters[usize::from(slot)];
                    *counter = counter.wrapping_add(n as u32);
                }
            }
        }
    }

    fn charge_access(&mut self) {
        let cost = self.config.access_cost;
        self.record(Event::Cycles, cost as u64);
    }
}

impl PerfAccess for SimulatedPmu {
    fn read_pmc(&mut self) -> u32 {
        let value = self.pmc.raw();
        self.pmc_reads += 1;
        self.charge_access();
        value
    }

    fn write_pmc(&mut self, value: u32) {
        let pmc = Pmc::from_raw(value);
        for slot in Slot::iter_all() {
            if pmc.command(slot) == SlotCommand::Reset {
                self.counters[usize::from(slot)] = 0;
            }
        }
        trace!("simulated pmc write {} -> {}", self.pmc, pmc);
        self.pmc = pmc;
        self.pmc_writes += 1;
        self.charge_access();
    }

    fn read_counter(&mut self, slot: Slot) -> u32 {
        let value = self.counter(slot);
        self.counter_reads += 1;
        self.charge_access();
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmc::flag;

    fn pmu_with(pmc: Pmc) -> SimulatedPmu {
        let mut pmu = SimulatedPmu::default();
        pmu.write_pmc(pmc.raw());
        pmu
    }

    #[test]
    fn test_power_on_state() {
        let pmu = SimulatedPmu::default();
        for slot in Slot::iter_all() {
            assert_eq!(SlotCommand::Stop, pmu.pmc().command(slot));
            assert_eq!(0, pmu.counter(slot));
        }
        assert_eq!(0, pmu.pmc_reads() + pmu.pmc_writes() + pmu.counter_reads());
    }

    #[test]
    fn test_reset_zeroes_counter() {
        let mut pmu = SimulatedPmu::default();
        pmu.set_counter(Slot::PM1, 42);
        pmu.set_counter(Slot::PM2, 43);
        let pmc = pmu.pmc().with_reset(Slot::PM1);
        pmu.write_pmc(pmc.raw());
        assert_eq!(0, pmu.counter(Slot::PM1));
        assert_eq!(43, pmu.counter(Slot::PM2));
    }

    #[test]
    fn test_stopped_slot_is_frozen() {
        let mut pmu = pmu_with(Pmc::SETUP);
        pmu.set_counter(Slot::PM0, 7);
        pmu.busy_wait(100);
        assert_eq!(7, pmu.counter(Slot::PM0));
    }

    #[test]
    fn test_chained_carry() {
        let pmc = Pmc::from_raw(flag::CHAIN_0_1)
            .with_start(Slot::PM0, Event::Cycles)
            .with_start(Slot::PM1, Event::Cycles)
            .with_stop(Slot::PM2)
            .with_stop(Slot::PM3);
        let mut pmu = pmu_with(pmc);
        pmu.set_counter(Slot::PM0, 0xFFFF_FFF0);
        pmu.busy_wait(0x20);
        assert_eq!(0x10, pmu.counter(Slot::PM0));
        assert_eq!(1, pmu.counter(Slot::PM1));
        pmu.busy_wait(3 << 32);
        assert_eq!(0x10, pmu.counter(Slot::PM0));
        assert_eq!(4, pmu.counter(Slot::PM1));
    }

    #[test]
    fn test_unchained_slots_count_independently() {
        let pmc = Pmc::default()
            .with_start(Slot::PM0, Event::Cycles)
            .with_start(Slot::PM1, Event::Cycles)
            .with_stop(Slot::PM2)
            .with_stop(Slot::PM3);
        let mut pmu = pmu_with(pmc);
        pmu.set_counter(Slot::PM0, 0xFFFF_FFFF);
        pmu.busy_wait(2);
        assert_eq!(1, pmu.counter(Slot::PM0));
        assert_eq!(2, pmu.counter(Slot::PM1));
    }

    #[test]
    fn test_other_events_are_ignored() {
        let pmc = Pmc::SETUP
            .with_start(Slot::PM2, Event::DcacheMisses)
            .with_start(Slot::PM3, Event::DcacheMisses);
        let mut pmu = pmu_with(pmc);
        pmu.busy_wait(1000);
        pmu.record(Event::DcacheHits, 10);
        assert_eq!(0, pmu.counter(Slot::PM2));
        pmu.record(Event::DcacheMisses, 10);
        assert_eq!(10, pmu.counter(Slot::PM2));
        assert_eq!(0, pmu.counter(Slot::PM3));
    }

    #[test]
    fn test_suspended_modes() {
        let pmc = Pmc::SETUP
            .with_start(Slot::PM0, Event::Cycles)
            .with_start(Slot::PM1, Event::Cycles);
        let mut pmu = pmu_with(pmc);
        pmu.set_mode(ExecutionMode::Privileged);
        pmu.busy_wait(10);
        pmu.set_mode(ExecutionMode::Debug);
        pmu.busy_wait(10);
        assert_eq!(0, pmu.counter(Slot::PM0));
        pmu.set_mode(ExecutionMode::User);
        pmu.busy_wait(10);
        assert_eq!(10, pmu.counter(Slot::PM0));

        let mut pmc = pmu.pmc();
        pmc.set_smp(false);
        pmu.write_pmc(pmc.raw());
        pmu.set_mode(ExecutionMode::Privileged);
        pmu.busy_wait(10);
        assert_eq!(20, pmu.counter(Slot::PM0));
    }

    #[test]
    fn test_access_cost() {
        let config = Config {
            access_cost: 5,
            ..Config::default()
        };
        let mut pmu = SimulatedPmu::new(config);
        let pmc = Pmc::SETUP
            .with_start(Slot::PM0, Event::Cycles)
            .with_start(Slot::PM1, Event::Cycles);
        // The write itself starts the counter, so its own cost is already counted.
        pmu.write_pmc(pmc.raw());
        assert_eq!(5, pmu.counter(Slot::PM0));
        assert_eq!(5, pmu.read_counter(Slot::PM0));
        assert_eq!(10, pmu.counter(Slot::PM0));
        pmu.read_pmc();
        assert_eq!(15, pmu.counter(Slot::PM0));
        assert_eq!((1, 1, 1), (pmu.pmc_reads(), pmu.pmc_writes(), pmu.counter_reads()));
    }
}
