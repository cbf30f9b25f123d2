//! Monotonic microsecond clock, timers and the per-iteration timesliver.
//!
//! The clock is built from a millisecond counter advanced by a periodic
//! interrupt and a sub-millisecond hardware count. Microseconds wrap every
//! ~71 minutes; elapsed-time arithmetic tolerates exactly one wrap.

use crate::math::{fp_ratio, shl, shr, FixedPoint};

/// Hardware view of the timekeeping interrupt.
pub trait TickSource {
    /// Milliseconds counted by the tick interrupt.
    fn millis(&self) -> u32;

    /// Microseconds into the current millisecond, `0..1000`.
    fn sub_millis_micros(&self) -> u32;
}

impl<T: TickSource + ?Sized> TickSource for &T {
    fn millis(&self) -> u32 {
        (**self).millis()
    }

    fn sub_millis_micros(&self) -> u32 {
        (**self).sub_millis_micros()
    }
}

/// Snapshot of [`Clock::now_micros`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timer(u32);

impl Timer {
    pub const fn at(micros: u32) -> Self {
        Self(micros)
    }

    pub const fn started_at(&self) -> u32 {
        self.0
    }

    /// Microseconds from this snapshot to `now`, across at most one wrap.
    pub const fn elapsed_at(&self, now: u32) -> u32 {
        now.wrapping_sub(self.0)
    }
}

pub struct Clock<T: TickSource> {
    source: T,
}

impl<T: TickSource> Clock<T> {
    pub const fn new(source: T) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &T {
        &self.source
    }

    /// Current time in microseconds.
    ///
    /// The millisecond counter is read on both sides of the sub-tick sample;
    /// if the tick interrupt fired in between, the pair is torn and is taken
    /// again.
    pub fn now_micros(&self) -> u32 {
        loop {
            let millis = self.source.millis();
            let sub = self.source.sub_millis_micros();
            if self.source.millis() == millis {
                return millis.wrapping_mul(1000).wrapping_add(sub);
            }
        }
    }

    pub fn start_timer(&self) -> Timer {
        Timer(self.now_micros())
    }

    pub fn elapsed_micros(&self, timer: Timer) -> u32 {
        timer.elapsed_at(self.now_micros())
    }

    /// Elapsed microseconds, restarting `timer` at the same instant.
    pub fn elapsed_and_reset(&self, timer: &mut Timer) -> u32 {
        let now = self.now_micros();
        let elapsed = timer.elapsed_at(now);
        timer.0 = now;
        elapsed
    }

    /// Busy-waits. Startup and calibration only.
    pub fn delay_ms(&self, millis: u32) {
        let timer = self.start_timer();
        let micros = millis.saturating_mul(1000);
        while self.elapsed_micros(timer) < micros {
            core::hint::spin_loop();
        }
    }

    /// Time since the previous iteration, restarting `loop_timer`.
    pub fn timesliver(&self, loop_timer: &mut Timer) -> Timesliver {
        Timesliver::from_micros(self.elapsed_and_reset(loop_timer))
    }
}

/// Seconds since the previous control iteration, carried with
/// [`Timesliver::EXTRA_SHIFT`] extra fractional bits.
///
/// A 2 ms iteration is only ~131 units of plain fixed point; the extra bits
/// keep integrators and filters from losing most of their resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timesliver(FixedPoint);

impl Timesliver {
    pub const EXTRA_SHIFT: u32 = 3;

    /// Longest step any single iteration may account for.
    pub const MAX: Timesliver = Timesliver(shl(fp_ratio(1, 50), Self::EXTRA_SHIFT));

    /// 2^16 · 2^16 · 10^-6, seconds per microsecond in 32.32.
    const MICROS_TO_SECONDS: u64 = 4295;

    pub fn from_micros(micros: u32) -> Self {
        let shifted =
            (micros as u64 * Self::MICROS_TO_SECONDS) >> (16 - Self::EXTRA_SHIFT);
        let max = Self::MAX.0.to_bits() as u64;
        Self(FixedPoint::from_bits(shifted.min(max) as i32))
    }

    /// Seconds scaled by `2^EXTRA_SHIFT`.
    pub const fn raw(&self) -> FixedPoint {
        self.0
    }

    /// Plain fixed-point seconds.
    pub const fn seconds(&self) -> FixedPoint {
        shr(self.0, Self::EXTRA_SHIFT)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Timesliver {
    fn format(&self, f: defmt::Formatter) {
        let micros = (self.0.to_bits() as i64 * 1_000_000) >> (16 + Self::EXTRA_SHIFT);
        defmt::write!(f, "{=i64}us", micros)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::cell::Cell;

    /// Scripted tick source for tests: time only moves when told to.
    #[derive(Default)]
    pub struct FakeTicks {
        pub micros: Cell<u64>,
        /// Millisecond counter reads left before a tick lands mid-sample.
        pub tear_after: Cell<Option<u32>>,
        pub millis_reads: Cell<u32>,
        /// Added after every sub-tick read so busy-waits finish.
        pub step: Cell<u64>,
    }

    impl FakeTicks {
        pub fn at(micros: u64) -> Self {
            let ticks = Self::default();
            ticks.micros.set(micros);
            ticks
        }

        pub fn advance(&self, micros: u64) {
            self.micros.set(self.micros.get() + micros);
        }
    }

    impl TickSource for FakeTicks {
        fn millis(&self) -> u32 {
            self.millis_reads.set(self.millis_reads.get() + 1);
            if let Some(left) = self.tear_after.get() {
                if left == 0 {
                    self.tear_after.set(None);
                    self.advance(1000 - self.micros.get() % 1000);
                } else {
                    self.tear_after.set(Some(left - 1));
                }
            }
            (self.micros.get() / 1000) as u32
        }

        fn sub_millis_micros(&self) -> u32 {
            let sub = (self.micros.get() % 1000) as u32;
            self.advance(self.step.get());
            sub
        }
    }

    #[test]
    fn now_combines_millis_and_sub_ticks() {
        let clock = Clock::new(FakeTicks::at(12_345_678));
        assert_eq!(clock.now_micros(), 12_345_678);
    }

    #[test]
    fn torn_sample_is_retried() {
        let ticks = FakeTicks::at(4_999_990);
        // The second millisecond read sees the tick that fired after the sub-tick sample.
        ticks.tear_after.set(Some(1));
        let clock = Clock::new(&ticks);
        assert_eq!(clock.now_micros(), 5_000_000);
        assert_eq!(ticks.millis_reads.get(), 4);
    }

    #[test]
    fn elapsed_survives_one_wrap() {
        let timer = Timer::at(u32::MAX - 10);
        assert_eq!(timer.elapsed_at(5), 16);

        let clock = Clock::new(FakeTicks::at(u32::MAX as u64 - 10));
        let timer = clock.start_timer();
        clock.source().advance(16);
        assert_eq!(clock.elapsed_micros(timer), 16);
    }

    #[test]
    fn elapsed_and_reset_restarts_the_timer() {
        let clock = Clock::new(FakeTicks::at(1_000));
        let mut timer = clock.start_timer();
        clock.source().advance(2_500);
        assert_eq!(clock.elapsed_and_reset(&mut timer), 2_500);
        assert_eq!(timer.started_at(), 3_500);
        assert_eq!(clock.elapsed_micros(timer), 0);
    }

    #[test]
    fn timesliver_scales_and_clamps() {
        let two_ms = Timesliver::from_micros(2_000);
        // 2000 * 4295 >> 13
        assert_eq!(two_ms.raw().to_bits(), 1048);
        assert_eq!(two_ms.seconds().to_bits(), 131);

        let stalled = Timesliver::from_micros(250_000);
        assert_eq!(stalled, Timesliver::MAX);
        assert_eq!(Timesliver::from_micros(u32::MAX), Timesliver::MAX);
    }

    #[test]
    fn timesliver_from_clock() {
        let clock = Clock::new(FakeTicks::at(0));
        let mut loop_timer = clock.start_timer();
        clock.source().advance(1_000);
        let ts = clock.timesliver(&mut loop_timer);
        assert_eq!(ts, Timesliver::from_micros(1_000));
    }
}
