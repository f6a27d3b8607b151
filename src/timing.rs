//! Settle-delay strategies
//!
//! Every line transition on the bus is followed by one call to
//! [`Timing::settle`]. The length of that interval sets the effective bus
//! clock: one bit takes roughly three settle intervals.
//!
//! [`SpinTiming`] is a counted busy loop and works on any target.
//! [`TimerTiming`] and [`DelayTiming`] use a hardware timer or a blocking
//! delay provider when the platform has one.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::timer::{CountDown, Periodic};
use nb::block;

/// Spin count used when the configuration leaves it at zero
pub const DEFAULT_DELAY_CYCLES: u32 = 32;

/// Bus configuration
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Config {
    /// Busy-loop iterations per settle interval, `0` selects
    /// [`DEFAULT_DELAY_CYCLES`]
    pub delay_cycles: u32,
}

impl Config {
    /// Configuration with the given spin count
    pub const fn new(delay_cycles: u32) -> Self {
        Config { delay_cycles }
    }

    /// Spin count with the zero default resolved
    pub fn resolved_delay_cycles(&self) -> u32 {
        if self.delay_cycles == 0 {
            DEFAULT_DELAY_CYCLES
        } else {
            self.delay_cycles
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(DEFAULT_DELAY_CYCLES)
    }
}

/// One unit of bus delay
pub trait Timing {
    /// Block until the lines have settled after a transition
    fn settle(&mut self);
}

impl<T: Timing + ?Sized> Timing for &mut T {
    #[inline]
    fn settle(&mut self) {
        (**self).settle()
    }
}

/// Counted busy loop, not calibrated to wall-clock time
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SpinTiming {
    cycles: u32,
}

impl SpinTiming {
    /// Spin for `cycles` iterations per settle, `0` selects the default
    pub fn new(cycles: u32) -> Self {
        SpinTiming::from(Config::new(cycles))
    }

    /// Iterations per settle
    pub fn cycles(&self) -> u32 {
        self.cycles
    }
}

impl Default for SpinTiming {
    fn default() -> Self {
        SpinTiming::from(Config::default())
    }
}

impl From<Config> for SpinTiming {
    fn from(config: Config) -> Self {
        SpinTiming {
            cycles: config.resolved_delay_cycles(),
        }
    }
}

impl Timing for SpinTiming {
    #[inline]
    fn settle(&mut self) {
        for i in 0..self.cycles {
            // keep the loop from being folded away
            core::hint::black_box(i);
            core::hint::spin_loop();
        }
    }
}

/// Waits for one period of an already started periodic timer
///
/// Start the timer at the desired settle rate before handing it over.
pub struct TimerTiming<CLK>
where
    CLK: CountDown + Periodic,
{
    clk: CLK,
}

impl<CLK> TimerTiming<CLK>
where
    CLK: CountDown + Periodic,
{
    /// Wrap a running periodic timer
    pub fn new(clk: CLK) -> Self {
        TimerTiming { clk }
    }

    /// Give the timer back
    pub fn free(self) -> CLK {
        self.clk
    }
}

impl<CLK> Timing for TimerTiming<CLK>
where
    CLK: CountDown + Periodic,
{
    #[inline]
    fn settle(&mut self) {
        block!(self.clk.wait()).ok();
    }
}

/// Fixed microsecond pause from a blocking delay provider
pub struct DelayTiming<D>
where
    D: DelayUs<u32>,
{
    delay: D,
    us: u32,
}

impl<D> DelayTiming<D>
where
    D: DelayUs<u32>,
{
    /// Pause `us` microseconds per settle
    pub fn new(delay: D, us: u32) -> Self {
        DelayTiming { delay, us }
    }

    /// Give the delay provider back
    pub fn free(self) -> D {
        self.delay
    }
}

impl<D> Timing for DelayTiming<D>
where
    D: DelayUs<u32>,
{
    #[inline]
    fn settle(&mut self) {
        self.delay.delay_us(self.us);
    }
}
