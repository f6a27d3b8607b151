//! Rotating magnetic field over an electromagnet array
//!
//! The field moves along a path of channels by cross-fading: the current
//! magnet ramps down while the next one ramps up, in equal linear steps.

use core::convert::Infallible;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::Write;

use crate::pca9685::{self, Pca9685};

/// Clockwise loop around the edge of a 4x4 array, channels numbered row by
/// row from 0
pub const CLOCKWISE: [u8; 12] = [0, 1, 2, 3, 7, 11, 15, 14, 13, 12, 8, 4];

/// Steps per cross-fade
pub const TRANSITION_STEPS: u16 = 100;

/// Pause after every step
pub const STEP_DELAY_MS: u16 = 10;

/// Output whose intensity can be set per channel
pub trait ChannelIntensity {
    /// Error type
    type Error;

    /// Drive `channel` at `intensity`, `0.0` off, `1.0` fully on
    fn set_intensity(&mut self, channel: u8, intensity: f32) -> Result<(), Self::Error>;
}

impl<I2C, E> ChannelIntensity for Pca9685<I2C>
where
    I2C: Write<Error = E>,
{
    type Error = pca9685::Error<E>;

    fn set_intensity(&mut self, channel: u8, intensity: f32) -> Result<(), Self::Error> {
        self.set_channel_duty_cycle(channel, intensity, false)
    }
}

/// Position of the field along a channel path
pub struct RotatingField<'a> {
    path: &'a [u8],
    current: usize,
    steps: u16,
    step_delay_ms: u16,
}

impl<'a> RotatingField<'a> {
    /// Field at the start of `path`, fading in `steps` steps
    ///
    /// Returns `None` when the path has fewer than two channels or `steps`
    /// is zero.
    pub fn new(path: &'a [u8], steps: u16, step_delay_ms: u16) -> Option<Self> {
        if path.len() < 2 || steps == 0 {
            return None;
        }
        Some(RotatingField {
            path,
            current: 0,
            steps,
            step_delay_ms,
        })
    }

    /// Clockwise field with the default pacing
    pub fn clockwise() -> RotatingField<'static> {
        RotatingField {
            path: &CLOCKWISE,
            current: 0,
            steps: TRANSITION_STEPS,
            step_delay_ms: STEP_DELAY_MS,
        }
    }

    /// Channel the field currently sits on
    pub fn current_channel(&self) -> u8 {
        self.path[self.current]
    }

    /// Channel the next cross-fade moves to
    pub fn next_channel(&self) -> u8 {
        self.path[self.next_index()]
    }

    /// Drive `count` channels, starting at 0, at the same `level`
    pub fn set_all<C>(out: &mut C, count: u8, level: f32) -> Result<(), C::Error>
    where
        C: ChannelIntensity,
    {
        for channel in 0..count {
            out.set_intensity(channel, level)?;
        }
        Ok(())
    }

    /// Switch `count` channels, starting at 0, off
    pub fn all_off<C>(out: &mut C, count: u8) -> Result<(), C::Error>
    where
        C: ChannelIntensity,
    {
        Self::set_all(out, count, 0.0)
    }

    /// Switch `count` channels fully on, as a hardware check of every magnet
    pub fn all_on<C>(out: &mut C, count: u8) -> Result<(), C::Error>
    where
        C: ChannelIntensity,
    {
        Self::set_all(out, count, 1.0)
    }

    /// Cross-fade from the current channel to the next one and move on
    pub fn advance<C, D>(&mut self, out: &mut C, delay: &mut D) -> Result<(), C::Error>
    where
        C: ChannelIntensity,
        D: DelayMs<u16>,
    {
        let from = self.current_channel();
        let to = self.next_channel();

        for step in 0..=self.steps {
            let next_strength = f32::from(step) / f32::from(self.steps);
            out.set_intensity(from, 1.0 - next_strength)?;
            out.set_intensity(to, next_strength)?;
            delay.delay_ms(self.step_delay_ms);
        }

        self.current = self.next_index();
        Ok(())
    }

    /// Rotate until an output error occurs
    pub fn run<C, D>(&mut self, out: &mut C, delay: &mut D) -> Result<Infallible, C::Error>
    where
        C: ChannelIntensity,
        D: DelayMs<u16>,
    {
        Self::all_off(out, pca9685::CHANNELS)?;
        loop {
            self.advance(out, delay)?;
        }
    }

    fn next_index(&self) -> usize {
        (self.current + 1) % self.path.len()
    }
}
