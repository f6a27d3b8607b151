//! PCA9685 16-channel PWM controller, duty cycle only
//!
//! Works on any blocking `embedded-hal` I2C bus, including
//! [`SoftI2c`](crate::i2c::SoftI2c).

use embedded_hal::blocking::i2c::Write;

/// Address with all address pins tied low
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Number of PWM outputs
pub const CHANNELS: u8 = 16;

/// PWM period in counts
const COUNTS: u16 = 4096;

const MODE1: u8 = 0x00;
const LED0_ON_L: u8 = 0x06;

const MODE1_AI: u8 = 0x20;
const FULL: u8 = 0x10;

/// PCA9685 error
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Error<E> {
    /// Bus error
    I2c(E),
    /// Channel outside `0..16`
    InvalidChannel(u8),
}

/// PCA9685 driver
pub struct Pca9685<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> Pca9685<I2C>
where
    I2C: Write<Error = E>,
{
    /// Create instance for the controller at 7-bit `address`
    pub fn new(i2c: I2C, address: u8) -> Self {
        Pca9685 { i2c, address }
    }

    /// Give the bus back
    pub fn destroy(self) -> I2C {
        self.i2c
    }

    /// Leave sleep mode with register auto-increment enabled
    pub fn wake(&mut self) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, &[MODE1, MODE1_AI])
            .map_err(Error::I2c)
    }

    /// Set `channel` to `duty` of the period, `0.0..=1.0`
    ///
    /// Values outside the range are clamped. `invert` flips the duty for
    /// active-low loads.
    pub fn set_channel_duty_cycle(
        &mut self,
        channel: u8,
        duty: f32,
        invert: bool,
    ) -> Result<(), Error<E>> {
        if channel >= CHANNELS {
            return Err(Error::InvalidChannel(channel));
        }

        let duty = if invert { 1.0 - clamp(duty) } else { clamp(duty) };
        let off = duty_counts(duty);

        let [on_h, off_l, off_h] = if off == 0 {
            [0x00, 0x00, FULL]
        } else if off >= COUNTS {
            [FULL, 0x00, 0x00]
        } else {
            [0x00, (off & 0xFF) as u8, (off >> 8) as u8]
        };

        let register = LED0_ON_L + 4 * channel;
        self.i2c
            .write(self.address, &[register, 0x00, on_h, off_l, off_h])
            .map_err(Error::I2c)
    }
}

fn clamp(duty: f32) -> f32 {
    if duty > 1.0 {
        1.0
    } else if duty > 0.0 {
        duty
    } else {
        // also NaN
        0.0
    }
}

fn duty_counts(duty: f32) -> u16 {
    (duty * COUNTS as f32 + 0.5) as u16
}
