//! This is a [bit banging] I2C master built on the [`embedded-hal`] traits.
//!
//! [bit banging]: https://en.wikipedia.org/wiki/Bit_banging
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal
//!
//! [`i2c::SoftI2c`] drives SCL and SDA through two GPIO pins and implements
//! the blocking `Write`, `Read` and `WriteRead` I2C traits, so existing
//! device drivers can run on it. Line timing comes from a pluggable
//! [`timing::Timing`] strategy.
//!
//! [`pca9685`] and [`field`] build a PWM channel driver and a rotating
//! electromagnet sequence on top of any such bus.

#![no_std]
#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod field;
pub mod i2c;
pub mod pca9685;
pub mod timing;

pub use crate::i2c::{Direction, Error, Nack, SoftI2c};
pub use crate::timing::{Config, Timing};
