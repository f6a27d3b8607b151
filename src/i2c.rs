/*!
  # Blocking I2C master over two GPIO pins

  This implementation consumes the following hardware resources:
  - Two GPIO pins for SDA and SCL lines.
  - A [`Timing`] strategy that paces every line transition.

  Only 7-bit addressing is supported. The address arguments of [`SoftI2c::write`],
  [`SoftI2c::write_then_read`] and [`SoftI2c::probe`] are raw 7-bit addresses;
  the read/write bit is added by [`Direction::address_byte`].

  The implementation does not support clock stretching or multi-master
  arbitration.

  ## Hardware requirements

  1. Configure both GPIO pins as open-drain outputs without internal pull,
     with external pull-ups on the bus.
  2. The SDA pin must be readable while it is released (driven high).

  ## Blue Pill example

  ```ignore
    use stm32f1xx_hal as hal;
    use hal::{prelude::*, stm32};
    use soft_i2c::i2c::SoftI2c;
    use soft_i2c::timing::Config;

    let pdev = stm32::Peripherals::take().unwrap();
    let mut rcc = pdev.RCC.constrain();
    let mut gpiob = pdev.GPIOB.split(&mut rcc.apb2);

    let scl = gpiob.pb6.into_open_drain_output(&mut gpiob.crl);
    let sda = gpiob.pb7.into_open_drain_output(&mut gpiob.crl);

    let mut i2c = SoftI2c::with_config(scl, sda, Config::default());
    i2c.init().unwrap();

    // LED0_ON_L of a PCA9685 at 0x40
    i2c.write(0x40, &[0x06, 0x00, 0x00, 0x00, 0x08]).unwrap();
  ```
*/

use embedded_hal::blocking::i2c::{Read, Write, WriteRead};
use embedded_hal::digital::v2::{InputPin, OutputPin};

use crate::timing::{Config, SpinTiming, Timing};

/// Highest valid 7-bit address
pub const MAX_ADDRESS: u8 = 0x7F;

/// I2C error
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Error<E> {
    /// GPIO error
    Bus(E),
    /// No ack received, the transaction was closed with a stop condition
    NoAck(Nack),
    /// Address does not fit in 7 bits
    InvalidAddress(u8),
}

/// Byte that was not acknowledged
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Nack {
    /// Address byte of either direction
    Address,
    /// Payload byte at this index
    Data(usize),
}

/// Transfer direction encoded in the lowest bit of the address byte
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Direction {
    /// Controller to peripheral, R/W bit cleared
    Write,
    /// Peripheral to controller, R/W bit set
    Read,
}

impl Direction {
    /// First byte on the wire for a 7-bit `address`
    ///
    /// The address is shifted left by one and the R/W bit goes into bit 0.
    /// Callers pass the unshifted address and never pre-mask it.
    #[inline]
    pub fn address_byte(self, address: u8) -> u8 {
        let rw = match self {
            Direction::Write => 0x0,
            Direction::Read => 0x1,
        };
        (address << 1) | rw
    }
}

/// Bit banging I2C bus master
///
/// Owns both lines, so a second handle to the same bus cannot exist.
/// All operations take `&mut self`; sharing one bus between execution
/// contexts needs a lock around the whole handle.
pub struct SoftI2c<SCL, SDA, T>
where
    SCL: OutputPin,
    SDA: OutputPin + InputPin,
    T: Timing,
{
    scl: SCL,
    sda: SDA,
    timing: T,
}

impl<SCL, SDA, E> SoftI2c<SCL, SDA, SpinTiming>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
{
    /// Create instance paced by a busy loop of `config.delay_cycles`
    pub fn with_config(scl: SCL, sda: SDA, config: Config) -> Self {
        SoftI2c::new(scl, sda, SpinTiming::from(config))
    }
}

impl<SCL, SDA, T, E> SoftI2c<SCL, SDA, T>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    T: Timing,
{
    /// Create instance
    ///
    /// The lines are not touched until [`init`](SoftI2c::init).
    pub fn new(scl: SCL, sda: SDA, timing: T) -> Self {
        SoftI2c { scl, sda, timing }
    }

    /// Release the pins and the timing strategy
    pub fn free(self) -> (SCL, SDA, T) {
        (self.scl, self.sda, self.timing)
    }

    /// Release both lines and wait one interval, leaving the bus free
    pub fn init(&mut self) -> Result<(), Error<E>> {
        self.scl.set_high().map_err(Error::Bus)?;
        self.sda.set_high().map_err(Error::Bus)?;
        self.timing.settle();
        Ok(())
    }

    /// Start condition, also used as repeated start
    ///
    /// Leaves SCL low.
    pub fn start(&mut self) -> Result<(), Error<E>> {
        self.set_sda(true)?;
        self.set_scl(true)?;
        self.set_sda(false)?;
        self.set_scl(false)
    }

    /// Stop condition
    ///
    /// Leaves both lines released.
    pub fn stop(&mut self) -> Result<(), Error<E>> {
        self.set_sda(false)?;
        self.set_scl(true)?;
        self.set_sda(true)
    }

    /// Shift out one byte MSB first and clock in the acknowledge bit
    ///
    /// Returns `true` when the peripheral pulled SDA low during the ninth
    /// clock. Leaves SCL low.
    pub fn transmit_byte(&mut self, byte: u8) -> Result<bool, Error<E>> {
        for bit_offset in 0..8 {
            let out_bit = (byte >> (7 - bit_offset)) & 0b1;

            self.set_scl(false)?;
            self.set_sda(out_bit == 1)?;
            self.set_scl(true)?;
        }

        self.set_scl(false)?;
        self.set_sda(true)?;
        self.set_scl(true)?;
        let ack = !self.sda_is_high()?;
        self.set_scl(false)?;

        Ok(ack)
    }

    /// Clock in one byte MSB first, then answer with ACK or NACK
    ///
    /// `ack` is `true` when more bytes are wanted. The last byte of a read
    /// must be answered with NACK. A silent bus reads as `0xFF`.
    pub fn receive_byte(&mut self, ack: bool) -> Result<u8, Error<E>> {
        let mut byte: u8 = 0;

        self.set_sda(true)?;

        for bit_offset in 0..8 {
            self.set_scl(false)?;
            self.set_scl(true)?;

            if self.sda_is_high()? {
                byte |= 1 << (7 - bit_offset);
            }
        }

        self.set_scl(false)?;
        self.set_sda(!ack)?;
        self.set_scl(true)?;
        self.set_scl(false)?;
        self.set_sda(true)?;

        Ok(byte)
    }

    /// Write `data` to the peripheral at `address`
    ///
    /// An empty `data` is an address-only transaction that succeeds when the
    /// address is acknowledged. Sending stops at the first byte that is not
    /// acknowledged.
    pub fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Error<E>> {
        Self::check_address(address)?;
        log::trace!("write {:#04x}, {} bytes", address, data.len());

        self.write_phase(address, data)?;

        // SP
        self.stop()
    }

    /// Write `tx`, then read `rx.len()` bytes within one transaction
    ///
    /// The read phase opens with a repeated start, so the bus is not released
    /// between the two phases. With an empty `tx` this is a plain read, with
    /// an empty `rx` a plain write. If both are empty nothing happens on the
    /// lines.
    pub fn write_then_read(
        &mut self,
        address: u8,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), Error<E>> {
        if tx.is_empty() && rx.is_empty() {
            return Ok(());
        }
        Self::check_address(address)?;
        log::trace!(
            "write_then_read {:#04x}, {} out, {} in",
            address,
            tx.len(),
            rx.len()
        );

        if !tx.is_empty() {
            self.write_phase(address, tx)?;
        }

        if !rx.is_empty() {
            // SR
            self.start()?;

            // SAD + R
            self.send_address(address, Direction::Read)?;

            self.read_from_slave(rx)?;
        }

        // SP
        self.stop()
    }

    /// Check whether a peripheral answers at `address`
    ///
    /// Returns `Ok(false)` when the address is not acknowledged.
    pub fn probe(&mut self, address: u8) -> Result<bool, Error<E>> {
        match self.write(address, &[]) {
            Ok(()) => Ok(true),
            Err(Error::NoAck(Nack::Address)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[inline]
    fn check_address(address: u8) -> Result<(), Error<E>> {
        if address > MAX_ADDRESS {
            Err(Error::InvalidAddress(address))
        } else {
            Ok(())
        }
    }

    fn write_phase(&mut self, address: u8, output: &[u8]) -> Result<(), Error<E>> {
        // ST
        self.start()?;

        // SAD + W
        self.send_address(address, Direction::Write)?;

        self.write_to_slave(address, output)
    }

    fn send_address(&mut self, address: u8, direction: Direction) -> Result<(), Error<E>> {
        if self.transmit_byte(direction.address_byte(address))? {
            Ok(())
        } else {
            self.abort(address, Nack::Address)
        }
    }

    #[inline]
    fn write_to_slave(&mut self, address: u8, output: &[u8]) -> Result<(), Error<E>> {
        for (index, byte) in output.iter().enumerate() {
            if !self.transmit_byte(*byte)? {
                return self.abort(address, Nack::Data(index));
            }
        }
        Ok(())
    }

    #[inline]
    fn read_from_slave(&mut self, input: &mut [u8]) -> Result<(), Error<E>> {
        let last = input.len() - 1;
        for (i, slot) in input.iter_mut().enumerate() {
            *slot = self.receive_byte(i != last)?;
        }
        Ok(())
    }

    fn abort<R>(&mut self, address: u8, nack: Nack) -> Result<R, Error<E>> {
        log::debug!("no ack from {:#04x} on {:?}", address, nack);
        self.stop()?;
        Err(Error::NoAck(nack))
    }

    #[inline]
    fn set_scl(&mut self, high: bool) -> Result<(), Error<E>> {
        if high {
            self.scl.set_high()
        } else {
            self.scl.set_low()
        }
        .map_err(Error::Bus)?;
        self.timing.settle();
        Ok(())
    }

    #[inline]
    fn set_sda(&mut self, high: bool) -> Result<(), Error<E>> {
        if high {
            self.sda.set_high()
        } else {
            self.sda.set_low()
        }
        .map_err(Error::Bus)?;
        self.timing.settle();
        Ok(())
    }

    #[inline]
    fn sda_is_high(&mut self) -> Result<bool, Error<E>> {
        self.sda.is_high().map_err(Error::Bus)
    }
}

impl<SCL, SDA, T, E> Write for SoftI2c<SCL, SDA, T>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    T: Timing,
{
    type Error = Error<E>;

    fn write(&mut self, addr: u8, output: &[u8]) -> Result<(), Self::Error> {
        SoftI2c::write(self, addr, output)
    }
}

impl<SCL, SDA, T, E> Read for SoftI2c<SCL, SDA, T>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    T: Timing,
{
    type Error = Error<E>;

    fn read(&mut self, addr: u8, input: &mut [u8]) -> Result<(), Self::Error> {
        self.write_then_read(addr, &[], input)
    }
}

impl<SCL, SDA, T, E> WriteRead for SoftI2c<SCL, SDA, T>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    T: Timing,
{
    type Error = Error<E>;

    fn write_read(&mut self, addr: u8, output: &[u8], input: &mut [u8]) -> Result<(), Self::Error> {
        self.write_then_read(addr, output, input)
    }
}
