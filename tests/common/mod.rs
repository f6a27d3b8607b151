//! Simulated open-drain bus with one register-file peripheral
//!
//! The peripheral decodes the waveform the controller produces: start and
//! stop conditions from SDA edges while SCL is high, data bits on rising SCL
//! edges, and it drives SDA itself for acknowledge bits and read data. It
//! behaves like a 24x02 EEPROM or a PCA9685: the first written byte sets the
//! register pointer, further bytes are stored with auto-increment, reads
//! return registers from the pointer on.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::v2::{InputPin, OutputPin};
use soft_i2c::timing::Timing;
use soft_i2c::SoftI2c;

/// Decoded bus activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Stop,
    /// Byte clocked in by the peripheral, `acked` by the peripheral
    Received { byte: u8, acked: bool },
    /// Byte clocked out by the peripheral, `acked` by the controller
    Sent { byte: u8, acked: bool },
}

/// Raw drive from the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    Scl(bool),
    Sda(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Receive,
    Transmit,
}

pub struct Target {
    pub address: u8,
    pub memory: [u8; 256],
    pub pointer: u8,
    /// Refuse the payload byte with this index
    pub nack_data_at: Option<usize>,
    mode: Mode,
    first_byte: bool,
    selected: bool,
    shift: u8,
    bits: u8,
    data_index: usize,
    pulling: bool,
    outgoing: u8,
    master_ack: bool,
}

impl Target {
    fn new(address: u8) -> Self {
        Target {
            address,
            memory: [0; 256],
            pointer: 0,
            nack_data_at: None,
            mode: Mode::Idle,
            first_byte: false,
            selected: false,
            shift: 0,
            bits: 0,
            data_index: 0,
            pulling: false,
            outgoing: 0xFF,
            master_ack: false,
        }
    }

    fn on_start(&mut self) {
        self.mode = Mode::Receive;
        self.first_byte = true;
        self.selected = false;
        self.shift = 0;
        self.bits = 0;
        self.data_index = 0;
        self.pulling = false;
    }

    fn on_stop(&mut self) {
        self.mode = Mode::Idle;
        self.pulling = false;
    }

    fn on_rising(&mut self, sda: bool, events: &mut Vec<Event>) {
        match self.mode {
            Mode::Idle => {}
            Mode::Receive => {
                if self.bits < 8 {
                    self.shift = (self.shift << 1) | sda as u8;
                    self.bits += 1;
                } else if self.bits == 8 {
                    events.push(Event::Received {
                        byte: self.shift,
                        acked: self.pulling,
                    });
                    self.bits = 9;
                }
            }
            Mode::Transmit => {
                if self.bits < 8 {
                    self.bits += 1;
                } else if self.bits == 8 {
                    self.master_ack = !sda;
                    events.push(Event::Sent {
                        byte: self.outgoing,
                        acked: self.master_ack,
                    });
                    self.bits = 9;
                }
            }
        }
    }

    fn on_falling(&mut self) {
        match self.mode {
            Mode::Idle => {}
            Mode::Receive => {
                if self.bits == 8 {
                    self.pulling = if self.first_byte {
                        self.selected = self.shift >> 1 == self.address;
                        self.selected
                    } else {
                        self.selected && self.nack_data_at != Some(self.data_index)
                    };
                } else if self.bits == 9 {
                    let acked = self.pulling;
                    self.pulling = false;
                    if self.first_byte {
                        self.first_byte = false;
                        if acked && self.shift & 1 == 1 {
                            self.mode = Mode::Transmit;
                            self.load();
                            return;
                        }
                    } else if acked {
                        self.store(self.shift);
                    }
                    self.shift = 0;
                    self.bits = 0;
                }
            }
            Mode::Transmit => {
                if self.bits < 8 {
                    self.drive_bit();
                } else if self.bits == 8 {
                    self.pulling = false;
                } else if self.master_ack {
                    self.load();
                } else {
                    self.mode = Mode::Idle;
                    self.pulling = false;
                }
            }
        }
    }

    fn store(&mut self, byte: u8) {
        if self.data_index == 0 {
            self.pointer = byte;
        } else {
            self.memory[self.pointer as usize] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
        self.data_index += 1;
    }

    fn load(&mut self) {
        self.outgoing = self.memory[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        self.bits = 0;
        self.drive_bit();
    }

    fn drive_bit(&mut self) {
        self.pulling = (self.outgoing >> (7 - self.bits)) & 1 == 0;
    }
}

pub struct Wire {
    scl: bool,
    sda_master: bool,
    pub target: Target,
    pub events: Vec<Event>,
    pub drives: Vec<Drive>,
    /// SDA level at every rising SCL edge, as seen on the wire
    pub clocked: Vec<bool>,
}

impl Wire {
    pub fn sda(&self) -> bool {
        self.sda_master && !self.target.pulling
    }

    pub fn scl(&self) -> bool {
        self.scl
    }

    fn drive_scl(&mut self, level: bool) {
        self.drives.push(Drive::Scl(level));
        if level == self.scl {
            return;
        }
        self.scl = level;
        if level {
            let sda = self.sda();
            self.clocked.push(sda);
            self.target.on_rising(sda, &mut self.events);
        } else {
            self.target.on_falling();
        }
    }

    fn drive_sda(&mut self, level: bool) {
        self.drives.push(Drive::Sda(level));
        let before = self.sda();
        self.sda_master = level;
        let after = self.sda();
        if self.scl && before != after {
            if after {
                self.events.push(Event::Stop);
                self.target.on_stop();
            } else {
                self.events.push(Event::Start);
                self.target.on_start();
            }
        }
    }
}

pub type SharedWire = Rc<RefCell<Wire>>;

pub struct Scl(SharedWire);
pub struct Sda(SharedWire);

impl OutputPin for Scl {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().drive_scl(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().drive_scl(true);
        Ok(())
    }
}

impl OutputPin for Sda {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().drive_sda(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().drive_sda(true);
        Ok(())
    }
}

impl InputPin for Sda {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Infallible> {
        Ok(self.0.borrow().sda())
    }

    fn is_low(&self) -> Result<bool, Infallible> {
        Ok(!self.0.borrow().sda())
    }
}

/// Counts settle intervals instead of waiting
#[derive(Clone, Default)]
pub struct Settles(pub Rc<Cell<usize>>);

impl Timing for Settles {
    fn settle(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

pub type Bus = SoftI2c<Scl, Sda, Settles>;

/// Idle bus with a peripheral at `address`
pub fn bus(address: u8) -> (SharedWire, Settles, Bus) {
    let _ = env_logger::try_init();

    let wire = Rc::new(RefCell::new(Wire {
        scl: true,
        sda_master: true,
        target: Target::new(address),
        events: Vec::new(),
        drives: Vec::new(),
        clocked: Vec::new(),
    }));
    let settles = Settles::default();
    let i2c = SoftI2c::new(Scl(wire.clone()), Sda(wire.clone()), settles.clone());
    (wire, settles, i2c)
}
