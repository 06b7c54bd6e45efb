//! Parser for sigrok-cli i2c decoder annotation logs of an eeprom being
//! read out.
//!
//! The log is a flat stream of lines like
//!
//! ```text
//! i2c-1: Address write: 50
//! i2c-1: Data write: 00
//! i2c-1: Data write: 10
//! i2c-1: Address read: 50
//! i2c-1: Data read: AB
//! ```
//!
//! An address write starts a 2-byte big-endian address phase, an address
//! read opens a new transaction at the accumulated address, and data reads
//! fill it. Each line is classified into an [`Event`] and replayed through
//! a small state machine, producing the transaction list the image is
//! assembled from.

use std::io::{self, BufRead};

use tracing::trace;

use crate::image::Transaction;

/// usual 24-series eeprom address
pub const DEFAULT_ADDRESS: u8 = 0x50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// start of an address phase for the target chip
    AddressWrite,
    /// start of a read phase, opens a transaction
    AddressRead,
    /// one byte of the memory address
    DataWrite(u8),
    /// payload bytes for the open transaction
    DataRead(Vec<u8>),
}

/// Classifies one log line into an [`Event`], or `None` for lines that
/// don't concern the target chip (other addresses, start/stop markers,
/// lines that aren't annotations at all).
pub struct Classifier {
    // the log renders addresses as two uppercase hex digits, so match on
    // the rendered form instead of re-parsing every line
    target: String,
}

impl Classifier {
    pub fn new(address: u8) -> Self {
        Self {
            target: format!("{:02X}", address),
        }
    }

    pub fn classify(&self, line: &str) -> Option<Event> {
        let fields: Vec<&str> = line.trim_end_matches('\n').split(": ").collect();

        // address lines match positionally: prefix, event, address, nothing after
        if fields.len() == 3 && fields[2] == self.target {
            match fields[1] {
                "Address write" => return Some(Event::AddressWrite),
                "Address read" => return Some(Event::AddressRead),
                _ => {}
            }
        }

        match *fields.get(1)? {
            "Data write" => {
                let bytes = decode_payload(fields.get(2)?)?;
                // the address accumulator only ever takes one byte per line
                Some(Event::DataWrite(*bytes.first()?))
            }
            "Data read" => Some(Event::DataRead(decode_payload(fields.get(2)?)?)),
            _ => None,
        }
    }
}

/// hex byte pairs, space separated or run together
fn decode_payload(field: &str) -> Option<Vec<u8>> {
    let compact: String = field.split_whitespace().collect();
    hex::decode(compact).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    /// accumulating the memory address byte by byte
    AddressPhase { addr: u16 },
    /// filling the transaction at this index
    ReadPhase { open: usize },
}

/// Advances the replay by one event. Pure in the state, with the side
/// effect of opening or extending a transaction in `txns`.
pub fn step(state: State, event: Event, txns: &mut Vec<Transaction>) -> State {
    match event {
        Event::AddressWrite => State::AddressPhase { addr: 0 },
        Event::AddressRead => {
            // an address read without a preceding address phase reads from
            // wherever the chip's internal pointer is; we can only call that 0
            let addr = match state {
                State::AddressPhase { addr } => addr,
                _ => 0,
            };
            txns.push(Transaction {
                addr: addr as u64,
                data: Vec::new(),
            });
            State::ReadPhase {
                open: txns.len() - 1,
            }
        }
        Event::DataWrite(byte) => match state {
            // 16-bit accumulator, oldest byte shifts out
            State::AddressPhase { addr } => State::AddressPhase {
                addr: (addr << 8) | byte as u16,
            },
            other => other,
        },
        Event::DataRead(bytes) => {
            // a data read outside a read phase belongs to some other
            // transfer on the bus, drop it
            if let State::ReadPhase { open } = state {
                txns[open].data.extend_from_slice(&bytes);
            }
            state
        }
    }
}

pub fn replay<I: IntoIterator<Item = Event>>(events: I) -> Vec<Transaction> {
    let mut txns = Vec::new();
    let mut state = State::Idle;
    for event in events {
        state = step(state, event, &mut txns);
    }
    txns
}

/// Classifies and replays a whole log. Only I/O errors surface; lines that
/// don't classify are skipped.
pub fn parse_log<R: BufRead>(reader: R, address: u8) -> io::Result<Vec<Transaction>> {
    let classifier = Classifier::new(address);

    let mut txns = Vec::new();
    let mut state = State::Idle;
    for line in reader.lines() {
        let line = line?;
        if let Some(event) = classifier.classify(&line) {
            trace!(?event, ?state, "replay");
            state = step(state, event, &mut txns);
        }
    }

    Ok(txns)
}
