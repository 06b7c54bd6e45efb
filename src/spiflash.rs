//! Parser for sigrok-cli spiflash decoder annotation logs.
//!
//! Unlike the i2c log, every read is a single self-contained line:
//!
//! ```text
//! spiflash-1: Read data (addr 0x10, 2 bytes): AB CD
//! ```
//!
//! so there is no replay state, just per-line validation. The declared
//! byte count has to agree exactly with the hex payload, otherwise a
//! mangled line would silently shift data around in the image.

use std::io::{self, BufRead};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::image::Transaction;

/// One annotation line to one transaction, or `None` for anything else:
/// other annotation rows, lines from other decoders, and read lines whose
/// payload disagrees with the declared count.
pub fn parse_line(line: &str) -> Option<Transaction> {
    lazy_static! {
        static ref RE: Regex =
            Regex::new(r"^[^:]+: Read data \(addr 0x([0-9a-fA-F]+), (\d+) bytes\): ([\s\w]+)")
                .unwrap();
    }

    let caps = RE.captures(line)?;

    let addr = u64::from_str_radix(&caps[1], 16).ok()?;
    let count: usize = caps[2].parse().ok()?;
    let payload: String = caps[3].trim().split(' ').collect();

    if payload.len() != 2 * count {
        return None;
    }

    let data = hex::decode(payload).ok()?;
    if data.len() != count {
        return None;
    }

    Some(Transaction { addr, data })
}

pub fn parse_log<R: BufRead>(reader: R) -> io::Result<Vec<Transaction>> {
    let mut txns = Vec::new();
    for line in reader.lines() {
        if let Some(txn) = parse_line(&line?) {
            trace!(addr = txn.addr, len = txn.data.len(), "read");
            txns.push(txn);
        }
    }

    Ok(txns)
}
