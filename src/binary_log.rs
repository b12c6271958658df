// src/binary_log.rs
//
// Optional compact binary event log.
//
// Length-prefixed records, little-endian scalars:
//   u32 total_len (including the prefix itself)
//   i64 sequence, i64 timestamp_ns
//   f64 best_bid, f64 best_ask, i32 best_bid_size, i32 best_ask_size
//   u16 n_trades, u16 n_fills
//   n_trades * (u8 side, f64 price, i32 size, u64 trade_id)
//   n_fills  * (u64 order_id, f64 price, i32 filled, i32 remaining)
//
// This is a fast-path sibling of the text log; it carries the top of
// book plus trades and partial fills, not the full level vectors.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use crate::types::{MarketDataEvent, Side};

const NS_PER_MS: i64 = 1_000_000;

#[derive(Debug)]
pub struct BinaryLogger {
    out: BufWriter<File>,
    buf: Vec<u8>,
}

impl BinaryLogger {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: BufWriter::new(file),
            buf: Vec::new(),
        })
    }

    pub fn log_event(&mut self, ev: &MarketDataEvent) -> io::Result<()> {
        self.buf.clear();

        // Placeholder for total_len, patched once the record is built.
        self.buf.extend_from_slice(&0u32.to_le_bytes());

        self.buf.extend_from_slice(&ev.sequence_number.to_le_bytes());
        self.buf
            .extend_from_slice(&(ev.timestamp * NS_PER_MS).to_le_bytes());
        self.buf.extend_from_slice(&ev.best_bid_price.to_le_bytes());
        self.buf.extend_from_slice(&ev.best_ask_price.to_le_bytes());
        self.buf
            .extend_from_slice(&(ev.best_bid_size as i32).to_le_bytes());
        self.buf
            .extend_from_slice(&(ev.best_ask_size as i32).to_le_bytes());
        self.buf
            .extend_from_slice(&(ev.trades.len() as u16).to_le_bytes());
        self.buf
            .extend_from_slice(&(ev.partial_fills.len() as u16).to_le_bytes());

        for t in &ev.trades {
            let side: u8 = match t.aggressor_side {
                Side::Buy => 1,
                Side::Sell => 0,
            };
            self.buf.push(side);
            self.buf.extend_from_slice(&t.price.to_le_bytes());
            self.buf.extend_from_slice(&(t.size as i32).to_le_bytes());
            self.buf.extend_from_slice(&t.trade_id.to_le_bytes());
        }

        for f in &ev.partial_fills {
            self.buf.extend_from_slice(&f.order_id.to_le_bytes());
            self.buf.extend_from_slice(&f.price.to_le_bytes());
            self.buf
                .extend_from_slice(&(f.filled_size as i32).to_le_bytes());
            self.buf
                .extend_from_slice(&(f.remaining_size as i32).to_le_bytes());
        }

        let total_len = self.buf.len() as u32;
        self.buf[0..4].copy_from_slice(&total_len.to_le_bytes());

        self.out.write_all(&self.buf)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Decoded binary record, used by tooling and the round-trip tests.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryRecord {
    pub sequence: i64,
    pub timestamp_ns: i64,
    pub best_bid: f64,
    pub best_ask: f64,
    pub best_bid_size: i32,
    pub best_ask_size: i32,
    pub trades: Vec<(u8, f64, i32, u64)>,
    pub fills: Vec<(u64, f64, i32, i32)>,
}

/// Read every record of a binary log. Fails on a truncated file.
pub fn read_binary_log(path: &Path) -> io::Result<Vec<BinaryRecord>> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;

    let mut records = Vec::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        let total_len = read_u32(&bytes, &mut pos)? as usize;
        let end = pos - 4 + total_len;
        if total_len < 4 || end > bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated binary log record",
            ));
        }

        let sequence = read_i64(&bytes, &mut pos)?;
        let timestamp_ns = read_i64(&bytes, &mut pos)?;
        let best_bid = read_f64(&bytes, &mut pos)?;
        let best_ask = read_f64(&bytes, &mut pos)?;
        let best_bid_size = read_i32(&bytes, &mut pos)?;
        let best_ask_size = read_i32(&bytes, &mut pos)?;
        let n_trades = read_u16(&bytes, &mut pos)?;
        let n_fills = read_u16(&bytes, &mut pos)?;

        let mut trades = Vec::with_capacity(n_trades as usize);
        for _ in 0..n_trades {
            let side = read_u8(&bytes, &mut pos)?;
            let price = read_f64(&bytes, &mut pos)?;
            let size = read_i32(&bytes, &mut pos)?;
            let trade_id = read_u64(&bytes, &mut pos)?;
            trades.push((side, price, size, trade_id));
        }

        let mut fills = Vec::with_capacity(n_fills as usize);
        for _ in 0..n_fills {
            let order_id = read_u64(&bytes, &mut pos)?;
            let price = read_f64(&bytes, &mut pos)?;
            let filled = read_i32(&bytes, &mut pos)?;
            let remaining = read_i32(&bytes, &mut pos)?;
            fills.push((order_id, price, filled, remaining));
        }

        if pos != end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "binary record length mismatch",
            ));
        }

        records.push(BinaryRecord {
            sequence,
            timestamp_ns,
            best_bid,
            best_ask,
            best_bid_size,
            best_ask_size,
            trades,
            fills,
        });
    }
    Ok(records)
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, n: usize) -> io::Result<&'a [u8]> {
    if *pos + n > bytes.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated binary log",
        ));
    }
    let slice = &bytes[*pos..*pos + n];
    *pos += n;
    Ok(slice)
}

fn read_u8(bytes: &[u8], pos: &mut usize) -> io::Result<u8> {
    Ok(take(bytes, pos, 1)?[0])
}

fn read_u16(bytes: &[u8], pos: &mut usize) -> io::Result<u16> {
    Ok(u16::from_le_bytes(take(bytes, pos, 2)?.try_into().unwrap()))
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> io::Result<u32> {
    Ok(u32::from_le_bytes(take(bytes, pos, 4)?.try_into().unwrap()))
}

fn read_i32(bytes: &[u8], pos: &mut usize) -> io::Result<i32> {
    Ok(i32::from_le_bytes(take(bytes, pos, 4)?.try_into().unwrap()))
}

fn read_i64(bytes: &[u8], pos: &mut usize) -> io::Result<i64> {
    Ok(i64::from_le_bytes(take(bytes, pos, 8)?.try_into().unwrap()))
}

fn read_u64(bytes: &[u8], pos: &mut usize) -> io::Result<u64> {
    Ok(u64::from_le_bytes(take(bytes, pos, 8)?.try_into().unwrap()))
}

fn read_f64(bytes: &[u8], pos: &mut usize) -> io::Result<f64> {
    Ok(f64::from_le_bytes(take(bytes, pos, 8)?.try_into().unwrap()))
}
