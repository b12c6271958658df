// src/event_log.rs
//
// Text event log for deterministic replay.
//
// One record per line, 11 fields separated by '|':
//   sequence|instrument|best_bid|best_ask|best_bid_size|best_ask_size|
//   timestamp_ms|bid_levels|ask_levels|trades|partial_fills
//
// Level groups are ';'-separated "price,size,order_id,timestamp_ms"
// entries; trades are "SIDE,price,size,trade_id,timestamp_ms"; partial
// fills are "order_id,price,filled_size,remaining_size,timestamp_ms".
// Floats are written in Rust's shortest round-trip form, so a parsed
// event is field-identical to the one serialized. MM fills are never
// logged: replay regenerates them against the live maker book.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::types::{MarketDataEvent, OrderLevel, PartialFillEvent, Side, Trade};

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("expected 11 '|' fields, got {got}")]
    FieldCount { got: usize },
    #[error("invalid {field}: {value:?}")]
    Parse { field: &'static str, value: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Serialize one event to its canonical log line (no trailing newline).
pub fn serialize_event(ev: &MarketDataEvent) -> String {
    let bid_levels = join_levels(&ev.bid_levels);
    let ask_levels = join_levels(&ev.ask_levels);

    let trades = ev
        .trades
        .iter()
        .map(|t| {
            format!(
                "{},{},{},{},{}",
                t.aggressor_side.as_str(),
                t.price,
                t.size,
                t.trade_id,
                t.timestamp
            )
        })
        .collect::<Vec<_>>()
        .join(";");

    let partial_fills = ev
        .partial_fills
        .iter()
        .map(|f| {
            format!(
                "{},{},{},{},{}",
                f.order_id, f.price, f.filled_size, f.remaining_size, f.timestamp
            )
        })
        .collect::<Vec<_>>()
        .join(";");

    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        ev.sequence_number,
        ev.instrument,
        ev.best_bid_price,
        ev.best_ask_price,
        ev.best_bid_size,
        ev.best_ask_size,
        ev.timestamp,
        bid_levels,
        ask_levels,
        trades,
        partial_fills
    )
}

fn join_levels(levels: &[OrderLevel]) -> String {
    levels
        .iter()
        .map(|l| format!("{},{},{},{}", l.price, l.size, l.order_id, l.timestamp))
        .collect::<Vec<_>>()
        .join(";")
}

/// Parse one canonical log line back into an event.
pub fn deserialize_event(line: &str) -> Result<MarketDataEvent, EventLogError> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() != 11 {
        return Err(EventLogError::FieldCount { got: fields.len() });
    }

    Ok(MarketDataEvent {
        sequence_number: parse_num(fields[0], "sequence")?,
        instrument: fields[1].to_string(),
        best_bid_price: parse_num(fields[2], "best_bid")?,
        best_ask_price: parse_num(fields[3], "best_ask")?,
        best_bid_size: parse_num(fields[4], "best_bid_size")?,
        best_ask_size: parse_num(fields[5], "best_ask_size")?,
        timestamp: parse_num(fields[6], "timestamp_ms")?,
        bid_levels: parse_levels(fields[7])?,
        ask_levels: parse_levels(fields[8])?,
        trades: parse_trades(fields[9])?,
        partial_fills: parse_partial_fills(fields[10])?,
        mm_fills: Vec::new(),
    })
}

fn parse_num<T: std::str::FromStr>(s: &str, field: &'static str) -> Result<T, EventLogError> {
    s.parse().map_err(|_| EventLogError::Parse {
        field,
        value: s.to_string(),
    })
}

fn split_group(group: &str) -> impl Iterator<Item = &str> {
    group.split(';').filter(|entry| !entry.is_empty())
}

fn parse_levels(group: &str) -> Result<Vec<OrderLevel>, EventLogError> {
    split_group(group)
        .map(|entry| {
            let parts: Vec<&str> = entry.split(',').collect();
            if parts.len() != 4 {
                return Err(EventLogError::Parse {
                    field: "level",
                    value: entry.to_string(),
                });
            }
            Ok(OrderLevel {
                price: parse_num(parts[0], "level price")?,
                size: parse_num(parts[1], "level size")?,
                order_id: parse_num(parts[2], "level order_id")?,
                timestamp: parse_num(parts[3], "level timestamp")?,
            })
        })
        .collect()
}

fn parse_trades(group: &str) -> Result<Vec<Trade>, EventLogError> {
    split_group(group)
        .map(|entry| {
            let parts: Vec<&str> = entry.split(',').collect();
            if parts.len() != 5 {
                return Err(EventLogError::Parse {
                    field: "trade",
                    value: entry.to_string(),
                });
            }
            let side = Side::parse(parts[0]).ok_or_else(|| EventLogError::Parse {
                field: "trade side",
                value: parts[0].to_string(),
            })?;
            Ok(Trade {
                aggressor_side: side,
                price: parse_num(parts[1], "trade price")?,
                size: parse_num(parts[2], "trade size")?,
                trade_id: parse_num(parts[3], "trade_id")?,
                timestamp: parse_num(parts[4], "trade timestamp")?,
            })
        })
        .collect()
}

fn parse_partial_fills(group: &str) -> Result<Vec<PartialFillEvent>, EventLogError> {
    split_group(group)
        .map(|entry| {
            let parts: Vec<&str> = entry.split(',').collect();
            if parts.len() != 5 {
                return Err(EventLogError::Parse {
                    field: "partial_fill",
                    value: entry.to_string(),
                });
            }
            Ok(PartialFillEvent {
                order_id: parse_num(parts[0], "fill order_id")?,
                price: parse_num(parts[1], "fill price")?,
                filled_size: parse_num(parts[2], "fill filled_size")?,
                remaining_size: parse_num(parts[3], "fill remaining_size")?,
                timestamp: parse_num(parts[4], "fill timestamp")?,
            })
        })
        .collect()
}

/// Buffered line-per-event log writer.
#[derive(Debug)]
pub struct EventLogWriter {
    writer: BufWriter<File>,
}

impl EventLogWriter {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn write_event(&mut self, ev: &MarketDataEvent) -> io::Result<()> {
        writeln!(self.writer, "{}", serialize_event(ev))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Read a whole event log into memory, skipping blank lines.
pub fn read_event_log(path: &Path) -> Result<Vec<MarketDataEvent>, EventLogError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(deserialize_event(&line)?);
    }
    Ok(out)
}
