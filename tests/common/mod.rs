//! Shared CSV fixtures for integration tests.

// Not every test binary uses every fixture helper.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::Path;

use chrono::{Duration, NaiveDate};

/// One minute bar row.
#[derive(Clone, Copy)]
pub struct MinuteRow {
    pub hour: u32,
    pub minute: u32,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Write a per-symbol daily CSV: `count` days of flat closes ending the
/// day before `trade_date`.
pub fn write_daily_csv(dir: &Path, symbol: &str, trade_date: NaiveDate, count: i64, close: f64, volume: f64) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for i in 0..count {
        let date = trade_date - Duration::days(count - i);
        let _ = writeln!(
            content,
            "{},{:.2},{:.2},{:.2},{:.2},{:.0}",
            date.format("%Y-%m-%d"),
            close,
            close * 1.01,
            close * 0.99,
            close,
            volume
        );
    }
    std::fs::write(dir.join(format!("{}_daily.csv", symbol)), content).unwrap();
}

/// Write a per-symbol minute CSV for one session.
pub fn write_minute_csv(dir: &Path, symbol: &str, date: NaiveDate, rows: &[MinuteRow]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for row in rows {
        let _ = writeln!(
            content,
            "{} {:02}:{:02}:00,{:.2},{:.2},{:.2},{:.2},{:.0}",
            date.format("%Y-%m-%d"),
            row.hour,
            row.minute,
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume
        );
    }
    std::fs::write(dir.join(format!("{}_minute.csv", symbol)), content).unwrap();
}

/// Append a second session to an existing minute CSV.
pub fn append_minute_csv(dir: &Path, symbol: &str, date: NaiveDate, rows: &[MinuteRow]) {
    let path = dir.join(format!("{}_minute.csv", symbol));
    let mut content = std::fs::read_to_string(&path).unwrap();
    for row in rows {
        let _ = writeln!(
            content,
            "{} {:02}:{:02}:00,{:.2},{:.2},{:.2},{:.2},{:.0}",
            date.format("%Y-%m-%d"),
            row.hour,
            row.minute,
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume
        );
    }
    std::fs::write(&path, content).unwrap();
}

fn at(offset: usize) -> (u32, u32) {
    let minute = 15 + offset as u32;
    (9 + minute / 60, minute % 60)
}

/// A session that survives the whole funnel: a 1% opening gap over a 1000
/// previous close, a steady rise that keeps price above the slow EMA and
/// VWAP, and a hammer close on a 3x volume surge.
pub fn full_setup_session() -> Vec<MinuteRow> {
    let n = 250;
    let mut rows = Vec::with_capacity(n);

    let (hour, minute) = at(0);
    rows.push(MinuteRow {
        hour,
        minute,
        open: 1008.0,
        high: 1011.0,
        low: 1007.0,
        close: 1010.0,
        volume: 60_000.0,
    });

    for i in 1..n - 1 {
        let (hour, minute) = at(i);
        let base = 1010.0 + i as f64 * 0.4;
        rows.push(MinuteRow {
            hour,
            minute,
            open: base,
            high: base + 1.0,
            low: base - 1.0,
            close: base + 0.4,
            volume: 10_000.0,
        });
    }

    let (hour, minute) = at(n - 1);
    let open = 1010.0 + (n - 1) as f64 * 0.4;
    rows.push(MinuteRow {
        hour,
        minute,
        open,
        high: open + 1.3,
        low: open - 3.0,
        close: open + 1.0,
        volume: 30_000.0,
    });

    rows
}

/// A session whose opening gap (3%) is too wide for the gap filter.
pub fn wide_gap_session() -> Vec<MinuteRow> {
    let mut rows = full_setup_session();
    let first = &mut rows[0];
    first.open = 1028.0;
    first.high = 1031.0;
    first.low = 1027.0;
    first.close = 1030.0;
    rows
}
