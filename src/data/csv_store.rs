//! CSV-backed market data store.
//!
//! One file per symbol per timeframe:
//! - `<dir>/<SYMBOL>_minute.csv` — `timestamp,open,high,low,close,volume`
//! - `<dir>/<SYMBOL>_daily.csv` — `date,open,high,low,close,volume`
//!
//! Missing files resolve to empty series so a symbol without data is
//! skipped downstream instead of failing the batch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

use super::{Candle, DataError, MarketData, NewsEvent, NewsSource};

const MINUTE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DAILY_DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// CSV Store
// ============================================================================

/// Market data store reading per-symbol CSV files from two directories.
#[derive(Debug, Clone)]
pub struct CsvStore {
    minute_dir: PathBuf,
    daily_dir: PathBuf,
}

impl CsvStore {
    /// Create a store over the given minute/daily data directories.
    pub fn new(minute_dir: impl Into<PathBuf>, daily_dir: impl Into<PathBuf>) -> Self {
        let store = Self {
            minute_dir: minute_dir.into(),
            daily_dir: daily_dir.into(),
        };
        debug!(
            minute_dir = %store.minute_dir.display(),
            daily_dir = %store.daily_dir.display(),
            "CSV store initialized"
        );
        store
    }

    fn minute_path(&self, symbol: &str) -> PathBuf {
        self.minute_dir.join(format!("{}_minute.csv", symbol))
    }

    fn daily_path(&self, symbol: &str) -> PathBuf {
        self.daily_dir.join(format!("{}_daily.csv", symbol))
    }

    async fn read_file(path: &Path) -> Result<Option<String>, DataError> {
        if !path.exists() {
            warn!(file = %path.display(), "Data file not found");
            return Ok(None);
        }
        tokio::fs::read_to_string(path)
            .await
            .map(Some)
            .map_err(|e| DataError::Io(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl MarketData for CsvStore {
    async fn minute_bars(
        &self,
        symbol: &str,
        date: NaiveDate,
        from: NaiveTime,
        to: NaiveTime,
    ) -> Result<Vec<Candle>, DataError> {
        let path = self.minute_path(symbol);
        let Some(content) = Self::read_file(&path).await? else {
            return Ok(Vec::new());
        };

        let mut bars = parse_minute_csv(&content, &path)?;
        bars.retain(|c| {
            c.timestamp.date() == date && c.timestamp.time() >= from && c.timestamp.time() <= to
        });
        bars.sort_by_key(|c| c.timestamp);

        debug!(symbol, count = bars.len(), %date, "Loaded minute bars");
        Ok(bars)
    }

    async fn daily_bars(&self, symbol: &str, lookback_days: usize) -> Result<Vec<Candle>, DataError> {
        let path = self.daily_path(symbol);
        let Some(content) = Self::read_file(&path).await? else {
            return Ok(Vec::new());
        };

        let mut bars = parse_daily_csv(&content, &path)?;
        bars.sort_by_key(|c| c.timestamp);
        if bars.len() > lookback_days {
            bars.drain(..bars.len() - lookback_days);
        }

        debug!(symbol, count = bars.len(), "Loaded daily bars");
        Ok(bars)
    }

    async fn previous_close(&self, symbol: &str, date: NaiveDate) -> Result<Option<f64>, DataError> {
        let bars = self.daily_bars(symbol, 10).await?;
        Ok(bars
            .iter()
            .rev()
            .find(|c| c.timestamp.date() < date)
            .map(|c| c.close))
    }
}

// ============================================================================
// CSV Parsing
// ============================================================================

fn parse_minute_csv(content: &str, path: &Path) -> Result<Vec<Candle>, DataError> {
    let mut bars = Vec::new();

    for (lineno, line) in data_lines(content) {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 6 {
            return Err(malformed(path, lineno, "expected 6 fields"));
        }

        let timestamp = NaiveDateTime::parse_from_str(fields[0], MINUTE_TIMESTAMP_FORMAT)
            .map_err(|e| malformed(path, lineno, &format!("bad timestamp: {}", e)))?;

        bars.push(Candle {
            timestamp,
            open: parse_price(fields[1], path, lineno)?,
            high: parse_price(fields[2], path, lineno)?,
            low: parse_price(fields[3], path, lineno)?,
            close: parse_price(fields[4], path, lineno)?,
            volume: parse_price(fields[5], path, lineno)?,
        });
    }

    Ok(bars)
}

fn parse_daily_csv(content: &str, path: &Path) -> Result<Vec<Candle>, DataError> {
    let mut bars = Vec::new();

    for (lineno, line) in data_lines(content) {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 6 {
            return Err(malformed(path, lineno, "expected 6 fields"));
        }

        let date = NaiveDate::parse_from_str(fields[0], DAILY_DATE_FORMAT)
            .map_err(|e| malformed(path, lineno, &format!("bad date: {}", e)))?;
        let timestamp = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| malformed(path, lineno, "bad date"))?;

        bars.push(Candle {
            timestamp,
            open: parse_price(fields[1], path, lineno)?,
            high: parse_price(fields[2], path, lineno)?,
            low: parse_price(fields[3], path, lineno)?,
            close: parse_price(fields[4], path, lineno)?,
            volume: parse_price(fields[5], path, lineno)?,
        });
    }

    Ok(bars)
}

/// Iterate non-empty data rows, skipping a header line when present.
fn data_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(i, line)| {
            if line.is_empty() {
                return false;
            }
            // Header rows start with a non-numeric field
            !(*i == 1 && line.chars().next().is_some_and(|c| c.is_ascii_alphabetic()))
        })
}

fn parse_price(field: &str, path: &Path, lineno: usize) -> Result<f64, DataError> {
    field
        .trim()
        .parse::<f64>()
        .map_err(|_| malformed(path, lineno, &format!("bad number '{}'", field)))
}

fn malformed(path: &Path, lineno: usize, message: &str) -> DataError {
    DataError::Malformed {
        file: path.display().to_string(),
        message: format!("line {}: {}", lineno, message),
    }
}

// ============================================================================
// News Sources
// ============================================================================

/// News source backed by a single CSV file, loaded once at startup.
///
/// Expected layout: `date,symbol,event_type,description`.
pub struct CsvNews {
    records: Vec<NewsRecord>,
}

struct NewsRecord {
    date: NaiveDate,
    symbol: String,
    event: NewsEvent,
}

impl CsvNews {
    /// Load all news records from `path`.
    ///
    /// A missing file yields an empty source, matching the store's
    /// missing-data policy.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(file = %path.display(), "News file not found");
            return Ok(Self { records: Vec::new() });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Io(format!("{}: {}", path.display(), e)))?;

        let mut records = Vec::new();
        for (lineno, line) in data_lines(&content) {
            // Description may contain commas; only the first 3 fields split.
            let fields: Vec<&str> = line.splitn(4, ',').collect();
            if fields.len() < 4 {
                return Err(malformed(path, lineno, "expected 4 fields"));
            }

            let date = NaiveDate::parse_from_str(fields[0], DAILY_DATE_FORMAT)
                .map_err(|e| malformed(path, lineno, &format!("bad date: {}", e)))?;

            records.push(NewsRecord {
                date,
                symbol: fields[1].trim().to_string(),
                event: NewsEvent {
                    event_type: fields[2].trim().to_string(),
                    description: fields[3].trim().to_string(),
                },
            });
        }

        debug!(count = records.len(), "Loaded news records");
        Ok(Self { records })
    }
}

impl NewsSource for CsvNews {
    fn news_for(&self, symbol: &str, date: NaiveDate) -> Option<NewsEvent> {
        self.records
            .iter()
            .find(|r| r.symbol == symbol && r.date == date)
            .map(|r| r.event.clone())
    }
}

/// Null news source used when no news file is configured.
pub struct NoNews;

impl NewsSource for NoNews {
    fn news_for(&self, _symbol: &str, _date: NaiveDate) -> Option<NewsEvent> {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn test_minute_bars_window() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "TEST.NS_minute.csv",
            "timestamp,open,high,low,close,volume\n\
             2024-01-15 09:15:00,100.0,101.0,99.5,100.5,1000\n\
             2024-01-15 09:16:00,100.5,101.5,100.0,101.0,1200\n\
             2024-01-15 10:00:00,101.0,102.0,100.5,101.5,900\n\
             2024-01-16 09:15:00,102.0,103.0,101.5,102.5,1100\n",
        );

        let store = CsvStore::new(dir.path(), dir.path());
        let bars = store
            .minute_bars("TEST.NS", date(2024, 1, 15), time(9, 15), time(9, 30))
            .await
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert!((bars[0].close - 100.5).abs() < 1e-9);
        assert!((bars[1].close - 101.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path(), dir.path());

        let bars = store
            .minute_bars("MISSING.NS", date(2024, 1, 15), time(9, 15), time(15, 30))
            .await
            .unwrap();
        assert!(bars.is_empty());

        let prev = store.previous_close("MISSING.NS", date(2024, 1, 15)).await.unwrap();
        assert!(prev.is_none());
    }

    #[tokio::test]
    async fn test_daily_bars_lookback() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "TEST.NS_daily.csv",
            "date,open,high,low,close,volume\n\
             2024-01-10,98.0,99.0,97.0,98.5,500000\n\
             2024-01-11,98.5,100.0,98.0,99.5,600000\n\
             2024-01-12,99.5,101.0,99.0,100.5,700000\n",
        );

        let store = CsvStore::new(dir.path(), dir.path());
        let bars = store.daily_bars("TEST.NS", 2).await.unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp.date(), date(2024, 1, 11));
        assert_eq!(bars[1].timestamp.date(), date(2024, 1, 12));
    }

    #[tokio::test]
    async fn test_previous_close() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "TEST.NS_daily.csv",
            "date,open,high,low,close,volume\n\
             2024-01-12,99.5,101.0,99.0,100.5,700000\n\
             2024-01-15,100.5,102.0,100.0,101.5,800000\n",
        );

        let store = CsvStore::new(dir.path(), dir.path());
        let prev = store.previous_close("TEST.NS", date(2024, 1, 15)).await.unwrap();
        assert_eq!(prev, Some(100.5));
    }

    #[tokio::test]
    async fn test_malformed_row_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "TEST.NS_daily.csv",
            "date,open,high,low,close,volume\n2024-01-12,not_a_number,101.0,99.0,100.5,700000\n",
        );

        let store = CsvStore::new(dir.path(), dir.path());
        let err = store.daily_bars("TEST.NS", 10).await.unwrap_err();
        assert!(matches!(err, DataError::Malformed { .. }));
    }

    #[test]
    fn test_csv_news_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "news.csv",
            "date,symbol,event_type,description\n\
             2024-01-15,RELIANCE.NS,earnings,Q3 results announcement\n\
             2024-01-15,TCS.NS,dividend,Interim dividend, record date set\n",
        );

        let news = CsvNews::load(dir.path().join("news.csv")).unwrap();

        let event = news.news_for("RELIANCE.NS", date(2024, 1, 15)).unwrap();
        assert_eq!(event.event_type, "earnings");

        // Commas inside the description survive the 4-field split
        let event = news.news_for("TCS.NS", date(2024, 1, 15)).unwrap();
        assert!(event.description.contains("record date"));

        assert!(news.news_for("RELIANCE.NS", date(2024, 1, 16)).is_none());
        assert!(news.news_for("INFY.NS", date(2024, 1, 15)).is_none());
    }

    #[test]
    fn test_no_news_source() {
        assert!(NoNews.news_for("ANY.NS", date(2024, 1, 15)).is_none());
    }
}
