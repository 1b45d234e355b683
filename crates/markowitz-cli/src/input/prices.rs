use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;

use markowitz_core::market_data::PriceSource;
use markowitz_core::statistics::{PriceSeries, PriceTable};
use markowitz_core::{MarkowitzError, MarkowitzResult};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Closing prices from a wide CSV file: a `Date` column followed by one
/// column per ticker. Blank cells are missing prices.
pub struct CsvPriceSource {
    table: PriceTable,
}

impl CsvPriceSource {
    pub fn open(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let canonical = super::file::resolve_path(path)?;
        let file = std::fs::File::open(&canonical)
            .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
        Ok(CsvPriceSource {
            table: parse_price_csv(file)?,
        })
    }

    pub fn table(&self) -> &PriceTable {
        &self.table
    }
}

impl PriceSource for CsvPriceSource {
    fn fetch_prices(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> MarkowitzResult<PriceTable> {
        Ok(self.table.select(tickers).between(Some(start), Some(end)))
    }
}

/// Parse a wide price CSV. Ticker headers are trimmed and uppercased; rows
/// are sorted by date and a repeated date is an error.
pub fn parse_price_csv<R: Read>(reader: R) -> MarkowitzResult<PriceTable> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| MarkowitzError::MarketData(format!("Unreadable CSV header: {}", e)))?
        .clone();
    match headers.get(0) {
        Some(h) if h.eq_ignore_ascii_case("date") => {}
        _ => {
            return Err(MarkowitzError::MarketData(
                "First CSV column must be 'Date'".into(),
            ))
        }
    }
    let tickers: Vec<String> = headers.iter().skip(1).map(|h| h.to_uppercase()).collect();

    let mut rows: BTreeMap<NaiveDate, Vec<Option<Decimal>>> = BTreeMap::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record
            .map_err(|e| MarkowitzError::MarketData(format!("Bad CSV row {}: {}", line + 2, e)))?;
        let raw_date = record.get(0).unwrap_or_default();
        let date = parse_date(raw_date).ok_or_else(|| {
            MarkowitzError::MarketData(format!("Row {}: unrecognised date '{}'", line + 2, raw_date))
        })?;

        let mut closes = Vec::with_capacity(tickers.len());
        for (col, ticker) in tickers.iter().enumerate() {
            let cell = record.get(col + 1).unwrap_or_default();
            closes.push(parse_price(cell).map_err(|_| {
                MarkowitzError::MarketData(format!(
                    "Row {}: price '{}' for {} is not a number",
                    line + 2,
                    cell,
                    ticker
                ))
            })?);
        }

        if rows.insert(date, closes).is_some() {
            return Err(MarkowitzError::MarketData(format!(
                "Date {} appears more than once",
                date
            )));
        }
    }

    let dates: Vec<NaiveDate> = rows.keys().copied().collect();
    let series = tickers
        .iter()
        .enumerate()
        .map(|(col, ticker)| PriceSeries {
            ticker: ticker.clone(),
            closes: rows.values().map(|r| r[col]).collect(),
        })
        .collect();

    tracing::debug!(dates = dates.len(), tickers = tickers.len(), "loaded price csv");
    PriceTable::new(dates, series)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    // Timestamps like "2024-01-02 00:00:00" keep only the date part.
    let day = raw.split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
}

fn parse_price(cell: &str) -> Result<Option<Decimal>, rust_decimal::Error> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    Decimal::from_str(cell)
        .or_else(|_| Decimal::from_scientific(cell))
        .map(Some)
}
