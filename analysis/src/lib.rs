//! Daily post sentiment set against the stock's close-to-close returns.
//!
//! Reads a persisted `<entity>_sentiment_reddit.csv` and a local price CSV,
//! averages `sentiment_score` per day over the most recent `n_days`, smooths it
//! over a calendar rolling window and lags it by one observation so each row
//! pairs yesterday's sentiment with today's return.

pub mod dates;
pub mod series;

use chrono::NaiveDate;
use series::Series;
use std::path::Path;
use stocksent_core::naming::result_filename;
use stocksent_core::{AnalysisConfig, CoreError, Table, TableError};
use tracing::{debug, info, warn};

pub const SCORE_COLUMN: &str = "sentiment_score";
pub const DATETIME_COLUMN: &str = "created_datetime";
pub const EPOCH_COLUMN: &str = "created_utc";

const PRICE_DATE_COLUMNS: [&str; 2] = ["date", "Date"];
const PRICE_CLOSE_COLUMNS: [&str; 2] = ["close", "Close"];

pub const REPORT_COLUMNS: [&str; 4] = ["date", "daily_sentiment", "rolling_sentiment", "return"];

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRow {
    pub date: NaiveDate,
    pub daily_sentiment: f64,
    /// Rolling sentiment of the previous observation.
    pub rolling_sentiment: Option<f64>,
    /// Close-to-close return ending on `date`.
    pub daily_return: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub rows: Vec<AnalysisRow>,
    /// Pearson correlation over rows with both a lagged sentiment and a return.
    pub correlation: Option<f64>,
}

impl AnalysisReport {
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    /// Rows usable for the correlation.
    pub fn paired(&self) -> Vec<(f64, f64)> {
        self.rows
            .iter()
            .filter_map(|r| Some((r.rolling_sentiment?, r.daily_return?)))
            .collect()
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(REPORT_COLUMNS.iter().map(|c| c.to_string()).collect());
        let optional = |v: Option<f64>| v.map(|v| format!("{:?}", v)).unwrap_or_default();
        for row in &self.rows {
            table.push_row(vec![
                row.date.format("%Y-%m-%d").to_string(),
                format!("{:?}", row.daily_sentiment),
                optional(row.rolling_sentiment),
                optional(row.daily_return),
            ]);
        }
        table
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        self.to_table().write_atomic(path)
    }
}

/// Dated sentiment scores from a persisted table.
///
/// Rows without a usable date or score are skipped with a warning.
pub fn sentiment_observations(
    table: &Table,
    source: &str,
) -> Result<Vec<(NaiveDate, f64)>, TableError> {
    let score_idx = table
        .column_index(SCORE_COLUMN)
        .ok_or_else(|| missing_column(SCORE_COLUMN, source))?;
    let datetime_idx = table.column_index(DATETIME_COLUMN);
    let epoch_idx = table.column_index(EPOCH_COLUMN);
    if datetime_idx.is_none() && epoch_idx.is_none() {
        return Err(missing_column(
            &format!("{}|{}", DATETIME_COLUMN, EPOCH_COLUMN),
            source,
        ));
    }

    let mut observations = Vec::with_capacity(table.len());
    let mut skipped = 0usize;
    for row in 0..table.len() {
        let date = datetime_idx
            .and_then(|i| table.cell(row, i))
            .and_then(dates::parse_date)
            .or_else(|| {
                epoch_idx
                    .and_then(|i| table.cell(row, i))
                    .and_then(dates::date_from_epoch)
            });
        let score = table
            .cell(row, score_idx)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|s| s.is_finite());

        match (date, score) {
            (Some(date), Some(score)) => observations.push((date, score)),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("{}: skipped {} rows without a date or score", source, skipped);
    }
    Ok(observations)
}

/// Closing prices by date. Later rows for the same date replace earlier ones.
pub fn price_series(table: &Table, source: &str) -> Result<Series, TableError> {
    let find = |candidates: &[&str]| {
        candidates
            .iter()
            .find_map(|c| table.column_index(c))
            .ok_or_else(|| missing_column(&candidates.join("|"), source))
    };
    let date_idx = find(&PRICE_DATE_COLUMNS[..])?;
    let close_idx = find(&PRICE_CLOSE_COLUMNS[..])?;

    let mut prices = Series::new();
    for row in 0..table.len() {
        let date = table.cell(row, date_idx).and_then(dates::parse_date);
        let close = table
            .cell(row, close_idx)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|c| c.is_finite());
        if let (Some(date), Some(close)) = (date, close) {
            prices.insert(date, close);
        }
    }
    Ok(prices)
}

/// Join sentiment observations with prices for the window in `config`.
pub fn analyze(
    observations: &[(NaiveDate, f64)],
    prices: &Series,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, CoreError> {
    if observations.is_empty() {
        return Err(CoreError::InvalidInput {
            message: "no dated sentiment scores to analyze".to_string(),
        });
    }
    let n_days = positive_days(config.n_days, "analysis.n_days")?;
    let window = positive_days(config.rolling_window_days, "analysis.rolling_window_days")?;

    let daily = series::last_days(&series::daily_mean(observations.iter().copied()), n_days);
    let lagged = series::shift_one(&series::rolling_mean(&daily, window));
    let returns = series::pct_change(prices);

    let rows: Vec<AnalysisRow> = daily
        .iter()
        .map(|(&date, &daily_sentiment)| AnalysisRow {
            date,
            daily_sentiment,
            rolling_sentiment: lagged.get(&date).copied().flatten(),
            daily_return: returns.get(&date).copied(),
        })
        .collect();

    let mut report = AnalysisReport {
        rows,
        correlation: None,
    };
    let paired = report.paired();
    report.correlation = series::pearson(&paired);
    debug!(
        days = report.rows.len(),
        paired = paired.len(),
        "Sentiment joined with returns"
    );
    Ok(report)
}

/// Analyze one entity's persisted results against a price file.
pub fn analyze_entity(
    entity: &str,
    results_dir: &Path,
    prices_path: &Path,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, CoreError> {
    let results_path = results_dir.join(result_filename(entity));
    let results = Table::read(&results_path)?;
    let observations = sentiment_observations(&results, &results_path.display().to_string())?;

    let prices = Table::read(prices_path)?;
    let prices = price_series(&prices, &prices_path.display().to_string())?;

    let report = analyze(&observations, &prices, config)?;
    match (report.first_date(), report.last_date()) {
        (Some(first), Some(last)) => info!(
            "{}: {} days from {} to {}, correlation {}",
            entity,
            report.rows.len(),
            first,
            last,
            report
                .correlation
                .map(|c| format!("{:.4}", c))
                .unwrap_or_else(|| "n/a".to_string())
        ),
        _ => info!("{}: nothing to report", entity),
    }
    Ok(report)
}

fn positive_days(value: i64, field: &str) -> Result<u64, CoreError> {
    u64::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| CoreError::InvalidInput {
            message: format!("{} must be positive, got {}", field, value),
        })
}

fn missing_column(column: &str, source: &str) -> TableError {
    TableError::MissingColumn {
        column: column.to_string(),
        path: source.to_string(),
    }
}
