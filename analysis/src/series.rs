//! Date-indexed series operations.

use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;

pub type Series = BTreeMap<NaiveDate, f64>;

/// Mean of all observations per calendar day.
pub fn daily_mean<I>(observations: I) -> Series
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (date, value) in observations {
        let entry = sums.entry(date).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(date, (sum, count))| (date, sum / count as f64))
        .collect()
}

/// Keep the `n_days` calendar days ending on the latest date.
pub fn last_days(series: &Series, n_days: u64) -> Series {
    let Some((&last, _)) = series.iter().next_back() else {
        return Series::new();
    };
    let first = first_day_of_window(last, n_days);
    series
        .range(first..=last)
        .map(|(&d, &v)| (d, v))
        .collect()
}

/// Mean over the calendar window `(date - window_days, date]` for each date.
///
/// Missing days shrink the window rather than counting as zero, and a
/// single observation is enough.
pub fn rolling_mean(series: &Series, window_days: u64) -> Series {
    series
        .keys()
        .map(|&date| {
            let first = first_day_of_window(date, window_days);
            let (sum, count) = series
                .range(first..=date)
                .fold((0.0, 0usize), |(s, c), (_, &v)| (s + v, c + 1));
            (date, sum / count as f64)
        })
        .collect()
}

/// Each date paired with the value of the previous date in the series.
pub fn shift_one(series: &Series) -> BTreeMap<NaiveDate, Option<f64>> {
    let mut previous = None;
    series
        .iter()
        .map(|(&date, &value)| {
            let shifted = previous;
            previous = Some(value);
            (date, shifted)
        })
        .collect()
}

/// Change from the previous entry, as a fraction. The first date has none.
pub fn pct_change(prices: &Series) -> Series {
    prices
        .iter()
        .zip(prices.iter().skip(1))
        .filter(|((_, &before), _)| before != 0.0)
        .map(|((_, &before), (&date, &after))| (date, after / before - 1.0))
        .collect()
}

/// Pearson correlation, or `None` for fewer than two pairs or a constant side.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

fn first_day_of_window(last: NaiveDate, days: u64) -> NaiveDate {
    last.checked_sub_days(Days::new(days.saturating_sub(1)))
        .unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_daily_mean() {
        let series = daily_mean(vec![(d(1), 1.0), (d(1), 0.0), (d(2), 0.5)]);
        assert_eq!(series[&d(1)], 0.5);
        assert_eq!(series[&d(2)], 0.5);
    }

    #[test]
    fn test_last_days_is_inclusive() {
        let series: Series = (1..=10).map(|i| (d(i), i as f64)).collect();
        let recent = last_days(&series, 3);
        assert_eq!(recent.keys().copied().collect::<Vec<_>>(), vec![d(8), d(9), d(10)]);
    }

    #[test]
    fn test_rolling_mean_uses_calendar_days() {
        // Day 3 is missing; the window ending on day 4 covers days 2..=4.
        let series: Series = [(d(1), 0.0), (d(2), 1.0), (d(4), 0.5), (d(8), 1.0)]
            .into_iter()
            .collect();
        let rolled = rolling_mean(&series, 3);

        assert_eq!(rolled[&d(1)], 0.0);
        assert_eq!(rolled[&d(2)], 0.5);
        assert_eq!(rolled[&d(4)], 0.75);
        // Nothing else within three days of day 8.
        assert_eq!(rolled[&d(8)], 1.0);
    }

    #[test]
    fn test_shift_one() {
        let series: Series = [(d(1), 0.1), (d(2), 0.2), (d(5), 0.5)].into_iter().collect();
        let shifted = shift_one(&series);
        assert_eq!(shifted[&d(1)], None);
        assert_eq!(shifted[&d(2)], Some(0.1));
        assert_eq!(shifted[&d(5)], Some(0.2));
    }

    #[test]
    fn test_pct_change() {
        let prices: Series = [(d(1), 100.0), (d(2), 110.0), (d(3), 99.0)].into_iter().collect();
        let returns = pct_change(&prices);
        assert!(!returns.contains_key(&d(1)));
        assert!((returns[&d(2)] - 0.10).abs() < 1e-12);
        assert!((returns[&d(3)] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_pearson() {
        let perfect = [(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)];
        assert!((pearson(&perfect).unwrap() - 1.0).abs() < 1e-12);

        let inverse = [(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)];
        assert!((pearson(&inverse).unwrap() + 1.0).abs() < 1e-12);

        assert_eq!(pearson(&[(1.0, 1.0)]), None);
        assert_eq!(pearson(&[(1.0, 1.0), (1.0, 2.0)]), None);
    }
}
