use super::aggregate::WeightedAccumulator;
use super::domain::{TimeGranularity, VaccinationRecord};
use chrono::{Datelike, Days, Month, Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineBucket {
    pub period_start: NaiveDate,
    pub label: String,
    /// `None` only for an interval inserted by gap filling.
    pub coverage: Option<f64>,
    pub record_count: usize,
    pub population: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

impl TrendDirection {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rising => "Rising",
            Self::Falling => "Falling",
            Self::Flat => "Flat",
        }
    }
}

/// First-half versus second-half comparison across the populated date range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSignal {
    pub first_half: f64,
    pub second_half: f64,
    pub delta: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalEntry {
    pub month: u32,
    pub month_label: &'static str,
    pub coverage: f64,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineAnalysis {
    pub granularity: TimeGranularity,
    pub buckets: Vec<TimelineBucket>,
    pub undated: usize,
    pub trend: Option<TrendSignal>,
    pub seasonal: Vec<SeasonalEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimelineOptions {
    pub granularity: TimeGranularity,
    pub fill_gaps: bool,
}

pub fn period_start(date: NaiveDate, granularity: TimeGranularity) -> NaiveDate {
    match granularity {
        TimeGranularity::Day => date,
        TimeGranularity::Week => {
            let offset = u64::from(date.weekday().num_days_from_monday());
            date.checked_sub_days(Days::new(offset)).unwrap_or(date)
        }
        TimeGranularity::Month => date.with_day(1).unwrap_or(date),
    }
}

pub fn period_label(start: NaiveDate, granularity: TimeGranularity) -> String {
    match granularity {
        TimeGranularity::Day => start.format("%Y-%m-%d").to_string(),
        TimeGranularity::Week => {
            let week = start.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        TimeGranularity::Month => start.format("%Y-%m").to_string(),
    }
}

fn next_period(start: NaiveDate, granularity: TimeGranularity) -> Option<NaiveDate> {
    match granularity {
        TimeGranularity::Day => start.checked_add_days(Days::new(1)),
        TimeGranularity::Week => start.checked_add_days(Days::new(7)),
        TimeGranularity::Month => start.checked_add_months(Months::new(1)),
    }
}

pub fn analyze_timeline(
    subset: &[&VaccinationRecord],
    options: TimelineOptions,
    trend_tolerance: f64,
) -> TimelineAnalysis {
    let mut periods: BTreeMap<NaiveDate, WeightedAccumulator> = BTreeMap::new();
    let mut months: BTreeMap<u32, WeightedAccumulator> = BTreeMap::new();
    let mut undated = 0;

    for record in subset {
        let Some(date) = record.date else {
            undated += 1;
            continue;
        };
        periods
            .entry(period_start(date, options.granularity))
            .or_default()
            .add(record);
        months.entry(date.month()).or_default().add(record);
    }

    let mut buckets: Vec<TimelineBucket> = periods
        .into_iter()
        .filter_map(|(start, accumulator)| {
            accumulator.rate().map(|coverage| TimelineBucket {
                period_start: start,
                label: period_label(start, options.granularity),
                coverage: Some(coverage),
                record_count: accumulator.count(),
                population: accumulator.population(),
            })
        })
        .collect();

    let trend = trend_signal(&buckets, trend_tolerance);
    if options.fill_gaps {
        buckets = fill_gaps(buckets, options.granularity);
    }

    let seasonal = months
        .into_iter()
        .filter_map(|(month, accumulator)| {
            let coverage = accumulator.rate()?;
            let name = u8::try_from(month)
                .ok()
                .and_then(|number| Month::try_from(number).ok())
                .map(|month| month.name())
                .unwrap_or("Unknown");
            Some(SeasonalEntry {
                month,
                month_label: name,
                coverage,
                record_count: accumulator.count(),
            })
        })
        .collect();

    TimelineAnalysis {
        granularity: options.granularity,
        buckets,
        undated,
        trend,
        seasonal,
    }
}

/// Compares weighted coverage before and after the midpoint of the populated
/// range. Buckets starting on or before the midpoint form the first half.
pub fn trend_signal(buckets: &[TimelineBucket], tolerance: f64) -> Option<TrendSignal> {
    let populated: Vec<&TimelineBucket> = buckets
        .iter()
        .filter(|bucket| bucket.coverage.is_some())
        .collect();
    let first = populated.first()?.period_start;
    let last = populated.last()?.period_start;
    let midpoint = first + (last - first) / 2;

    let mut early = HalfAccumulator::default();
    let mut late = HalfAccumulator::default();
    for bucket in &populated {
        let half = if bucket.period_start <= midpoint {
            &mut early
        } else {
            &mut late
        };
        half.add(bucket);
    }

    let first_half = early.rate()?;
    let second_half = late.rate()?;
    let delta = second_half - first_half;
    let direction = if delta > tolerance {
        TrendDirection::Rising
    } else if delta < -tolerance {
        TrendDirection::Falling
    } else {
        TrendDirection::Flat
    };

    Some(TrendSignal {
        first_half,
        second_half,
        delta,
        direction,
    })
}

#[derive(Default)]
struct HalfAccumulator {
    weighted_sum: f64,
    population: f64,
}

impl HalfAccumulator {
    fn add(&mut self, bucket: &TimelineBucket) {
        if let Some(coverage) = bucket.coverage {
            self.weighted_sum += coverage * bucket.population;
            self.population += bucket.population;
        }
    }

    fn rate(&self) -> Option<f64> {
        (self.population > 0.0).then(|| self.weighted_sum / self.population)
    }
}

fn fill_gaps(buckets: Vec<TimelineBucket>, granularity: TimeGranularity) -> Vec<TimelineBucket> {
    let (Some(first), Some(last)) = (buckets.first(), buckets.last()) else {
        return buckets;
    };
    let last_start = last.period_start;
    let mut cursor = Some(first.period_start);
    let mut populated = buckets.into_iter().peekable();
    let mut filled = Vec::new();

    while let Some(start) = cursor.filter(|start| *start <= last_start) {
        match populated.next_if(|bucket| bucket.period_start == start) {
            Some(bucket) => filled.push(bucket),
            None => filled.push(TimelineBucket {
                period_start: start,
                label: period_label(start, granularity),
                coverage: None,
                record_count: 0,
                population: 0.0,
            }),
        }
        cursor = next_period(start, granularity);
    }
    filled
}
