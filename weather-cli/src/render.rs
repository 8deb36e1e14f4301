//! Human-friendly text output.

use std::{collections::BTreeMap, fmt::Write};

use weather_core::{Extremes, IngestReport, Observation, SkipReason};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub fn ingest_report(report: &IngestReport) -> String {
    let mut out = String::new();

    let recent: Vec<&str> = skipped_with(report, SkipReason::RecentlyLogged);
    if !recent.is_empty() {
        let _ = writeln!(
            out,
            "Skipped {} location(s) logged within the dedup window: {}",
            recent.len(),
            recent.join(", ")
        );
    }
    let repeated = skipped_with(report, SkipReason::DuplicateInBatch);
    if !repeated.is_empty() {
        let _ = writeln!(out, "Ignored repeated names: {}", repeated.join(", "));
    }

    for obs in &report.logged {
        let _ = writeln!(out, "{}: {}°C, {}", obs.location, obs.temperature_c, obs.description);
    }
    for failed in &report.failed {
        let _ = writeln!(out, "Error fetching data for {}: {}", failed.location, failed.error);
    }

    let _ = writeln!(
        out,
        "\nLogged {} location(s), skipped {}, failed {}.",
        report.fetched_count(),
        report.skipped_count(),
        report.failed_count()
    );
    out
}

fn skipped_with(report: &IngestReport, reason: SkipReason) -> Vec<&str> {
    report
        .skipped
        .iter()
        .filter(|s| s.reason == reason)
        .map(|s| s.location.as_str())
        .collect()
}

pub fn logs_table(logs: &[Observation]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Weather Logs ({} entries):", logs.len());
    let _ = writeln!(out, "{}", "=".repeat(84));
    let _ = writeln!(
        out,
        "{:<15} {:<10} {:<24} {:<12} {:<16}",
        "Location", "Temp (°C)", "Description", "Humidity (%)", "Timestamp"
    );
    let _ = writeln!(out, "{}", "-".repeat(84));

    for log in logs {
        let _ = writeln!(
            out,
            "{:<15} {:<10} {:<24} {:<12} {:<16}",
            log.location,
            log.temperature_c,
            log.description,
            log.humidity,
            log.observed_at_local.format(TIMESTAMP_FORMAT)
        );
    }
    out
}

pub fn averages(averages: &BTreeMap<String, f64>) -> String {
    let mut out = String::from("Average temperature per location:\n");
    let _ = writeln!(out, "{}", "-".repeat(40));
    for (location, avg) in averages {
        let _ = writeln!(out, "{location}: {avg}°C");
    }
    out
}

pub fn extremes(extremes: &Extremes, window_hours: Option<u32>) -> String {
    let scope = match window_hours {
        Some(h) => format!("last {h} hours"),
        None => "overall".to_string(),
    };

    let mut out = String::new();
    let _ = writeln!(out, "Hottest & coldest ({scope}):");
    let _ = writeln!(out, "{}", "-".repeat(40));
    for (label, obs) in [("Hottest", &extremes.hottest), ("Coldest", &extremes.coldest)] {
        let _ = writeln!(
            out,
            "{label}: {} at {}°C ({}, {})",
            obs.location,
            obs.temperature_c,
            obs.description,
            obs.observed_at_local.format(TIMESTAMP_FORMAT)
        );
    }
    out
}

/// Ascending series as a table followed by a sparkline.
pub fn trend(series: &[Observation]) -> String {
    let mut out = String::new();
    let Some(first) = series.first() else {
        return out;
    };

    let _ = writeln!(out, "Temperature trend for {}:", first.location);
    for obs in series {
        let _ = writeln!(
            out,
            "  {}  {:>7}°C",
            obs.observed_at_local.format(TIMESTAMP_FORMAT),
            obs.temperature_c
        );
    }

    let temps: Vec<f64> = series.iter().map(|o| o.temperature_c).collect();
    let (min, max) = temps
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(*t), hi.max(*t)));
    let _ = writeln!(out, "\n  {}  (min {min}°C, max {max}°C)", sparkline(&temps));
    out
}

fn sparkline(values: &[f64]) -> String {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let span = max - min;
    let top = SPARKS.len() - 1;

    values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                SPARKS[top / 2]
            } else {
                let level = ((v - min) / span * top as f64).round() as usize;
                SPARKS[level.min(top)]
            }
        })
        .collect()
}
