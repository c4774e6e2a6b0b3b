use anyhow::Result;
use metroweather_core::{Current, DailySummary, HourlyBucket, IngestReport, Reading, RollupReport};
use serde_json::json;

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn readings(readings: &[Reading], json: bool) -> Result<()> {
    if json {
        return print_json(readings);
    }
    if readings.is_empty() {
        println!("No readings stored yet.");
        return Ok(());
    }
    println!(
        "{:<12} {:<10} {:>7} {:>7} {:<12} {:>5} {:>7}  {}",
        "CITY", "ID", "TEMP", "FEELS", "CONDITION", "HUM", "PRESS", "OBSERVED (UTC)"
    );
    for r in readings {
        println!(
            "{:<12} {:<10} {:>7.1} {:>7.1} {:<12} {:>5.0} {:>7.0}  {}",
            r.city,
            r.city_id,
            r.temperature,
            r.feels_like,
            r.condition,
            r.humidity,
            r.pressure,
            r.dt.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub fn current(current: &Current, json: bool) -> Result<()> {
    match current {
        Current::One(reading) => readings(std::slice::from_ref(reading), json),
        Current::All(all) => readings(all, json),
    }
}

pub fn hourly(buckets: &[HourlyBucket], json: bool) -> Result<()> {
    if json {
        return print_json(buckets);
    }
    if buckets.is_empty() {
        println!("No readings in the requested window.");
        return Ok(());
    }
    println!(
        "{:>4} {:>5} {:>8} {:>8} {:>8} {:>8}",
        "HOUR", "N", "TEMP", "FEELS", "HUM", "PRESS"
    );
    for b in buckets {
        println!(
            "{:>4} {:>5} {:>8.2} {:>8.2} {:>8.1} {:>8.1}",
            format!("{:02}h", b.hour),
            b.count,
            b.avg_temp,
            b.avg_feels_like,
            b.avg_humidity,
            b.avg_pressure
        );
    }
    Ok(())
}

pub fn daily(summaries: &[DailySummary], json: bool) -> Result<()> {
    if json {
        return print_json(summaries);
    }
    if summaries.is_empty() {
        println!("No daily summaries yet.");
        return Ok(());
    }
    println!(
        "{:<10} {:<12} {:>7} {:>7} {:>7}  {}",
        "DATE", "CITY", "AVG", "MIN", "MAX", "CONDITION"
    );
    for s in summaries {
        println!(
            "{:<10} {:<12} {:>7.1} {:>7.1} {:>7.1}  {}",
            s.date, s.city, s.avg_temp, s.min_temp, s.max_temp, s.most_frequent_condition
        );
    }
    Ok(())
}

pub fn ingest_report(report: &IngestReport, json: bool) -> Result<()> {
    if json {
        let failures: Vec<_> = report
            .failures
            .iter()
            .map(|(city_id, err)| json!({ "city_id": city_id, "error": err.to_string() }))
            .collect();
        return print_json(&json!({ "stored": report.stored, "failures": failures }));
    }

    readings(&report.stored, false)?;
    for (city_id, err) in &report.failures {
        eprintln!("failed {city_id}: {err}");
    }
    Ok(())
}

pub fn rollup_report(report: &RollupReport, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({
            "date": report.date,
            "written": report.written,
            "skipped": report.skipped,
            "failed": report.failed,
        }));
    }

    println!("Rollup for {}", report.date);
    println!("  written: {}", report.written.join(", "));
    println!("  skipped: {}", report.skipped.join(", "));
    if !report.failed.is_empty() {
        println!("  failed:  {}", report.failed.join(", "));
    }
    Ok(())
}
