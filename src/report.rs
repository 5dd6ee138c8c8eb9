//! Result tables and the run summary.
//!
//! The per-bucket checkpoint is written in append mode so that an aborted run
//! keeps the buckets it finished. A rerun over the same file appends its rows
//! after the existing ones; stale rows are not deduplicated, so resuming a
//! half-finished run should restart from the first unwritten bucket.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Utc;
use color_eyre::eyre::{Context, Result};
use log::info;
use serde::Serialize;

use crate::correlation::{BucketResult, ClassificationResults, Quartiles, SpikeClassStats};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

fn bucket_label(bucket: &BucketResult) -> String {
    format!("{}..{}", bucket.min_size, bucket.max_size - 1)
}

/// Append one bucket's row to the checkpoint file, writing the header first
/// when the file does not exist yet. Hop columns run up to this bucket's own
/// maximum hop, so rows of different buckets may differ in width.
pub fn append_bucket_row(path: &Path, bucket: &BucketResult) -> Result<()> {
    ensure_parent(path)?;
    let new_file = !path.exists();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open checkpoint file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    if new_file {
        write!(
            writer,
            "Spike_size\tSingle_0.33\tSingleUpdates_0.33\tSingle_0.66\tSingleUpdates_0.66\tSingle_1\tSingleUpdates_1"
        )?;
    }

    write!(writer, "\n{}", bucket_label(bucket))?;
    write_advanced_columns(&mut writer, &bucket.results, bucket.results.max_hop())?;
    writer.flush()?;
    Ok(())
}

/// Rewrite the full classification table over all buckets, with hop columns
/// up to the largest hop any bucket reached.
pub fn write_classification_table(path: &Path, buckets: &[BucketResult]) -> Result<()> {
    ensure_parent(path)?;
    let max_hop = buckets
        .iter()
        .filter_map(|b| b.results.max_hop())
        .max();

    let file = File::create(path)
        .with_context(|| format!("failed to create results file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    write!(
        writer,
        "Spike_size\tSingle_0.33\tSingleUpdates_0.33\tSingle_0.66\tSingleUpdates_0.66\tSingle_1\tSingleUpdates_1"
    )?;
    if let Some(max_hop) = max_hop {
        for hop in 1..=max_hop {
            write!(writer, "\tDuplicated_{hop}_hop\tDuplicatedUpdates_{hop}_hop")?;
        }
    }

    for bucket in buckets {
        write!(writer, "\n{}", bucket_label(bucket))?;
        write_advanced_columns(&mut writer, &bucket.results, max_hop)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_advanced_columns(
    writer: &mut impl Write,
    results: &ClassificationResults,
    max_hop: Option<u8>,
) -> Result<()> {
    for stats in [
        &results.single_low_visibility,
        &results.single_mid_visibility,
        &results.single_high_visibility,
    ] {
        write!(writer, "\t{}\t{}", stats.spikes, stats.prefixes)?;
    }
    if let Some(max_hop) = max_hop {
        for hop in 1..=max_hop {
            match results.correlated_by_hop.get(&hop) {
                Some(stats) => write!(writer, "\t{}\t{}", stats.spikes, stats.prefixes)?,
                None => write!(writer, "\t0\t0")?,
            }
        }
    }
    Ok(())
}

fn write_quartile_columns(writer: &mut impl Write, quartiles: Option<Quartiles>) -> Result<()> {
    match quartiles {
        Some(q) => write!(
            writer,
            "\t{}\t{}\t{}\t{}\t{}",
            q.q1, q.median, q.q3, q.min, q.max
        )?,
        None => write!(writer, "\t0\t0\t0\t0\t0")?,
    }
    Ok(())
}

/// Quartiles of the time span of correlated groups, one row per hop.
pub fn write_time_quartiles(path: &Path, totals: &ClassificationResults) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)
        .with_context(|| format!("failed to create quartiles file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let max_hop = totals.max_hop().unwrap_or(0);
    for hop in 1..=max_hop {
        if hop == 1 {
            write!(writer, "{hop} hop")?;
        } else {
            write!(writer, "\n{hop} hops")?;
        }
        write!(writer, "\t{}", hop as u32 * 10)?;
        let quartiles = totals
            .correlated_by_hop
            .get(&hop)
            .and_then(SpikeClassStats::time_quartiles);
        write_quartile_columns(&mut writer, quartiles)?;
    }
    writer.flush()?;
    Ok(())
}

/// Quartiles of distinct origin AS counts, one row per hop plus one row per
/// single visibility band. The band rows continue the xtic scale past the
/// last hop so everything lands on one chart axis.
pub fn write_origins_quartiles(path: &Path, totals: &ClassificationResults) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)
        .with_context(|| format!("failed to create quartiles file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let max_hop = totals.max_hop().unwrap_or(0);
    let mut first = true;
    for hop in 1..=max_hop {
        if first {
            first = false;
        } else {
            writeln!(writer)?;
        }
        if hop == 1 {
            write!(writer, "{hop} hop")?;
        } else {
            write!(writer, "{hop} hops")?;
        }
        write!(writer, "\t{}", hop as u32 * 10)?;
        let quartiles = totals
            .correlated_by_hop
            .get(&hop)
            .and_then(SpikeClassStats::origins_quartiles);
        write_quartile_columns(&mut writer, quartiles)?;
    }

    let bands = [
        ("single33", 1u32, &totals.single_low_visibility),
        ("single66", 2u32, &totals.single_mid_visibility),
        ("single100", 3u32, &totals.single_high_visibility),
    ];
    for (label, offset, stats) in bands {
        if let Some(quartiles) = stats.origins_quartiles() {
            if first {
                first = false;
            } else {
                writeln!(writer)?;
            }
            write!(writer, "{label}\t{}", (max_hop as u32 + offset) * 10)?;
            write_quartile_columns(&mut writer, Some(quartiles))?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// The basic classifier's per-bucket table.
pub fn write_basic_table(path: &Path, buckets: &[BucketResult]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)
        .with_context(|| format!("failed to create results file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    write!(
        writer,
        "Spike_size\tTotalSpikes\tTotalUpdates\tSingle\tSingleUpdates\tCorrelated\tCorrelatedUpdates\tAllCorrelatedPrefixes"
    )?;
    for bucket in buckets {
        let basic = &bucket.results.basic;
        write!(
            writer,
            "\n{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            bucket_label(bucket),
            basic.total_spikes(),
            basic.single_prefixes + basic.correlated_prefixes,
            basic.single_spikes,
            basic.single_prefixes,
            basic.correlated_spikes,
            basic.correlated_prefixes,
            basic.corroborated_prefixes,
        )?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    generated_at: String,
    pairs: usize,
    spikes: usize,
    updates: u64,
    results: &'a ClassificationResults,
}

/// Machine-readable summary of the whole run.
pub fn write_json_summary(
    path: &Path,
    pairs: usize,
    spikes: usize,
    updates: u64,
    totals: &ClassificationResults,
) -> Result<()> {
    ensure_parent(path)?;
    let summary = JsonSummary {
        generated_at: Utc::now().to_rfc3339(),
        pairs,
        spikes,
        updates,
        results: totals,
    };
    let file = File::create(path)
        .with_context(|| format!("failed to create summary file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &summary)
        .context("failed to serialize run summary")?;
    Ok(())
}

/// Log the headline numbers of the run.
pub fn print_summary(totals: &ClassificationResults) {
    let single = totals.single_spikes();
    let correlated = totals.correlated_spikes();
    if single + correlated > 0 {
        info!(
            "classified {} spikes: {single} single, {correlated} correlated (max hop {:?})",
            single + correlated,
            totals.max_hop()
        );
    }
    if totals.basic.total_spikes() > 0 {
        info!(
            "basic classification: {} single, {} correlated, {} corroborated prefixes",
            totals.basic.single_spikes,
            totals.basic.correlated_spikes,
            totals.basic.corroborated_prefixes
        );
    }
}
