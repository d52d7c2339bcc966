use std::time::{Duration, Instant};

use anyhow::{Context, Result, ensure};
use log::info;

use crate::{
    cli::BenchArgs,
    mapper::Mapper,
    samples::{TEN_COLUMNS, TenColumnRecord, ten_column_table},
    shape::ShapeId,
    source::{RowSource, Table},
    table,
};

#[derive(Debug, Clone)]
pub struct Measurement {
    pub strategy: &'static str,
    pub best: Duration,
    pub mean: Duration,
    pub rows: usize,
}

impl Measurement {
    fn rows_per_second(&self) -> f64 {
        let secs = self.best.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.rows as f64 / secs
        }
    }
}

pub fn execute(args: &BenchArgs, mapper: &Mapper) -> Result<()> {
    ensure!(args.runs > 0, "--runs must be at least 1");
    info!(
        "Timing {} run(s) over {} row(s) of {}",
        args.runs,
        args.rows,
        ShapeId::of::<TenColumnRecord>()
    );
    let measurements = measure(mapper, args.rows, args.runs)?;

    let headers = ["strategy", "rows", "best_ms", "mean_ms", "rows_per_sec"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = measurements
        .iter()
        .map(|m| {
            vec![
                m.strategy.to_string(),
                m.rows.to_string(),
                format!("{:.3}", m.best.as_secs_f64() * 1000.0),
                format!("{:.3}", m.mean.as_secs_f64() * 1000.0),
                format!("{:.0}", m.rows_per_second()),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    Ok(())
}

/// Hand-written field assignment versus the mapper over the same rows.
pub fn measure(mapper: &Mapper, rows: usize, runs: usize) -> Result<Vec<Measurement>> {
    let table = ten_column_table(rows).context("Building the sample table")?;
    mapper
        .configure::<TenColumnRecord>()
        .context("Configuring the ten-column record")?;

    let manual = time_runs("manual", rows, runs, || read_manually(&table))?;
    let mapped = time_runs("mapper", rows, runs, || {
        let mut reader = table.reader();
        let records = mapper
            .map_all::<TenColumnRecord, _>(&mut reader)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records.len())
    })?;
    Ok(vec![manual, mapped])
}

fn time_runs<F>(strategy: &'static str, rows: usize, runs: usize, mut run: F) -> Result<Measurement>
where
    F: FnMut() -> Result<usize>,
{
    let divisor = u32::try_from(runs)
        .ok()
        .filter(|runs| *runs > 0)
        .with_context(|| format!("--runs must be between 1 and {}, got {runs}", u32::MAX))?;
    let mut timings = Vec::with_capacity(runs);
    for _ in 0..runs {
        let started = Instant::now();
        let produced = run()?;
        timings.push(started.elapsed());
        ensure!(
            produced == rows,
            "{strategy} produced {produced} record(s), expected {rows}"
        );
    }
    let best = timings.iter().min().copied().unwrap_or_default();
    let total: Duration = timings.iter().sum();
    let mean = total / divisor;
    Ok(Measurement {
        strategy,
        best,
        mean,
        rows,
    })
}

/// Baseline: direct column reads without the mapper.
fn read_manually(table: &Table) -> Result<usize> {
    let mut reader = table.reader();
    let mut records = Vec::with_capacity(table.len());
    while reader.advance()? {
        let mut record = TenColumnRecord::default();
        for (slot, column) in record.values.iter_mut().zip(TEN_COLUMNS) {
            *slot = reader
                .get(column)
                .map(|value| value.as_display())
                .unwrap_or_default();
        }
        records.push(record);
    }
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_strategies_produce_every_row() {
        let measurements = measure(&Mapper::new(), 25, 2).unwrap();
        assert_eq!(measurements.len(), 2);
        assert!(measurements.iter().all(|m| m.rows == 25));
        assert_eq!(measurements[0].strategy, "manual");
        assert_eq!(measurements[1].strategy, "mapper");
    }

    #[test]
    fn zero_runs_are_rejected() {
        let err = time_runs("manual", 0, 0, || Ok(0)).unwrap_err();
        assert!(err.to_string().contains("--runs"));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn run_counts_beyond_u32_are_rejected_before_timing() {
        let runs = u32::MAX as usize + 1;
        let err = time_runs("manual", 0, runs, || panic!("must not run")).unwrap_err();
        assert!(err.to_string().contains("4294967296"), "{err}");
    }
}
