use crate::config::Config;
use crate::engine::Record;
use crate::stats::{Accumulator, TimeSeries};
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde_value::Value;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

pub trait Obs {
    fn update(&mut self, record: &Record) -> Result<()>;
    fn report(&self) -> Result<Value>;
}

fn named_report<T: serde::Serialize>(name: &str, report: T) -> Result<Value> {
    let report = BTreeMap::from([(name, report)]);
    serde_value::to_value(report).with_context(|| format!("failed to convert {name} report"))
}

/// Mean number of agents per compartment.
pub struct CompartmentCounts {
    labels: Vec<&'static str>,
    acc_vec: Vec<Accumulator>,
}

impl CompartmentCounts {
    pub fn new(cfg: &Config) -> Self {
        let labels = cfg.model.compartment_labels();
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(labels.len(), Accumulator::new);
        Self { labels, acc_vec }
    }
}

impl Obs for CompartmentCounts {
    fn update(&mut self, record: &Record) -> Result<()> {
        for (acc, &count) in self.acc_vec.iter_mut().zip(&record.tally.counts) {
            acc.add(count as f64);
        }
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        let reports: BTreeMap<_, _> = self
            .labels
            .iter()
            .zip(&self.acc_vec)
            .map(|(&label, acc)| (label, acc.report()))
            .collect();
        named_report("compartment_counts", reports)
    }
}

/// Fraction of agents carrying parasites (neither susceptible nor prophylactic).
pub struct Prevalence {
    infected: Vec<bool>,
    time_series: TimeSeries,
}

impl Prevalence {
    pub fn new(cfg: &Config) -> Self {
        let infected = cfg
            .model
            .compartment_labels()
            .into_iter()
            .map(|label| !matches!(label, "S" | "P"))
            .collect();
        Self {
            infected,
            time_series: TimeSeries::new(),
        }
    }
}

impl Obs for Prevalence {
    fn update(&mut self, record: &Record) -> Result<()> {
        let total = record.tally.total();
        if total == 0 {
            return Ok(());
        }
        let n_infected: usize = record
            .tally
            .counts
            .iter()
            .zip(&self.infected)
            .filter(|(_, infected)| **infected)
            .map(|(count, _)| count)
            .sum();
        self.time_series.push(n_infected as f64 / total as f64);
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        named_report("prevalence", self.time_series.report())
    }
}

/// Entomological inoculation rate.
#[derive(Default)]
pub struct Eir {
    time_series: TimeSeries,
}

impl Obs for Eir {
    fn update(&mut self, record: &Record) -> Result<()> {
        self.time_series.push(record.eir);
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        named_report("eir", self.time_series.report())
    }
}

/// Infectivity of the human population towards mosquitoes.
#[derive(Default)]
pub struct Infectivity {
    time_series: TimeSeries,
}

impl Obs for Infectivity {
    fn update(&mut self, record: &Record) -> Result<()> {
        self.time_series.push(record.infectivity);
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        named_report("infectivity", self.time_series.report())
    }
}

pub struct Analyzer {
    saves_per_file: usize,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: &Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(CompartmentCounts::new(cfg)),
            Box::new(Prevalence::new(cfg)),
            Box::new(Eir::default()),
            Box::new(Infectivity::default()),
        ];
        Self {
            saves_per_file: cfg.output.saves_per_file,
            obs_ptr_vec,
        }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for _ in 0..self.saves_per_file {
            let record: Record =
                decode::from_read(&mut reader).context("failed to read record")?;
            self.add_record(&record)?;
        }
        Ok(())
    }

    pub fn add_record(&mut self, record: &Record) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(record).context("failed to update observable")?;
        }
        Ok(())
    }

    pub fn reports(&self) -> Result<Vec<Value>> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let reports = self.reports().context("failed to build reports")?;
        encode::write_named(&mut writer, &reports).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stepper::Tally;
    use crate::testing::config;

    fn record(counts: [usize; 6], eir: f64) -> Record {
        Record {
            step: 0,
            time: 0.0,
            eir,
            infectivity: 0.1,
            tally: Tally { counts },
            vector: BTreeMap::new(),
        }
    }

    #[test]
    fn prevalence_excludes_susceptible_and_prophylactic() {
        let mut obs = Prevalence::new(&config());
        obs.update(&record([5, 1, 1, 1, 1, 1], 0.0)).unwrap();
        obs.update(&record([0, 0, 0, 0, 0, 0], 0.0)).unwrap();
        let report = obs.time_series.report();
        assert!((report.mean - 0.4).abs() < 1e-12);
    }

    #[test]
    fn analyzer_reports_every_observable() {
        let mut analyzer = Analyzer::new(&config());
        for idx in 0..32 {
            analyzer
                .add_record(&record([100 - idx, idx, 0, 0, 0, 0], idx as f64))
                .unwrap();
        }
        let reports = analyzer.reports().unwrap();
        assert_eq!(reports.len(), 4);
        assert!(matches!(reports[0], Value::Map(_)));
    }
}
