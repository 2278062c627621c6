use crate::engine::{EndReason, RoundRecord, RunSummary};
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result, bail};
use rmp_serde::decode;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

/// Aggregate results over all runs of a simulation directory.
#[derive(Debug, Serialize, Deserialize)]
pub struct Results {
    pub n_runs: usize,
    pub n_extinction: usize,
    pub n_all_dead: usize,
    pub n_round_cap: usize,
    pub n_rounds: AccumulatorReport,
    pub n_dead: AccumulatorReport,
    pub total_infections: AccumulatorReport,
    pub peak_new_infections: AccumulatorReport,
    pub new_infections_per_round: AccumulatorReport,
}

pub struct Analyzer {
    n_runs: usize,
    n_extinction: usize,
    n_all_dead: usize,
    n_round_cap: usize,
    n_rounds: Accumulator,
    n_dead: Accumulator,
    total_infections: Accumulator,
    peak_new_infections: Accumulator,
    new_infections_per_round: Accumulator,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            n_runs: 0,
            n_extinction: 0,
            n_all_dead: 0,
            n_round_cap: 0,
            n_rounds: Accumulator::new(),
            n_dead: Accumulator::new(),
            total_infections: Accumulator::new(),
            peak_new_infections: Accumulator::new(),
            new_infections_per_round: Accumulator::new(),
        }
    }

    /// Add one finished run, given its summary and trajectory files.
    pub fn add_run<P: AsRef<Path>>(&mut self, summary_file: P, trajectory_file: P) -> Result<()> {
        let summary_file = summary_file.as_ref();
        let file =
            File::open(summary_file).with_context(|| format!("failed to open {summary_file:?}"))?;
        let summary: RunSummary = decode::from_read(BufReader::new(file))
            .context("failed to deserialize run summary")?;

        let trajectory_file = trajectory_file.as_ref();
        let file = File::open(trajectory_file)
            .with_context(|| format!("failed to open {trajectory_file:?}"))?;
        let mut reader = BufReader::new(file);

        let mut last = None;
        for _ in 0..summary.n_rounds {
            let record: RoundRecord =
                decode::from_read(&mut reader).context("failed to read round record")?;
            self.new_infections_per_round
                .add(record.n_new_infections as f64);
            last = Some(record);
        }
        match last {
            Some(record) if !record.continuing && record.n_dead == summary.n_dead => {}
            _ => bail!("trajectory does not match run summary"),
        }

        self.n_runs += 1;
        match summary.end_reason {
            EndReason::Extinction => self.n_extinction += 1,
            EndReason::AllEligibleDead => self.n_all_dead += 1,
            EndReason::RoundCap => self.n_round_cap += 1,
        }
        self.n_rounds.add(summary.n_rounds as f64);
        self.n_dead.add(summary.n_dead as f64);
        self.total_infections.add(summary.total_infections as f64);
        self.peak_new_infections
            .add(summary.peak_new_infections as f64);

        Ok(())
    }

    pub fn results(&self) -> Results {
        Results {
            n_runs: self.n_runs,
            n_extinction: self.n_extinction,
            n_all_dead: self.n_all_dead,
            n_round_cap: self.n_round_cap,
            n_rounds: self.n_rounds.report(),
            n_dead: self.n_dead.report(),
            total_infections: self.total_infections.report(),
            peak_new_infections: self.peak_new_infections.report(),
            new_infections_per_round: self.new_infections_per_round.report(),
        }
    }
}
