use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::events::TextLog;
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::encode;
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    pub fn create_run(&self, seed: Option<u64>) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let seed = seed
            .or(self.cfg.run.seed)
            .unwrap_or_else(rand::random::<u64>);
        log::info!("using seed {seed}");

        let mut engine =
            Engine::new(self.cfg.clone(), seed).context("failed to construct engine")?;

        let log_file = run_dir.join(self.log_file_name());
        let file =
            File::create(&log_file).with_context(|| format!("failed to create {log_file:?}"))?;
        let mut event_log = TextLog::new(BufWriter::new(file));

        let trajectory_file = self.trajectory_file(run_idx);
        let file = File::create(&trajectory_file)
            .with_context(|| format!("failed to create {trajectory_file:?}"))?;
        let mut writer = BufWriter::new(file);

        let summary = engine
            .run(&mut event_log, |record| {
                encode::write(&mut writer, record).context("failed to serialize round record")
            })
            .context("failed to run simulation")?;

        event_log.finish()?;
        writer.flush().context("failed to flush writer stream")?;

        log::info!("{summary:#?}");
        write_msgpack(self.summary_file(run_idx), &summary).context("failed to save summary")?;

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let mut analyzer = Analyzer::new();

        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            analyzer
                .add_run(self.summary_file(run_idx), self.trajectory_file(run_idx))
                .with_context(|| format!("failed to add run {run_idx}"))?;
        }

        let results = analyzer.results();
        log::info!("{results:#?}");

        write_msgpack(self.results_file(), &results).context("failed to save results")?;

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for run_dir in glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
        {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let results_file = self.results_file();
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
        }

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn log_file_name(&self) -> String {
        let pathogen = &self.cfg.pathogen;
        let pop = &self.cfg.population;
        format!(
            "{}_pop_{}_vac_{}_inf_{}.log",
            pathogen.name, pop.size, pop.n_vaccinated, pop.n_infected_init
        )
    }

    fn trajectory_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("trajectory.msgpack")
    }

    fn summary_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("summary.msgpack")
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.msgpack")
    }
}

fn write_msgpack<T: Serialize, P: AsRef<Path>>(file: P, value: &T) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, value).context("failed to serialize value")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}
