use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pathogen parameters.
    pub pathogen: PathogenConfig,
    /// Initial population composition.
    pub population: PopulationConfig,
    /// Run control parameters.
    pub run: RunConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PathogenConfig {
    /// Label, informational only.
    pub name: String,
    /// Probability that an infected agent dies when its infection is resolved.
    pub mortality_rate: f64,
    /// Probability that a contact with a susceptible agent transmits.
    pub transmission_rate: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of agents.
    pub size: usize,
    /// Number of vaccinated agents.
    pub n_vaccinated: usize,
    /// Number of agents infected at the start.
    pub n_infected_init: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of rounds before a run is stopped.
    pub max_rounds: usize,
    /// Random seed. Fresh entropy is used when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.pathogen.mortality_rate, 0.0..=1.0).context("invalid mortality rate")?;
        check_num(self.pathogen.transmission_rate, 0.0..=1.0)
            .context("invalid transmission rate")?;

        let pop = &self.population;
        check_num(pop.size, 1..10_000_000).context("invalid population size")?;
        check_num(pop.n_vaccinated, 0..=pop.size).context("invalid number of vaccinated")?;
        check_num(pop.n_infected_init, 0..=pop.size - pop.n_vaccinated)
            .context("invalid initial number of infected")?;

        check_num(self.run.max_rounds, 1..1_000_000_000).context("invalid maximum of rounds")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
