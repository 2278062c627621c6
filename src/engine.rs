use crate::config::Config;
use crate::events::{EventSink, RunMetadata};
use crate::interaction;
use crate::model::{Pathogen, Population};
use crate::population::build_population;
use crate::resolution::{self, RoundTally};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// Every non-vaccinated agent is dead.
    AllEligibleDead,
    /// No carriers were left and no new infections happened.
    Extinction,
    /// The round cap was reached.
    RoundCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Ended(EndReason),
}

/// Record of the simulation at a single round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: usize,
    pub n_infected: usize,
    pub n_dead: usize,
    pub n_new_infections: usize,
    pub continuing: bool,
}

/// Outcome of a complete run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    pub n_rounds: usize,
    pub end_reason: EndReason,
    pub n_dead: usize,
    pub n_alive: usize,
    pub total_infections: usize,
    pub peak_new_infections: usize,
}

/// Simulation engine.
///
/// Owns the population and the random number generator, and steps the
/// simulation round by round until it ends.
pub struct Engine {
    cfg: Config,
    seed: u64,
    pathogen: Rc<Pathogen>,
    pop: Population,
    rng: ChaCha12Rng,
    round: usize,
    status: Status,
    tally: RoundTally,
    total_infections: usize,
    peak_new_infections: usize,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and seed.
    ///
    /// # Errors
    /// Returns an error if the pathogen or population parameters are invalid.
    pub fn new(cfg: Config, seed: u64) -> Result<Self> {
        let pathogen = Pathogen::new(
            cfg.pathogen.name.clone(),
            cfg.pathogen.mortality_rate,
            cfg.pathogen.transmission_rate,
        )
        .context("failed to construct pathogen")?;
        let pathogen = Rc::new(pathogen);

        let pop = build_population(
            cfg.population.size,
            cfg.population.n_vaccinated,
            cfg.population.n_infected_init,
            &pathogen,
        )
        .context("failed to build population")?;

        let rng = ChaCha12Rng::seed_from_u64(seed);

        Ok(Self {
            total_infections: cfg.population.n_infected_init,
            cfg,
            seed,
            pathogen,
            pop,
            rng,
            round: 0,
            status: Status::Running,
            tally: RoundTally::default(),
            peak_new_infections: 0,
        })
    }

    #[cfg(test)]
    pub fn population(&self) -> &Population {
        &self.pop
    }

    pub fn metadata(&self) -> RunMetadata {
        RunMetadata {
            pop_size: self.pop.len(),
            n_vaccinated: self.cfg.population.n_vaccinated,
            pathogen_name: self.pathogen.name().to_owned(),
            mortality_rate: self.pathogen.mortality_rate(),
            transmission_rate: self.pathogen.transmission_rate(),
        }
    }

    /// Run the simulation to completion.
    ///
    /// `on_round` is called with the record of every round, after the round
    /// summary has been sent to `sink`.
    pub fn run<S, F>(&mut self, sink: &mut S, mut on_round: F) -> Result<RunSummary>
    where
        S: EventSink + ?Sized,
        F: FnMut(&RoundRecord) -> Result<()>,
    {
        if self.round != 0 || self.status != Status::Running {
            bail!("simulation already started");
        }
        sink.record_run_metadata(&self.metadata())
            .context("failed to record run metadata")?;

        let end_reason = loop {
            let round = self.round + 1;
            let record = self
                .perform_round(sink)
                .with_context(|| format!("failed to perform round {round}"))?;
            log::debug!("{record:?}");
            on_round(&record)?;

            if let Status::Ended(end_reason) = self.status {
                break end_reason;
            }
        };
        log::info!("simulation ended after {} rounds: {end_reason:?}", self.round);

        let n_dead = self.pop.n_dead();
        Ok(RunSummary {
            seed: self.seed,
            n_rounds: self.round,
            end_reason,
            n_dead,
            n_alive: self.pop.len() - n_dead,
            total_infections: self.total_infections,
            peak_new_infections: self.peak_new_infections,
        })
    }

    fn perform_round<S>(&mut self, sink: &mut S) -> Result<RoundRecord>
    where
        S: EventSink + ?Sized,
    {
        let round = self.round + 1;

        // Contacts strictly before resolution.
        let contacts = interaction::run_round(&mut self.pop, round, &mut self.rng, sink)
            .context("failed to run interactions")?;

        self.tally = resolution::resolve_round(&mut self.pop, round, &mut self.rng, sink)
            .context("failed to resolve infections")?;

        self.round = round;

        let n_new_infections = contacts.newly_infected.len();
        self.total_infections += n_new_infections;
        self.peak_new_infections = self.peak_new_infections.max(n_new_infections);

        let n_eligible = self.pop.len() - self.cfg.population.n_vaccinated;
        if self.tally.n_dead >= n_eligible {
            self.status = Status::Ended(EndReason::AllEligibleDead);
        } else if contacts.n_carriers == 0 && n_new_infections == 0 {
            self.status = Status::Ended(EndReason::Extinction);
        } else if self.round >= self.cfg.run.max_rounds {
            log::warn!("stopping at round cap {}", self.cfg.run.max_rounds);
            self.status = Status::Ended(EndReason::RoundCap);
        }
        let continuing = self.status == Status::Running;

        sink.record_round_summary(round, self.tally.n_infected, self.tally.n_dead, continuing)
            .context("failed to record round summary")?;

        Ok(RoundRecord {
            round,
            n_infected: self.tally.n_infected,
            n_dead: self.tally.n_dead,
            n_new_infections,
            continuing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PathogenConfig, PopulationConfig, RunConfig};
    use crate::error::SimError;
    use crate::events::{Event, Outcome, Recorder};

    fn config(
        size: usize,
        n_vaccinated: usize,
        n_infected_init: usize,
        mortality_rate: f64,
        transmission_rate: f64,
    ) -> Config {
        Config {
            pathogen: PathogenConfig {
                name: "test".into(),
                mortality_rate,
                transmission_rate,
            },
            population: PopulationConfig {
                size,
                n_vaccinated,
                n_infected_init,
            },
            run: RunConfig {
                max_rounds: 10_000,
                seed: None,
            },
        }
    }

    fn run_with_recorder(cfg: Config, seed: u64) -> (Engine, RunSummary, Vec<Event>) {
        let mut engine = Engine::new(cfg, seed).unwrap();
        let mut rec = Recorder::new();
        let summary = engine.run(&mut rec, |_| Ok(())).unwrap();
        (engine, summary, rec.events)
    }

    fn round_summaries(events: &[Event]) -> Vec<(usize, usize, usize, bool)> {
        events
            .iter()
            .filter_map(|e| match *e {
                Event::RoundSummary {
                    round,
                    n_infected,
                    n_dead,
                    continuing,
                } => Some((round, n_infected, n_dead, continuing)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn lethal_non_transmissible_pathogen_dies_out() {
        let (engine, summary, events) = run_with_recorder(config(5, 0, 1, 1.0, 0.0), 1);

        assert_eq!(
            round_summaries(&events),
            vec![(1, 0, 1, true), (2, 0, 1, false)]
        );
        assert_eq!(summary.end_reason, EndReason::Extinction);
        assert_eq!(summary.n_rounds, 2);
        assert_eq!(summary.n_dead, 1);
        assert_eq!(summary.total_infections, 1);
        assert!(!engine.population().get(0).is_alive());
        assert!(engine.population().agents()[1..].iter().all(|a| a.is_alive()));
    }

    #[test]
    fn harmless_transmissible_pathogen_leaves_everyone_immune() {
        let (engine, summary, events) = run_with_recorder(config(4, 0, 1, 0.0, 1.0), 9);

        assert_eq!(summary.n_dead, 0);
        assert_eq!(summary.n_alive, 4);
        assert_eq!(summary.end_reason, EndReason::Extinction);
        assert_eq!(summary.n_rounds, 2);
        assert!(engine.population().carriers().is_empty());

        let summaries = round_summaries(&events);
        assert_eq!(summaries.len(), 2);
        // Round 1 resolves the seed carrier and everyone it infected.
        assert_eq!(summaries[0].1, summary.total_infections);
        assert_eq!(summaries[1], (2, 0, 0, false));

        // How many of the 3 others get infected depends on the 4 draws,
        // but every hit on a susceptible agent transmits.
        let n_transmitted = events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Event::Interaction {
                        outcome: Outcome::Transmitted,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(summary.total_infections, 1 + n_transmitted);
        assert!((1..=4).contains(&summary.total_infections));
        assert_eq!(summary.peak_new_infections, n_transmitted);
    }

    #[test]
    fn certain_transmission_reaches_every_susceptible_hit() {
        let cfg = config(4, 0, 1, 0.0, 1.0);
        for seed in 0..64 {
            let (_, summary, events) = run_with_recorder(cfg.clone(), seed);

            let mut hit = std::collections::HashSet::new();
            for event in &events {
                if let Event::Interaction {
                    source_id: 1,
                    target_id,
                    ..
                } = *event
                {
                    if target_id != 1 {
                        hit.insert(target_id);
                    }
                }
            }
            // Each distinct susceptible agent hit in round 1 ends up infected.
            assert_eq!(summary.total_infections, 1 + hit.len());
        }
    }

    #[test]
    fn fully_lethal_spread_ends_when_all_eligible_dead() {
        let (_, summary, events) = run_with_recorder(config(20, 0, 20, 1.0, 0.5), 3);

        assert_eq!(summary.end_reason, EndReason::AllEligibleDead);
        assert_eq!(summary.n_rounds, 1);
        assert_eq!(round_summaries(&events), vec![(1, 0, 20, false)]);
    }

    #[test]
    fn vaccinated_agents_never_infected_nor_dead() {
        let (engine, _, events) = run_with_recorder(config(60, 20, 3, 0.5, 0.8), 17);

        for agt in &engine.population().agents()[3..23] {
            assert!(agt.is_vaccinated());
            assert!(agt.is_alive());
            assert!(!agt.is_infected());
        }
        for event in &events {
            if let Event::Resolution { agent_id, .. } = event {
                assert!(!(4..=23).contains(agent_id));
            }
        }
    }

    #[test]
    fn dead_agents_take_no_part_in_later_rounds() {
        let (engine, _, events) = run_with_recorder(config(80, 5, 4, 0.6, 0.4), 23);
        assert_eq!(engine.population().len(), 80);

        let mut dead = std::collections::HashSet::new();
        for event in &events {
            match *event {
                Event::Resolution { agent_id, died } => {
                    assert!(!dead.contains(&agent_id));
                    if died {
                        dead.insert(agent_id);
                    }
                }
                Event::Interaction {
                    source_id,
                    target_id,
                    ..
                } => {
                    assert!(!dead.contains(&source_id));
                    assert!(!dead.contains(&target_id));
                }
                _ => {}
            }
        }
        assert_eq!(dead.len(), engine.population().n_dead());
    }

    #[test]
    fn same_seed_same_events() {
        let cfg = config(40, 8, 2, 0.3, 0.2);
        let (_, summary_a, events_a) = run_with_recorder(cfg.clone(), 1234);
        let (_, summary_b, events_b) = run_with_recorder(cfg, 1234);
        assert_eq!(summary_a, summary_b);
        assert_eq!(events_a, events_b);
    }

    #[test]
    fn metadata_recorded_once_first() {
        let (_, _, events) = run_with_recorder(config(10, 2, 1, 0.5, 0.5), 5);
        assert!(matches!(events[0], Event::RunMetadata(_)));
        let n_meta = events
            .iter()
            .filter(|e| matches!(e, Event::RunMetadata(_)))
            .count();
        assert_eq!(n_meta, 1);
    }

    #[test]
    fn round_cap_stops_run() {
        let mut cfg = config(10, 0, 1, 0.0, 1.0);
        cfg.run.max_rounds = 1;
        let (_, summary, events) = run_with_recorder(cfg, 2);
        assert_eq!(summary.end_reason, EndReason::RoundCap);
        assert_eq!(summary.n_rounds, 1);
        assert!(!round_summaries(&events)[0].3);
    }

    #[test]
    fn run_twice_is_rejected() {
        let mut engine = Engine::new(config(5, 0, 1, 1.0, 0.0), 0).unwrap();
        let mut rec = Recorder::new();
        engine.run(&mut rec, |_| Ok(())).unwrap();
        assert!(engine.run(&mut rec, |_| Ok(())).is_err());
    }

    #[test]
    fn rejects_invalid_population() {
        let err = Engine::new(config(5, 0, 6, 0.5, 0.5), 0).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<SimError>(),
            Some(SimError::Configuration(_))
        ));
    }
}
