use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Result of a contact between a carrier and a live target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    AlreadyInfected,
    AlreadyVaccinated,
    Transmitted,
}

/// Parameters recorded once at the start of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub pop_size: usize,
    pub n_vaccinated: usize,
    pub pathogen_name: String,
    pub mortality_rate: f64,
    pub transmission_rate: f64,
}

/// Append-only receiver of simulation events.
pub trait EventSink {
    fn record_run_metadata(&mut self, meta: &RunMetadata) -> Result<()>;

    fn record_interaction(
        &mut self,
        source_id: usize,
        target_id: usize,
        outcome: Outcome,
    ) -> Result<()>;

    fn record_resolution(&mut self, agent_id: usize, died: bool) -> Result<()>;

    fn record_round_summary(
        &mut self,
        round: usize,
        n_infected: usize,
        n_dead: usize,
        continuing: bool,
    ) -> Result<()>;
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn record_run_metadata(&mut self, meta: &RunMetadata) -> Result<()> {
        (**self).record_run_metadata(meta)
    }

    fn record_interaction(
        &mut self,
        source_id: usize,
        target_id: usize,
        outcome: Outcome,
    ) -> Result<()> {
        (**self).record_interaction(source_id, target_id, outcome)
    }

    fn record_resolution(&mut self, agent_id: usize, died: bool) -> Result<()> {
        (**self).record_resolution(agent_id, died)
    }

    fn record_round_summary(
        &mut self,
        round: usize,
        n_infected: usize,
        n_dead: usize,
        continuing: bool,
    ) -> Result<()> {
        (**self).record_round_summary(round, n_infected, n_dead, continuing)
    }
}

/// A single recorded event.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    RunMetadata(RunMetadata),
    Interaction {
        source_id: usize,
        target_id: usize,
        outcome: Outcome,
    },
    Resolution {
        agent_id: usize,
        died: bool,
    },
    RoundSummary {
        round: usize,
        n_infected: usize,
        n_dead: usize,
        continuing: bool,
    },
}

/// Keeps every event in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
}

#[cfg(test)]
impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl EventSink for Recorder {
    fn record_run_metadata(&mut self, meta: &RunMetadata) -> Result<()> {
        self.events.push(Event::RunMetadata(meta.clone()));
        Ok(())
    }

    fn record_interaction(
        &mut self,
        source_id: usize,
        target_id: usize,
        outcome: Outcome,
    ) -> Result<()> {
        self.events.push(Event::Interaction {
            source_id,
            target_id,
            outcome,
        });
        Ok(())
    }

    fn record_resolution(&mut self, agent_id: usize, died: bool) -> Result<()> {
        self.events.push(Event::Resolution { agent_id, died });
        Ok(())
    }

    fn record_round_summary(
        &mut self,
        round: usize,
        n_infected: usize,
        n_dead: usize,
        continuing: bool,
    ) -> Result<()> {
        self.events.push(Event::RoundSummary {
            round,
            n_infected,
            n_dead,
            continuing,
        });
        Ok(())
    }
}

const RULE: &str = "==================================";

/// Human readable event log.
pub struct TextLog<W: Write> {
    writer: W,
}

impl<W: Write> TextLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush().context("failed to flush event log")?;
        Ok(self.writer)
    }
}

impl<W: Write> EventSink for TextLog<W> {
    fn record_run_metadata(&mut self, meta: &RunMetadata) -> Result<()> {
        let w = &mut self.writer;
        writeln!(w, "Population size: {}", meta.pop_size)?;
        writeln!(w, "Vaccinated: {}", meta.n_vaccinated)?;
        writeln!(w, "Pathogen: {}", meta.pathogen_name)?;
        writeln!(w, "Mortality rate: {}", meta.mortality_rate)?;
        writeln!(w, "Transmission rate: {}", meta.transmission_rate)?;
        writeln!(w, "{RULE}")?;
        Ok(())
    }

    fn record_interaction(
        &mut self,
        source_id: usize,
        target_id: usize,
        outcome: Outcome,
    ) -> Result<()> {
        match outcome {
            Outcome::Transmitted => writeln!(self.writer, "{source_id} infects {target_id}")?,
            Outcome::AlreadyInfected => writeln!(
                self.writer,
                "{source_id} didn't infect {target_id} because already infected"
            )?,
            Outcome::AlreadyVaccinated => writeln!(
                self.writer,
                "{source_id} didn't infect {target_id} because vaccinated"
            )?,
        }
        Ok(())
    }

    fn record_resolution(&mut self, agent_id: usize, died: bool) -> Result<()> {
        if died {
            writeln!(self.writer, "{agent_id} died from infection")?;
        } else {
            writeln!(self.writer, "{agent_id} survived infection")?;
        }
        Ok(())
    }

    fn record_round_summary(
        &mut self,
        round: usize,
        n_infected: usize,
        n_dead: usize,
        continuing: bool,
    ) -> Result<()> {
        let w = &mut self.writer;
        writeln!(w, "{RULE}")?;
        writeln!(w, "Total dead: {n_dead}")?;
        writeln!(w, "Total infected: {n_infected}")?;
        if continuing {
            writeln!(w, "Round {round} ended, beginning {}", round + 1)?;
        } else {
            writeln!(w, "Round {round} ended, no more rounds")?;
        }
        writeln!(w, "{RULE}")?;
        Ok(())
    }
}
