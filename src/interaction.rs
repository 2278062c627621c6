use crate::error::SimError;
use crate::events::{EventSink, Outcome};
use crate::model::Population;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::Uniform;
use std::rc::Rc;

/// Result of the contact phase of one round.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Contacts {
    /// Number of carriers at the start of the round.
    pub n_carriers: usize,
    /// Indices of agents that went from susceptible to infected this round.
    pub newly_infected: Vec<usize>,
}

/// Run the contact phase of one round.
///
/// Carriers are fixed before any transmission happens, so an agent infected
/// during this round never acts as a source until the next one. Each carrier
/// makes exactly `pop.len()` draws with replacement over the whole
/// population; draws landing on dead agents are wasted.
pub fn run_round<R, S>(
    pop: &mut Population,
    round: usize,
    rng: &mut R,
    sink: &mut S,
) -> Result<Contacts>
where
    R: Rng + ?Sized,
    S: EventSink + ?Sized,
{
    let carriers = pop.carriers();
    let n_agt = pop.len();
    let target_dist = Uniform::new(0, n_agt).context("failed to build contact distribution")?;

    let mut newly_infected = Vec::new();

    for &i_src in &carriers {
        let src = pop.get(i_src);
        let src_id = src.id();
        let pathogen = src.infection().map(Rc::clone).ok_or(SimError::InvariantViolation {
            round,
            agent_id: src_id,
            reason: "carrier without an infection",
        })?;

        for _ in 0..n_agt {
            let i_tgt = target_dist.sample(rng);
            let tgt = pop.get(i_tgt);
            if !tgt.is_alive() {
                continue;
            }
            let tgt_id = tgt.id();

            // Infection status takes precedence over vaccination status.
            if tgt.is_infected() {
                sink.record_interaction(src_id, tgt_id, Outcome::AlreadyInfected)?;
            } else if tgt.is_vaccinated() {
                sink.record_interaction(src_id, tgt_id, Outcome::AlreadyVaccinated)?;
            } else if pathogen.transmission_rate() > rng.random::<f64>() {
                pop.get_mut(i_tgt).infect(Rc::clone(&pathogen), round)?;
                sink.record_interaction(src_id, tgt_id, Outcome::Transmitted)?;
                newly_infected.push(i_tgt);
            }
        }
    }

    Ok(Contacts {
        n_carriers: carriers.len(),
        newly_infected,
    })
}
