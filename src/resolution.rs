use crate::events::EventSink;
use crate::model::Population;
use anyhow::Result;
use rand::prelude::*;

/// Aggregate counts at the end of a round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoundTally {
    /// Agents whose infection was resolved by recovery this round.
    pub n_infected: usize,
    /// Agents dead at the end of this round, including earlier deaths.
    pub n_dead: usize,
}

/// Resolve the fate of every infected agent.
///
/// Each infected agent dies with the mortality rate of its pathogen and
/// otherwise recovers with permanent immunity. Agents infected earlier in the
/// same round are resolved too.
pub fn resolve_round<R, S>(
    pop: &mut Population,
    round: usize,
    rng: &mut R,
    sink: &mut S,
) -> Result<RoundTally>
where
    R: Rng + ?Sized,
    S: EventSink + ?Sized,
{
    let mut tally = RoundTally::default();

    for i_agt in 0..pop.len() {
        let agt = pop.get(i_agt);
        if !agt.is_alive() {
            tally.n_dead += 1;
            continue;
        }
        let Some(pathogen) = agt.infection() else {
            continue;
        };

        let died = rng.random::<f64>() < pathogen.mortality_rate();
        let agt = pop.get_mut(i_agt);
        agt.resolve(died, round)?;
        sink.record_resolution(agt.id(), died)?;

        if died {
            tally.n_dead += 1;
        } else {
            tally.n_infected += 1;
        }
    }

    Ok(tally)
}
