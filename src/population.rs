use crate::error::SimError;
use crate::model::{Agent, Pathogen, Population};
use std::rc::Rc;

/// Build the initial population.
///
/// Ids run from 1 to `size` in creation order: first the initially infected
/// agents, then the vaccinated ones, then the remaining susceptible agents.
///
/// # Errors
/// Returns [`SimError::Configuration`] if `size` is zero or if
/// `n_infected_init + n_vaccinated` exceeds `size`.
pub fn build_population(
    size: usize,
    n_vaccinated: usize,
    n_infected_init: usize,
    pathogen: &Rc<Pathogen>,
) -> Result<Population, SimError> {
    if size == 0 {
        return Err(SimError::config("population size must be positive"));
    }
    let n_susceptible = size
        .checked_sub(n_infected_init)
        .and_then(|rest| rest.checked_sub(n_vaccinated))
        .ok_or_else(|| {
            SimError::config(format!(
                "initially infected ({n_infected_init}) plus vaccinated ({n_vaccinated}) \
                 exceeds population size ({size})"
            ))
        })?;

    let kinds = std::iter::repeat_n((false, true), n_infected_init)
        .chain(std::iter::repeat_n((true, false), n_vaccinated))
        .chain(std::iter::repeat_n((false, false), n_susceptible));

    let agt_vec = kinds
        .enumerate()
        .map(|(i_agt, (vaccinated, infected))| {
            let infection = infected.then(|| Rc::clone(pathogen));
            Agent::new(i_agt + 1, vaccinated, infection)
        })
        .collect();

    Ok(Population::new(agt_vec))
}
