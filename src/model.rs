use crate::error::SimError;
use std::rc::Rc;

/// Pathogen parameters, shared by every agent it infects.
#[derive(Debug, Clone, PartialEq)]
pub struct Pathogen {
    name: String,
    mortality_rate: f64,
    transmission_rate: f64,
}

impl Pathogen {
    /// Create a new pathogen.
    ///
    /// # Errors
    /// Returns [`SimError::Configuration`] if either rate lies outside `[0, 1]`.
    pub fn new(
        name: impl Into<String>,
        mortality_rate: f64,
        transmission_rate: f64,
    ) -> Result<Self, SimError> {
        check_prob(mortality_rate, "mortality rate")?;
        check_prob(transmission_rate, "transmission rate")?;
        Ok(Self {
            name: name.into(),
            mortality_rate,
            transmission_rate,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mortality_rate(&self) -> f64 {
        self.mortality_rate
    }

    pub fn transmission_rate(&self) -> f64 {
        self.transmission_rate
    }
}

fn check_prob(prob: f64, what: &str) -> Result<(), SimError> {
    // Also rejects NaN.
    if !(0.0..=1.0).contains(&prob) {
        return Err(SimError::config(format!(
            "{what} must be in the range [0, 1], but is {prob}"
        )));
    }
    Ok(())
}

/// Individual of the population.
///
/// `vaccinated` is fixed at construction and `alive` only ever goes from
/// `true` to `false`.
#[derive(Debug, Clone)]
pub struct Agent {
    id: usize,
    vaccinated: bool,
    alive: bool,
    infection: Option<Rc<Pathogen>>,
}

impl Agent {
    pub fn new(id: usize, vaccinated: bool, infection: Option<Rc<Pathogen>>) -> Self {
        Self {
            id,
            vaccinated,
            alive: true,
            infection,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_vaccinated(&self) -> bool {
        self.vaccinated
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn infection(&self) -> Option<&Rc<Pathogen>> {
        self.infection.as_ref()
    }

    pub fn is_infected(&self) -> bool {
        self.infection.is_some()
    }

    /// Alive and infected, i.e. able to act as a transmission source.
    pub fn is_carrier(&self) -> bool {
        self.alive && self.infection.is_some()
    }

    pub(crate) fn infect(&mut self, pathogen: Rc<Pathogen>, round: usize) -> Result<(), SimError> {
        let reason = if !self.alive {
            "transmission to a dead agent"
        } else if self.vaccinated {
            "transmission to a vaccinated agent"
        } else if self.infection.is_some() {
            "transmission to an infected agent"
        } else {
            self.infection = Some(pathogen);
            return Ok(());
        };
        Err(SimError::InvariantViolation {
            round,
            agent_id: self.id,
            reason,
        })
    }

    /// Settle the current infection: either die or recover with immunity.
    pub(crate) fn resolve(&mut self, died: bool, round: usize) -> Result<(), SimError> {
        if !self.alive || self.infection.is_none() {
            return Err(SimError::InvariantViolation {
                round,
                agent_id: self.id,
                reason: "resolving an agent without an active infection",
            });
        }
        if died {
            self.alive = false;
        } else {
            self.infection = None;
        }
        Ok(())
    }
}

/// Fixed-size roster of agents.
///
/// Agents are owned here and addressed by index; the agent at index `i` has id `i + 1`.
#[derive(Debug, Clone)]
pub struct Population {
    agt_vec: Vec<Agent>,
}

impl Population {
    pub(crate) fn new(agt_vec: Vec<Agent>) -> Self {
        Self { agt_vec }
    }

    pub fn len(&self) -> usize {
        self.agt_vec.len()
    }

    #[cfg(test)]
    pub fn agents(&self) -> &[Agent] {
        &self.agt_vec
    }

    pub fn get(&self, i_agt: usize) -> &Agent {
        &self.agt_vec[i_agt]
    }

    pub(crate) fn get_mut(&mut self, i_agt: usize) -> &mut Agent {
        &mut self.agt_vec[i_agt]
    }

    /// Indices of all current carriers.
    pub fn carriers(&self) -> Vec<usize> {
        self.agt_vec
            .iter()
            .enumerate()
            .filter(|(_, agt)| agt.is_carrier())
            .map(|(i_agt, _)| i_agt)
            .collect()
    }

    pub fn n_dead(&self) -> usize {
        self.agt_vec.iter().filter(|agt| !agt.is_alive()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pathogen() -> Rc<Pathogen> {
        Rc::new(Pathogen::new("flu", 0.5, 0.5).unwrap())
    }

    #[test]
    fn pathogen_rejects_out_of_range_rates() {
        assert!(Pathogen::new("x", 1.2, 0.1).is_err());
        assert!(Pathogen::new("x", 0.1, -0.1).is_err());
        assert!(Pathogen::new("x", f64::NAN, 0.1).is_err());
        assert!(Pathogen::new("x", 0.0, 1.0).is_ok());
    }

    #[test]
    fn vaccinated_agent_cannot_be_infected() {
        let mut agt = Agent::new(3, true, None);
        let err = agt.infect(pathogen(), 2).unwrap_err();
        assert_eq!(
            err,
            SimError::InvariantViolation {
                round: 2,
                agent_id: 3,
                reason: "transmission to a vaccinated agent",
            }
        );
        assert!(!agt.is_infected());
    }

    #[test]
    fn death_is_permanent() {
        let mut agt = Agent::new(1, false, Some(pathogen()));
        agt.resolve(true, 1).unwrap();
        assert!(!agt.is_alive());
        assert!(!agt.is_carrier());
        assert!(agt.resolve(false, 2).is_err());
        assert!(agt.infect(pathogen(), 2).is_err());
        assert!(!agt.is_alive());
    }

    #[test]
    fn recovery_clears_infection() {
        let mut agt = Agent::new(1, false, Some(pathogen()));
        agt.resolve(false, 1).unwrap();
        assert!(agt.is_alive());
        assert!(!agt.is_infected());
        assert!(agt.resolve(false, 1).is_err());
    }
}
