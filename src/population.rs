//! Ordered collection of agents and the aggregates carried between steps.

use crate::agent::{Agent, Demography};
use crate::clock::RateClock;
use crate::model::{Compartment, DiseaseModel, MaternalImmunity};
use serde::{Deserialize, Serialize};

/// Total weighted exposure `sum(omega * zeta)`, valid for a single time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureCache {
    total: f64,
    valid_at: Option<f64>,
}

impl ExposureCache {
    pub fn is_valid_at(&self, t: f64) -> bool {
        self.valid_at == Some(t)
    }

    pub fn invalidate(&mut self) {
        self.valid_at = None;
    }

    /// Recompute the total over `agents` and mark it valid at `t`.
    pub fn rebuild<S>(&mut self, agents: &[Agent<S>], t: f64) {
        self.commit(agents.iter().map(Agent::exposure).sum(), t);
    }

    pub fn commit(&mut self, total: f64, t: f64) {
        self.total = total;
        self.valid_at = Some(t);
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

/// Per-agent record suitable for external serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub age: f64,
    pub compartment: String,
    pub parasite_immunity: f64,
    pub clinical_immunity: f64,
    pub zeta: f64,
    pub hypnozoites: u32,
}

/// Human population with its exposure cache and maternal immunity pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Population<S> {
    agents: Vec<Agent<S>>,
    exposure: ExposureCache,
    pool: Vec<MaternalImmunity>,
}

impl<S> Default for Population<S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S> Population<S> {
    pub fn empty() -> Self {
        Self {
            agents: Vec::new(),
            exposure: ExposureCache::default(),
            pool: vec![MaternalImmunity::ZERO],
        }
    }

    /// Create a population from an initial set of agents.
    ///
    /// The maternal immunity pool is filled by [`Population::rebuild_pool`]
    /// and the exposure cache is left invalid.
    pub fn new(agents: Vec<Agent<S>>) -> Self {
        Self {
            agents,
            ..Self::empty()
        }
    }

    pub fn push(&mut self, agent: Agent<S>) {
        self.agents.push(agent);
        self.exposure.invalidate();
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agents(&self) -> &[Agent<S>] {
        &self.agents
    }

    /// Mutable access to the agents. Invalidates the exposure cache.
    pub fn agents_mut(&mut self) -> &mut [Agent<S>] {
        self.exposure.invalidate();
        &mut self.agents
    }

    pub fn exposure(&self) -> &ExposureCache {
        &self.exposure
    }

    /// Total weighted exposure valid at `t`, recomputed if stale.
    pub fn total_exposure(&mut self, t: f64) -> f64 {
        if !self.exposure.is_valid_at(t) {
            self.exposure.rebuild(&self.agents, t);
        }
        self.exposure.total()
    }

    pub fn invalidate(&mut self) {
        self.exposure.invalidate();
    }

    /// Immunity levels newborns are sampled from. Never empty.
    pub fn maternal_immunity_pool(&self) -> &[MaternalImmunity] {
        &self.pool
    }

    /// Replace the pool, falling back to a single zero entry.
    pub fn set_maternal_immunity_pool(&mut self, mut pool: Vec<MaternalImmunity>) {
        if pool.is_empty() {
            pool.push(MaternalImmunity::ZERO);
        }
        self.pool = pool;
    }

    /// Collect the pool from every agent inside the birthing window.
    pub fn rebuild_pool<M>(&mut self, model: &M)
    where
        M: DiseaseModel<Status = S>,
    {
        let demography = model.demography();
        let pool = self
            .agents
            .iter()
            .filter(|agent| demography.is_birthing_capable(agent.age()))
            .map(|agent| M::immunity(agent.status()))
            .collect();
        self.set_maternal_immunity_pool(pool);
    }

    /// Agents together with the pool of the current step.
    pub(crate) fn parts_mut(&mut self) -> (&mut [Agent<S>], &[MaternalImmunity]) {
        self.exposure.invalidate();
        (&mut self.agents, &self.pool)
    }

    /// Install the aggregates built during a step as the caches valid at `t`.
    pub(crate) fn commit(&mut self, total_exposure: f64, pool: Vec<MaternalImmunity>, t: f64) {
        self.exposure.commit(total_exposure, t);
        self.set_maternal_immunity_pool(pool);
    }

    /// Record of every agent, in population order.
    pub fn snapshot<M>(&self) -> Vec<AgentSnapshot>
    where
        M: DiseaseModel<Status = S>,
    {
        self.agents
            .iter()
            .map(|agent| {
                let immunity = M::immunity(agent.status());
                AgentSnapshot {
                    age: agent.age(),
                    compartment: M::compartment(agent.status()).label().to_string(),
                    parasite_immunity: immunity.parasite,
                    clinical_immunity: immunity.clinical,
                    zeta: agent.zeta(),
                    hypnozoites: M::hypnozoites(agent.status()),
                }
            })
            .collect()
    }
}

/// Initial population: `n_agents` agents with exponential ages truncated
/// below the maximum age and log-normal biting heterogeneity.
pub fn initial_population<M: DiseaseModel>(
    model: &M,
    n_agents: usize,
    status: impl Fn() -> M::Status,
    clock: &mut RateClock,
) -> Population<M::Status> {
    let demography: &Demography = model.demography();
    let agents = (0..n_agents)
        .map(|_| {
            let age = clock.truncated_exponential(demography.death_rate, demography.max_age);
            let zeta = clock.log_normal(
                demography.biting_rate_log_mean,
                demography.biting_rate_log_sd,
            );
            Agent::new(age, zeta, status(), demography)
        })
        .collect();
    let mut population = Population::new(agents);
    population.rebuild_pool(model);
    population
}
