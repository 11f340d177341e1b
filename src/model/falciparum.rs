//! Non-relapsing malaria.
//!
//! Agents move between susceptible, asymptomatic, subpatent, diseased,
//! treated and prophylactic compartments. Clinical outcomes of an infection
//! depend on clinical immunity and recovery from asymptomatic infection on
//! parasite immunity.

use super::{Compartment, DiseaseModel, Hill, MaternalImmunity, Transition, choose_event};
use crate::agent::Demography;
use crate::clock::RateClock;
use crate::config::FalciparumConfig;
use crate::scheduler::InfectionScheduler;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FalciparumCompartment {
    S,
    A,
    U,
    D,
    T,
    P,
}

impl Compartment for FalciparumCompartment {
    const ALL: [Self; 6] = [Self::S, Self::A, Self::U, Self::D, Self::T, Self::P];

    fn index(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::A => "A",
            Self::U => "U",
            Self::D => "D",
            Self::T => "T",
            Self::P => "P",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FalciparumStatus {
    compartment: FalciparumCompartment,
    parasite_immunity: f64,
    clinical_immunity: f64,
    maternal_clinical_immunity: f64,
    pending_boosts: u32,
    refractory_until: f64,
    infections: InfectionScheduler<()>,
}

impl FalciparumStatus {
    pub fn new(
        compartment: FalciparumCompartment,
        parasite_immunity: f64,
        clinical_immunity: f64,
    ) -> Self {
        Self {
            compartment,
            parasite_immunity,
            clinical_immunity,
            maternal_clinical_immunity: 0.0,
            pending_boosts: 0,
            refractory_until: f64::NEG_INFINITY,
            infections: InfectionScheduler::new(),
        }
    }

    pub fn susceptible() -> Self {
        Self::new(FalciparumCompartment::S, 0.0, 0.0)
    }

    pub fn compartment(&self) -> FalciparumCompartment {
        self.compartment
    }

    pub fn parasite_immunity(&self) -> f64 {
        self.parasite_immunity
    }

    /// Acquired plus maternal clinical immunity.
    pub fn clinical_immunity(&self) -> f64 {
        self.clinical_immunity + self.maternal_clinical_immunity
    }

    pub fn maternal_clinical_immunity(&self) -> f64 {
        self.maternal_clinical_immunity
    }

    pub fn infections(&self) -> &InfectionScheduler<()> {
        &self.infections
    }

    fn enter(&mut self, compartment: FalciparumCompartment) {
        self.compartment = compartment;
        if compartment == FalciparumCompartment::T {
            self.infections.clear();
        }
    }
}

/// Resolved parameters of the non-relapsing model for a fixed time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Falciparum {
    demography: Demography,
    delay: f64,
    treatment_rate: f64,
    disease_rate: f64,
    subpatent_rate: f64,
    asymptomatic_rate: f64,
    prophylaxis_rate: f64,
    prob_treatment: f64,
    /// Probability that an infection is clinical.
    phi: Hill,
    parasite_immunity_mid: f64,
    parasite_immunity_steepness: f64,
    asymptomatic_rate_factor: f64,
    parasite_decay: f64,
    clinical_decay: f64,
    maternal_decay: f64,
    end_maternal_immunity: f64,
    refractory_period: f64,
    c_a: f64,
    c_u: f64,
    c_d: f64,
    c_t: f64,
}

impl Falciparum {
    pub fn new(cfg: &FalciparumConfig, demography: Demography, dt: f64) -> Self {
        Self {
            demography,
            delay: cfg.delay,
            treatment_rate: 1.0 / cfg.duration_treatment,
            disease_rate: 1.0 / cfg.duration_disease,
            subpatent_rate: 1.0 / cfg.duration_subpatent,
            asymptomatic_rate: 1.0 / cfg.duration_asymptomatic,
            prophylaxis_rate: 1.0 / cfg.duration_prophylaxis,
            prob_treatment: cfg.prob_treatment,
            phi: Hill {
                min: 0.0,
                max: 1.0,
                mid: cfg.clinical_immunity_mid,
                steepness: cfg.clinical_immunity_steepness,
            },
            parasite_immunity_mid: cfg.parasite_immunity_mid,
            parasite_immunity_steepness: cfg.parasite_immunity_steepness,
            asymptomatic_rate_factor: cfg.asymptomatic_rate_factor,
            parasite_decay: (-dt / cfg.duration_parasite_immunity).exp(),
            clinical_decay: (-dt / cfg.duration_clinical_immunity).exp(),
            maternal_decay: (-dt / cfg.duration_maternal_immunity).exp(),
            end_maternal_immunity: cfg.end_maternal_immunity,
            refractory_period: cfg.refractory_period,
            c_a: cfg.c_a,
            c_u: cfg.c_u,
            c_d: cfg.c_d,
            c_t: cfg.c_t,
        }
    }

    pub fn infectivity(&self, compartment: FalciparumCompartment) -> f64 {
        match compartment {
            FalciparumCompartment::S | FalciparumCompartment::P => 0.0,
            FalciparumCompartment::A => self.c_a,
            FalciparumCompartment::U => self.c_u,
            FalciparumCompartment::D => self.c_d,
            FalciparumCompartment::T => self.c_t,
        }
    }

    /// Recovery rate from asymptomatic infection.
    ///
    /// Equals the base rate without parasite immunity and approaches
    /// `asymptomatic_rate_factor` times the base rate as immunity grows.
    fn asymptomatic_recovery_rate(&self, parasite_immunity: f64) -> f64 {
        let saturation = 1.0
            + (parasite_immunity / self.parasite_immunity_mid)
                .powf(-self.parasite_immunity_steepness);
        self.asymptomatic_rate * (1.0 + (self.asymptomatic_rate_factor - 1.0) / saturation)
    }

    fn progression(&self, status: &FalciparumStatus) -> Option<(f64, FalciparumCompartment)> {
        match status.compartment {
            FalciparumCompartment::S => None,
            FalciparumCompartment::A => Some((
                self.asymptomatic_recovery_rate(status.parasite_immunity),
                FalciparumCompartment::U,
            )),
            FalciparumCompartment::U => Some((self.subpatent_rate, FalciparumCompartment::S)),
            FalciparumCompartment::D => Some((self.disease_rate, FalciparumCompartment::A)),
            FalciparumCompartment::T => Some((self.treatment_rate, FalciparumCompartment::P)),
            FalciparumCompartment::P => Some((self.prophylaxis_rate, FalciparumCompartment::S)),
        }
    }

    fn expose(
        &self,
        status: &mut FalciparumStatus,
        lambda: f64,
        t: f64,
        dt: f64,
        clock: &mut RateClock,
    ) {
        if clock.event_occurs(lambda, dt) {
            status.infections.schedule(t + self.delay, ());
        }
    }

    fn activate(&self, status: &mut FalciparumStatus, t: f64) -> bool {
        let due = status.infections.drain_due(t);
        if due.is_empty() {
            return false;
        }
        if t >= status.refractory_until {
            status.pending_boosts += 1;
            status.refractory_until = t + self.refractory_period;
        }
        true
    }

    /// Clinical or asymptomatic outcome of an activated infection.
    fn infection_outcome(&self, status: &mut FalciparumStatus, clock: &mut RateClock) {
        if clock.uniform() > self.phi.eval(status.clinical_immunity()) {
            status.enter(FalciparumCompartment::A);
        } else if clock.uniform() <= self.prob_treatment {
            status.enter(FalciparumCompartment::T);
        } else {
            status.enter(FalciparumCompartment::D);
        }
    }

    fn competing_events(
        &self,
        status: &mut FalciparumStatus,
        dt: f64,
        clock: &mut RateClock,
    ) -> bool {
        let death_rate = self.demography.death_rate;
        let Some((rate, next)) = self.progression(status) else {
            return clock.event_occurs(death_rate, dt);
        };
        let rates = [rate, death_rate];
        if !clock.event_occurs(rate + death_rate, dt) {
            return false;
        }
        if choose_event(clock, &rates) == 0 {
            status.enter(next);
            false
        } else {
            true
        }
    }
}

impl DiseaseModel for Falciparum {
    type Status = FalciparumStatus;
    type Compartment = FalciparumCompartment;

    fn demography(&self) -> &Demography {
        &self.demography
    }

    fn compartment(status: &FalciparumStatus) -> FalciparumCompartment {
        status.compartment
    }

    fn immunity(status: &FalciparumStatus) -> MaternalImmunity {
        MaternalImmunity {
            parasite: status.parasite_immunity,
            clinical: status.clinical_immunity(),
        }
    }

    fn transition(
        &self,
        status: &mut FalciparumStatus,
        lambda: f64,
        t: f64,
        dt: f64,
        clock: &mut RateClock,
    ) -> Transition {
        let infectivity = self.infectivity(status.compartment);
        let dies = match status.compartment {
            FalciparumCompartment::T | FalciparumCompartment::P => {
                self.competing_events(status, dt, clock)
            }
            current => {
                self.expose(status, lambda, t, dt, clock);
                if self.activate(status, t) {
                    // A clinical case absorbs new infections.
                    if current != FalciparumCompartment::D {
                        self.infection_outcome(status, clock);
                    }
                    false
                } else {
                    self.competing_events(status, dt, clock)
                }
            }
        };
        Transition { dies, infectivity }
    }

    fn update_immunity(&self, status: &mut FalciparumStatus, age: f64) {
        let boosts = status.pending_boosts as f64;
        status.pending_boosts = 0;
        status.parasite_immunity = status.parasite_immunity * self.parasite_decay + boosts;
        status.clinical_immunity = status.clinical_immunity * self.clinical_decay + boosts;
        if age >= self.end_maternal_immunity {
            status.maternal_clinical_immunity = 0.0;
        } else {
            status.maternal_clinical_immunity *= self.maternal_decay;
        }
    }

    fn newborn(&self, mother: MaternalImmunity) -> FalciparumStatus {
        FalciparumStatus {
            maternal_clinical_immunity: self.demography.proportion_maternal_immunity
                * mother.clinical,
            ..FalciparumStatus::susceptible()
        }
    }
}
