//! Relapsing malaria with a dormant liver stage.
//!
//! Agents move between six compartments: susceptible, light-microscopy
//! detectable, PCR detectable, high density (clinical), treated and
//! prophylactic. Dormant hypnozoites reactivate as relapses.

use super::{Compartment, DiseaseModel, Hill, MaternalImmunity, Transition, choose_event};
use crate::agent::Demography;
use crate::clock::RateClock;
use crate::config::VivaxConfig;
use crate::scheduler::InfectionScheduler;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VivaxCompartment {
    S,
    ILm,
    IPcr,
    ID,
    T,
    P,
}

impl Compartment for VivaxCompartment {
    const ALL: [Self; 6] = [Self::S, Self::ILm, Self::IPcr, Self::ID, Self::T, Self::P];

    fn index(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::ILm => "I_LM",
            Self::IPcr => "I_PCR",
            Self::ID => "I_D",
            Self::T => "T",
            Self::P => "P",
        }
    }
}

/// Disease data of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VivaxStatus {
    compartment: VivaxCompartment,
    parasite_immunity: f64,
    clinical_immunity: f64,
    maternal_parasite_immunity: f64,
    maternal_clinical_immunity: f64,
    /// Boosts collected this step, applied by the immunity update.
    pending_boosts: u32,
    refractory_until: f64,
    hypnozoites: u32,
    /// Pending activations; the payload is the number of new hypnozoites.
    infections: InfectionScheduler<u32>,
}

impl VivaxStatus {
    pub fn new(
        compartment: VivaxCompartment,
        parasite_immunity: f64,
        clinical_immunity: f64,
        hypnozoites: u32,
    ) -> Self {
        Self {
            compartment,
            parasite_immunity,
            clinical_immunity,
            maternal_parasite_immunity: 0.0,
            maternal_clinical_immunity: 0.0,
            pending_boosts: 0,
            refractory_until: f64::NEG_INFINITY,
            hypnozoites,
            infections: InfectionScheduler::new(),
        }
    }

    pub fn susceptible() -> Self {
        Self::new(VivaxCompartment::S, 0.0, 0.0, 0)
    }

    pub fn compartment(&self) -> VivaxCompartment {
        self.compartment
    }

    pub fn parasite_immunity(&self) -> f64 {
        self.parasite_immunity + self.maternal_parasite_immunity
    }

    pub fn clinical_immunity(&self) -> f64 {
        self.clinical_immunity + self.maternal_clinical_immunity
    }

    pub fn maternal_immunity(&self) -> MaternalImmunity {
        MaternalImmunity {
            parasite: self.maternal_parasite_immunity,
            clinical: self.maternal_clinical_immunity,
        }
    }

    pub fn hypnozoites(&self) -> u32 {
        self.hypnozoites
    }

    pub fn infections(&self) -> &InfectionScheduler<u32> {
        &self.infections
    }

    fn enter(&mut self, compartment: VivaxCompartment) {
        self.compartment = compartment;
        if compartment == VivaxCompartment::T {
            self.infections.clear();
        }
    }
}

/// Resolved parameters of the relapsing model for a fixed time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vivax {
    demography: Demography,
    delay: f64,
    relapse_rate: f64,
    hypnozoite_clearance_rate: f64,
    prophylaxis_rate: f64,
    treatment_rate: f64,
    high_density_rate: f64,
    lm_rate: f64,
    phi_lm: Hill,
    phi_d: Hill,
    d_pcr: Hill,
    chi_t: f64,
    parasite_decay: f64,
    clinical_decay: f64,
    maternal_decay: f64,
    end_maternal_immunity: f64,
    refractory_period: f64,
    c_lm: f64,
    c_pcr: f64,
    c_d: f64,
    c_t: f64,
}

impl Vivax {
    pub fn new(cfg: &VivaxConfig, demography: Demography, dt: f64) -> Self {
        Self {
            demography,
            delay: cfg.delay,
            relapse_rate: 1.0 / cfg.time_to_relapse,
            hypnozoite_clearance_rate: 1.0 / cfg.time_to_clear_hypnozoite,
            prophylaxis_rate: 1.0 / cfg.duration_prophylaxis,
            treatment_rate: 1.0 / cfg.duration_treatment,
            high_density_rate: 1.0 / cfg.duration_high_density_infection,
            lm_rate: 1.0 / cfg.duration_lm_infection,
            phi_lm: cfg.phi_lm,
            phi_d: cfg.phi_d,
            d_pcr: cfg.d_pcr,
            chi_t: cfg.chi_t,
            parasite_decay: (-dt / cfg.duration_parasite_immunity).exp(),
            clinical_decay: (-dt / cfg.duration_clinical_immunity).exp(),
            maternal_decay: (-dt / cfg.duration_maternal_immunity).exp(),
            end_maternal_immunity: cfg.end_maternal_immunity,
            refractory_period: cfg.refractory_period,
            c_lm: cfg.c_lm,
            c_pcr: cfg.c_pcr,
            c_d: cfg.c_d,
            c_t: cfg.c_t,
        }
    }

    /// Infectivity towards mosquitoes of an agent in `compartment`.
    pub fn infectivity(&self, compartment: VivaxCompartment) -> f64 {
        match compartment {
            VivaxCompartment::S | VivaxCompartment::P => 0.0,
            VivaxCompartment::ILm => self.c_lm,
            VivaxCompartment::IPcr => self.c_pcr,
            VivaxCompartment::ID => self.c_d,
            VivaxCompartment::T => self.c_t,
        }
    }

    /// Spontaneous exit of the compartment and its destination.
    fn progression(&self, status: &VivaxStatus) -> Option<(f64, VivaxCompartment)> {
        match status.compartment {
            VivaxCompartment::S => None,
            VivaxCompartment::ILm => Some((self.lm_rate, VivaxCompartment::IPcr)),
            VivaxCompartment::IPcr => Some((
                1.0 / self.d_pcr.eval(status.parasite_immunity()),
                VivaxCompartment::S,
            )),
            VivaxCompartment::ID => Some((self.high_density_rate, VivaxCompartment::ILm)),
            VivaxCompartment::T => Some((self.treatment_rate, VivaxCompartment::P)),
            VivaxCompartment::P => Some((self.prophylaxis_rate, VivaxCompartment::S)),
        }
    }

    /// Queue a bite or a relapse.
    fn expose(
        &self,
        status: &mut VivaxStatus,
        lambda: f64,
        t: f64,
        dt: f64,
        clock: &mut RateClock,
    ) {
        let hazard = lambda + status.hypnozoites as f64 * self.relapse_rate;
        if clock.event_occurs(hazard, dt) {
            let new_hypnozoites = u32::from(clock.uniform() < lambda / hazard);
            status.infections.schedule(t + self.delay, new_hypnozoites);
        }
    }

    /// Activate due infections, returning whether any did.
    fn activate(&self, status: &mut VivaxStatus, t: f64) -> bool {
        let due = status.infections.drain_due(t);
        for infection in &due {
            status.hypnozoites += infection.payload;
            if t >= status.refractory_until {
                status.pending_boosts += 1;
                status.refractory_until = t + self.refractory_period;
            }
        }
        !due.is_empty()
    }

    /// Outcome of an activation in a compartment without patent parasitaemia.
    fn subpatent_infection(&self, status: &mut VivaxStatus, clock: &mut RateClock) {
        if clock.uniform() > self.phi_lm.eval(status.parasite_immunity()) {
            status.enter(VivaxCompartment::IPcr);
        } else {
            self.patent_infection(status, clock);
        }
    }

    /// Outcome of an activation once parasites are microscopy detectable.
    fn patent_infection(&self, status: &mut VivaxStatus, clock: &mut RateClock) {
        if clock.uniform() > self.phi_d.eval(status.clinical_immunity()) {
            status.enter(VivaxCompartment::ILm);
        } else if clock.uniform() > self.chi_t {
            status.enter(VivaxCompartment::ID);
        } else {
            status.enter(VivaxCompartment::T);
        }
    }

    /// Progression, hypnozoite clearance or death. Returns whether the agent dies.
    fn competing_events(&self, status: &mut VivaxStatus, dt: f64, clock: &mut RateClock) -> bool {
        let progression = self.progression(status);
        let rates = [
            progression.map_or(0.0, |(rate, _)| rate),
            status.hypnozoites as f64 * self.hypnozoite_clearance_rate,
            self.demography.death_rate,
        ];
        if !clock.event_occurs(rates.iter().sum(), dt) {
            return false;
        }
        match choose_event(clock, &rates) {
            0 => {
                if let Some((_, next)) = progression {
                    status.enter(next);
                }
                false
            }
            1 => {
                status.hypnozoites -= 1;
                false
            }
            _ => true,
        }
    }
}

impl DiseaseModel for Vivax {
    type Status = VivaxStatus;
    type Compartment = VivaxCompartment;

    fn demography(&self) -> &Demography {
        &self.demography
    }

    fn compartment(status: &VivaxStatus) -> VivaxCompartment {
        status.compartment
    }

    fn immunity(status: &VivaxStatus) -> MaternalImmunity {
        MaternalImmunity {
            parasite: status.parasite_immunity(),
            clinical: status.clinical_immunity(),
        }
    }

    fn hypnozoites(status: &VivaxStatus) -> u32 {
        status.hypnozoites
    }

    fn transition(
        &self,
        status: &mut VivaxStatus,
        lambda: f64,
        t: f64,
        dt: f64,
        clock: &mut RateClock,
    ) -> Transition {
        let infectivity = self.infectivity(status.compartment);
        let dies = match status.compartment {
            VivaxCompartment::T | VivaxCompartment::P => self.competing_events(status, dt, clock),
            current => {
                self.expose(status, lambda, t, dt, clock);
                if self.activate(status, t) {
                    match current {
                        VivaxCompartment::S | VivaxCompartment::IPcr => {
                            self.subpatent_infection(status, clock)
                        }
                        VivaxCompartment::ILm => self.patent_infection(status, clock),
                        // Superinfection of a clinical case changes nothing.
                        _ => {}
                    }
                    false
                } else {
                    self.competing_events(status, dt, clock)
                }
            }
        };
        Transition { dies, infectivity }
    }

    fn update_immunity(&self, status: &mut VivaxStatus, age: f64) {
        let boosts = status.pending_boosts as f64;
        status.pending_boosts = 0;
        status.parasite_immunity = status.parasite_immunity * self.parasite_decay + boosts;
        status.clinical_immunity = status.clinical_immunity * self.clinical_decay + boosts;
        if age >= self.end_maternal_immunity {
            status.maternal_parasite_immunity = 0.0;
            status.maternal_clinical_immunity = 0.0;
        } else {
            status.maternal_parasite_immunity *= self.maternal_decay;
            status.maternal_clinical_immunity *= self.maternal_decay;
        }
    }

    fn newborn(&self, mother: MaternalImmunity) -> VivaxStatus {
        let p_m = self.demography.proportion_maternal_immunity;
        VivaxStatus {
            maternal_parasite_immunity: p_m * mother.parasite,
            maternal_clinical_immunity: p_m * mother.clinical,
            ..VivaxStatus::susceptible()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{vivax, vivax_config};

    fn immortal() -> Vivax {
        let mut model = vivax();
        model.demography.death_rate = 0.0;
        model
    }

    #[test]
    fn nothing_happens_without_exposure() {
        let model = immortal();
        let mut clock = RateClock::from_seed(5);
        for compartment in [VivaxCompartment::S, VivaxCompartment::ID] {
            let mut status = VivaxStatus::new(compartment, 0.0, 0.0, 0);
            let mut model = model.clone();
            model.high_density_rate = 0.0;
            for step in 0..200 {
                let out = model.transition(&mut status, 0.0, step as f64, 1.0, &mut clock);
                assert!(!out.dies);
            }
            assert_eq!(status.compartment(), compartment);
            assert!(status.infections().is_empty());
        }
    }

    #[test]
    fn infectivity_matches_compartment_before_step() {
        let model = vivax();
        let mut clock = RateClock::from_seed(2);
        let mut status = VivaxStatus::new(VivaxCompartment::ID, 0.0, 0.0, 0);
        let out = model.transition(&mut status, 0.0, 0.0, 1.0, &mut clock);
        assert_eq!(out.infectivity, 0.8);

        let mut status = VivaxStatus::susceptible();
        let out = model.transition(&mut status, 0.0, 0.0, 1.0, &mut clock);
        assert_eq!(out.infectivity, 0.0);
    }

    #[test]
    fn immunity_decays_geometrically() {
        let model = vivax();
        let mut status = VivaxStatus::new(VivaxCompartment::S, 3.0, 5.0, 0);
        let n = 50;
        for step in 0..n {
            model.update_immunity(&mut status, 1000.0 + step as f64);
        }
        let expected = 3.0 * model.parasite_decay.powi(n);
        assert!((status.parasite_immunity() - expected).abs() < 1e-12 * expected);
        let expected = 5.0 * model.clinical_decay.powi(n);
        assert!((status.clinical_immunity() - expected).abs() < 1e-12 * expected);
    }

    #[test]
    fn maternal_immunity_ends() {
        let model = vivax();
        let mother = MaternalImmunity {
            parasite: 10.0,
            clinical: 20.0,
        };
        let mut status = model.newborn(mother);
        assert_eq!(status.compartment(), VivaxCompartment::S);
        assert!((status.maternal_immunity().parasite - 3.1).abs() < 1e-12);
        assert!((status.maternal_immunity().clinical - 6.2).abs() < 1e-12);

        model.update_immunity(&mut status, 1.0);
        assert!(status.maternal_immunity().parasite < 3.1);

        model.update_immunity(&mut status, vivax_config().end_maternal_immunity);
        assert_eq!(status.maternal_immunity(), MaternalImmunity::ZERO);
    }

    #[test]
    fn bite_adds_hypnozoite_after_delay() {
        let model = immortal();
        let mut clock = RateClock::from_seed(9);
        let mut status = VivaxStatus::susceptible();
        model.transition(&mut status, f64::MAX, 0.0, 1.0, &mut clock);
        let pending = status.infections().peek_earliest().copied();
        assert_eq!(pending.map(|inf| (inf.time, inf.payload)), Some((10.0, 1)));
        assert_eq!(status.compartment(), VivaxCompartment::S);

        // Activation happens once the step time reaches the delay.
        model.transition(&mut status, 0.0, 10.0, 1.0, &mut clock);
        assert!(status.hypnozoites() >= 1);
        assert_ne!(status.compartment(), VivaxCompartment::S);
        assert_eq!(status.pending_boosts, 1);
        assert_eq!(status.refractory_until, 10.0 + 42.4);
    }

    #[test]
    fn boosts_respect_refractory_period() {
        let model = vivax();
        let mut status = VivaxStatus::susceptible();
        status.infections.schedule(0.0, 0);
        status.infections.schedule(0.5, 0);
        assert!(model.activate(&mut status, 1.0));
        assert_eq!(status.pending_boosts, 1);

        model.update_immunity(&mut status, 100.0);
        assert_eq!(status.pending_boosts, 0);
        assert!((status.parasite_immunity() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn treatment_clears_pending_infections() {
        let mut model = immortal();
        model.phi_lm.min = 1.0;
        model.phi_lm.max = 1.0;
        model.phi_d.min = 1.0;
        model.phi_d.max = 1.0;
        model.chi_t = 1.0;
        let mut clock = RateClock::from_seed(4);
        let mut status = VivaxStatus::susceptible();
        status.infections.schedule(1.0, 1);
        status.infections.schedule(50.0, 1);
        model.transition(&mut status, 0.0, 1.0, 1.0, &mut clock);
        assert_eq!(status.compartment(), VivaxCompartment::T);
        assert!(status.infections().is_empty());
    }

    #[test]
    fn treated_agents_ignore_bites() {
        let mut model = immortal();
        model.treatment_rate = 0.0;
        let mut clock = RateClock::from_seed(8);
        let mut status = VivaxStatus::new(VivaxCompartment::T, 0.0, 0.0, 0);
        for step in 0..20 {
            model.transition(&mut status, f64::MAX, step as f64, 1.0, &mut clock);
        }
        assert_eq!(status.compartment(), VivaxCompartment::T);
        assert!(status.infections().is_empty());
    }

    #[test]
    fn hypnozoites_relapse_or_clear() {
        let mut model = immortal();
        model.relapse_rate = 0.0;
        model.hypnozoite_clearance_rate = f64::MAX / 100.0;
        let mut clock = RateClock::from_seed(12);
        let mut status = VivaxStatus::new(VivaxCompartment::S, 0.0, 0.0, 3);
        for step in 0..3 {
            model.transition(&mut status, 0.0, step as f64, 1.0, &mut clock);
        }
        assert_eq!(status.hypnozoites(), 0);

        let mut model = immortal();
        model.relapse_rate = f64::MAX / 100.0;
        let mut status = VivaxStatus::new(VivaxCompartment::S, 0.0, 0.0, 2);
        model.transition(&mut status, 0.0, 0.0, 1.0, &mut clock);
        let pending = status.infections().peek_earliest().copied();
        assert_eq!(pending.map(|inf| inf.payload), Some(0));
    }

    #[test]
    fn certain_death_is_reported() {
        let mut model = vivax();
        model.demography.death_rate = f64::MAX;
        let mut clock = RateClock::from_seed(1);
        let mut status = VivaxStatus::new(VivaxCompartment::P, 0.0, 0.0, 0);
        assert!(model.transition(&mut status, 0.0, 0.0, 1.0, &mut clock).dies);
    }
}
