//! Shared fixtures for unit tests.

use crate::agent::Demography;
use crate::config::{Config, FalciparumConfig, ModelConfig, VivaxConfig};
use crate::model::{falciparum::Falciparum, vivax::Vivax};

pub const VIVAX_CONFIG: &str = r#"
[demography]
life_expectancy = 4380.0
max_age = 36500.0
age_0 = 2920.0
rho = 0.85
min_birth_age = 6570.0
max_birth_age = 14600.0
proportion_maternal_immunity = 0.31
biting_rate_log_mean = 0.0
biting_rate_log_sd = 1.10905365064

[model]
strain = "vivax"
delay = 10.0
time_to_relapse = 41.0
time_to_clear_hypnozoite = 383.0
duration_prophylaxis = 5.0
duration_treatment = 1.0
duration_high_density_infection = 5.0
duration_lm_infection = 16.0
phi_lm = { min = 0.011, max = 0.93, mid = 18.8, steepness = 3.37 }
phi_d = { min = 0.006, max = 0.96, mid = 24.5, steepness = 5.63 }
d_pcr = { min = 10.0, max = 52.6, mid = 9.9, steepness = 3.82 }
chi_t = 0.5
duration_parasite_immunity = 3650.0
duration_clinical_immunity = 10950.0
duration_maternal_immunity = 49.9
end_maternal_immunity = 365.0
refractory_period = 42.4
c_lm = 0.1
c_pcr = 0.035
c_d = 0.8
c_t = 0.4

[vector]
kind = "simple"

[[vector.species]]
name = "anopheles"
state = [1000.0, 0.0, 10.0]
params = { life_expectancy = 10.0, incubation_period = 12.0, biting_rate = 0.25 }

[init]
n_agents = 200
time_step = 1.0
eir = 1.0
seed = 42

[output]
steps_per_save = 10
saves_per_file = 5
"#;

pub fn config() -> Config {
    Config::from_toml(VIVAX_CONFIG).expect("fixture config should be valid")
}

pub fn demography() -> Demography {
    Demography::new(&config().demography)
}

pub fn vivax_config() -> VivaxConfig {
    match config().model {
        ModelConfig::Vivax(cfg) => cfg,
        ModelConfig::Falciparum(_) => unreachable!("fixture config is vivax"),
    }
}

pub fn vivax() -> Vivax {
    vivax_with(demography())
}

pub fn vivax_with(demography: Demography) -> Vivax {
    Vivax::new(&vivax_config(), demography, 1.0)
}

pub fn falciparum_config() -> FalciparumConfig {
    FalciparumConfig {
        delay: 12.0,
        duration_treatment: 5.0,
        duration_disease: 5.0,
        duration_subpatent: 110.0,
        duration_asymptomatic: 200.0,
        duration_prophylaxis: 25.0,
        prob_treatment: 0.2,
        clinical_immunity_mid: 1.0,
        clinical_immunity_steepness: 4.13,
        parasite_immunity_mid: 4732.5,
        parasite_immunity_steepness: 5.0,
        asymptomatic_rate_factor: 1.0,
        duration_parasite_immunity: 3650.0,
        duration_clinical_immunity: 10950.0,
        duration_maternal_immunity: 49.9,
        end_maternal_immunity: 365.0,
        refractory_period: 7.0,
        c_a: 0.1,
        c_u: 0.0062,
        c_d: 0.068,
        c_t: 0.022,
    }
}

pub fn falciparum() -> Falciparum {
    Falciparum::new(&falciparum_config(), demography(), 1.0)
}
