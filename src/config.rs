use crate::model::{Compartment, Hill, falciparum::FalciparumCompartment, vivax::VivaxCompartment};
use crate::vector::{LarvalMosquitoParams, SimpleMosquitoParams, Species};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub demography: DemographyConfig,
    pub model: ModelConfig,
    pub vector: VectorConfig,
    pub init: InitConfig,
    pub output: OutputConfig,
}

/// Demographic parameters shared by every strain.
///
/// Ages and durations are in days.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DemographyConfig {
    /// Mean life expectancy.
    pub life_expectancy: f64,
    /// Age at which agents are replaced.
    pub max_age: f64,
    /// Age scale of the age weight.
    pub age_0: f64,
    /// Exposure reduction at birth.
    pub rho: f64,
    /// Birthing age window.
    pub min_birth_age: f64,
    pub max_birth_age: f64,
    /// Fraction of the birthing agent's immunity inherited by a newborn.
    pub proportion_maternal_immunity: f64,
    /// Log-normal parameters of the biting heterogeneity.
    pub biting_rate_log_mean: f64,
    pub biting_rate_log_sd: f64,
}

/// Human disease model, selected by the `strain` key.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "strain", rename_all = "lowercase")]
pub enum ModelConfig {
    Vivax(VivaxConfig),
    Falciparum(FalciparumConfig),
}

/// Relapsing model parameters. Durations are converted to rates.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct VivaxConfig {
    /// Latent period between bite and infection.
    pub delay: f64,
    pub time_to_relapse: f64,
    pub time_to_clear_hypnozoite: f64,
    pub duration_prophylaxis: f64,
    pub duration_treatment: f64,
    pub duration_high_density_infection: f64,
    pub duration_lm_infection: f64,
    /// Probability of light-microscopy detectability against parasite immunity.
    pub phi_lm: Hill,
    /// Probability of clinical disease against clinical immunity.
    pub phi_d: Hill,
    /// Duration of a PCR-detectable infection against parasite immunity.
    pub d_pcr: Hill,
    /// Probability that a clinical case is treated.
    pub chi_t: f64,
    pub duration_parasite_immunity: f64,
    pub duration_clinical_immunity: f64,
    pub duration_maternal_immunity: f64,
    pub end_maternal_immunity: f64,
    pub refractory_period: f64,
    /// Infectivity to mosquitoes of each infected compartment.
    pub c_lm: f64,
    pub c_pcr: f64,
    pub c_d: f64,
    pub c_t: f64,
}

/// Non-relapsing model parameters. Durations are converted to rates.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FalciparumConfig {
    /// Latent period between bite and infection.
    pub delay: f64,
    pub duration_treatment: f64,
    pub duration_disease: f64,
    pub duration_subpatent: f64,
    pub duration_asymptomatic: f64,
    pub duration_prophylaxis: f64,
    /// Probability that a clinical case is treated.
    pub prob_treatment: f64,
    /// Clinical immunity at which half of the infections are clinical.
    pub clinical_immunity_mid: f64,
    pub clinical_immunity_steepness: f64,
    /// Parasite immunity scale of the asymptomatic recovery rate.
    pub parasite_immunity_mid: f64,
    pub parasite_immunity_steepness: f64,
    /// Relative asymptomatic recovery rate at full parasite immunity.
    pub asymptomatic_rate_factor: f64,
    pub duration_parasite_immunity: f64,
    pub duration_clinical_immunity: f64,
    pub duration_maternal_immunity: f64,
    pub end_maternal_immunity: f64,
    pub refractory_period: f64,
    /// Infectivity to mosquitoes of each infected compartment.
    pub c_a: f64,
    pub c_u: f64,
    pub c_d: f64,
    pub c_t: f64,
}

/// Vector population model, selected by the `kind` key.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VectorConfig {
    /// Fixed entomological inoculation rate.
    Constant { eir: f64 },
    Simple { species: Vec<Species<SimpleMosquitoParams, 3>> },
    Larval { species: Vec<Species<LarvalMosquitoParams, 6>> },
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    /// Number of agents (constant over the run).
    pub n_agents: usize,
    /// Time step in days.
    pub time_step: f64,
    /// Initial entomological inoculation rate.
    pub eir: f64,
    /// Seed of the random number generator (random if absent).
    pub seed: Option<u64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of steps between saved records.
    pub steps_per_save: usize,
    /// Number of records written per trajectory file.
    pub saves_per_file: usize,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;
        config.validate().context("failed to validate config")?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.demography
            .validate()
            .context("invalid demography parameters")?;
        match &self.model {
            ModelConfig::Vivax(cfg) => cfg.validate().context("invalid vivax parameters")?,
            ModelConfig::Falciparum(cfg) => {
                cfg.validate().context("invalid falciparum parameters")?
            }
        }
        self.vector.validate().context("invalid vector parameters")?;

        check_num(self.init.n_agents, 1..10_000_000).context("invalid number of agents")?;
        check_pos(self.init.time_step).context("invalid time step")?;
        check_num(self.init.eir, 0.0..f64::INFINITY).context("invalid initial eir")?;

        check_num(self.output.steps_per_save, 1..100_000)
            .context("invalid number of steps per save")?;
        check_num(self.output.saves_per_file, 1..100_000)
            .context("invalid number of saves per file")?;

        Ok(())
    }
}

impl DemographyConfig {
    fn validate(&self) -> Result<()> {
        check_pos(self.life_expectancy).context("invalid life expectancy")?;
        check_pos(self.max_age).context("invalid maximum age")?;
        check_pos(self.age_0).context("invalid age scale")?;
        check_num(self.rho, 0.0..1.0).context("invalid rho")?;
        check_num(self.min_birth_age, 0.0..self.max_birth_age)
            .context("invalid minimum birth age")?;
        check_num(self.max_birth_age, self.min_birth_age..self.max_age)
            .context("invalid maximum birth age")?;
        check_prob(self.proportion_maternal_immunity)
            .context("invalid proportion of maternal immunity")?;
        check_num(self.biting_rate_log_sd, 0.0..f64::INFINITY)
            .context("invalid biting rate log standard deviation")?;
        if !self.biting_rate_log_mean.is_finite() {
            bail!("biting rate log mean must be finite");
        }
        Ok(())
    }
}

impl ModelConfig {
    /// Compartment names in tally order.
    pub fn compartment_labels(&self) -> Vec<&'static str> {
        match self {
            ModelConfig::Vivax(_) => VivaxCompartment::ALL.map(|c| c.label()).to_vec(),
            ModelConfig::Falciparum(_) => FalciparumCompartment::ALL.map(|c| c.label()).to_vec(),
        }
    }
}

impl VivaxConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.delay, 0.0..f64::INFINITY).context("invalid delay")?;
        check_pos(self.time_to_relapse).context("invalid time to relapse")?;
        check_pos(self.time_to_clear_hypnozoite).context("invalid time to clear hypnozoite")?;
        check_pos(self.duration_prophylaxis).context("invalid prophylaxis duration")?;
        check_pos(self.duration_treatment).context("invalid treatment duration")?;
        check_pos(self.duration_high_density_infection)
            .context("invalid high density infection duration")?;
        check_pos(self.duration_lm_infection).context("invalid lm infection duration")?;
        check_hill(&self.phi_lm, true).context("invalid phi_lm")?;
        check_hill(&self.phi_d, true).context("invalid phi_d")?;
        check_hill(&self.d_pcr, false).context("invalid d_pcr")?;
        if self.d_pcr.min <= 0.0 || self.d_pcr.max <= 0.0 {
            bail!("pcr infection durations must be positive");
        }
        check_prob(self.chi_t).context("invalid chi_t")?;
        check_pos(self.duration_parasite_immunity)
            .context("invalid parasite immunity duration")?;
        check_pos(self.duration_clinical_immunity)
            .context("invalid clinical immunity duration")?;
        check_pos(self.duration_maternal_immunity)
            .context("invalid maternal immunity duration")?;
        check_num(self.end_maternal_immunity, 0.0..f64::INFINITY)
            .context("invalid end of maternal immunity")?;
        check_num(self.refractory_period, 0.0..f64::INFINITY)
            .context("invalid refractory period")?;
        for (name, c) in [
            ("c_lm", self.c_lm),
            ("c_pcr", self.c_pcr),
            ("c_d", self.c_d),
            ("c_t", self.c_t),
        ] {
            check_prob(c).with_context(|| format!("invalid {name}"))?;
        }
        Ok(())
    }
}

impl FalciparumConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.delay, 0.0..f64::INFINITY).context("invalid delay")?;
        check_pos(self.duration_treatment).context("invalid treatment duration")?;
        check_pos(self.duration_disease).context("invalid disease duration")?;
        check_pos(self.duration_subpatent).context("invalid subpatent duration")?;
        check_pos(self.duration_asymptomatic).context("invalid asymptomatic duration")?;
        check_pos(self.duration_prophylaxis).context("invalid prophylaxis duration")?;
        check_prob(self.prob_treatment).context("invalid probability of treatment")?;
        check_pos(self.clinical_immunity_mid).context("invalid clinical immunity scale")?;
        check_num(self.clinical_immunity_steepness, 0.0..f64::INFINITY)
            .context("invalid clinical immunity steepness")?;
        check_pos(self.parasite_immunity_mid).context("invalid parasite immunity scale")?;
        check_num(self.parasite_immunity_steepness, 0.0..f64::INFINITY)
            .context("invalid parasite immunity steepness")?;
        check_num(self.asymptomatic_rate_factor, 0.0..f64::INFINITY)
            .context("invalid asymptomatic rate factor")?;
        check_pos(self.duration_parasite_immunity)
            .context("invalid parasite immunity duration")?;
        check_pos(self.duration_clinical_immunity)
            .context("invalid clinical immunity duration")?;
        check_pos(self.duration_maternal_immunity)
            .context("invalid maternal immunity duration")?;
        check_num(self.end_maternal_immunity, 0.0..f64::INFINITY)
            .context("invalid end of maternal immunity")?;
        check_num(self.refractory_period, 0.0..f64::INFINITY)
            .context("invalid refractory period")?;
        for (name, c) in [
            ("c_a", self.c_a),
            ("c_u", self.c_u),
            ("c_d", self.c_d),
            ("c_t", self.c_t),
        ] {
            check_prob(c).with_context(|| format!("invalid {name}"))?;
        }
        Ok(())
    }
}

impl VectorConfig {
    fn validate(&self) -> Result<()> {
        match self {
            VectorConfig::Constant { eir } => {
                check_num(*eir, 0.0..f64::INFINITY).context("invalid eir")?;
            }
            VectorConfig::Simple { species } => {
                check_species(species, |p| p.validate())?;
            }
            VectorConfig::Larval { species } => {
                check_species(species, |p| p.validate())?;
            }
        }
        Ok(())
    }
}

fn check_species<P, const N: usize>(
    species: &[Species<P, N>],
    check_params: impl Fn(&P) -> Result<()>,
) -> Result<()> {
    if species.is_empty() {
        bail!("at least one species is required");
    }
    let mut names = BTreeSet::new();
    for sp in species {
        if !names.insert(sp.name.as_str()) {
            bail!("species {:?} is defined more than once", sp.name);
        }
        check_params(&sp.params).with_context(|| format!("invalid species {:?}", sp.name))?;
        if sp.state.iter().any(|&x| !(x >= 0.0 && x.is_finite())) {
            bail!("species {:?} state must be finite and non-negative", sp.name);
        }
    }
    Ok(())
}

pub(crate) fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

pub(crate) fn check_pos(num: f64) -> Result<()> {
    if !(num > 0.0 && num.is_finite()) {
        bail!("number must be positive and finite, but is {num:?}");
    }
    Ok(())
}

pub(crate) fn check_prob(num: f64) -> Result<()> {
    check_num(num, 0.0..=1.0)
}

fn check_hill(hill: &Hill, prob_hill: bool) -> Result<()> {
    check_pos(hill.mid).context("invalid midpoint")?;
    check_num(hill.steepness, 0.0..f64::INFINITY).context("invalid steepness")?;
    if prob_hill {
        // For probability curves: both limits are probabilities.
        check_prob(hill.min).context("invalid minimum")?;
        check_prob(hill.max).context("invalid maximum")?;
    } else if !(hill.min.is_finite() && hill.max.is_finite()) {
        bail!("limits must be finite");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::VIVAX_CONFIG;

    #[test]
    fn parses_example_config() {
        let cfg = Config::from_toml(VIVAX_CONFIG).expect("config should be valid");
        assert_eq!(cfg.init.n_agents, 200);
        assert!(matches!(cfg.model, ModelConfig::Vivax(_)));
        assert!(matches!(cfg.vector, VectorConfig::Simple { .. }));
        assert_eq!(
            cfg.model.compartment_labels(),
            vec!["S", "I_LM", "I_PCR", "I_D", "T", "P"]
        );
    }

    #[test]
    fn rejects_non_positive_time_step() {
        let contents = VIVAX_CONFIG.replace("time_step = 1.0", "time_step = 0.0");
        let err = Config::from_toml(&contents).expect_err("zero time step must be rejected");
        assert!(format!("{err:#}").contains("invalid time step"));
    }

    #[test]
    fn rejects_missing_field() {
        let contents = VIVAX_CONFIG.replace("chi_t = 0.5\n", "");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn rejects_wrong_state_length() {
        let contents = VIVAX_CONFIG.replace("state = [1000.0, 0.0, 10.0]", "state = [1.0, 2.0]");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn rejects_inverted_birth_window() {
        let contents = VIVAX_CONFIG.replace("min_birth_age = 6570.0", "min_birth_age = 20000.0");
        assert!(Config::from_toml(&contents).is_err());
    }
}
