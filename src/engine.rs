use crate::agent::Demography;
use crate::clock::RateClock;
use crate::config::{Config, ModelConfig};
use crate::driver::run_steps;
use crate::model::DiseaseModel;
use crate::model::falciparum::{Falciparum, FalciparumStatus};
use crate::model::vivax::{Vivax, VivaxStatus};
use crate::population::{AgentSnapshot, Population, initial_population};
use crate::stepper::{Tally, step_population};
use crate::vector::VectorPopulation;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Summary of the simulation written after every `steps_per_save` steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Number of steps completed.
    pub step: usize,
    /// Time at the end of the last step.
    pub time: f64,
    /// EIR fed to the next human step.
    pub eir: f64,
    /// Infectivity of the humans towards mosquitoes during the last step.
    pub infectivity: f64,
    pub tally: Tally,
    /// State of each mosquito species.
    pub vector: BTreeMap<String, Vec<f64>>,
}

/// Human side of the simulation.
#[derive(Serialize, Deserialize)]
enum Human {
    Vivax {
        model: Vivax,
        population: Population<VivaxStatus>,
    },
    Falciparum {
        model: Falciparum,
        population: Population<FalciparumStatus>,
    },
}

/// Simulation engine.
///
/// Holds the configuration, the human and vector populations, the feedback
/// EIR and the random number source, and provides methods to initialize,
/// run, save, and load simulations.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    human: Human,
    vector: VectorPopulation,
    clock: RateClock,
    step: usize,
    time: f64,
    eir: f64,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a random initial state.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let mut clock = match cfg.init.seed {
            Some(seed) => RateClock::from_seed(seed),
            None => RateClock::from_os_rng().context("failed to seed random number source")?,
        };

        let demography = Demography::new(&cfg.demography);
        let dt = cfg.init.time_step;
        let n_agents = cfg.init.n_agents;
        let human = match &cfg.model {
            ModelConfig::Vivax(model_cfg) => {
                let model = Vivax::new(model_cfg, demography, dt);
                let population =
                    initial_population(&model, n_agents, VivaxStatus::susceptible, &mut clock);
                Human::Vivax { model, population }
            }
            ModelConfig::Falciparum(model_cfg) => {
                let model = Falciparum::new(model_cfg, demography, dt);
                let population =
                    initial_population(&model, n_agents, FalciparumStatus::susceptible, &mut clock);
                Human::Falciparum { model, population }
            }
        };
        log::info!("generated {n_agents} agents");

        let vector = VectorPopulation::new(&cfg.vector);
        let eir = cfg.init.eir;

        Ok(Self {
            cfg,
            human,
            vector,
            clock,
            step: 0,
            time: 0.0,
            eir,
        })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Simulated time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Perform the simulation and save the resulting records to a binary file.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let saves_per_file = self.cfg.output.saves_per_file;
        for i_save in 0..saves_per_file {
            let record = self.advance(self.cfg.output.steps_per_save);
            log::debug!(
                "t = {:.2}, eir = {:.4e}, tally = {:?}",
                record.time,
                record.eir,
                record.tally.counts
            );

            encode::write(&mut writer, &record).context("failed to serialize record")?;

            let progress = 100.0 * (i_save + 1) as f64 / saves_per_file as f64;
            log::info!("completed {progress:06.2}%");
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save the state of every agent.
    pub fn save_snapshot<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self.snapshot()).context("failed to serialize snapshot")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<AgentSnapshot> {
        match &self.human {
            Human::Vivax { population, .. } => population.snapshot::<Vivax>(),
            Human::Falciparum { population, .. } => population.snapshot::<Falciparum>(),
        }
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        // Tagged config enums need named fields to round-trip.
        encode::write_named(&mut writer, &self).context("failed to serialize engine")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }

    /// Run `n_steps` coupled steps and summarize the last one.
    fn advance(&mut self, n_steps: usize) -> Record {
        let dt = self.cfg.init.time_step;
        let t0 = self.time;
        let (eir, t1, last) = match &mut self.human {
            Human::Vivax { model, population } => couple(
                model,
                population,
                &mut self.vector,
                &mut self.clock,
                t0,
                dt,
                n_steps,
                self.eir,
            ),
            Human::Falciparum { model, population } => couple(
                model,
                population,
                &mut self.vector,
                &mut self.clock,
                t0,
                dt,
                n_steps,
                self.eir,
            ),
        };
        self.eir = eir;
        self.time = t1;
        self.step += n_steps;

        let (tally, infectivity) = last.unwrap_or_default();
        Record {
            step: self.step,
            time: self.time,
            eir: self.eir,
            infectivity,
            tally,
            vector: self.vector.snapshot(),
        }
    }
}

/// Couple one human model to the vector population for `n_steps` steps.
///
/// Returns the final EIR, the end time and the tally and infectivity of the
/// last step.
#[allow(clippy::too_many_arguments)]
fn couple<M: DiseaseModel>(
    model: &M,
    population: &mut Population<M::Status>,
    vector: &mut VectorPopulation,
    clock: &mut RateClock,
    t0: f64,
    dt: f64,
    n_steps: usize,
    eir: f64,
) -> (f64, f64, Option<(Tally, f64)>) {
    let mut last = None;
    let mut t1 = t0;
    let eir = run_steps(
        t0,
        dt,
        n_steps,
        eir,
        |t, dt, eir| {
            let (tally, infectivity) = step_population(t, dt, eir, population, model, clock);
            ((tally, infectivity), infectivity)
        },
        |t, dt, infectivity| ((), vector.step(t, dt, infectivity)),
        |_, t, human, (), _| {
            last = Some(human);
            t1 = t + dt;
        },
    );
    (eir, t1, last)
}
