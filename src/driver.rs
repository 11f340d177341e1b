//! Alternating human and vector steps over a time horizon.
//!
//! The human step maps `(t, dt, eir)` to a tally and the infectivity of the
//! population towards mosquitoes. The vector step maps `(t, dt, infectivity)`
//! to its new state and the EIR fed to the next human step. Extra arguments
//! of either step are captured by the closures.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Half-open time interval `[t0, t1)` traversed in steps of `dt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizon {
    t0: f64,
    t1: f64,
    dt: f64,
}

impl Horizon {
    pub fn new(t0: f64, t1: f64, dt: f64) -> Result<Self> {
        if !(dt > 0.0 && dt.is_finite()) {
            bail!("time step must be positive and finite, but is {dt:?}");
        }
        if !(t0.is_finite() && t1.is_finite()) {
            bail!("horizon must be finite, but is [{t0:?}, {t1:?})");
        }
        Ok(Self { t0, t1, dt })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Time of step `idx`.
    pub fn time(&self, idx: usize) -> f64 {
        self.t0 + idx as f64 * self.dt
    }

    /// Number of steps whose start time lies before `t1`.
    pub fn n_steps(&self) -> usize {
        (0..).take_while(|&idx| self.time(idx) < self.t1).count()
    }
}

/// Outputs of every step of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory<H, V> {
    pub times: Vec<f64>,
    pub human: Vec<H>,
    pub vector: Vec<V>,
    /// EIR after each step.
    pub eir: Vec<f64>,
}

impl<H, V> Default for Trajectory<H, V> {
    fn default() -> Self {
        Self {
            times: Vec::new(),
            human: Vec::new(),
            vector: Vec::new(),
            eir: Vec::new(),
        }
    }
}

/// Run `n_steps` coupled steps starting at `t0` and return the final EIR.
///
/// Each step starts at `t + dt` of the previous one, the time at which the
/// human step commits its caches. `observe` receives the step index, its
/// start time, the human output, the vector output and the new EIR.
pub fn run_steps<H, V, FH, FV, FO>(
    t0: f64,
    dt: f64,
    n_steps: usize,
    eir: f64,
    mut human_step: FH,
    mut vector_step: FV,
    mut observe: FO,
) -> f64
where
    FH: FnMut(f64, f64, f64) -> (H, f64),
    FV: FnMut(f64, f64, f64) -> (V, f64),
    FO: FnMut(usize, f64, H, V, f64),
{
    let mut eir = eir;
    let mut t = t0;
    for idx in 0..n_steps {
        let (human, infectivity) = human_step(t, dt, eir);
        let (vector, next_eir) = vector_step(t, dt, infectivity);
        eir = next_eir;
        observe(idx, t, human, vector, eir);
        t += dt;
    }
    eir
}

/// Run the coupled model over `horizon` and keep every step's output.
pub fn simulate<H, V, FH, FV>(
    horizon: &Horizon,
    eir: f64,
    human_step: FH,
    vector_step: FV,
) -> Trajectory<H, V>
where
    FH: FnMut(f64, f64, f64) -> (H, f64),
    FV: FnMut(f64, f64, f64) -> (V, f64),
{
    let mut trajectory = Trajectory::default();
    run_steps(
        horizon.t0,
        horizon.dt,
        horizon.n_steps(),
        eir,
        human_step,
        vector_step,
        |_, t, human, vector, eir| {
            trajectory.times.push(t);
            trajectory.human.push(human);
            trajectory.vector.push(vector);
            trajectory.eir.push(eir);
        },
    );
    trajectory
}
