//! Truth inference over items observed through many binary symmetric channels.
//!
//! Each item has a latent boolean truth variable; each channel (e.g. a
//! worker) has one noise rate. An observation `(item, channel, value)` adds a
//! BSC factor tying the item to the channel's rate. Training by EM
//! alternates between reassigning items and re-estimating rates.
//!
//! ## Example
//!
//! ```rust
//! use bscem_core::engine::em::EmConfig;
//! use bscem_core::model::multiple_bsc::MultipleBscModel;
//!
//! let mut model = MultipleBscModel::new();
//! model.add_channel("w1", 0.1).unwrap();
//! model.add_channel("w2", 0.1).unwrap();
//! model.add_observation("q1", "w1", true).unwrap();
//! model.add_observation("q1", "w2", true).unwrap();
//! let diagnostics = model.em(&EmConfig::new(20, 1e-6), |_, _, _| {}).unwrap();
//! assert!(diagnostics.rounds_run >= 1);
//! assert!(model.input_scores()["q1"] > 0.5);
//! ```

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::dist::Beta;
use crate::engine::channel::{Bsc, Channel};
use crate::engine::em::{self, run_em, EmConfig, EmDiagnostics, EmModel, Stage};
use crate::engine::errors::ModelError;
use crate::engine::factor_graph::FactorGraph;
use crate::engine::variable::{RandomVariable, VarId};
use crate::model::prior::NoisePrior;
use crate::model::NameTable;

/// Items, single-layer channels and their factor graph.
#[derive(Debug, Clone)]
pub struct MultipleBscModel {
    graph: FactorGraph,
    inputs: NameTable,
    channels: NameTable,
    soft_inputs: bool,
    prior: Option<NoisePrior>,
    /// M-step weight per item from the latest E-step
    weights: FxHashMap<VarId, f64>,
    input_scores: BTreeMap<String, f64>,
}

impl Default for MultipleBscModel {
    fn default() -> Self {
        Self {
            graph: FactorGraph::new(),
            inputs: NameTable::default(),
            channels: NameTable::default(),
            soft_inputs: true,
            prior: None,
            weights: FxHashMap::default(),
            input_scores: BTreeMap::new(),
        }
    }
}

impl MultipleBscModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a channel with an initial noise rate. An existing channel keeps
    /// its current rate.
    pub fn add_channel(&mut self, name: &str, noise_rate: f64) -> Result<(), ModelError> {
        if self.channels.contains(name) {
            return Ok(());
        }
        let ch = Bsc::new(&mut self.graph, noise_rate)?;
        if let Some(prior) = self.prior {
            prior.attach(&mut self.graph, ch.noise_rate)?;
        }
        self.channels.insert(name, ch.noise_rate);
        Ok(())
    }

    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.contains(name)
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains(name)
    }

    /// Registers an item, initially false. Returns its truth variable.
    pub fn add_input(&mut self, name: &str) -> VarId {
        match self.inputs.get(name) {
            Some(id) => id,
            None => {
                let id = self.graph.add_variable(RandomVariable::boolean(false));
                self.inputs.insert(name, id);
                id
            }
        }
    }

    /// Records that `channel` reported `value` for `input`. The item is
    /// created on first sight; the channel must already exist.
    pub fn add_observation(
        &mut self,
        input: &str,
        channel: &str,
        value: bool,
    ) -> Result<(), ModelError> {
        let noise_rate = self
            .channels
            .get(channel)
            .ok_or_else(|| ModelError::UnknownChannel(channel.to_string()))?;
        let item = self.add_input(input);
        self.graph.add_factor(Bsc { noise_rate }.factor(item, value))?;
        Ok(())
    }

    /// Whether the M-step uses posterior probabilities (default) or hard
    /// assignments.
    pub fn set_soft_inputs(&mut self, soft: bool) {
        self.soft_inputs = soft;
    }

    pub fn soft_inputs(&self) -> bool {
        self.soft_inputs
    }

    /// Places a `Beta(alpha, beta)` prior over every noise rate, current and
    /// future. With `update`, the prior is refit after each EM round.
    ///
    /// Calling this again resets the hyperparameters and update flag.
    pub fn enable_noise_prior(
        &mut self,
        alpha: f64,
        beta: f64,
        update: bool,
    ) -> Result<(), ModelError> {
        if let Some(prior) = self.prior.as_mut() {
            prior.set(&mut self.graph, alpha, beta)?;
            prior.update = update;
            return Ok(());
        }
        let prior = NoisePrior::new(&mut self.graph, alpha, beta, update)?;
        for rate in self.channels.ids() {
            prior.attach(&mut self.graph, *rate)?;
        }
        self.prior = Some(prior);
        Ok(())
    }

    /// The current noise prior, if enabled.
    pub fn noise_prior(&self) -> Option<Beta> {
        self.prior.and_then(|p| p.current(&self.graph).ok())
    }

    /// Current truth value of one item.
    pub fn input_value(&self, name: &str) -> Option<bool> {
        self.inputs
            .get(name)
            .map(|id| self.graph.variables()[id.index()].value() != 0.0)
    }

    /// Current truth value of every item.
    pub fn inputs(&self) -> BTreeMap<String, bool> {
        self.inputs
            .values(&self.graph)
            .into_iter()
            .map(|(name, v)| (name, v != 0.0))
            .collect()
    }

    /// Current noise rate of every channel.
    pub fn noise_rates(&self) -> BTreeMap<String, f64> {
        self.channels.values(&self.graph)
    }

    pub fn noise_rate(&self, name: &str) -> Option<f64> {
        self.channels
            .get(name)
            .map(|id| self.graph.variables()[id.index()].value())
    }

    /// Posterior `P(true)` per item, recorded at the end of [`em`](Self::em).
    pub fn input_scores(&self) -> &BTreeMap<String, f64> {
        &self.input_scores
    }

    /// Total log score of the factor graph.
    pub fn score(&self) -> f64 {
        self.graph.score()
    }

    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    /// Trains item values and noise rates by EM.
    ///
    /// `callback` sees stages `Initial`, then per round `input`, `noise`
    /// (per M-step pass) and `beta` (when the prior is refit), and finally
    /// `Final`.
    pub fn em<F>(&mut self, config: &EmConfig, callback: F) -> Result<EmDiagnostics, ModelError>
    where
        F: FnMut(&Self, usize, Stage),
    {
        run_em(self, config, callback)
    }
}

impl EmModel for MultipleBscModel {
    fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    fn update_inputs(&mut self) -> Result<(), ModelError> {
        self.weights = em::assign_inputs(&mut self.graph, self.inputs.ids(), self.soft_inputs)?;
        Ok(())
    }

    fn update_noise(&mut self, report: &mut dyn FnMut(&Self, Stage)) -> Result<(), ModelError> {
        let prior = self.prior.map(|p| p.current(&self.graph)).transpose()?;
        em::update_rates(&mut self.graph, self.channels.ids(), &self.weights, prior)?;
        report(self, Stage::Noise);
        Ok(())
    }

    fn update_prior(&mut self, report: &mut dyn FnMut(&Self, Stage)) -> Result<(), ModelError> {
        if let Some(prior) = self.prior.filter(|p| p.update) {
            prior.refit(&mut self.graph, self.channels.ids())?;
            report(self, Stage::Beta);
        }
        Ok(())
    }

    fn record_input_scores(&mut self) -> Result<(), ModelError> {
        let scores = em::final_scores(&mut self.graph, self.inputs.ids())?;
        self.input_scores = self
            .inputs
            .names()
            .iter()
            .zip(scores)
            .map(|(name, score)| (name.to_string(), score))
            .collect();
        Ok(())
    }
}
