//! Truth inference over items observed through two-layer channels.
//!
//! A channel is a pair of named layers, each with its own noise rate; layers
//! are shared by every channel that names them. In crowd judging, layer 1 is
//! typically per question (how confusing the question is) and layer 2 per
//! worker. The observed answer is flipped iff exactly one layer flips.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::dist::{Beta, Space};
use crate::engine::channel::{BscPair, Channel};
use crate::engine::em::{self, run_em, EmConfig, EmDiagnostics, EmModel, Stage};
use crate::engine::errors::{check_probability, ModelError};
use crate::engine::factor_graph::FactorGraph;
use crate::engine::variable::{RandomVariable, VarId};
use crate::model::prior::NoisePrior;
use crate::model::NameTable;

/// Items, two-layer channels and their factor graph.
#[derive(Debug, Clone)]
pub struct MultipleBscPairModel {
    graph: FactorGraph,
    inputs: NameTable,
    layer1: NameTable,
    layer2: NameTable,
    /// Channels by layer-1 name, then layer-2 name
    channels: FxHashMap<Arc<str>, FxHashMap<Arc<str>, BscPair>>,
    soft_inputs: bool,
    prior1: Option<NoisePrior>,
    prior2: Option<NoisePrior>,
    weights: FxHashMap<VarId, f64>,
    input_scores: BTreeMap<String, f64>,
}

impl Default for MultipleBscPairModel {
    fn default() -> Self {
        Self {
            graph: FactorGraph::new(),
            inputs: NameTable::default(),
            layer1: NameTable::default(),
            layer2: NameTable::default(),
            channels: FxHashMap::default(),
            soft_inputs: true,
            prior1: None,
            prior2: None,
            weights: FxHashMap::default(),
            input_scores: BTreeMap::new(),
        }
    }
}

impl MultipleBscPairModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a layer, creating it with `noise_rate` if new.
    fn layer(
        graph: &mut FactorGraph,
        table: &mut NameTable,
        prior: Option<NoisePrior>,
        name: &str,
        noise_rate: f64,
    ) -> Result<(Arc<str>, VarId), ModelError> {
        if let (Some(key), Some(id)) = (table.key(name), table.get(name)) {
            return Ok((key, id));
        }
        let id = graph.add_variable(RandomVariable::continuous(
            Space::unit_interval(),
            noise_rate,
        ));
        if let Some(prior) = prior {
            prior.attach(graph, id)?;
        }
        Ok((table.insert(name, id), id))
    }

    /// Adds the channel `(name1, name2)`. A layer that already exists keeps
    /// its current rate and is shared with the new channel.
    pub fn add_channel(
        &mut self,
        name1: &str,
        noise_rate1: f64,
        name2: &str,
        noise_rate2: f64,
    ) -> Result<(), ModelError> {
        check_probability(noise_rate1)?;
        check_probability(noise_rate2)?;
        let (key1, rate1) =
            Self::layer(&mut self.graph, &mut self.layer1, self.prior1, name1, noise_rate1)?;
        let (key2, rate2) =
            Self::layer(&mut self.graph, &mut self.layer2, self.prior2, name2, noise_rate2)?;
        self.channels
            .entry(key1)
            .or_default()
            .insert(key2, BscPair::from_rates(rate1, rate2));
        Ok(())
    }

    fn channel(&self, name1: &str, name2: &str) -> Option<&BscPair> {
        self.channels.get(name1).and_then(|inner| inner.get(name2))
    }

    pub fn has_channel(&self, name1: &str, name2: &str) -> bool {
        self.channel(name1, name2).is_some()
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

    /// Records that channel `(channel1, channel2)` reported `value` for
    /// `input`. The channel must already exist.
    pub fn add_observation(
        &mut self,
        input: &str,
        channel1: &str,
        channel2: &str,
        value: bool,
    ) -> Result<(), ModelError> {
        let ch = *self
            .channel(channel1, channel2)
            .ok_or_else(|| ModelError::UnknownChannel(format!("{}/{}", channel1, channel2)))?;
        let item = self.add_input(input);
        self.graph.add_factor(ch.factor(item, value))?;
        Ok(())
    }

    pub fn set_soft_inputs(&mut self, soft: bool) {
        self.soft_inputs = soft;
    }

    pub fn soft_inputs(&self) -> bool {
        self.soft_inputs
    }

    /// Places an independent `Beta(alpha, beta)` prior over each layer's
    /// rates. With `update`, both are refit after each EM round.
    ///
    /// Calling this again resets both priors' hyperparameters and update
    /// flag.
    pub fn enable_noise_prior(
        &mut self,
        alpha: f64,
        beta: f64,
        update: bool,
    ) -> Result<(), ModelError> {
        if let (Some(p1), Some(p2)) = (self.prior1.as_mut(), self.prior2.as_mut()) {
            p1.set(&mut self.graph, alpha, beta)?;
            p2.set(&mut self.graph, alpha, beta)?;
            p1.update = update;
            p2.update = update;
            return Ok(());
        }
        let prior1 = NoisePrior::new(&mut self.graph, alpha, beta, update)?;
        let prior2 = NoisePrior::new(&mut self.graph, alpha, beta, update)?;
        for rate in self.layer1.ids() {
            prior1.attach(&mut self.graph, *rate)?;
        }
        for rate in self.layer2.ids() {
            prior2.attach(&mut self.graph, *rate)?;
        }
        self.prior1 = Some(prior1);
        self.prior2 = Some(prior2);
        Ok(())
    }

    /// The current layer-1 and layer-2 priors, if enabled.
    pub fn noise_priors(&self) -> (Option<Beta>, Option<Beta>) {
        let current = |p: Option<NoisePrior>| p.and_then(|p| p.current(&self.graph).ok());
        (current(self.prior1), current(self.prior2))
    }

    pub fn input_value(&self, name: &str) -> Option<bool> {
        self.inputs
            .get(name)
            .map(|id| self.graph.variables()[id.index()].value() != 0.0)
    }

    pub fn inputs(&self) -> BTreeMap<String, bool> {
        self.inputs
            .values(&self.graph)
            .into_iter()
            .map(|(name, v)| (name, v != 0.0))
            .collect()
    }

    /// Current layer-1 noise rates.
    pub fn noise1_rates(&self) -> BTreeMap<String, f64> {
        self.layer1.values(&self.graph)
    }

    /// Current layer-2 noise rates.
    pub fn noise2_rates(&self) -> BTreeMap<String, f64> {
        self.layer2.values(&self.graph)
    }

    pub fn input_scores(&self) -> &BTreeMap<String, f64> {
        &self.input_scores
    }

    pub fn score(&self) -> f64 {
        self.graph.score()
    }

    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    /// Trains item values and both layers of noise rates by EM.
    ///
    /// Each M-step pass updates layer 1 (`noise1`) holding layer 2 fixed,
    /// then layer 2 (`noise2`) holding layer 1 fixed. Prior refits report
    /// `beta1` and `beta2`.
    pub fn em<F>(&mut self, config: &EmConfig, callback: F) -> Result<EmDiagnostics, ModelError>
    where
        F: FnMut(&Self, usize, Stage),
    {
        run_em(self, config, callback)
    }
}

impl EmModel for MultipleBscPairModel {
    fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    fn update_inputs(&mut self) -> Result<(), ModelError> {
        self.weights = em::assign_inputs(&mut self.graph, self.inputs.ids(), self.soft_inputs)?;
        Ok(())
    }

    fn update_noise(&mut self, report: &mut dyn FnMut(&Self, Stage)) -> Result<(), ModelError> {
        let prior1 = self.prior1.map(|p| p.current(&self.graph)).transpose()?;
        em::update_rates(&mut self.graph, self.layer1.ids(), &self.weights, prior1)?;
        report(self, Stage::Noise1);

        let prior2 = self.prior2.map(|p| p.current(&self.graph)).transpose()?;
        em::update_rates(&mut self.graph, self.layer2.ids(), &self.weights, prior2)?;
        report(self, Stage::Noise2);
        Ok(())
    }

    fn update_prior(&mut self, report: &mut dyn FnMut(&Self, Stage)) -> Result<(), ModelError> {
        if let Some(prior) = self.prior1.filter(|p| p.update) {
            prior.refit(&mut self.graph, self.layer1.ids())?;
            report(self, Stage::Beta1);
        }
        if let Some(prior) = self.prior2.filter(|p| p.update) {
            prior.refit(&mut self.graph, self.layer2.ids())?;
            report(self, Stage::Beta2);
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
