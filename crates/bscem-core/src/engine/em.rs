//! Expectation-maximization over channel truth models.
//!
//! The driver ([`run_em`]) owns the two nested loops and the convergence
//! bookkeeping; models plug in their E-step, M-step and prior refit through
//! [`EmModel`]. The helpers in this module compute item posteriors and
//! noise-rate statistics against a [`FactorGraph`] without mutating it, so a
//! scan can fan out across items or channels (behind the `parallel`
//! feature) and apply its writes after the barrier.
//!
//! ## Numerical guards
//!
//! - Item posteriors are computed in log space:
//!   `P(true) = 1 / (1 + exp(ln_false − ln_true))`. Equal scores, including
//!   an item with no factors, give exactly 0.5.
//! - Soft scores fed to the M-step are clamped to `[1e-6, 1 − 1e-6]`.
//! - Noise rates are clamped to `[1e-3, 1 − 1e-3]`; a channel with no
//!   factors gets the floor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::dist::Beta;
use crate::engine::errors::ModelError;
use crate::engine::factor::Factor;
use crate::engine::factor_graph::FactorGraph;
use crate::engine::variable::VarId;

/// Soft scores used during training stay this far from 0 and 1.
pub const SOFT_SCORE_FLOOR: f64 = 1e-6;

/// Noise rates stay this far from 0 and 1.
pub const NOISE_RATE_FLOOR: f64 = 1e-3;

/// Configuration for an EM run.
#[derive(Debug, Clone)]
pub struct EmConfig {
    /// Round budget for both the outer loop and each inner M-step loop.
    /// Zero means unbounded.
    pub max_rounds: usize,
    /// A loop stops once its score improves by no more than this.
    pub tolerance: f64,
    /// Checked between outer rounds; a set flag stops training early.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for EmConfig {
    fn default() -> Self {
        Self {
            max_rounds: 0,
            tolerance: 1e-3,
            cancel: None,
        }
    }
}

impl EmConfig {
    pub fn new(max_rounds: usize, tolerance: f64) -> Self {
        Self {
            max_rounds,
            tolerance,
            cancel: None,
        }
    }

    /// Attaches a cancellation flag.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ModelError::ValidationError(
                "em: tolerance must be finite and >= 0".into(),
            ));
        }
        if self.max_rounds == 0 && self.tolerance == 0.0 {
            return Err(ModelError::ValidationError(
                "em: an unbounded round budget needs a positive tolerance".into(),
            ));
        }
        Ok(())
    }

    /// Whether a loop should run round `round` (1-based) after improving
    /// its score by `delta` in the previous round.
    fn keep_going(&self, round: usize, delta: f64) -> bool {
        (self.max_rounds == 0 || round <= self.max_rounds) && delta > self.tolerance
    }

    /// Whether a final score change counts as convergence. A round whose
    /// score fell by more than the tolerance stopped the loop but did not
    /// converge.
    fn settled(&self, delta: f64) -> bool {
        delta.abs() <= self.tolerance
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// The step an EM callback is reporting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    Initial,
    Input,
    Noise,
    Noise1,
    Noise2,
    Beta,
    Beta1,
    Beta2,
    Final,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initial => "Initial",
            Stage::Input => "input",
            Stage::Noise => "noise",
            Stage::Noise1 => "noise1",
            Stage::Noise2 => "noise2",
            Stage::Beta => "beta",
            Stage::Beta1 => "beta1",
            Stage::Beta2 => "beta2",
            Stage::Final => "Final",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime diagnostics emitted by an EM run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmDiagnostics {
    /// Number of outer rounds actually executed.
    pub rounds_run: usize,
    /// Total inner M-step passes across all outer rounds.
    pub noise_rounds_run: usize,
    /// Whether the last outer round moved the score by at most the tolerance
    /// in either direction.
    pub converged: bool,
    /// Whether the cancellation flag stopped training.
    pub cancelled: bool,
    /// Graph score before the first round.
    pub initial_score: f64,
    /// Graph score after the final posterior pass.
    pub final_score: f64,
    /// Score change of the last outer round; negative when the score fell.
    pub final_delta: f64,
}

/// The steps a truth model contributes to [`run_em`].
///
/// Each step must run to completion before the next one reads the state it
/// wrote.
pub trait EmModel: Sized {
    fn graph(&self) -> &FactorGraph;

    /// E-step: reassigns every item and records the weights the M-step uses.
    fn update_inputs(&mut self) -> Result<(), ModelError>;

    /// One M-step pass over every noise rate. Reports each layer it updates.
    fn update_noise(&mut self, report: &mut dyn FnMut(&Self, Stage)) -> Result<(), ModelError>;

    /// Empirical-Bayes refit of the noise prior(s), if enabled.
    fn update_prior(&mut self, report: &mut dyn FnMut(&Self, Stage)) -> Result<(), ModelError>;

    /// Final pass: hard assignments plus the unclamped posterior snapshot.
    fn record_input_scores(&mut self) -> Result<(), ModelError>;
}

/// Trains `model` by EM.
///
/// `callback` receives the model, the outer round index and the stage after
/// every step; `Initial` and `Final` are reported with round 0. Exhausting
/// the round budget is not an error; inspect the returned diagnostics.
pub fn run_em<M, F>(
    model: &mut M,
    config: &EmConfig,
    mut callback: F,
) -> Result<EmDiagnostics, ModelError>
where
    M: EmModel,
    F: FnMut(&M, usize, Stage),
{
    config.validate()?;

    let initial_score = model.graph().score();
    let mut diagnostics = EmDiagnostics {
        rounds_run: 0,
        noise_rounds_run: 0,
        converged: false,
        cancelled: false,
        initial_score,
        final_score: initial_score,
        final_delta: f64::INFINITY,
    };
    callback(model, 0, Stage::Initial);

    let mut score = initial_score;
    let mut delta = f64::INFINITY;
    let mut round = 1;
    while config.keep_going(round, delta) {
        if config.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::debug!("EM cancelled before round {}", round);
            diagnostics.cancelled = true;
            break;
        }

        model.update_inputs()?;
        callback(model, round, Stage::Input);

        let mut inner_score = model.graph().score();
        let mut inner_delta = f64::INFINITY;
        let mut inner_round = 1;
        while config.keep_going(inner_round, inner_delta) {
            model.update_noise(&mut |m: &M, stage| callback(m, round, stage))?;
            let next = model.graph().score();
            inner_delta = next - inner_score;
            inner_score = next;
            inner_round += 1;
            diagnostics.noise_rounds_run += 1;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "EM round {}: noise rates settled after {} pass(es) (delta = {:.2e})",
            round,
            inner_round - 1,
            inner_delta
        );

        model.update_prior(&mut |m: &M, stage| callback(m, round, stage))?;

        let next = model.graph().score();
        delta = next - score;
        score = next;
        diagnostics.rounds_run = round;
        diagnostics.final_delta = delta;
        #[cfg(feature = "tracing")]
        tracing::debug!("EM round {}: score {:.6} (delta = {:.2e})", round, score, delta);
        round += 1;
    }

    model.record_input_scores()?;
    diagnostics.converged = config.settled(diagnostics.final_delta);
    diagnostics.final_score = model.graph().score();
    callback(model, 0, Stage::Final);
    Ok(diagnostics)
}

/// Probability that an item is true given its log scores under each value.
pub fn soft_score(ln_false: f64, ln_true: f64) -> f64 {
    if ln_false == ln_true {
        return 0.5;
    }
    if ln_true == f64::NEG_INFINITY {
        return 0.0;
    }
    if ln_false == f64::NEG_INFINITY {
        return 1.0;
    }
    1.0 / (1.0 + (ln_false - ln_true).exp())
}

/// An item's posterior under the current noise rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Posterior {
    /// Unclamped `P(true)`.
    pub soft: f64,
    /// MAP value; ties go to true.
    pub hard: bool,
}

impl Posterior {
    /// Weight fed to the M-step.
    pub fn weight(&self, soft_inputs: bool) -> f64 {
        if soft_inputs {
            self.soft.clamp(SOFT_SCORE_FLOOR, 1.0 - SOFT_SCORE_FLOOR)
        } else if self.hard {
            1.0
        } else {
            0.0
        }
    }
}

fn posterior(graph: &FactorGraph, item: VarId) -> Result<Posterior, ModelError> {
    let ln_false = graph.score_var_assuming(item, 0.0)?;
    let ln_true = graph.score_var_assuming(item, 1.0)?;
    Ok(Posterior {
        soft: soft_score(ln_false, ln_true),
        hard: !(ln_false > ln_true),
    })
}

/// Posteriors of every item, read from the same graph state.
pub(crate) fn posteriors(
    graph: &FactorGraph,
    items: &[VarId],
) -> Result<Vec<Posterior>, ModelError> {
    #[cfg(feature = "parallel")]
    let iter = items.par_iter();
    #[cfg(not(feature = "parallel"))]
    let iter = items.iter();
    iter.map(|item| posterior(graph, *item)).collect()
}

/// Runs the E-step for `items`: writes hard assignments into the graph and
/// returns the M-step weight of each item.
pub(crate) fn assign_inputs(
    graph: &mut FactorGraph,
    items: &[VarId],
    soft_inputs: bool,
) -> Result<FxHashMap<VarId, f64>, ModelError> {
    let found = posteriors(graph, items)?;
    let mut weights = FxHashMap::default();
    weights.reserve(items.len());
    for (item, post) in items.iter().zip(found) {
        graph.set_value(*item, if post.hard { 1.0 } else { 0.0 })?;
        weights.insert(*item, post.weight(soft_inputs));
    }
    Ok(weights)
}

/// Expected flips attributed to one noise rate, and the observations seen.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct FlipCounts {
    pub flips: f64,
    pub total: f64,
}

/// Probability that an observation disagrees with its input.
#[inline]
fn disagreement(p_true: f64, output: bool) -> f64 {
    if output {
        1.0 - p_true
    } else {
        p_true
    }
}

fn flip_counts(
    graph: &FactorGraph,
    rate: VarId,
    weights: &FxHashMap<VarId, f64>,
) -> Result<FlipCounts, ModelError> {
    let weight = |id: VarId| -> Result<f64, ModelError> {
        match weights.get(&id) {
            Some(w) => Ok(*w),
            None => graph.value(id),
        }
    };
    let mut counts = FlipCounts::default();
    for fid in graph.adjacent_to_variable(rate)? {
        match graph.factor(*fid)? {
            Factor::Bsc(f) if f.noise_rate == rate => {
                counts.flips += disagreement(weight(f.input)?, f.output);
                counts.total += 1.0;
            }
            Factor::BscPair(f) => {
                // Coordinate ascent: hold the other layer's rate fixed.
                let other = if f.noise_rate1 == rate {
                    f.noise_rate2
                } else if f.noise_rate2 == rate {
                    f.noise_rate1
                } else {
                    continue;
                };
                let d = disagreement(weight(f.input)?, f.output);
                let n = graph.value(other)?;
                counts.flips += d * (1.0 - n) + (1.0 - d) * n;
                counts.total += 1.0;
            }
            _ => {}
        }
    }
    Ok(counts)
}

/// New noise rate from flip counts, optionally regularized by a Beta prior.
///
/// With a prior whose mode exists (α > 1, β > 1) this is the posterior mode
/// `(flips + α − 1) / (total + α + β − 2)`; otherwise the plain ratio.
pub fn estimate_rate(flips: f64, total: f64, prior: Option<Beta>) -> f64 {
    let raw = match prior {
        Some(p) if p.alpha > 1.0 && p.beta > 1.0 => {
            (flips + p.alpha - 1.0) / (total + p.alpha + p.beta - 2.0)
        }
        _ if total == 0.0 => NOISE_RATE_FLOOR,
        _ => flips / total,
    };
    if raw.is_nan() {
        return NOISE_RATE_FLOOR;
    }
    raw.clamp(NOISE_RATE_FLOOR, 1.0 - NOISE_RATE_FLOOR)
}

/// Runs one M-step over `rates`: every estimate is read from the pre-step
/// graph, then all are written.
pub(crate) fn update_rates(
    graph: &mut FactorGraph,
    rates: &[VarId],
    weights: &FxHashMap<VarId, f64>,
    prior: Option<Beta>,
) -> Result<(), ModelError> {
    let estimates: Vec<f64> = {
        let graph = &*graph;
        #[cfg(feature = "parallel")]
        let iter = rates.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = rates.iter();
        iter.map(|rate| {
            flip_counts(graph, *rate, weights).map(|c| estimate_rate(c.flips, c.total, prior))
        })
        .collect::<Result<_, _>>()?
    };
    for (rate, value) in rates.iter().zip(estimates) {
        graph.set_value(*rate, value)?;
    }
    Ok(())
}

/// Unclamped posterior snapshot after a final hard assignment pass.
pub(crate) fn final_scores(
    graph: &mut FactorGraph,
    items: &[VarId],
) -> Result<Vec<f64>, ModelError> {
    let found = posteriors(graph, items)?;
    let mut scores = Vec::with_capacity(items.len());
    for (item, post) in items.iter().zip(found) {
        graph.set_value(*item, if post.hard { 1.0 } else { 0.0 })?;
        scores.push(post.soft);
    }
    Ok(scores)
}
