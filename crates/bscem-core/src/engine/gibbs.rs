//! Gibbs sampling over a factor graph.
//!
//! An alternative to EM for the same graphs: instead of point estimates,
//! draw variable values one at a time conditioned on the rest. A schedule
//! lists the variables to resample, each with its sampler, in sweep order.
//! After `burn_in` full sweeps, every scheduled variable in turn gets
//! `thinning` extra sweeps and then one sweep whose value for that variable
//! is recorded.

use rand::Rng;

use crate::dist::{DenseDiscrete, Dist, Distribution, Outcome};
use crate::engine::errors::ModelError;
use crate::engine::factor_graph::FactorGraph;
use crate::engine::variable::{RandomVariable, VarId};

/// Configuration for a Gibbs run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GibbsConfig {
    /// Sweeps discarded before recording starts.
    pub burn_in: usize,
    /// Sweeps discarded between two recorded draws.
    pub thinning: usize,
}

impl Default for GibbsConfig {
    fn default() -> Self {
        Self {
            burn_in: 100,
            thinning: 10,
        }
    }
}

impl GibbsConfig {
    /// Checks the run is finite for a schedule of `schedule_len` steps and
    /// returns the number of sweeps it will take.
    pub fn validate(&self, schedule_len: usize) -> Result<usize, ModelError> {
        self.thinning
            .checked_add(1)
            .and_then(|per_draw| per_draw.checked_mul(schedule_len))
            .and_then(|draws| draws.checked_add(self.burn_in))
            .ok_or_else(|| {
                ModelError::ValidationError(
                    "gibbs: burn_in and thinning overflow the sweep count".into(),
                )
            })
    }
}

/// How a scheduled variable draws its next value.
#[derive(Debug, Clone, PartialEq)]
pub enum Sampler {
    /// Draw a discrete outcome in proportion to the product of the
    /// variable's incident factor scores.
    Product,
    /// Draw from a fixed distribution, ignoring the graph.
    Distribution(Distribution),
}

/// One entry of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct GibbsStep {
    pub variable: VarId,
    pub sampler: Sampler,
}

impl GibbsStep {
    pub fn new(variable: VarId, sampler: Sampler) -> Self {
        Self { variable, sampler }
    }
}

/// Runs Gibbs sampling and returns one recorded draw per schedule entry, in
/// schedule order. The graph is left at its final sampled state.
pub fn infer<R: Rng + ?Sized>(
    graph: &mut FactorGraph,
    schedule: &[GibbsStep],
    config: &GibbsConfig,
    rng: &mut R,
) -> Result<Vec<RandomVariable>, ModelError> {
    let _sweeps = config.validate(schedule.len())?;
    for step in schedule {
        graph.variable(step.variable)?;
    }

    for _ in 0..config.burn_in {
        sweep(graph, schedule, rng)?;
    }

    let mut draws = Vec::with_capacity(schedule.len());
    for step in schedule {
        for _ in 0..config.thinning {
            sweep(graph, schedule, rng)?;
        }
        sweep(graph, schedule, rng)?;
        draws.push(graph.variable(step.variable)?.clone());
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "Gibbs sampling recorded {} draw(s) over {} sweep(s)",
        draws.len(),
        _sweeps
    );
    Ok(draws)
}

fn sweep<R: Rng + ?Sized>(
    graph: &mut FactorGraph,
    schedule: &[GibbsStep],
    rng: &mut R,
) -> Result<(), ModelError> {
    for step in schedule {
        resample(graph, step, rng)?;
    }
    Ok(())
}

fn resample<R: Rng + ?Sized>(
    graph: &mut FactorGraph,
    step: &GibbsStep,
    rng: &mut R,
) -> Result<(), ModelError> {
    let id = step.variable;
    match &step.sampler {
        Sampler::Product => {
            let outcome = sample_product(graph, id, rng)?;
            graph.set_outcome(id, outcome)
        }
        Sampler::Distribution(dist) if dist.is_discrete() => {
            let outcome = dist.sample_outcome(rng)?;
            graph.set_outcome(id, outcome)
        }
        Sampler::Distribution(dist) => {
            let value = dist.sample_value(rng)?;
            graph.set_value(id, value)
        }
    }
}

/// Draws an outcome of `id` from its conditional given every other variable.
fn sample_product<R: Rng + ?Sized>(
    graph: &FactorGraph,
    id: VarId,
    rng: &mut R,
) -> Result<Outcome, ModelError> {
    let space = graph.variable(id)?.space();
    let size = space.size().ok_or(ModelError::NotDiscrete(id))?;

    let mut log_scores = Vec::with_capacity(size);
    for i in 0..size {
        let value = space.value_of(Outcome(i as u32));
        log_scores.push(graph.score_var_assuming(id, value)?);
    }
    let max = log_scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return Err(ModelError::ZeroProbability);
    }

    let mut conditional = DenseDiscrete::new(space)?;
    for (i, ln) in log_scores.into_iter().enumerate() {
        conditional.set_weight(Outcome(i as u32), (ln - max).exp())?;
    }
    conditional.normalize()?;
    conditional.sample(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::{Bernoulli, Normal, Space};
    use crate::engine::channel::{Bsc, Channel};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn config_reports_total_sweeps() {
        let config = GibbsConfig {
            burn_in: 5,
            thinning: 2,
        };
        assert_eq!(config.validate(3).unwrap(), 14);
        let huge = GibbsConfig {
            burn_in: usize::MAX,
            thinning: 0,
        };
        assert!(huge.validate(1).is_err());
    }

    #[test]
    fn product_sampler_follows_strong_evidence() {
        let mut graph = FactorGraph::new();
        let item = graph.add_variable(RandomVariable::boolean(false));
        let ch = Bsc::new(&mut graph, 0.0).unwrap();
        graph.add_factor(ch.factor(item, true)).unwrap();

        let mut rng = StdRng::seed_from_u64(4);
        let schedule = [GibbsStep::new(item, Sampler::Product)];
        let config = GibbsConfig {
            burn_in: 3,
            thinning: 1,
        };
        let draws = infer(&mut graph, &schedule, &config, &mut rng).unwrap();
        assert_eq!(draws, vec![RandomVariable::boolean(true)]);
    }

    #[test]
    fn product_sampler_rejects_continuous_variables() {
        let mut graph = FactorGraph::new();
        let x = graph.add_variable(RandomVariable::continuous(Space::real_line(), 0.0));
        let mut rng = StdRng::seed_from_u64(4);
        let schedule = [GibbsStep::new(x, Sampler::Product)];
        let err = infer(&mut graph, &schedule, &GibbsConfig::default(), &mut rng).unwrap_err();
        assert!(matches!(err, ModelError::NotDiscrete(v) if v == x));
    }

    #[test]
    fn distribution_sampler_draws_each_kind() {
        let mut graph = FactorGraph::new();
        let flag = graph.add_variable(RandomVariable::boolean(false));
        let x = graph.add_variable(RandomVariable::continuous(Space::real_line(), 0.0));
        let schedule = [
            GibbsStep::new(flag, Sampler::Distribution(Bernoulli::new(1.0).unwrap().into())),
            GibbsStep::new(x, Sampler::Distribution(Normal::new(5.0, 0.0001).into())),
        ];
        let mut rng = StdRng::seed_from_u64(8);
        let draws = infer(&mut graph, &schedule, &GibbsConfig::default(), &mut rng).unwrap();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].value(), 1.0);
        assert!((draws[1].value() - 5.0).abs() < 0.01);
    }

    #[test]
    fn unknown_scheduled_variable_fails_up_front() {
        let mut graph = FactorGraph::new();
        let mut rng = StdRng::seed_from_u64(0);
        let schedule = [GibbsStep::new(VarId(3), Sampler::Product)];
        assert!(matches!(
            infer(&mut graph, &schedule, &GibbsConfig::default(), &mut rng),
            Err(ModelError::UnknownVariable(VarId(3)))
        ));
    }
}
