//! The factor graph: variable arena, factor list, and variable→factor index.
//!
//! Variables live in a dense arena addressed by [`VarId`]; factors are
//! appended to a list addressed by [`FactorId`]. The reverse index keeps, per
//! variable, the factors that touch it so per-variable scores cost O(deg(v))
//! rather than a scan of every factor.

use smallvec::SmallVec;

use crate::dist::Outcome;
use crate::engine::errors::ModelError;
use crate::engine::factor::{Factor, FactorId};
use crate::engine::variable::{RandomVariable, VarId};

/// Inline capacity of a variable's incident factor list.
const INLINE_VEC_SIZE: usize = 8;

/// A bipartite graph of random variables and factors.
///
/// Adding the same factor twice duplicates it in the factor list and in
/// every adjacent variable's incident list; callers must not double-add.
#[derive(Debug, Clone, Default)]
pub struct FactorGraph {
    variables: Vec<RandomVariable>,
    factors: Vec<Factor>,
    /// Incident factors, indexed by variable
    adjacency: Vec<SmallVec<[FactorId; INLINE_VEC_SIZE]>>,
}

impl FactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable to the arena.
    pub fn add_variable(&mut self, var: RandomVariable) -> VarId {
        let id = VarId(self.variables.len() as u32);
        self.variables.push(var);
        self.adjacency.push(SmallVec::new());
        id
    }

    /// Appends a factor and indexes it under each adjacent variable.
    pub fn add_factor(&mut self, factor: impl Into<Factor>) -> Result<FactorId, ModelError> {
        let factor = factor.into();
        let adjacent = factor.adjacent();
        if let Some(missing) = adjacent.iter().find(|id| id.index() >= self.variables.len()) {
            return Err(ModelError::UnknownVariable(*missing));
        }
        let id = FactorId(self.factors.len() as u32);
        for var in adjacent {
            self.adjacency[var.index()].push(id);
        }
        self.factors.push(factor);
        Ok(id)
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    pub fn variables(&self) -> &[RandomVariable] {
        &self.variables
    }

    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    pub fn variable(&self, id: VarId) -> Result<&RandomVariable, ModelError> {
        self.variables
            .get(id.index())
            .ok_or(ModelError::UnknownVariable(id))
    }

    pub fn factor(&self, id: FactorId) -> Result<&Factor, ModelError> {
        self.factors
            .get(id.index())
            .ok_or(ModelError::UnknownFactor(id))
    }

    /// The current real value of a variable.
    pub fn value(&self, id: VarId) -> Result<f64, ModelError> {
        Ok(self.variable(id)?.value())
    }

    /// Overwrites a variable's value.
    pub fn set_value(&mut self, id: VarId, value: f64) -> Result<(), ModelError> {
        self.variables
            .get_mut(id.index())
            .ok_or(ModelError::UnknownVariable(id))?
            .set_value(value);
        Ok(())
    }

    /// Overwrites a discrete variable's outcome.
    pub fn set_outcome(&mut self, id: VarId, outcome: Outcome) -> Result<(), ModelError> {
        let var = self
            .variables
            .get_mut(id.index())
            .ok_or(ModelError::UnknownVariable(id))?;
        if !var.is_discrete() {
            return Err(ModelError::NotDiscrete(id));
        }
        var.set_outcome(outcome)
    }

    /// The factors incident on a variable.
    pub fn adjacent_to_variable(&self, id: VarId) -> Result<&[FactorId], ModelError> {
        self.adjacency
            .get(id.index())
            .map(|list| list.as_slice())
            .ok_or(ModelError::UnknownVariable(id))
    }

    /// Sum of natural-log factor scores over the whole graph.
    pub fn score(&self) -> f64 {
        self.factors
            .iter()
            .map(|f| f.score(&self.variables).ln())
            .sum()
    }

    /// Sum of natural-log scores of the factors touching `id`.
    pub fn score_var(&self, id: VarId) -> Result<f64, ModelError> {
        self.score_incident(id, None)
    }

    /// Like [`score_var`](Self::score_var), with `id` taking `value`.
    ///
    /// The graph is not mutated.
    pub fn score_var_assuming(&self, id: VarId, value: f64) -> Result<f64, ModelError> {
        self.score_incident(id, Some((id, value)))
    }

    fn score_incident(&self, id: VarId, assume: Option<(VarId, f64)>) -> Result<f64, ModelError> {
        Ok(self
            .adjacent_to_variable(id)?
            .iter()
            .map(|fid| self.factors[fid.index()].score_with(&self.variables, assume).ln())
            .sum())
    }
}
