use crate::model::Model;
use crate::solution::Solution;

/// An external LP/MIP solving capability.
///
/// Implementations report expected optimization outcomes (infeasible,
/// unbounded, failures inside the solver) through the returned
/// [`Solution`]'s status rather than as errors.
pub trait SolverAdapter {
    fn solve(&self, model: &Model) -> Solution;
}

impl<F> SolverAdapter for F
where
    F: Fn(&Model) -> Solution,
{
    fn solve(&self, model: &Model) -> Solution {
        self(model)
    }
}
