use std::fmt;

use crate::expr::{LinearExpr, Var};
use crate::model::Model;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// Solver encountered an error
    Error,
}

impl SolutionStatus {
    pub fn label(self) -> &'static str {
        match self {
            SolutionStatus::Optimal => "OPTIMAL",
            SolutionStatus::Infeasible => "INFEASIBLE",
            SolutionStatus::Unbounded => "UNBOUNDED",
            SolutionStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The result of solving a model.
///
/// Values and the objective value only exist for [`SolutionStatus::Optimal`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    status: SolutionStatus,
    objective_value: Option<f64>,
    /// One value per declared variable, in declaration order
    values: Option<Vec<f64>>,
    /// Diagnostic from the solver, set for [`SolutionStatus::Error`]
    message: Option<String>,
}

impl Solution {
    pub fn optimal(values: Vec<f64>, objective_value: f64) -> Self {
        Self {
            status: SolutionStatus::Optimal,
            objective_value: Some(objective_value),
            values: Some(values),
            message: None,
        }
    }

    pub fn infeasible() -> Self {
        Self::without_values(SolutionStatus::Infeasible, None)
    }

    pub fn unbounded() -> Self {
        Self::without_values(SolutionStatus::Unbounded, None)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::without_values(SolutionStatus::Error, Some(message.into()))
    }

    fn without_values(status: SolutionStatus, message: Option<String>) -> Self {
        Self {
            status,
            objective_value: None,
            values: None,
            message,
        }
    }

    pub fn status(&self) -> SolutionStatus {
        self.status
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    pub fn objective_value(&self) -> Option<f64> {
        self.objective_value
    }

    pub fn value(&self, var: Var) -> Option<f64> {
        self.values.as_ref()?.get(var.index()).copied()
    }

    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }

    /// Evaluate an expression at the solution point
    pub fn eval(&self, expr: &LinearExpr) -> Option<f64> {
        self.values.as_deref().map(|values| expr.evaluate(values))
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Plain-text report of the solution, naming values after `model`'s variables
    pub fn report<'a>(&'a self, model: &'a Model) -> SolutionReport<'a> {
        SolutionReport {
            solution: self,
            model,
        }
    }
}

pub struct SolutionReport<'a> {
    solution: &'a Solution,
    model: &'a Model,
}

impl fmt::Display for SolutionReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Status: {}", self.solution.status)?;
        if let Some(message) = &self.solution.message {
            writeln!(f, "Message: {}", message)?;
        }
        let (Some(objective), Some(values)) = (self.solution.objective_value, &self.solution.values) else {
            return Ok(());
        };
        writeln!(f, "Objective: {}", objective)?;
        for (variable, value) in self.model.variables().iter().zip(values) {
            writeln!(f, "  {} = {}", variable.name, value)?;
        }
        Ok(())
    }
}
