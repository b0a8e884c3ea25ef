mod error;
mod expr;
mod model;
mod render;
mod solution;
mod solver;

pub use error::ModelError;
pub use expr::{LinearExpr, Var};
pub use model::{Constraint, ConstraintOp, ConstraintRef, Domain, Model, Objective, Sense, Variable};
pub use render::format_number;
pub use solution::{Solution, SolutionReport, SolutionStatus};
pub use solver::SolverAdapter;
