mod simplex;
mod standard;

pub use simplex::SimplexSolver;
