use linprog_model::{ConstraintOp, Model, Solution, SolverAdapter};
use tracing::{debug, trace, warn};

use crate::standard::StandardProblem;

/// Distance from the nearest integer tolerated for integer variables
const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Consecutive degenerate pivots after which entering columns are picked by
/// smallest index, which rules out cycling
const DEGENERATE_STREAK_LIMIT: usize = 50;

/// Relative slack allowed when the recovered point is checked against the model
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Reference two-phase simplex solver for linear programs.
///
/// Integer variables are accepted as long as the LP optimum already places
/// them on integral values; otherwise the result is an error status, since
/// no integer search is performed.
#[derive(Debug, Clone)]
pub struct SimplexSolver {
    /// Maximum iterations per phase before giving up
    max_iterations: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
}

impl Default for SimplexSolver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
        }
    }
}

impl SimplexSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the pivoting tolerance. Values that are not positive and finite
    /// are ignored and the current tolerance is kept.
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        if tol.is_finite() && tol > 0.0 {
            self.tolerance = tol;
        } else {
            warn!(tolerance = tol, kept = self.tolerance, "ignoring invalid tolerance");
        }
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn run(&self, model: &Model) -> Solution {
        let problem = StandardProblem::from_model(model);
        let mut tableau = Tableau::build(&problem);
        debug!(
            columns = problem.num_columns,
            rows = problem.rows.len(),
            artificial = tableau.n_artificial,
            "built tableau"
        );

        // Phase 1: find an initial basic feasible solution
        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau) {
                SimplexResult::Optimal => {}
                SimplexResult::Infeasible | SimplexResult::Unbounded => return Solution::infeasible(),
                SimplexResult::IterationLimit => {
                    return Solution::error(format!("iteration limit of {} reached in phase 1", self.max_iterations));
                }
            }
        }

        // Phase 2: optimize
        match self.phase2(&mut tableau) {
            SimplexResult::Optimal => {}
            SimplexResult::Unbounded => return Solution::unbounded(),
            SimplexResult::Infeasible => return Solution::infeasible(),
            SimplexResult::IterationLimit => {
                return Solution::error(format!("iteration limit of {} reached in phase 2", self.max_iterations));
            }
        }

        let columns = tableau.column_values(problem.num_columns);
        let mut values = problem.variable_values(&columns);

        if let Some(violation) = first_violation(model, &values) {
            warn!(%violation, "optimal basis does not satisfy the model");
            return Solution::error(format!("numerical trouble: {}", violation));
        }

        for (variable, value) in model.variables().iter().zip(values.iter_mut()) {
            if !variable.is_integer() {
                continue;
            }
            let rounded = value.round();
            if (*value - rounded).abs() > INTEGRALITY_TOLERANCE {
                debug!(variable = %variable.name, value = *value, "fractional integer variable");
                return Solution::error(format!(
                    "fractional LP relaxation ({} = {}); a MIP-capable solver is required",
                    variable.name, value
                ));
            }
            *value = rounded;
        }

        let objective_value = model.objective().expr.evaluate(&values);
        debug!(objective_value, "optimal");
        Solution::optimal(values, objective_value)
    }

    fn phase1(&self, tableau: &mut Tableau) -> SimplexResult {
        // Auxiliary objective: minimize the sum of artificials, stored as
        // maximize -sum so the same pivoting rule applies
        let obj_row = tableau.obj_row();
        let n_cols = tableau.n_cols();
        let art_start = tableau.artificial_start();

        let orig_obj = std::mem::replace(&mut tableau.data[obj_row], vec![0.0; n_cols]);
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[obj_row][j] = -1.0;
        }

        // Price out the basic artificials
        for i in 0..obj_row {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[obj_row][j] += tableau.data[i][j];
                }
            }
        }

        match self.iterate(tableau, n_cols - 1, "phase 1") {
            SimplexResult::Optimal => {}
            // The auxiliary problem is bounded by zero, so this only happens
            // through numerical trouble
            SimplexResult::Unbounded | SimplexResult::Infeasible => return SimplexResult::Infeasible,
            SimplexResult::IterationLimit => return SimplexResult::IterationLimit,
        }

        let rhs_col = n_cols - 1;
        let residual: f64 = (0..obj_row)
            .filter(|&i| tableau.basic_vars[i] >= art_start)
            .map(|i| tableau.data[i][rhs_col])
            .sum();
        if residual > self.tolerance.max(1e-7) {
            debug!(residual, "phase 1 residual is positive, infeasible");
            return SimplexResult::Infeasible;
        }

        self.drive_out_artificials(tableau);

        // Restore the phase 2 objective and price out basic columns
        let obj_row = tableau.obj_row();
        tableau.data[obj_row] = orig_obj;
        for i in 0..obj_row {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[obj_row][basic];
            if ratio.abs() > self.tolerance {
                for j in 0..n_cols {
                    tableau.data[obj_row][j] -= ratio * tableau.data[i][j];
                }
            }
        }

        SimplexResult::Optimal
    }

    /// Pivot artificials still basic at zero level out of the basis; rows
    /// where that is impossible are linearly dependent and get dropped
    fn drive_out_artificials(&self, tableau: &mut Tableau) {
        let art_start = tableau.artificial_start();
        let mut i = 0;
        while i < tableau.obj_row() {
            if tableau.basic_vars[i] < art_start {
                i += 1;
                continue;
            }
            let entering = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance);
            match entering {
                Some(col) => {
                    trace!(row = i, col, "driving artificial out of basis");
                    tableau.pivot(i, col);
                    i += 1;
                }
                None => {
                    debug!(row = i, "dropping redundant row");
                    tableau.data.remove(i);
                    tableau.basic_vars.remove(i);
                }
            }
        }
    }

    fn phase2(&self, tableau: &mut Tableau) -> SimplexResult {
        // Artificial columns never re-enter the basis
        let exclude_from = tableau.artificial_start();
        self.iterate(tableau, exclude_from, "phase 2")
    }

    fn iterate(&self, tableau: &mut Tableau, exclude_from: usize, phase: &str) -> SimplexResult {
        let mut degenerate_streak = 0;
        for iteration in 0..self.max_iterations {
            let bland = degenerate_streak >= DEGENERATE_STREAK_LIMIT;
            let Some(pivot_col) = self.find_pivot_column(tableau, exclude_from, bland) else {
                debug!(phase, iterations = iteration, "optimal basis");
                return SimplexResult::Optimal;
            };
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col) else {
                debug!(phase, col = pivot_col, "no leaving row, unbounded");
                return SimplexResult::Unbounded;
            };

            let rhs_col = tableau.n_cols() - 1;
            if tableau.data[pivot_row][rhs_col].abs() <= self.tolerance {
                degenerate_streak += 1;
            } else {
                degenerate_streak = 0;
            }
            trace!(phase, iteration, row = pivot_row, col = pivot_col, bland, "pivot");
            tableau.pivot(pivot_row, pivot_col);
        }
        warn!(phase, max_iterations = self.max_iterations, "iteration limit reached");
        SimplexResult::IterationLimit
    }

    /// Pick the entering column among `0..exclude_from`: the most positive
    /// reduced cost, or the first positive one when `bland` is set
    fn find_pivot_column(&self, tableau: &Tableau, exclude_from: usize, bland: bool) -> Option<usize> {
        let obj = &tableau.data[tableau.obj_row()];

        if bland {
            return (0..exclude_from).find(|&j| obj[j] > self.tolerance);
        }

        let mut max_val = self.tolerance;
        let mut max_col = None;
        for (j, &value) in obj.iter().enumerate().take(exclude_from) {
            if value > max_val {
                max_val = value;
                max_col = Some(j);
            }
        }
        max_col
    }

    /// Minimum ratio test; ties go to the row whose basic column has the smallest index
    fn find_pivot_row(&self, tableau: &Tableau, col: usize) -> Option<usize> {
        let rhs_col = tableau.n_cols() - 1;

        let mut min_ratio = f64::INFINITY;
        let mut min_row: Option<usize> = None;

        for i in 0..tableau.obj_row() {
            let val = tableau.data[i][col];
            if val <= self.tolerance {
                continue;
            }
            let ratio = tableau.data[i][rhs_col].max(0.0) / val;
            let better = match min_row {
                None => true,
                Some(row) => {
                    ratio < min_ratio - self.tolerance
                        || (ratio <= min_ratio + self.tolerance && tableau.basic_vars[i] < tableau.basic_vars[row])
                }
            };
            if better {
                min_ratio = ratio;
                min_row = Some(i);
            }
        }

        min_row
    }
}

/// Re-check a recovered point against the model's bounds and constraints
fn first_violation(model: &Model, values: &[f64]) -> Option<String> {
    let slack = |scale: f64| FEASIBILITY_TOLERANCE * (1.0 + scale);

    for (variable, &value) in model.variables().iter().zip(values) {
        let outside = value < variable.lower - slack(variable.lower.abs())
            || value > variable.upper + slack(variable.upper.abs());
        if !value.is_finite() || outside {
            return Some(format!("{} = {} is outside its bounds", variable.name, value));
        }
    }

    for (i, constraint) in model.constraints().iter().enumerate() {
        let magnitude: f64 = constraint
            .expr()
            .terms()
            .map(|(var, coef)| (coef * values[var.index()]).abs())
            .sum();
        if !constraint.is_satisfied(values, slack(magnitude + constraint.rhs().abs())) {
            return Some(format!(
                "constraint c{} ({} {}) is violated",
                i + 1,
                constraint.op(),
                constraint.rhs()
            ));
        }
    }
    None
}

impl SolverAdapter for SimplexSolver {
    #[tracing::instrument(
        name = "simplex",
        level = "debug",
        skip_all,
        fields(variables = model.num_variables(), constraints = model.num_constraints())
    )]
    fn solve(&self, model: &Model) -> Solution {
        self.run(model)
    }
}

/// Dense simplex tableau. The last row holds the objective, the last column
/// the right-hand side. Columns are ordered structural, slack/surplus,
/// artificial.
struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
}

impl Tableau {
    fn build(problem: &StandardProblem) -> Self {
        let n_vars = problem.num_columns;
        let n_constraints = problem.rows.len();

        let mut n_slack = 0;
        let mut n_artificial = 0;
        for row in &problem.rows {
            match row.op {
                ConstraintOp::Le => n_slack += 1,
                ConstraintOp::Ge => {
                    n_slack += 1; // surplus
                    n_artificial += 1;
                }
                ConstraintOp::Eq => n_artificial += 1,
            }
        }

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; n_constraints + 1],
            basic_vars: vec![0; n_constraints],
            n_vars,
            n_slack,
            n_artificial,
        };

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, row) in problem.rows.iter().enumerate() {
            trace!(row = %row.name, op = %row.op, rhs = row.rhs, "tableau row");
            tableau.data[i][..n_vars].copy_from_slice(&row.coefficients);
            tableau.data[i][total_cols - 1] = row.rhs;

            match row.op {
                ConstraintOp::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    slack_idx += 1;
                }
                ConstraintOp::Ge => {
                    tableau.data[i][slack_idx] = -1.0; // surplus
                    slack_idx += 1;
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                ConstraintOp::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        // Pivoting maximizes, so a minimization objective is negated
        let obj_row = n_constraints;
        for (j, &coef) in problem.objective.iter().enumerate() {
            tableau.data[obj_row][j] = if problem.maximize { coef } else { -coef };
        }

        tableau
    }

    fn obj_row(&self) -> usize {
        self.data.len() - 1
    }

    fn n_cols(&self) -> usize {
        self.data[0].len()
    }

    fn artificial_start(&self) -> usize {
        self.n_vars + self.n_slack
    }

    fn pivot(&mut self, row: usize, col: usize) {
        self.basic_vars[row] = col;

        let pivot_val = self.data[row][col];
        for value in self.data[row].iter_mut() {
            *value /= pivot_val;
        }

        let pivot_row = self.data[row].clone();
        for (i, other) in self.data.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = other[col];
            if factor == 0.0 {
                continue;
            }
            for (value, &p) in other.iter_mut().zip(&pivot_row) {
                *value -= factor * p;
            }
        }
    }

    /// Values of the first `n` columns at the current basis
    fn column_values(&self, n: usize) -> Vec<f64> {
        let rhs_col = self.n_cols() - 1;
        let mut values = vec![0.0; n];
        for (i, &basic) in self.basic_vars.iter().enumerate() {
            if basic < n {
                values[basic] = self.data[i][rhs_col].max(0.0);
            }
        }
        values
    }
}

enum SimplexResult {
    Optimal,
    Unbounded,
    Infeasible,
    IterationLimit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use linprog_model::{Domain, SolutionStatus};
    use tracing_test::traced_test;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value present");
        assert!((actual - expected).abs() < 1e-6, "got {} (expected {})", actual, expected);
    }

    #[test]
    #[traced_test]
    fn test_simple_maximization() {
        // Maximize: 3x + 2y
        // Subject to:
        //   x + y <= 4
        //   x <= 3
        //   y <= 3
        //   x, y >= 0
        // Optimal: x=3, y=1, obj=11
        let mut model = Model::new();
        let x = model.add_continuous("x", 0.0, f64::INFINITY).unwrap();
        let y = model.add_continuous("y", 0.0, f64::INFINITY).unwrap();
        model.maximize(3.0 * x + 2.0 * y).unwrap();
        model.add_constraint(x + y, ConstraintOp::Le, 4.0).unwrap();
        model.add_constraint(x, ConstraintOp::Le, 3.0).unwrap();
        model.add_constraint(y, ConstraintOp::Le, 3.0).unwrap();

        let solution = model.solve(&SimplexSolver::new());

        assert_eq!(solution.status(), SolutionStatus::Optimal);
        assert_close(solution.value(x), 3.0);
        assert_close(solution.value(y), 1.0);
        assert_close(solution.objective_value(), 11.0);
    }

    #[test]
    #[traced_test]
    fn test_minimization_with_ge() {
        // Minimize 2x + 3y s.t. x + y >= 4, 0 <= x <= 3, 0 <= y <= 3
        // Optimal: x=3, y=1, obj=9
        let mut model = Model::new();
        let x = model.add_continuous("x", 0.0, 3.0).unwrap();
        let y = model.add_continuous("y", 0.0, 3.0).unwrap();
        model.minimize(2.0 * x + 3.0 * y).unwrap();
        model.add_constraint(x + y, ConstraintOp::Ge, 4.0).unwrap();

        let solution = model.solve(&SimplexSolver::new());

        assert_eq!(solution.status(), SolutionStatus::Optimal);
        assert_close(solution.value(x), 3.0);
        assert_close(solution.value(y), 1.0);
        assert_close(solution.objective_value(), 9.0);
        assert!(logs_contain("optimal basis"));
    }

    #[test]
    fn test_infeasible() {
        let mut model = Model::new();
        let x = model.add_continuous("x", f64::NEG_INFINITY, f64::INFINITY).unwrap();
        model.minimize(x).unwrap();
        model.add_constraint(x, ConstraintOp::Ge, 5.0).unwrap();
        model.add_constraint(x, ConstraintOp::Le, 3.0).unwrap();

        let solution = model.solve(&SimplexSolver::new());

        assert_eq!(solution.status(), SolutionStatus::Infeasible);
        assert_eq!(solution.values(), None);
    }

    #[test]
    fn test_unbounded() {
        let mut model = Model::new();
        let x = model.add_continuous("x", 0.0, f64::INFINITY).unwrap();
        let y = model.add_continuous("y", 0.0, f64::INFINITY).unwrap();
        model.maximize(x + y).unwrap();
        model.add_constraint(x - y, ConstraintOp::Le, 1.0).unwrap();

        let solution = model.solve(&SimplexSolver::new());
        assert_eq!(solution.status(), SolutionStatus::Unbounded);
        assert_eq!(solution.objective_value(), None);
    }

    #[test]
    fn test_equality_and_free_variable() {
        // min x + 2y s.t. x + y = 1, x - y >= -5, x <= 4, y >= 0, x free
        // Optimal: x=1, y=0, obj=1
        let mut model = Model::new();
        let x = model.add_continuous("x", f64::NEG_INFINITY, f64::INFINITY).unwrap();
        let y = model.add_continuous("y", 0.0, f64::INFINITY).unwrap();
        model.minimize(x + 2.0 * y).unwrap();
        model.add_constraint(x + y, ConstraintOp::Eq, 1.0).unwrap();
        model.add_constraint(x - y, ConstraintOp::Ge, -5.0).unwrap();
        model.add_constraint(x, ConstraintOp::Le, 4.0).unwrap();

        let solution = model.solve(&SimplexSolver::new());
        assert_eq!(solution.status(), SolutionStatus::Optimal);
        assert_close(solution.value(x), 1.0);
        assert_close(solution.value(y), 0.0);
        assert_close(solution.objective_value(), 1.0);
    }

    #[test]
    fn test_negative_lower_and_upper_only_bounds() {
        // max x - y with -2 <= x <= 1 and y <= 5 (no lower), y >= -1 via constraint
        // Optimal: x=1, y=-1, obj=2
        let mut model = Model::new();
        let x = model.add_continuous("x", -2.0, 1.0).unwrap();
        let y = model.add_continuous("y", f64::NEG_INFINITY, 5.0).unwrap();
        model.maximize(x - y + 10.0).unwrap();
        model.add_constraint(y, ConstraintOp::Ge, -1.0).unwrap();

        let solution = model.solve(&SimplexSolver::new());
        assert_eq!(solution.status(), SolutionStatus::Optimal);
        assert_close(solution.value(x), 1.0);
        assert_close(solution.value(y), -1.0);
        assert_close(solution.objective_value(), 12.0);
    }

    #[test]
    fn test_redundant_equalities() {
        let mut model = Model::new();
        let x = model.add_continuous("x", 0.0, f64::INFINITY).unwrap();
        let y = model.add_continuous("y", 0.0, f64::INFINITY).unwrap();
        model.minimize(x + y).unwrap();
        model.add_constraint(x + y, ConstraintOp::Eq, 2.0).unwrap();
        model.add_constraint(2.0 * x + 2.0 * y, ConstraintOp::Eq, 4.0).unwrap();

        let solution = model.solve(&SimplexSolver::new());
        assert_eq!(solution.status(), SolutionStatus::Optimal);
        assert_close(solution.objective_value(), 2.0);
    }

    #[test]
    fn test_integral_relaxation_is_accepted() {
        let mut model = Model::new();
        let n = model.add_variable("n", 0.0, 7.0, Domain::Integer).unwrap();
        model.maximize(n).unwrap();

        let solution = model.solve(&SimplexSolver::new());
        assert_eq!(solution.status(), SolutionStatus::Optimal);
        assert_eq!(solution.value(n), Some(7.0));
    }

    #[test]
    fn test_fractional_relaxation_is_an_error() {
        let mut model = Model::new();
        let n = model.add_integer("n", 0.0, f64::INFINITY).unwrap();
        model.maximize(n).unwrap();
        model.add_constraint(2.0 * n, ConstraintOp::Le, 7.0).unwrap();

        let solution = model.solve(&SimplexSolver::new());
        assert_eq!(solution.status(), SolutionStatus::Error);
        assert_eq!(solution.values(), None);
        assert!(solution.message().unwrap().contains("MIP-capable"));
    }

    #[test]
    fn test_iteration_limit() {
        let mut model = Model::new();
        let x = model.add_continuous("x", 0.0, 1.0).unwrap();
        let y = model.add_continuous("y", 0.0, 1.0).unwrap();
        model.maximize(x + y).unwrap();

        let solution = model.solve(&SimplexSolver::new().with_max_iterations(1));
        assert_eq!(solution.status(), SolutionStatus::Error);
    }

    #[test]
    fn test_huge_finite_bounds() {
        for bound in [1e20, f64::MAX] {
            let mut model = Model::new();
            let x = model.add_continuous("x", -bound, bound).unwrap();
            model.minimize(x).unwrap();
            model.add_constraint(x, ConstraintOp::Ge, 1.0).unwrap();

            let solution = model.solve(&SimplexSolver::new());
            assert_eq!(solution.status(), SolutionStatus::Optimal, "bound {}", bound);
            assert_close(solution.value(x), 1.0);
            assert_close(solution.objective_value(), 1.0);
            assert!(model.constraints()[0].is_satisfied(solution.values().unwrap(), 1e-9));
        }
    }

    #[test]
    fn test_huge_bounds_alongside_ordinary_ones() {
        // max x + y s.t. x + y <= 7, x in [-1e20, 1e20], y in [2, 1e30]
        let mut model = Model::new();
        let x = model.add_continuous("x", -1e20, 1e20).unwrap();
        let y = model.add_continuous("y", 2.0, 1e30).unwrap();
        model.maximize(x + y).unwrap();
        model.add_constraint(x + y, ConstraintOp::Le, 7.0).unwrap();
        model.add_constraint(x, ConstraintOp::Ge, 0.5).unwrap();
        model.add_constraint(y, ConstraintOp::Le, 3.0).unwrap();

        let solution = model.solve(&SimplexSolver::new());
        assert_eq!(solution.status(), SolutionStatus::Optimal);
        assert_close(solution.objective_value(), 7.0);
        let values = solution.values().unwrap();
        assert!(model.constraints().iter().all(|c| c.is_satisfied(values, 1e-9)));
    }

    #[test]
    fn test_recovered_point_is_checked() {
        let mut model = Model::new();
        let x = model.add_continuous("x", 0.0, 10.0).unwrap();
        let y = model.add_continuous("y", 0.0, f64::INFINITY).unwrap();
        model.add_constraint(x + y, ConstraintOp::Le, 4.0).unwrap();

        assert_eq!(first_violation(&model, &[1.0, 3.0]), None);
        assert_eq!(first_violation(&model, &[4.0 + 1e-9, 0.0]), None);
        assert_eq!(
            first_violation(&model, &[11.0, 0.0]),
            Some("x = 11 is outside its bounds".to_string())
        );
        assert_eq!(
            first_violation(&model, &[2.0, 3.0]),
            Some("constraint c1 (<= 4) is violated".to_string())
        );
        assert!(first_violation(&model, &[f64::NAN, 0.0]).is_some());
    }

    #[test]
    #[traced_test]
    fn test_invalid_tolerance_is_ignored() {
        let solver = SimplexSolver::new().with_tolerance(1e-7);
        assert_eq!(solver.tolerance(), 1e-7);
        for bad in [-1e-6, 0.0, f64::NAN, f64::INFINITY] {
            assert_eq!(solver.clone().with_tolerance(bad).tolerance(), 1e-7);
        }
        assert!(logs_contain("ignoring invalid tolerance"));
    }
}
