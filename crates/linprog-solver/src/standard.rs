use linprog_model::{ConstraintOp, LinearExpr, Model, Sense};

/// How a model variable is expressed through non-negative columns
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ColumnMap {
    /// `x = offset + col`
    Shifted { col: usize, offset: f64 },
    /// `x = offset - col`
    Mirrored { col: usize, offset: f64 },
    /// `x = pos - neg`
    Split { pos: usize, neg: usize },
}

impl ColumnMap {
    fn value(&self, columns: &[f64]) -> f64 {
        match *self {
            ColumnMap::Shifted { col, offset } => offset + columns[col],
            ColumnMap::Mirrored { col, offset } => offset - columns[col],
            ColumnMap::Split { pos, neg } => columns[pos] - columns[neg],
        }
    }
}

/// One row `coefficients . columns op rhs`, with `rhs >= 0`
#[derive(Debug, Clone)]
pub(crate) struct Row {
    /// Label used in diagnostics
    pub name: String,
    pub coefficients: Vec<f64>,
    pub op: ConstraintOp,
    pub rhs: f64,
}

/// A model rewritten over non-negative columns
#[derive(Debug, Clone)]
pub(crate) struct StandardProblem {
    pub num_columns: usize,
    /// Objective coefficients per column
    pub objective: Vec<f64>,
    pub maximize: bool,
    pub rows: Vec<Row>,
    mapping: Vec<ColumnMap>,
}

/// Bounds at or beyond this magnitude are never used as column offsets: they
/// are kept as explicit rows, so values near zero survive the substitution
const LARGE_BOUND: f64 = 1e15;

fn offset_candidate(bound: f64) -> Option<f64> {
    (bound.abs() < LARGE_BOUND).then_some(bound)
}

impl StandardProblem {
    pub fn from_model(model: &Model) -> Self {
        let mut num_columns = 0;
        let mut next_column = || {
            num_columns += 1;
            num_columns - 1
        };

        let mut mapping = Vec::with_capacity(model.num_variables());
        let mut bound_rows = Vec::new();
        for (var, variable) in model.vars().zip(model.variables()) {
            let lower = variable.lower.is_finite().then_some(variable.lower);
            let upper = variable.upper.is_finite().then_some(variable.upper);
            let lower_row = lower.map(|lo| (format!("{}.lower", variable.name), var, ConstraintOp::Ge, lo));
            let upper_row = upper.map(|hi| (format!("{}.upper", variable.name), var, ConstraintOp::Le, hi));

            // Offset by the finite bound closest to zero; the other bound
            // becomes a row
            let map = match (lower.and_then(offset_candidate), upper.and_then(offset_candidate)) {
                (Some(lo), Some(hi)) if hi.abs() < lo.abs() => {
                    bound_rows.extend(lower_row);
                    ColumnMap::Mirrored {
                        col: next_column(),
                        offset: hi,
                    }
                }
                (Some(lo), _) => {
                    bound_rows.extend(upper_row);
                    ColumnMap::Shifted {
                        col: next_column(),
                        offset: lo,
                    }
                }
                (None, Some(hi)) => {
                    bound_rows.extend(lower_row);
                    ColumnMap::Mirrored {
                        col: next_column(),
                        offset: hi,
                    }
                }
                (None, None) => {
                    bound_rows.extend(lower_row.into_iter().chain(upper_row));
                    ColumnMap::Split {
                        pos: next_column(),
                        neg: next_column(),
                    }
                }
            };
            mapping.push(map);
        }

        let mut problem = Self {
            num_columns,
            objective: Vec::new(),
            maximize: model.objective().sense == Sense::Maximize,
            rows: Vec::with_capacity(model.num_constraints() + bound_rows.len()),
            mapping,
        };

        let (objective, _) = problem.substitute(&model.objective().expr);
        problem.objective = objective;

        for (i, constraint) in model.constraints().iter().enumerate() {
            let (coefficients, offset) = problem.substitute(constraint.expr());
            problem.push_row(format!("c{}", i + 1), coefficients, constraint.op(), constraint.rhs() - offset);
        }
        for (name, var, op, bound) in bound_rows {
            let (coefficients, offset) = problem.substitute(&LinearExpr::from(var));
            problem.push_row(name, coefficients, op, bound - offset);
        }

        problem
    }

    /// Rewrite `expr` over columns. Returns the column coefficients and the
    /// constant picked up from variable offsets and the expression itself.
    fn substitute(&self, expr: &LinearExpr) -> (Vec<f64>, f64) {
        let mut coefficients = vec![0.0; self.num_columns];
        let mut constant = expr.constant_term();
        for (var, coef) in expr.terms() {
            match self.mapping[var.index()] {
                ColumnMap::Shifted { col, offset } => {
                    coefficients[col] += coef;
                    constant += coef * offset;
                }
                ColumnMap::Mirrored { col, offset } => {
                    coefficients[col] -= coef;
                    constant += coef * offset;
                }
                ColumnMap::Split { pos, neg } => {
                    coefficients[pos] += coef;
                    coefficients[neg] -= coef;
                }
            }
        }
        (coefficients, constant)
    }

    fn push_row(&mut self, name: String, mut coefficients: Vec<f64>, mut op: ConstraintOp, mut rhs: f64) {
        if rhs < 0.0 {
            coefficients.iter_mut().for_each(|c| *c = -*c);
            rhs = -rhs;
            op = op.flipped();
        }
        self.rows.push(Row {
            name,
            coefficients,
            op,
            rhs,
        });
    }

    /// Map column values back to one value per model variable
    pub fn variable_values(&self, columns: &[f64]) -> Vec<f64> {
        self.mapping.iter().map(|map| map.value(columns)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_variable_gets_shift_and_upper_row() {
        let mut model = Model::new();
        let x = model.add_continuous("x", 2.0, 5.0).unwrap();
        model.add_constraint(3.0 * x, ConstraintOp::Le, 12.0).unwrap();
        let problem = StandardProblem::from_model(&model);

        assert_eq!(problem.num_columns, 1);
        assert_eq!(problem.rows.len(), 2);
        // 3 (2 + x') <= 12  =>  3 x' <= 6
        assert_eq!(problem.rows[0].coefficients, vec![3.0]);
        assert_eq!(problem.rows[0].rhs, 6.0);
        assert_eq!(problem.rows[1].name, "x.upper");
        assert_eq!(problem.rows[1].rhs, 3.0);
        assert_eq!(problem.variable_values(&[1.5]), vec![3.5]);
    }

    #[test]
    fn test_upper_only_and_free_variables() {
        let mut model = Model::new();
        let a = model.add_continuous("a", f64::NEG_INFINITY, 4.0).unwrap();
        let b = model.add_continuous("b", f64::NEG_INFINITY, f64::INFINITY).unwrap();
        model.add_constraint(a + 2.0 * b, ConstraintOp::Ge, 1.0).unwrap();
        let problem = StandardProblem::from_model(&model);

        assert_eq!(problem.num_columns, 3);
        // (4 - a') + 2 (b+ - b-) >= 1  =>  -a' + 2 b+ - 2 b- >= -3  =>  a' - 2 b+ + 2 b- <= 3
        let row = &problem.rows[0];
        assert_eq!(row.coefficients, vec![1.0, -2.0, 2.0]);
        assert_eq!(row.op, ConstraintOp::Le);
        assert_eq!(row.rhs, 3.0);
        assert_eq!(problem.variable_values(&[1.0, 0.5, 2.0]), vec![3.0, -1.5]);
    }

    #[test]
    fn test_offset_uses_bound_closest_to_zero() {
        let mut model = Model::new();
        model.add_continuous("x", -100.0, 1.0).unwrap();
        let problem = StandardProblem::from_model(&model);

        // x = 1 - x', x >= -100  =>  x' <= 101
        assert_eq!(problem.num_columns, 1);
        assert_eq!(problem.rows.len(), 1);
        assert_eq!(problem.rows[0].name, "x.lower");
        assert_eq!(problem.rows[0].op, ConstraintOp::Le);
        assert_eq!(problem.rows[0].rhs, 101.0);
        assert_eq!(problem.variable_values(&[1.5]), vec![-0.5]);
    }

    #[test]
    fn test_huge_bounds_become_rows() {
        let mut model = Model::new();
        let x = model.add_continuous("x", -1e20, 1e20).unwrap();
        model.add_constraint(x, ConstraintOp::Ge, 1.0).unwrap();
        let problem = StandardProblem::from_model(&model);

        // split into x+ - x-, both bounds kept as rows with their exact values
        assert_eq!(problem.num_columns, 2);
        assert_eq!(problem.rows[0].rhs, 1.0);
        let bounds: Vec<_> = problem.rows[1..]
            .iter()
            .map(|r| (r.name.as_str(), r.coefficients.clone(), r.op, r.rhs))
            .collect();
        assert_eq!(
            bounds,
            vec![
                ("x.lower", vec![-1.0, 1.0], ConstraintOp::Le, 1e20),
                ("x.upper", vec![1.0, -1.0], ConstraintOp::Le, 1e20),
            ]
        );
        assert_eq!(problem.variable_values(&[1.0, 0.0]), vec![1.0]);
    }

    #[test]
    fn test_negative_rhs_flips_row() {
        let mut model = Model::new();
        let x = model.add_continuous("x", 0.0, f64::INFINITY).unwrap();
        model.add_constraint(x, ConstraintOp::Ge, -2.0).unwrap();
        let problem = StandardProblem::from_model(&model);
        assert_eq!(problem.rows[0].coefficients, vec![-1.0]);
        assert_eq!(problem.rows[0].op, ConstraintOp::Le);
        assert_eq!(problem.rows[0].rhs, 2.0);
    }
}
