use std::fmt::{self, Write};

use crate::expr::LinearExpr;
use crate::model::{Model, Variable};

/// Format a number the way listings print it: shortest round-trip form, no `-0`.
pub fn format_number(value: f64) -> String {
    format!("{}", value + 0.0)
}

impl Model {
    /// Deterministic text listing of the model: objective, constraints in
    /// insertion order, one bound line per variable in declaration order,
    /// then integer variables if any.
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn write_expr(&self, f: &mut impl Write, expr: &LinearExpr) -> fmt::Result {
        let mut first = true;
        for (var, coef) in expr.terms() {
            if coef == 0.0 {
                continue;
            }
            let name = self.variable(var).map_or("?", |v| v.name.as_str());
            let magnitude = coef.abs();
            match (first, coef < 0.0) {
                (true, false) => {}
                (true, true) => f.write_char('-')?,
                (false, false) => f.write_str(" + ")?,
                (false, true) => f.write_str(" - ")?,
            }
            if magnitude != 1.0 {
                write!(f, "{} ", format_number(magnitude))?;
            }
            f.write_str(name)?;
            first = false;
        }

        let constant = expr.constant_term();
        if first {
            f.write_str(&format_number(constant))
        } else if constant > 0.0 {
            write!(f, " + {}", format_number(constant))
        } else if constant < 0.0 {
            write!(f, " - {}", format_number(-constant))
        } else {
            Ok(())
        }
    }
}

fn write_bound(f: &mut impl Write, variable: &Variable) -> fmt::Result {
    let name = &variable.name;
    let lower = variable.lower.is_finite().then_some(variable.lower);
    let upper = variable.upper.is_finite().then_some(variable.upper);
    match (lower, upper) {
        (Some(lo), Some(hi)) if lo == hi => write!(f, "{} = {}", name, format_number(lo)),
        (Some(lo), Some(hi)) => write!(f, "{} <= {} <= {}", format_number(lo), name, format_number(hi)),
        (Some(lo), None) => write!(f, "{} >= {}", name, format_number(lo)),
        (None, Some(hi)) => write!(f, "{} <= {}", name, format_number(hi)),
        (None, None) => write!(f, "{} free", name),
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let objective = self.objective();
        write!(f, "{} ", objective.sense.keyword())?;
        self.write_expr(f, &objective.expr)?;
        writeln!(f)?;

        writeln!(f, "subject to")?;
        for constraint in self.constraints() {
            f.write_str("  ")?;
            self.write_expr(f, constraint.expr())?;
            writeln!(f, " {} {}", constraint.op(), format_number(constraint.rhs()))?;
        }

        writeln!(f, "bounds")?;
        for variable in self.variables() {
            f.write_str("  ")?;
            write_bound(f, variable)?;
            writeln!(f)?;
        }

        if self.has_integer_variables() {
            writeln!(f, "integer")?;
            for variable in self.variables().iter().filter(|v| v.is_integer()) {
                writeln!(f, "  {}", variable.name)?;
            }
        }
        Ok(())
    }
}
