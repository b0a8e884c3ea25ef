use std::collections::HashSet;

use linprog_model::{Domain, LinearExpr, Model, ModelError, Sense, Var};
use thiserror::Error;
use tracing::debug;

use crate::ast::*;
use crate::lexer::Span;
use crate::parser::{ParseError, Parser};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Undeclared variable {name} at position {span:?}: give it a line in the bounds section")]
    UndeclaredVariable { name: String, span: Span },
    #[error("Invalid model at position {span:?}: {source}")]
    Model {
        span: Span,
        #[source]
        source: ModelError,
    },
}

/// Builds a [`Model`] from a parsed listing.
///
/// Variables are declared in bounds-section order, so a listing produced by
/// [`Model::render`] loads back into a model that renders identically, as
/// long as every variable name is a listing identifier: a letter or `_`
/// followed by letters, digits, `_`, `.`, `[` or `]`, and not a keyword
/// (`min`, `max`, `subject`, `to`, `bounds`, `integer`, `free`, `inf`, ...).
pub struct Loader<'a> {
    file: &'a ModelFile,
    model: Model,
}

impl<'a> Loader<'a> {
    pub fn new(file: &'a ModelFile) -> Self {
        Self {
            file,
            model: Model::new(),
        }
    }

    /// Parse and load a listing in one step
    pub fn load_str(source: &str) -> Result<Model, LoadError> {
        let file = Parser::parse(source)?;
        Loader::new(&file).load()
    }

    pub fn load(mut self) -> Result<Model, LoadError> {
        let integers: HashSet<&str> = self.file.integers.iter().map(|i| i.name.as_str()).collect();

        for bound in &self.file.bounds {
            let domain = if integers.contains(bound.name.name.as_str()) {
                Domain::Integer
            } else {
                Domain::Continuous
            };
            self.model
                .add_variable(
                    bound.name.name.clone(),
                    bound.lower.unwrap_or(f64::NEG_INFINITY),
                    bound.upper.unwrap_or(f64::INFINITY),
                    domain,
                )
                .map_err(|source| LoadError::Model {
                    span: bound.span,
                    source,
                })?;
        }

        for ident in &self.file.integers {
            self.lookup(ident)?;
        }

        if let Some(objective) = &self.file.objective {
            let expr = self.linear_expr(&objective.expr)?;
            self.model
                .set_objective(expr, objective.sense)
                .map_err(|source| LoadError::Model {
                    span: objective.span,
                    source,
                })?;
        } else {
            debug!("listing has no objective, keeping {} 0", Sense::default().keyword());
        }

        for constraint in &self.file.constraints {
            let expr = self.linear_expr(&constraint.lhs)? - self.linear_expr(&constraint.rhs)?;
            self.model
                .add_constraint(expr, constraint.op, 0.0)
                .map_err(|source| LoadError::Model {
                    span: constraint.span,
                    source,
                })?;
        }

        debug!(
            variables = self.model.num_variables(),
            constraints = self.model.num_constraints(),
            "loaded model"
        );
        Ok(self.model)
    }

    fn lookup(&self, ident: &Ident) -> Result<Var, LoadError> {
        self.model
            .variable_by_name(&ident.name)
            .ok_or_else(|| LoadError::UndeclaredVariable {
                name: ident.name.clone(),
                span: ident.span,
            })
    }

    fn linear_expr(&self, expr: &Expr) -> Result<LinearExpr, LoadError> {
        let mut linear = LinearExpr::new();
        for term in &expr.terms {
            match term {
                Term::Variable { coefficient, name } => linear.add_term(self.lookup(name)?, *coefficient),
                Term::Constant(value) => linear.add_constant(*value),
            }
        }
        Ok(linear)
    }
}
