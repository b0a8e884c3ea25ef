use linprog_model::{ConstraintOp, Sense};

use crate::lexer::Span;

/// A parsed model listing
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFile {
    pub objective: Option<ObjectiveDecl>,
    pub constraints: Vec<ConstraintDecl>,
    pub bounds: Vec<BoundDecl>,
    pub integers: Vec<Ident>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub span: Span,
    pub name: String,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveDecl {
    pub span: Span,
    pub sense: Sense,
    pub expr: Expr,
}

/// `lhs op rhs`; either side may mention variables
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDecl {
    pub span: Span,
    pub lhs: Expr,
    pub op: ConstraintOp,
    pub rhs: Expr,
}

/// One line of the bounds section. `None` means unbounded on that side.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BoundDecl {
    pub span: Span,
    pub name: Ident,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// A flat sum of signed terms
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub terms: Vec<Term>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Variable { coefficient: f64, name: Ident },
    Constant(f64),
}
