//! Immutable model description: variables, domains, actions, property.

use crate::{ModelError, ModelResult};
use corral_expr::Expr;

/// Action identifier: the index of the action in the model.
pub type ActionLabel = usize;

/// A state variable with an inclusive integer domain.
/// Index 0 is the location discriminator by convention.
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub lower: i64,
    pub upper: i64,
}

impl VarDecl {
    /// Number of values in the domain.
    pub fn width(&self) -> u64 {
        (self.upper - self.lower + 1) as u64
    }
}

/// One probabilistic branch of an action: relative weight plus the
/// variable assignments applied when the branch fires. Unassigned
/// variables keep their value.
#[derive(Debug, Clone)]
pub struct UpdateOp {
    pub weight: u32,
    pub assigns: Vec<(usize, Expr)>,
}

/// A guarded action with one or more weighted update operations.
#[derive(Debug, Clone)]
pub struct ActionDecl {
    pub name: String,
    pub guard: Expr,
    pub updates: Vec<UpdateOp>,
    /// Whether the policy chooses this action (vs. pure non-determinism).
    pub learned: bool,
}

/// The safety property: declared start predicate and unsafety predicate.
#[derive(Debug, Clone)]
pub struct Property {
    pub start: Expr,
    pub unsafety: Expr,
}

/// An immutable transition model over integer state variables.
#[derive(Debug)]
pub struct Model {
    pub name: String,
    vars: Vec<VarDecl>,
    actions: Vec<ActionDecl>,
    property: Property,
}

impl Model {
    pub fn new(
        name: String,
        vars: Vec<VarDecl>,
        actions: Vec<ActionDecl>,
        property: Property,
    ) -> ModelResult<Self> {
        if vars.is_empty() {
            return Err(ModelError::NoVariables);
        }
        for var in &vars {
            if var.lower > var.upper {
                return Err(ModelError::EmptyDomain {
                    name: var.name.clone(),
                    lb: var.lower,
                    ub: var.upper,
                });
            }
        }
        for action in &actions {
            if action.updates.is_empty() {
                return Err(ModelError::BadAction {
                    name: action.name.clone(),
                    message: "no update operations".into(),
                });
            }
            if action.updates.iter().all(|u| u.weight == 0) {
                return Err(ModelError::BadAction {
                    name: action.name.clone(),
                    message: "all update weights are zero".into(),
                });
            }
            check_var_refs(&action.guard, vars.len())?;
            for update in &action.updates {
                for (idx, expr) in &update.assigns {
                    if *idx >= vars.len() {
                        return Err(ModelError::VarOutOfRange {
                            index: *idx,
                            count: vars.len(),
                        });
                    }
                    check_var_refs(expr, vars.len())?;
                }
            }
        }
        check_var_refs(&property.start, vars.len())?;
        check_var_refs(&property.unsafety, vars.len())?;
        Ok(Model {
            name,
            vars,
            actions,
            property,
        })
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn var(&self, idx: usize) -> &VarDecl {
        &self.vars[idx]
    }

    pub fn vars(&self) -> &[VarDecl] {
        &self.vars
    }

    /// Variable-reference expression for a variable index.
    pub fn var_expr(&self, idx: usize) -> Expr {
        debug_assert!(idx < self.vars.len());
        Expr::Var(idx)
    }

    pub fn num_actions(&self) -> usize {
        self.actions.len()
    }

    pub fn action(&self, label: ActionLabel) -> &ActionDecl {
        &self.actions[label]
    }

    pub fn actions(&self) -> &[ActionDecl] {
        &self.actions
    }

    /// Whether the action with this label is chosen by the policy.
    pub fn is_learned(&self, label: ActionLabel) -> bool {
        self.actions[label].learned
    }

    /// Labels of policy-chosen actions, in ascending order. This is
    /// the output order of a network policy.
    pub fn learned_labels(&self) -> Vec<ActionLabel> {
        (0..self.actions.len())
            .filter(|&l| self.actions[l].learned)
            .collect()
    }

    /// Whether any action is policy-chosen.
    pub fn has_learned_actions(&self) -> bool {
        self.actions.iter().any(|a| a.learned)
    }

    pub fn property(&self) -> &Property {
        &self.property
    }

    /// Whether every variable of a state vector is inside its domain.
    pub fn in_domain(&self, values: &[i64]) -> bool {
        values.len() == self.vars.len()
            && self
                .vars
                .iter()
                .zip(values)
                .all(|(v, &x)| x >= v.lower && x <= v.upper)
    }

    /// Data-variable indices (everything but the location discriminator).
    pub fn data_indices(&self) -> std::ops::Range<usize> {
        1..self.vars.len()
    }
}

fn check_var_refs(expr: &Expr, count: usize) -> ModelResult<()> {
    match expr.max_var() {
        Some(idx) if idx >= count => Err(ModelError::VarOutOfRange { index: idx, count }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_expr::Expr;

    fn tiny_model() -> Model {
        Model::new(
            "tiny".into(),
            vec![
                VarDecl {
                    name: "loc".into(),
                    lower: 0,
                    upper: 0,
                },
                VarDecl {
                    name: "x".into(),
                    lower: 0,
                    upper: 10,
                },
            ],
            vec![ActionDecl {
                name: "inc".into(),
                guard: Expr::binary(corral_expr::BinOp::Lt, Expr::Var(1), Expr::Int(10)),
                updates: vec![UpdateOp {
                    weight: 1,
                    assigns: vec![(
                        1,
                        Expr::binary(corral_expr::BinOp::Add, Expr::Var(1), Expr::Int(1)),
                    )],
                }],
                learned: true,
            }],
            Property {
                start: Expr::truth(),
                unsafety: Expr::eq(Expr::Var(1), Expr::Int(5)),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_model_accessors() {
        let m = tiny_model();
        assert_eq!(m.num_vars(), 2);
        assert_eq!(m.var(1).width(), 11);
        assert!(m.is_learned(0));
        assert_eq!(m.learned_labels(), vec![0]);
        assert!(m.in_domain(&[0, 10]));
        assert!(!m.in_domain(&[0, 11]));
        assert_eq!(m.data_indices().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_rejects_out_of_range_reference() {
        let err = Model::new(
            "bad".into(),
            vec![VarDecl {
                name: "loc".into(),
                lower: 0,
                upper: 0,
            }],
            vec![],
            Property {
                start: Expr::eq(Expr::Var(3), Expr::Int(0)),
                unsafety: Expr::falsity(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::VarOutOfRange { index: 3, .. }));
    }

    #[test]
    fn test_rejects_weightless_action() {
        let err = Model::new(
            "bad".into(),
            vec![VarDecl {
                name: "loc".into(),
                lower: 0,
                upper: 0,
            }],
            vec![ActionDecl {
                name: "noop".into(),
                guard: Expr::truth(),
                updates: vec![UpdateOp {
                    weight: 0,
                    assigns: vec![],
                }],
                learned: false,
            }],
            Property {
                start: Expr::truth(),
                unsafety: Expr::falsity(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::BadAction { .. }));
    }
}
