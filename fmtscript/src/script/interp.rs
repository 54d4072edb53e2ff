//! Script interpreter: evaluates compiled trees against one argument store.
//!
//! Evaluation recurses into nested nodes only; `and`/`or` operands and
//! conditional branches are flat lists walked in a loop.  Untaken branches
//! and the operands after a decided `and`/`or` are never evaluated.

use tracing::trace;

use super::compile::{Field, Node};
use super::field::{AccessStep, ArgKey, ArgRef};
use crate::error::{ErrorCode, FormatError, Result};
use crate::render::Render;
use crate::value::{ArgStore, Argument, Variable};

/// What one evaluation needs: the call's arguments and the renderer used
/// for nested fields.  Nothing survives between calls.
pub struct ExecContext<'r, 'a> {
    args: &'r ArgStore<'a>,
    renderer: &'r dyn Render,
}

impl<'r, 'a> ExecContext<'r, 'a> {
    pub fn new(args: &'r ArgStore<'a>, renderer: &'r dyn Render) -> Self {
        ExecContext { args, renderer }
    }

    /// Evaluate `node` to a script value.
    pub fn eval(&self, node: &Node) -> Result<Variable> {
        match node {
            Node::Literal(v) => Ok(v.clone()),
            Node::Argument(arg) => self.variable(arg),
            Node::Field(field) => match field.as_ref() {
                Field::Value { arg, spec: None } => self.variable(arg),
                other => {
                    let mut text = String::new();
                    self.render_field(other, &mut text)?;
                    Ok(Variable::from(text))
                }
            },
            Node::Not(inner) => Ok(Variable::Bool(!self.eval(inner)?.truthy())),
            Node::And(operands) => {
                for operand in operands {
                    if !self.eval(operand)?.truthy() {
                        return Ok(Variable::Bool(false));
                    }
                }
                Ok(Variable::Bool(true))
            }
            Node::Or(operands) => {
                for operand in operands {
                    if self.eval(operand)?.truthy() {
                        return Ok(Variable::Bool(true));
                    }
                }
                Ok(Variable::Bool(false))
            }
            Node::Compare {
                op,
                lhs,
                rhs,
                offset,
            } => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                let ord = l.compare(&r).map_err(|e| e.or_at(*offset))?;
                trace!(?op, lhs = %l, rhs = %r, "compare");
                Ok(Variable::Bool(op.holds(ord)))
            }
            Node::Conditional {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.truthy() {
                        return self.eval(body);
                    }
                }
                match otherwise {
                    Some(body) => self.eval(body),
                    None => Ok(Variable::default()),
                }
            }
        }
    }

    /// Append the rendered text of a compiled field to `out`.
    pub fn render_field(&self, field: &Field, out: &mut String) -> Result<()> {
        match field {
            Field::Value { arg, spec } => self.with_argument(arg, |value| {
                self.renderer.render(value, spec.as_ref(), out)
            }),
            Field::Script(node) => {
                let value = self.eval(node)?;
                out.push_str(&value.to_string());
                Ok(())
            }
        }
    }

    fn variable(&self, arg: &ArgRef) -> Result<Variable> {
        self.with_argument(arg, |value| value.as_variable().map_err(|e| e.or_at(arg.offset)))
    }

    /// Resolve the base argument, apply the access chain, and hand the final
    /// argument to `f`.
    pub fn with_argument<R>(
        &self,
        arg: &ArgRef,
        f: impl FnOnce(&Argument<'_>) -> Result<R>,
    ) -> Result<R> {
        let base = match &arg.key {
            ArgKey::Index(i) => self.args.get(*i).ok_or_else(|| {
                FormatError::new(
                    ErrorCode::InvalidIndex,
                    format!(
                        "argument {i} is out of range ({} positional arguments)",
                        self.args.len()
                    ),
                )
                .at(arg.offset)
            })?,
            ArgKey::Named(name) => self.args.get_named(name).ok_or_else(|| {
                FormatError::new(
                    ErrorCode::InvalidFieldName,
                    format!("no argument named '{name}'"),
                )
                .at(arg.offset)
            })?,
        };
        walk(base, &arg.steps, f)
    }
}

fn walk<R>(
    value: &Argument<'_>,
    steps: &[AccessStep],
    f: impl FnOnce(&Argument<'_>) -> Result<R>,
) -> Result<R> {
    match steps.split_first() {
        None => f(value),
        Some((step, rest)) => {
            let next = value.access(&step.access).map_err(|e| e.or_at(step.offset))?;
            walk(&next, rest, f)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
