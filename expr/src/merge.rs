//! Lambda composition.
//!
//! `merge(f, g)` builds `x => g(f(x))` by substituting `f`'s body for every
//! reference to `g`'s parameter. Member reads on a freshly constructed
//! record resolve straight to the constructor argument, so chains of
//! record-building projections stay one level deep.

use std::collections::HashMap;

use tracing::debug;

use crate::fold::fold;
use crate::{
    BinaryOp, Expr, ExprError, ExprKind, ExprResult, Lambda, MemberBinding, Parameter, UnaryOp,
};

/// Compose `f: A -> B` with `g: B -> C` into `A -> C`.
pub fn merge(f: &Lambda, g: &Lambda) -> ExprResult<Lambda> {
    let produced = f.return_type();
    if *g.param_type() != produced {
        return Err(ExprError::type_mismatch(
            g.param_type().name(),
            produced.name(),
        ));
    }
    if is_identity(g) {
        return Ok(f.clone());
    }

    let body = Substitution::new(g.param(), f.body().clone()).apply(g.body())?;
    let merged = Lambda::new(f.param().clone(), fold(&body));
    debug!(first = %f, second = %g, merged = %merged, "merged lambdas");
    Ok(merged)
}

/// AND two predicates over the same element type into one, aligning the
/// second predicate's parameter with the first.
pub fn conjoin(first: &Lambda, second: &Lambda) -> ExprResult<Lambda> {
    let aligned = rebind(second, first.param())?;
    let body = Expr::binary(BinaryOp::AndAlso, first.body().clone(), aligned.body().clone())?;
    Ok(Lambda::new(first.param().clone(), fold(&body)))
}

/// Re-express `lambda` over `param`. Returns the same lambda when it
/// already uses that parameter.
pub fn rebind(lambda: &Lambda, param: &Parameter) -> ExprResult<Lambda> {
    if lambda.param() == param {
        return Ok(lambda.clone());
    }
    if lambda.param_type() != param.ty() {
        return Err(ExprError::type_mismatch(
            param.ty().name(),
            lambda.param_type().name(),
        ));
    }
    let body = Substitution::new(lambda.param(), param.to_expr()).apply(lambda.body())?;
    Ok(Lambda::new(param.clone(), body))
}

/// Logical negation of a predicate. `!x` negates to `x`.
pub fn negate(predicate: &Lambda) -> ExprResult<Lambda> {
    Ok(Lambda::new(
        predicate.param().clone(),
        negate_expr(predicate.body())?,
    ))
}

/// Logical negation of a boolean expression. `!x` negates to `x`.
pub fn negate_expr(expr: &Expr) -> ExprResult<Expr> {
    match expr.kind() {
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
            ..
        } => Ok(operand.clone()),
        _ => Expr::unary(UnaryOp::Not, expr.clone()),
    }
}

/// True only for `x => x`.
pub fn is_identity(lambda: &Lambda) -> bool {
    matches!(lambda.body().kind(), ExprKind::Parameter(p) if p == lambda.param())
}

/// Parameter substitution. Built fresh for every call, so nested merges
/// never share state.
struct Substitution {
    replacements: HashMap<u64, Expr>,
}

impl Substitution {
    fn new(param: &Parameter, replacement: Expr) -> Self {
        let mut replacements = HashMap::new();
        replacements.insert(param.id(), replacement);
        Self { replacements }
    }

    fn apply(&self, expr: &Expr) -> ExprResult<Expr> {
        match expr.kind() {
            ExprKind::Constant { .. } => Ok(expr.clone()),
            ExprKind::Parameter(p) => Ok(self
                .replacements
                .get(&p.id())
                .cloned()
                .unwrap_or_else(|| expr.clone())),
            ExprKind::Member { target, member, .. } => {
                let new_target = self.apply(target)?;
                if let ExprKind::Construct {
                    record,
                    args,
                    bindings,
                } = new_target.kind()
                {
                    return read_constructed(record, args, bindings, member);
                }
                if new_target.ptr_eq(target) {
                    Ok(expr.clone())
                } else {
                    Expr::member(new_target, member.clone())
                }
            }
            ExprKind::Unary { op, operand, .. } => {
                let new_operand = self.apply(operand)?;
                if new_operand.ptr_eq(operand) {
                    Ok(expr.clone())
                } else {
                    Expr::unary(op.clone(), new_operand)
                }
            }
            ExprKind::Binary {
                op, left, right, ..
            } => {
                let new_left = self.apply(left)?;
                let new_right = self.apply(right)?;
                if new_left.ptr_eq(left) && new_right.ptr_eq(right) {
                    Ok(expr.clone())
                } else {
                    Expr::binary(*op, new_left, new_right)
                }
            }
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => {
                let new_test = self.apply(test)?;
                let new_true = self.apply(if_true)?;
                let new_false = self.apply(if_false)?;
                if new_test.ptr_eq(test) && new_true.ptr_eq(if_true) && new_false.ptr_eq(if_false)
                {
                    Ok(expr.clone())
                } else {
                    Expr::conditional(new_test, new_true, new_false)
                }
            }
            ExprKind::Call {
                target,
                method,
                args,
                ..
            } => {
                let new_target = target.as_ref().map(|t| self.apply(t)).transpose()?;
                let new_args = self.apply_all(args)?;
                let target_same = match (&new_target, target) {
                    (Some(n), Some(o)) => n.ptr_eq(o),
                    _ => true,
                };
                if target_same && all_same(&new_args, args) {
                    Ok(expr.clone())
                } else {
                    Expr::call(new_target, *method, new_args)
                }
            }
            ExprKind::Construct {
                record,
                args,
                bindings,
            } => {
                let new_args = self.apply_all(args)?;
                let new_bindings = bindings
                    .iter()
                    .map(|b| Ok(MemberBinding::new(b.member.clone(), self.apply(&b.value)?)))
                    .collect::<ExprResult<Vec<_>>>()?;
                let bindings_same = new_bindings
                    .iter()
                    .zip(bindings)
                    .all(|(n, o)| n.value.ptr_eq(&o.value));
                if all_same(&new_args, args) && bindings_same {
                    Ok(expr.clone())
                } else {
                    Expr::construct(record.clone(), new_args, new_bindings)
                }
            }
        }
    }

    fn apply_all(&self, exprs: &[Expr]) -> ExprResult<Vec<Expr>> {
        exprs.iter().map(|e| self.apply(e)).collect()
    }
}

fn all_same(new: &[Expr], old: &[Expr]) -> bool {
    new.iter().zip(old).all(|(n, o)| n.ptr_eq(o))
}

/// `new R(..).member` resolves to the expression that initializes `member`,
/// or the field's zero value when nothing does.
fn read_constructed(
    record: &std::sync::Arc<sieve_core::RecordType>,
    args: &[Expr],
    bindings: &[MemberBinding],
    member: &str,
) -> ExprResult<Expr> {
    let index = record
        .field_index(member)
        .ok_or_else(|| ExprError::unknown_member(member, record.name()))?;
    let field_ty = &record.fields()[index].ty;

    let init = match args.get(index) {
        Some(arg) => arg.clone(),
        None => match bindings.iter().find(|b| b.member == member) {
            Some(binding) => binding.value.clone(),
            None => return Expr::typed_constant(field_ty.zero_value(), field_ty.clone()),
        },
    };

    // An untyped `null` initializer takes the field's type.
    match init.as_constant() {
        Some(value) if init.ty() != *field_ty => {
            Expr::typed_constant(value.clone(), field_ty.clone())
        }
        _ => Ok(init),
    }
}
