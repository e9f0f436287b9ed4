//! Partial evaluation.
//!
//! [`fold`] replaces every closed, pure subtree with the constant it
//! evaluates to. A subtree whose evaluation fails (overflow in a checked
//! operator, division by zero, a null reference) is left as written:
//! folding only ever simplifies, it never raises.
//!
//! Before evaluating, each node goes through [`combine_operators`]-style
//! re-association so that `c1 + (x + c2)` becomes `x + (c1 + c2)`, which
//! lets repeated query rewrites collapse chained constant arithmetic.

use tracing::trace;

use crate::eval::eval_binary_values;
use crate::{BinaryOp, Bindings, Evaluator, Expr, ExprKind, Lambda, MemberBinding};

/// Fold constant subtrees bottom-up.
pub fn fold(expr: &Expr) -> Expr {
    let rebuilt = map_children(expr, &mut |child| fold(child));
    let simplified = simplify(&rebuilt).unwrap_or(rebuilt);
    try_evaluate(&simplified).unwrap_or(simplified)
}

/// Fold a lambda body. Returns the same lambda when nothing changed.
pub fn fold_lambda(lambda: &Lambda) -> Lambda {
    let body = fold(lambda.body());
    if body.ptr_eq(lambda.body()) {
        lambda.clone()
    } else {
        Lambda::new(lambda.param().clone(), body)
    }
}

/// Re-associate chains of add/multiply around constants, without folding
/// anything else.
pub fn combine_operators(expr: &Expr) -> Expr {
    let rebuilt = map_children(expr, &mut |child| combine_operators(child));
    match rebuilt.kind() {
        ExprKind::Binary {
            op, left, right, ..
        } if op.is_associative() => combine(*op, left, right).unwrap_or(rebuilt),
        _ => rebuilt,
    }
}

/// Whether a node can be replaced by its value: every operand is already
/// a constant and evaluating it has no observable effect.
fn is_foldable(expr: &Expr) -> bool {
    match expr.kind() {
        ExprKind::Constant { .. } | ExprKind::Parameter(_) | ExprKind::Construct { .. } => false,
        ExprKind::Member { target, .. } => target.is_constant(),
        ExprKind::Unary { operand, .. } => operand.is_constant(),
        ExprKind::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
            ..
        } => test.is_constant() && if_true.is_constant() && if_false.is_constant(),
        ExprKind::Call {
            target,
            method,
            args,
            ..
        } => {
            method.is_pure()
                && target.as_ref().map_or(true, Expr::is_constant)
                && args.iter().all(Expr::is_constant)
        }
    }
}

fn try_evaluate(expr: &Expr) -> Option<Expr> {
    if !is_foldable(expr) {
        return None;
    }
    match Evaluator::new().eval(expr, &Bindings::new()) {
        Ok(value) => Some(Expr::from_kind(ExprKind::Constant {
            value,
            ty: expr.ty(),
        })),
        Err(e) => {
            trace!(expr = %expr, error = %e, "fold abandoned");
            None
        }
    }
}

/// Local rewrites applied before evaluation.
fn simplify(expr: &Expr) -> Option<Expr> {
    let ExprKind::Binary {
        op, left, right, ..
    } = expr.kind()
    else {
        return None;
    };
    match op {
        op if op.is_associative() => combine(*op, left, right),
        BinaryOp::AndAlso => match (left.as_constant(), right.as_constant()) {
            (Some(l), _) if l.as_bool() == Some(true) => Some(right.clone()),
            (Some(l), _) if l.as_bool() == Some(false) => Some(left.clone()),
            (_, Some(r)) if r.as_bool() == Some(true) => Some(left.clone()),
            _ => None,
        },
        BinaryOp::OrElse => match (left.as_constant(), right.as_constant()) {
            (Some(l), _) if l.as_bool() == Some(true) => Some(left.clone()),
            (Some(l), _) if l.as_bool() == Some(false) => Some(right.clone()),
            (_, Some(r)) if r.as_bool() == Some(false) => Some(left.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Try both associations of `left op right`.
fn combine(op: BinaryOp, left: &Expr, right: &Expr) -> Option<Expr> {
    try_combine(op, left, right).or_else(|| try_combine(op, right, left))
}

/// `c op (x op d)` or `c op (d op x)` becomes `x op (c op d)`.
fn try_combine(op: BinaryOp, constant: &Expr, other: &Expr) -> Option<Expr> {
    let c = constant.as_constant()?;
    if !c.is_numeric() {
        return None;
    }
    let ExprKind::Binary {
        op: inner_op,
        left,
        right,
        ..
    } = other.kind()
    else {
        return None;
    };
    if *inner_op != op {
        return None;
    }
    let (d, rest) = match (left.as_constant(), right.as_constant()) {
        (Some(d), _) => (d, right),
        (_, Some(d)) => (d, left),
        _ => return None,
    };
    // A checked combination that overflows is left for evaluation time.
    let combined = eval_binary_values(op, c, d).ok()?;
    Expr::binary(op, rest.clone(), Expr::constant(combined)).ok()
}

/// Rebuild `expr` with `f` applied to each direct child. Returns the same
/// allocation when no child changed.
pub(crate) fn map_children(expr: &Expr, f: &mut impl FnMut(&Expr) -> Expr) -> Expr {
    let kind = match expr.kind() {
        ExprKind::Constant { .. } | ExprKind::Parameter(_) => return expr.clone(),
        ExprKind::Member { target, member, ty } => {
            let new_target = f(target);
            if new_target.ptr_eq(target) {
                return expr.clone();
            }
            ExprKind::Member {
                target: new_target,
                member: member.clone(),
                ty: ty.clone(),
            }
        }
        ExprKind::Unary { op, operand, ty } => {
            let new_operand = f(operand);
            if new_operand.ptr_eq(operand) {
                return expr.clone();
            }
            ExprKind::Unary {
                op: op.clone(),
                operand: new_operand,
                ty: ty.clone(),
            }
        }
        ExprKind::Binary {
            op,
            left,
            right,
            ty,
        } => {
            let new_left = f(left);
            let new_right = f(right);
            if new_left.ptr_eq(left) && new_right.ptr_eq(right) {
                return expr.clone();
            }
            ExprKind::Binary {
                op: *op,
                left: new_left,
                right: new_right,
                ty: ty.clone(),
            }
        }
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
            ty,
        } => {
            let new_test = f(test);
            let new_true = f(if_true);
            let new_false = f(if_false);
            if new_test.ptr_eq(test) && new_true.ptr_eq(if_true) && new_false.ptr_eq(if_false) {
                return expr.clone();
            }
            ExprKind::Conditional {
                test: new_test,
                if_true: new_true,
                if_false: new_false,
                ty: ty.clone(),
            }
        }
        ExprKind::Call {
            target,
            method,
            args,
            ty,
        } => {
            let new_target = target.as_ref().map(|t| f(t));
            let new_args: Vec<Expr> = args.iter().map(|a| f(a)).collect();
            let target_same = match (&new_target, target) {
                (Some(n), Some(o)) => n.ptr_eq(o),
                _ => true,
            };
            if target_same && new_args.iter().zip(args).all(|(n, o)| n.ptr_eq(o)) {
                return expr.clone();
            }
            ExprKind::Call {
                target: new_target,
                method: *method,
                args: new_args,
                ty: ty.clone(),
            }
        }
        ExprKind::Construct {
            record,
            args,
            bindings,
        } => {
            let new_args: Vec<Expr> = args.iter().map(|a| f(a)).collect();
            let new_bindings: Vec<MemberBinding> = bindings
                .iter()
                .map(|b| MemberBinding::new(b.member.clone(), f(&b.value)))
                .collect();
            let unchanged = new_args.iter().zip(args).all(|(n, o)| n.ptr_eq(o))
                && new_bindings
                    .iter()
                    .zip(bindings)
                    .all(|(n, o)| n.value.ptr_eq(&o.value));
            if unchanged {
                return expr.clone();
            }
            ExprKind::Construct {
                record: record.clone(),
                args: new_args,
                bindings: new_bindings,
            }
        }
    };
    Expr::from_kind(kind)
}
