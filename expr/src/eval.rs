//! Expression evaluation.

use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use sieve_core::{Record, RecordType, Value};

use crate::{
    BinaryOp, Bindings, Expr, ExprError, ExprKind, ExprResult, Lambda, MemberBinding, Method,
    UnaryOp,
};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Expression evaluator.
///
/// The evaluator is stateless; parameter values arrive through [`Bindings`]
/// on each call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    /// Create a new evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Apply a lambda to a single argument.
    pub fn apply(&self, lambda: &Lambda, arg: Value) -> ExprResult<Value> {
        let bindings = Bindings::single(lambda.param(), arg);
        self.eval(lambda.body(), &bindings)
    }

    /// Apply a predicate lambda to a single argument.
    pub fn test(&self, predicate: &Lambda, arg: Value) -> ExprResult<bool> {
        let bindings = Bindings::single(predicate.param(), arg);
        self.eval_bool(predicate.body(), &bindings)
    }

    /// Evaluate an expression with the given bindings.
    pub fn eval(&self, expr: &Expr, bindings: &Bindings) -> ExprResult<Value> {
        match expr.kind() {
            ExprKind::Constant { value, .. } => Ok(value.clone()),
            ExprKind::Parameter(param) => bindings
                .get(param)
                .cloned()
                .ok_or_else(|| ExprError::unbound_parameter(param.name())),
            ExprKind::Member { target, member, .. } => {
                self.eval_member(target, member, bindings)
            }
            ExprKind::Unary { op, operand, .. } => {
                let value = self.eval(operand, bindings)?;
                self.eval_unary_op(op, value)
            }
            ExprKind::Binary {
                op, left, right, ..
            } => self.eval_binary_op(*op, left, right, bindings),
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => {
                if self.eval_bool(test, bindings)? {
                    self.eval(if_true, bindings)
                } else {
                    self.eval(if_false, bindings)
                }
            }
            ExprKind::Call {
                target,
                method,
                args,
                ..
            } => {
                let target = match target {
                    Some(t) => Some(self.eval(t, bindings)?),
                    None => None,
                };
                let args = args
                    .iter()
                    .map(|a| self.eval(a, bindings))
                    .collect::<ExprResult<Vec<_>>>()?;
                self.eval_method(*method, target, &args)
            }
            ExprKind::Construct {
                record,
                args,
                bindings: members,
            } => self.eval_construct(record, args, members, bindings),
        }
    }

    /// Evaluate an expression that must produce a boolean.
    pub fn eval_bool(&self, expr: &Expr, bindings: &Bindings) -> ExprResult<bool> {
        let value = self.eval(expr, bindings)?;
        value
            .as_bool()
            .ok_or_else(|| ExprError::type_mismatch("Bool", value.type_name()))
    }

    fn eval_member(&self, target: &Expr, member: &str, bindings: &Bindings) -> ExprResult<Value> {
        match self.eval(target, bindings)? {
            Value::Record(record) => record
                .get(member)
                .cloned()
                .ok_or_else(|| ExprError::unknown_member(member, record.ty().name())),
            Value::Null => Err(ExprError::invalid_operation(format!(
                "null reference reading '{}'",
                member
            ))),
            other => Err(ExprError::unknown_member(member, other.type_name())),
        }
    }

    fn eval_construct(
        &self,
        record: &std::sync::Arc<RecordType>,
        args: &[Expr],
        members: &[MemberBinding],
        bindings: &Bindings,
    ) -> ExprResult<Value> {
        let mut values: Vec<Value> = record.fields().iter().map(|f| f.ty.zero_value()).collect();
        for (slot, arg) in values.iter_mut().zip(args) {
            *slot = self.eval(arg, bindings)?;
        }
        for binding in members {
            let index = record
                .field_index(&binding.member)
                .ok_or_else(|| ExprError::unknown_member(&binding.member, record.name()))?;
            values[index] = self.eval(&binding.value, bindings)?;
        }
        Ok(Value::Record(Record::new(record.clone(), values)?))
    }

    fn eval_unary_op(&self, op: &UnaryOp, value: Value) -> ExprResult<Value> {
        match (op, value) {
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Not, Value::Int32(i)) => Ok(Value::Int32(!i)),
            (UnaryOp::Not, Value::Int64(i)) => Ok(Value::Int64(!i)),
            (UnaryOp::Negate, Value::Int32(i)) => Ok(Value::Int32(i.wrapping_neg())),
            (UnaryOp::Negate, Value::Int64(i)) => Ok(Value::Int64(i.wrapping_neg())),
            (UnaryOp::NegateChecked, Value::Int32(i)) => i
                .checked_neg()
                .map(Value::Int32)
                .ok_or_else(|| ExprError::overflow("NegateChecked")),
            (UnaryOp::NegateChecked, Value::Int64(i)) => i
                .checked_neg()
                .map(Value::Int64)
                .ok_or_else(|| ExprError::overflow("NegateChecked")),
            (UnaryOp::Negate | UnaryOp::NegateChecked, Value::Float32(f)) => {
                Ok(Value::Float32(-f))
            }
            (UnaryOp::Negate | UnaryOp::NegateChecked, Value::Float64(f)) => {
                Ok(Value::Float64(-f))
            }
            (UnaryOp::Plus, v) if v.is_numeric() => Ok(v),
            (UnaryOp::Convert(ty), v) => Ok(v.convert(ty)?),
            (op, v) => Err(ExprError::invalid_operation(format!(
                "cannot apply {:?} to {}",
                op,
                v.type_name()
            ))),
        }
    }

    fn eval_binary_op(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        bindings: &Bindings,
    ) -> ExprResult<Value> {
        // Short-circuit operators evaluate the right side only when needed.
        match op {
            BinaryOp::AndAlso => {
                if !self.eval_bool(left, bindings)? {
                    return Ok(Value::Bool(false));
                }
                return Ok(Value::Bool(self.eval_bool(right, bindings)?));
            }
            BinaryOp::OrElse => {
                if self.eval_bool(left, bindings)? {
                    return Ok(Value::Bool(true));
                }
                return Ok(Value::Bool(self.eval_bool(right, bindings)?));
            }
            _ => {}
        }

        let left = self.eval(left, bindings)?;
        let right = self.eval(right, bindings)?;
        eval_binary_values(op, &left, &right)
    }

    fn eval_method(
        &self,
        method: Method,
        target: Option<Value>,
        args: &[Value],
    ) -> ExprResult<Value> {
        let null_target = || {
            ExprError::invalid_operation(format!("null reference calling {}", method.name()))
        };
        match (method, target, args) {
            (Method::AddDays, Some(Value::Timestamp(ts)), [days]) => {
                let days = days
                    .as_f64()
                    .ok_or_else(|| ExprError::type_mismatch("numeric", days.type_name()))?;
                let millis = (days * MILLIS_PER_DAY).round();
                if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
                    return Err(ExprError::overflow("AddDays"));
                }
                ts.checked_add(millis as i64)
                    .map(Value::Timestamp)
                    .ok_or_else(|| ExprError::overflow("AddDays"))
            }
            (Method::Abs, None, [Value::Int32(i)]) => i
                .checked_abs()
                .map(Value::Int32)
                .ok_or_else(|| ExprError::overflow("Abs")),
            (Method::Abs, None, [Value::Int64(i)]) => i
                .checked_abs()
                .map(Value::Int64)
                .ok_or_else(|| ExprError::overflow("Abs")),
            (Method::Abs, None, [Value::Float32(f)]) => Ok(Value::Float32(f.abs())),
            (Method::Abs, None, [Value::Float64(f)]) => Ok(Value::Float64(f.abs())),
            (Method::ToUpper, Some(Value::String(s)), []) => Ok(Value::String(s.to_uppercase())),
            (Method::ToLower, Some(Value::String(s)), []) => Ok(Value::String(s.to_lowercase())),
            (Method::Length, Some(Value::String(s)), []) => i32::try_from(s.chars().count())
                .map(Value::Int32)
                .map_err(|_| ExprError::overflow("Length")),
            (Method::StartsWith, Some(Value::String(s)), [Value::String(p)]) => {
                Ok(Value::Bool(s.starts_with(p.as_str())))
            }
            (Method::EndsWith, Some(Value::String(s)), [Value::String(p)]) => {
                Ok(Value::Bool(s.ends_with(p.as_str())))
            }
            (Method::Contains, Some(Value::String(s)), [Value::String(p)]) => {
                Ok(Value::Bool(s.contains(p.as_str())))
            }
            (Method::Now, None, []) => {
                let elapsed = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| ExprError::invalid_operation(e.to_string()))?;
                i64::try_from(elapsed.as_millis())
                    .map(Value::Timestamp)
                    .map_err(|_| ExprError::overflow("Now"))
            }
            (_, Some(Value::Null), _) => Err(null_target()),
            (method, _, args) => Err(ExprError::invalid_operation(format!(
                "cannot call {} with ({})",
                method.name(),
                args.iter()
                    .map(Value::type_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

/// Evaluate a non-short-circuit binary operator over two values.
pub(crate) fn eval_binary_values(op: BinaryOp, left: &Value, right: &Value) -> ExprResult<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOp::Lt => Ok(Value::Bool(compare(left, right) == Some(Ordering::Less))),
        BinaryOp::Le => Ok(Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ))),
        BinaryOp::Gt => Ok(Value::Bool(compare(left, right) == Some(Ordering::Greater))),
        BinaryOp::Ge => Ok(Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ))),
        BinaryOp::AndAlso | BinaryOp::OrElse => match (left, right) {
            (Value::Bool(a), Value::Bool(b)) if op == BinaryOp::AndAlso => {
                Ok(Value::Bool(*a && *b))
            }
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
            _ => Err(ExprError::type_mismatch("Bool", left.type_name())),
        },
        BinaryOp::Concat => eval_concat(left, right),
        BinaryOp::Shl | BinaryOp::Shr => eval_shift(op, left, right),
        _ => eval_arithmetic(op, left, right),
    }
}

macro_rules! int_arith {
    ($name:ident, $t:ty) => {
        fn $name(op: BinaryOp, a: $t, b: $t) -> ExprResult<$t> {
            let overflow = || ExprError::overflow(format!("{:?}", op));
            match op {
                BinaryOp::Add => Ok(a.wrapping_add(b)),
                BinaryOp::AddChecked => a.checked_add(b).ok_or_else(overflow),
                BinaryOp::Sub => Ok(a.wrapping_sub(b)),
                BinaryOp::SubChecked => a.checked_sub(b).ok_or_else(overflow),
                BinaryOp::Mul => Ok(a.wrapping_mul(b)),
                BinaryOp::MulChecked => a.checked_mul(b).ok_or_else(overflow),
                BinaryOp::Div | BinaryOp::Rem if b == 0 => Err(ExprError::DivisionByZero),
                BinaryOp::Div => a.checked_div(b).ok_or_else(overflow),
                BinaryOp::Rem => a.checked_rem(b).ok_or_else(overflow),
                BinaryOp::BitAnd => Ok(a & b),
                BinaryOp::BitOr => Ok(a | b),
                BinaryOp::BitXor => Ok(a ^ b),
                _ => Err(ExprError::invalid_operation(format!(
                    "'{}' is not an integer operator",
                    op.symbol()
                ))),
            }
        }
    };
}

int_arith!(int32_arith, i32);
int_arith!(int64_arith, i64);

fn float_arith(op: BinaryOp, a: f64, b: f64) -> ExprResult<f64> {
    match op {
        BinaryOp::Add | BinaryOp::AddChecked => Ok(a + b),
        BinaryOp::Sub | BinaryOp::SubChecked => Ok(a - b),
        BinaryOp::Mul | BinaryOp::MulChecked => Ok(a * b),
        BinaryOp::Div => Ok(a / b),
        BinaryOp::Rem => Ok(a % b),
        _ => Err(ExprError::invalid_operation(format!(
            "'{}' is not a floating point operator",
            op.symbol()
        ))),
    }
}

fn eval_arithmetic(op: BinaryOp, left: &Value, right: &Value) -> ExprResult<Value> {
    match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => int32_arith(op, *a, *b).map(Value::Int32),
        (Value::Int64(a), Value::Int64(b)) => int64_arith(op, *a, *b).map(Value::Int64),
        (Value::Float32(a), Value::Float32(b)) => {
            float_arith(op, f64::from(*a), f64::from(*b)).map(|f| Value::Float32(f as f32))
        }
        (Value::Float64(a), Value::Float64(b)) => float_arith(op, *a, *b).map(Value::Float64),
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::BitAnd => Ok(Value::Bool(*a & *b)),
            BinaryOp::BitOr => Ok(Value::Bool(*a | *b)),
            BinaryOp::BitXor => Ok(Value::Bool(*a ^ *b)),
            _ => Err(ExprError::type_mismatch("numeric", "Bool")),
        },
        _ => Err(ExprError::type_mismatch(
            left.type_name(),
            right.type_name(),
        )),
    }
}

fn eval_shift(op: BinaryOp, left: &Value, right: &Value) -> ExprResult<Value> {
    let amount = right
        .as_i32()
        .ok_or_else(|| ExprError::type_mismatch("Int32", right.type_name()))?;
    // Shift counts are masked to the operand width.
    let amount = amount as u32;
    match (op, left) {
        (BinaryOp::Shl, Value::Int32(a)) => Ok(Value::Int32(a.wrapping_shl(amount))),
        (BinaryOp::Shr, Value::Int32(a)) => Ok(Value::Int32(a.wrapping_shr(amount))),
        (BinaryOp::Shl, Value::Int64(a)) => Ok(Value::Int64(a.wrapping_shl(amount))),
        (BinaryOp::Shr, Value::Int64(a)) => Ok(Value::Int64(a.wrapping_shr(amount))),
        _ => Err(ExprError::type_mismatch("integer", left.type_name())),
    }
}

fn eval_concat(left: &Value, right: &Value) -> ExprResult<Value> {
    let part = |v: &Value| -> ExprResult<String> {
        match v {
            Value::String(s) => Ok(s.clone()),
            Value::Null => Ok(String::new()),
            other => Err(ExprError::type_mismatch("String", other.type_name())),
        }
    };
    Ok(Value::String(format!("{}{}", part(left)?, part(right)?)))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    left == right
}

/// Ordering for relational operators. `None` when either side is null or
/// the values are unordered (NaN), which makes every relation false.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            Some(left.as_i64()?.cmp(&right.as_i64()?))
        }
        (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
