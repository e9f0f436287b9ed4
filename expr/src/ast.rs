//! Expression tree.
//!
//! Predicates and projections are single-parameter [`Lambda`]s whose bodies
//! are [`Expr`] trees. Trees are immutable and shared behind `Arc`, so
//! cloning is cheap and rewrites that leave a subtree alone hand back the
//! same allocation (see [`Expr::ptr_eq`]).
//!
//! Every constructor type-checks its operands and caches the result type,
//! so an `Expr` that exists is always well-typed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sieve_core::{RecordType, Value, ValueType};

use crate::{ExprError, ExprResult};

static NEXT_PARAMETER_ID: AtomicU64 = AtomicU64::new(1);

/// A lambda parameter. Identity is by allocation id, not by name, so two
/// parameters named `x` never alias each other.
#[derive(Debug, Clone)]
pub struct Parameter {
    id: u64,
    name: Arc<str>,
    ty: ValueType,
}

impl Parameter {
    /// Create a fresh parameter.
    pub fn new(name: impl AsRef<str>, ty: ValueType) -> Self {
        Self {
            id: NEXT_PARAMETER_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name.as_ref()),
            ty,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &ValueType {
        &self.ty
    }

    /// A reference to this parameter as an expression.
    pub fn to_expr(&self) -> Expr {
        Expr::parameter(self)
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Parameter {}

/// Unary operators.
#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    /// Logical not on Bool, bitwise complement on integers.
    Not,
    /// Wrapping negation.
    Negate,
    /// Negation that fails on overflow.
    NegateChecked,
    Plus,
    /// Unchecked conversion to another type.
    Convert(ValueType),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    AddChecked,
    Sub,
    SubChecked,
    Mul,
    MulChecked,
    Div,
    Rem,
    // Bitwise
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical (short-circuit)
    AndAlso,
    OrElse,
    // String
    Concat,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add | BinaryOp::AddChecked => "+",
            BinaryOp::Sub | BinaryOp::SubChecked => "-",
            BinaryOp::Mul | BinaryOp::MulChecked => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::Concat => "++",
        }
    }

    /// Add and multiply, checked or not. These may be re-associated.
    pub fn is_associative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::AddChecked | BinaryOp::Mul | BinaryOp::MulChecked
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

/// Methods callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `timestamp.AddDays(days)`
    AddDays,
    /// `Abs(number)`
    Abs,
    ToUpper,
    ToLower,
    /// Character count of a string.
    Length,
    StartsWith,
    EndsWith,
    Contains,
    /// Current wall-clock time. Never folded.
    Now,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::AddDays => "AddDays",
            Method::Abs => "Abs",
            Method::ToUpper => "ToUpper",
            Method::ToLower => "ToLower",
            Method::Length => "Length",
            Method::StartsWith => "StartsWith",
            Method::EndsWith => "EndsWith",
            Method::Contains => "Contains",
            Method::Now => "Now",
        }
    }

    /// Static methods take no target.
    pub fn is_static(self) -> bool {
        matches!(self, Method::Abs | Method::Now)
    }

    /// Pure methods return the same value for the same inputs.
    pub fn is_pure(self) -> bool {
        !matches!(self, Method::Now)
    }
}

/// A named member initializer inside a construct expression.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberBinding {
    pub member: String,
    pub value: Expr,
}

impl MemberBinding {
    pub fn new(member: impl Into<String>, value: Expr) -> Self {
        Self {
            member: member.into(),
            value,
        }
    }
}

/// Expression node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant {
        value: Value,
        ty: ValueType,
    },
    Parameter(Parameter),
    Member {
        target: Expr,
        member: String,
        ty: ValueType,
    },
    Unary {
        op: UnaryOp,
        operand: Expr,
        ty: ValueType,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
        ty: ValueType,
    },
    Conditional {
        test: Expr,
        if_true: Expr,
        if_false: Expr,
        ty: ValueType,
    },
    Call {
        target: Option<Expr>,
        method: Method,
        args: Vec<Expr>,
        ty: ValueType,
    },
    /// Build a record. Positional `args` fill the first fields in
    /// declaration order; `bindings` set the rest by name.
    Construct {
        record: Arc<RecordType>,
        args: Vec<Expr>,
        bindings: Vec<MemberBinding>,
    },
}

/// An immutable, shared expression tree.
#[derive(Clone)]
pub struct Expr(Arc<ExprKind>);

impl Expr {
    pub(crate) fn from_kind(kind: ExprKind) -> Self {
        Expr(Arc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    /// Reference identity: true if both handles share one allocation.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The static result type.
    pub fn ty(&self) -> ValueType {
        match self.kind() {
            ExprKind::Constant { ty, .. }
            | ExprKind::Member { ty, .. }
            | ExprKind::Unary { ty, .. }
            | ExprKind::Binary { ty, .. }
            | ExprKind::Conditional { ty, .. }
            | ExprKind::Call { ty, .. } => ty.clone(),
            ExprKind::Parameter(p) => p.ty().clone(),
            ExprKind::Construct { record, .. } => ValueType::Record(record.clone()),
        }
    }

    // ==================== Constructors ====================

    /// A constant whose type is inferred from the value.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = infer_type(&value);
        Self::from_kind(ExprKind::Constant { value, ty })
    }

    /// A constant with an explicit type, e.g. a typed `null`.
    pub fn typed_constant(value: Value, ty: ValueType) -> ExprResult<Self> {
        if !value.is_instance_of(&ty) {
            return Err(ExprError::type_mismatch(ty.name(), value.type_name()));
        }
        Ok(Self::from_kind(ExprKind::Constant { value, ty }))
    }

    pub fn parameter(param: &Parameter) -> Self {
        Self::from_kind(ExprKind::Parameter(param.clone()))
    }

    /// Field access on a record-typed target.
    pub fn member(target: Expr, member: impl Into<String>) -> ExprResult<Self> {
        let member = member.into();
        let target_ty = target.ty();
        let record = target_ty
            .as_record()
            .ok_or_else(|| ExprError::unknown_member(&member, target_ty.name()))?;
        let ty = record
            .field(&member)
            .map(|f| f.ty.clone())
            .ok_or_else(|| ExprError::unknown_member(&member, record.name()))?;
        Ok(Self::from_kind(ExprKind::Member { target, member, ty }))
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> ExprResult<Self> {
        let operand_ty = operand.ty();
        let ty = match &op {
            UnaryOp::Not if operand_ty == ValueType::Bool || operand_ty.is_integer() => operand_ty,
            UnaryOp::Negate | UnaryOp::NegateChecked | UnaryOp::Plus
                if operand_ty.is_numeric() =>
            {
                operand_ty
            }
            UnaryOp::Convert(target) => target.clone(),
            _ => return Err(ExprError::type_mismatch("numeric or Bool", operand_ty.name())),
        };
        Ok(Self::from_kind(ExprKind::Unary { op, operand, ty }))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> ExprResult<Self> {
        let ty = binary_result_type(op, &left.ty(), &right.ty())?;
        Ok(Self::from_kind(ExprKind::Binary {
            op,
            left,
            right,
            ty,
        }))
    }

    pub fn conditional(test: Expr, if_true: Expr, if_false: Expr) -> ExprResult<Self> {
        if test.ty() != ValueType::Bool {
            return Err(ExprError::type_mismatch("Bool", test.ty().name()));
        }
        let ty = unify(&if_true.ty(), &if_false.ty())?;
        Ok(Self::from_kind(ExprKind::Conditional {
            test,
            if_true,
            if_false,
            ty,
        }))
    }

    pub fn call(target: Option<Expr>, method: Method, args: Vec<Expr>) -> ExprResult<Self> {
        let ty = call_result_type(target.as_ref(), method, &args)?;
        Ok(Self::from_kind(ExprKind::Call {
            target,
            method,
            args,
            ty,
        }))
    }

    pub fn construct(
        record: Arc<RecordType>,
        args: Vec<Expr>,
        bindings: Vec<MemberBinding>,
    ) -> ExprResult<Self> {
        let fields = record.fields();
        if args.len() > fields.len() {
            return Err(ExprError::invalid_operation(format!(
                "'{}' has {} fields but {} arguments were given",
                record.name(),
                fields.len(),
                args.len()
            )));
        }
        for (field, arg) in fields.iter().zip(&args) {
            if unify(&field.ty, &arg.ty())? != field.ty {
                return Err(ExprError::type_mismatch(field.ty.name(), arg.ty().name()));
            }
        }
        let mut bound = vec![false; fields.len()];
        for binding in &bindings {
            let index = record
                .field_index(&binding.member)
                .ok_or_else(|| ExprError::unknown_member(&binding.member, record.name()))?;
            if index < args.len() {
                return Err(ExprError::invalid_operation(format!(
                    "member '{}' is already set by a constructor argument",
                    binding.member
                )));
            }
            if std::mem::replace(&mut bound[index], true) {
                return Err(ExprError::invalid_operation(format!(
                    "member '{}' is bound more than once",
                    binding.member
                )));
            }
            let field_ty = &fields[index].ty;
            if unify(field_ty, &binding.value.ty())? != *field_ty {
                return Err(ExprError::type_mismatch(
                    field_ty.name(),
                    binding.value.ty().name(),
                ));
            }
        }
        Ok(Self::from_kind(ExprKind::Construct {
            record,
            args,
            bindings,
        }))
    }

    // ==================== Fluent helpers ====================

    /// `self.member`
    pub fn field(&self, member: impl Into<String>) -> ExprResult<Self> {
        Self::member(self.clone(), member)
    }

    /// `self op right`
    pub fn op(&self, op: BinaryOp, right: Expr) -> ExprResult<Self> {
        Self::binary(op, self.clone(), right)
    }

    /// `self == right`
    pub fn equals(&self, right: Expr) -> ExprResult<Self> {
        Self::binary(BinaryOp::Eq, self.clone(), right)
    }

    /// `self.method(args)`
    pub fn invoke(&self, method: Method, args: Vec<Expr>) -> ExprResult<Self> {
        Self::call(Some(self.clone()), method, args)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind(), ExprKind::Constant { .. })
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self.kind() {
            ExprKind::Constant { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.kind(), f)
    }
}

/// A single-parameter function `param => body`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    param: Parameter,
    body: Expr,
}

impl Lambda {
    pub fn new(param: Parameter, body: Expr) -> Self {
        Self { param, body }
    }

    /// Build a lambda over a fresh parameter.
    pub fn build(
        name: &str,
        ty: ValueType,
        body: impl FnOnce(Expr) -> ExprResult<Expr>,
    ) -> ExprResult<Self> {
        let param = Parameter::new(name, ty);
        let body = body(param.to_expr())?;
        Ok(Self::new(param, body))
    }

    /// `x => x` over `ty`.
    pub fn identity(ty: ValueType) -> Self {
        let param = Parameter::new("x", ty);
        let body = param.to_expr();
        Self::new(param, body)
    }

    pub fn param(&self) -> &Parameter {
        &self.param
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub fn param_type(&self) -> &ValueType {
        self.param.ty()
    }

    pub fn return_type(&self) -> ValueType {
        self.body.ty()
    }
}

// ==================== Typing rules ====================

fn infer_type(value: &Value) -> ValueType {
    match value {
        Value::Null => ValueType::Null,
        Value::Bool(_) => ValueType::Bool,
        Value::Int32(_) => ValueType::Int32,
        Value::Int64(_) => ValueType::Int64,
        Value::Float32(_) => ValueType::Float32,
        Value::Float64(_) => ValueType::Float64,
        Value::String(_) => ValueType::String,
        Value::Timestamp(_) => ValueType::Timestamp,
        Value::Record(r) => ValueType::Record(r.ty().clone()),
        Value::List(items) => ValueType::List(Box::new(
            items.first().map(infer_type).unwrap_or(ValueType::Null),
        )),
    }
}

/// The common type of two branches; `Null` joins any nullable type.
fn unify(a: &ValueType, b: &ValueType) -> ExprResult<ValueType> {
    match (a, b) {
        _ if a == b => Ok(a.clone()),
        (ValueType::Null, t) | (t, ValueType::Null) if t.is_nullable() => Ok(t.clone()),
        _ => Err(ExprError::type_mismatch(a.name(), b.name())),
    }
}

fn binary_result_type(op: BinaryOp, left: &ValueType, right: &ValueType) -> ExprResult<ValueType> {
    let mismatch = || ExprError::type_mismatch(left.name(), right.name());
    match op {
        BinaryOp::Add
        | BinaryOp::AddChecked
        | BinaryOp::Sub
        | BinaryOp::SubChecked
        | BinaryOp::Mul
        | BinaryOp::MulChecked
        | BinaryOp::Div
        | BinaryOp::Rem => {
            if left.is_numeric() && left == right {
                Ok(left.clone())
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::Shl | BinaryOp::Shr => {
            if left.is_integer() && *right == ValueType::Int32 {
                Ok(left.clone())
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
            if left == right && (left.is_integer() || *left == ValueType::Bool) {
                Ok(left.clone())
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::Eq | BinaryOp::Ne => unify(left, right).map(|_| ValueType::Bool),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let comparable = left.is_numeric()
                || matches!(left, ValueType::String | ValueType::Timestamp);
            if left == right && comparable {
                Ok(ValueType::Bool)
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::AndAlso | BinaryOp::OrElse => {
            if *left == ValueType::Bool && *right == ValueType::Bool {
                Ok(ValueType::Bool)
            } else {
                Err(ExprError::type_mismatch(
                    "Bool",
                    format!("{} and {}", left, right),
                ))
            }
        }
        BinaryOp::Concat => {
            if unify(left, &ValueType::String).is_ok() && unify(right, &ValueType::String).is_ok() {
                Ok(ValueType::String)
            } else {
                Err(mismatch())
            }
        }
    }
}

fn call_result_type(target: Option<&Expr>, method: Method, args: &[Expr]) -> ExprResult<ValueType> {
    let arg_types: Vec<ValueType> = args.iter().map(Expr::ty).collect();
    let target_ty = match (target, method.is_static()) {
        (Some(t), false) => Some(t.ty()),
        (None, true) => None,
        (Some(_), true) => {
            return Err(ExprError::invalid_operation(format!(
                "{} is static and takes no target",
                method.name()
            )))
        }
        (None, false) => {
            return Err(ExprError::invalid_operation(format!(
                "{} requires a target",
                method.name()
            )))
        }
    };
    let signature_error = || {
        ExprError::invalid_operation(format!(
            "no overload of {} accepts ({})",
            method.name(),
            arg_types
                .iter()
                .map(ValueType::name)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    };
    match (method, target_ty, arg_types.as_slice()) {
        (Method::AddDays, Some(ValueType::Timestamp), [days]) if days.is_numeric() => {
            Ok(ValueType::Timestamp)
        }
        (Method::Abs, None, [n]) if n.is_numeric() => Ok(n.clone()),
        (Method::ToUpper | Method::ToLower, Some(ValueType::String), []) => Ok(ValueType::String),
        (Method::Length, Some(ValueType::String), []) => Ok(ValueType::Int32),
        (
            Method::StartsWith | Method::EndsWith | Method::Contains,
            Some(ValueType::String),
            [ValueType::String],
        ) => Ok(ValueType::Bool),
        (Method::Now, None, []) => Ok(ValueType::Timestamp),
        _ => Err(signature_error()),
    }
}

// ==================== Display ====================

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Constant { value, .. } => write!(f, "{}", value),
            ExprKind::Parameter(p) => write!(f, "{}", p.name()),
            ExprKind::Member { target, member, .. } => write!(f, "{}.{}", target, member),
            ExprKind::Unary { op, operand, .. } => match op {
                UnaryOp::Not => write!(f, "!{}", operand),
                UnaryOp::Negate | UnaryOp::NegateChecked => write!(f, "-{}", operand),
                UnaryOp::Plus => write!(f, "+{}", operand),
                UnaryOp::Convert(ty) => write!(f, "({}){}", ty, operand),
            },
            ExprKind::Binary {
                op, left, right, ..
            } => write!(f, "({} {} {})", left, op.symbol(), right),
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => write!(f, "({} ? {} : {})", test, if_true, if_false),
            ExprKind::Call {
                target,
                method,
                args,
                ..
            } => {
                if let Some(target) = target {
                    write!(f, "{}.", target)?;
                }
                write!(f, "{}(", method.name())?;
                write_list(f, args.iter().map(|a| a.to_string()))?;
                write!(f, ")")
            }
            ExprKind::Construct {
                record,
                args,
                bindings,
            } => {
                write!(f, "new {}(", record.name())?;
                let positional = record
                    .fields()
                    .iter()
                    .zip(args)
                    .map(|(field, arg)| format!("{} = {}", field.name, arg));
                let named = bindings
                    .iter()
                    .map(|b| format!("{} = {}", b.member, b.value));
                write_list(f, positional.chain(named))?;
                write!(f, ")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = String>) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.param.name(), self.body)
    }
}
