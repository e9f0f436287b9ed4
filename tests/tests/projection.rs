//! Projections, operations composed after them, and distinct.

use std::sync::Arc;

use sieve_tests::prelude::*;

fn parity() -> Result<Lambda, sieve_expr::ExprError> {
    Lambda::build("f", foo_type(), |f| {
        f.field("Blap")?.op(BinaryOp::Rem, Expr::constant(2))
    })
}

fn doubled() -> Result<Lambda, sieve_expr::ExprError> {
    Lambda::build("x", ValueType::Int32, |x| x.op(BinaryOp::Mul, Expr::constant(2)))
}

fn projecting() -> HarnessResult<Scenario> {
    Ok(Scenario::new("projecting")
        .source(foo_backend()?.query())
        .step(
            "blaps",
            |q| q.select(&blap()?)?.to_list(),
            |a| a.returns([0, 1, 2, 3]),
        )
        .step(
            "names",
            |q| q.select(&name()?)?.to_list(),
            |a| a.rows(4).first("zero").last("three").contains("two"),
        )
        .step(
            "filter_projected_values",
            |q| q.select(&blap()?)?.filter(&int_is(BinaryOp::Gt, 1)?)?.to_list(),
            |a| a.returns([2, 3]),
        )
        .step(
            "select_twice",
            |q| q.select(&blap()?)?.select(&doubled()?)?.to_list(),
            |a| a.returns([0, 2, 4, 6]),
        )
        .step(
            "order_projected_values",
            |q| {
                q.select(&blap()?)?
                    .order_by_descending(&Lambda::identity(ValueType::Int32))?
                    .to_list()
            },
            |a| a.returns([3, 2, 1, 0]),
        )
        .step(
            "select_after_skip",
            |q| q.skip(1)?.select(&blap()?)?.to_list(),
            |a| a.error_kind(ErrorKind::NotSupported),
        )
        .step(
            "wrong_parameter_type",
            |q| q.filter(&int_is(BinaryOp::Gt, 1)?)?.to_list(),
            |a| a.error_kind(ErrorKind::ArgumentError),
        ))
}

fn distinct() -> HarnessResult<Scenario> {
    Ok(Scenario::new("distinct")
        .source(foo_backend()?.query())
        .step(
            "parities",
            |q| q.select(&parity()?)?.distinct()?.to_list(),
            |a| a.returns([0, 1]),
        )
        .step(
            "distinct_then_take",
            |q| q.select(&parity()?)?.distinct()?.take(1)?.to_list(),
            |a| a.returns([0]),
        )
        .step(
            "distinct_then_skip",
            |q| q.select(&parity()?)?.distinct()?.skip(1)?.to_list(),
            |a| a.returns([1]),
        )
        .step(
            "distinct_after_take",
            |q| q.select(&parity()?)?.take(2)?.distinct()?.to_list(),
            |a| {
                a.error_kind(ErrorKind::NotSupported)
                    .error("Distinct cannot be applied after Skip/Take")
            },
        )
        .step(
            "select_after_distinct",
            |q| q.select(&blap()?)?.distinct()?.select(&doubled()?)?.to_list(),
            |a| a.error_kind(ErrorKind::NotSupported).error("after distinct"),
        )
        .step(
            "distinct_without_projection",
            |q| q.distinct()?.to_list(),
            |a| a.error_kind(ErrorKind::NotSupported),
        ))
}

#[test]
fn test_projecting() {
    projecting().unwrap().run().unwrap();
}

#[test]
fn test_distinct() {
    distinct().unwrap().run().unwrap();
}

#[test]
fn test_rows_decoded_from_replies() {
    // GIVEN
    let backend = Arc::new(MemoryBackend::from_replies(foo_type(), &foo_replies()).unwrap());

    // WHEN
    let names = backend
        .query()
        .order_by_descending(&blap().unwrap())
        .and_then(|q| q.select(&name().unwrap()))
        .and_then(|q| q.to_list())
        .unwrap();

    // THEN
    assert_eq!(names, rows!["three", "two", "one", "zero"]);
}

#[test]
fn test_projection_of_empty_query_keeps_node() {
    let empty = foo_backend().unwrap().query().take(0).unwrap();

    let projected = empty.select(&blap().unwrap()).unwrap();

    assert!(!projected.same_as(&empty));
    assert_eq!(projected.element_type(), ValueType::Int32);
    assert!(projected.to_list().unwrap().is_empty());
}

#[test]
fn test_identity_projection_is_dropped() {
    let query = int_backend([3, 1, 2]).query();

    let projected = query.select(&Lambda::identity(ValueType::Int32)).unwrap();

    assert!(projected.same_as(&query));
}
