//! Composition: filters, ordering, reversal, and row limits.

use sieve_tests::prelude::*;

fn parity() -> Result<Lambda, sieve_expr::ExprError> {
    Lambda::build("f", foo_type(), |f| {
        f.field("Blap")?.op(BinaryOp::Rem, Expr::constant(2))
    })
}

fn filtering() -> HarnessResult<Scenario> {
    Ok(Scenario::new("filtering")
        .source(foo_backend()?.query())
        .step(
            "blap_over_one",
            |q| q.filter(&blap_is(BinaryOp::Gt, 1)?)?.select(&blap()?)?.to_list(),
            |a| a.returns([2, 3]),
        )
        .step(
            "conjoined_filters",
            |q| {
                q.filter(&blap_is(BinaryOp::Gt, 0)?)?
                    .filter(&blap_is(BinaryOp::Lt, 3)?)?
                    .select(&blap()?)?
                    .to_list()
            },
            |a| a.returns([1, 2]),
        )
        .step(
            "nothing_matches",
            |q| q.filter(&blap_is(BinaryOp::Gt, 10)?)?.to_list(),
            |a| a.empty(),
        )
        .step(
            "where_after_take",
            |q| q.take(2)?.filter(&blap_is(BinaryOp::Gt, 0)?)?.to_list(),
            |a| {
                a.error_kind(ErrorKind::InvalidComposition)
                    .error("cannot be added after row limits")
            },
        ))
}

fn ordering() -> HarnessResult<Scenario> {
    Ok(Scenario::new("ordering")
        .source(foo_backend()?.query())
        .step(
            "by_name",
            |q| q.order_by(&name()?)?.select(&blap()?)?.to_list(),
            |a| a.returns([1, 3, 2, 0]),
        )
        .step(
            "by_blap_descending",
            |q| q.order_by_descending(&blap()?)?.select(&blap()?)?.to_list(),
            |a| a.returns([3, 2, 1, 0]),
        )
        .step(
            "reversed",
            |q| {
                q.order_by_descending(&blap()?)?
                    .reverse()?
                    .select(&blap()?)?
                    .to_list()
            },
            |a| a.returns([0, 1, 2, 3]),
        )
        .step(
            "then_by",
            |q| {
                q.order_by(&parity()?)?
                    .then_by_descending(&blap()?)?
                    .select(&blap()?)?
                    .to_list()
            },
            |a| a.returns([2, 0, 3, 1]),
        )
        .step(
            "later_order_is_primary",
            |q| {
                q.order_by_descending(&blap()?)?
                    .order_by(&parity()?)?
                    .select(&blap()?)?
                    .to_list()
            },
            |a| a.returns([2, 0, 3, 1]),
        )
        .step(
            "reverse_without_order",
            |q| q.reverse()?.to_list(),
            |a| {
                a.error_kind(ErrorKind::InvalidComposition)
                    .error("explicit order")
            },
        )
        .step(
            "order_after_skip",
            |q| q.skip(1)?.order_by(&blap()?)?.to_list(),
            |a| a.error_kind(ErrorKind::InvalidComposition),
        ))
}

fn row_limits() -> HarnessResult<Scenario> {
    Ok(Scenario::new("row_limits")
        .source(foo_backend()?.query())
        .step(
            "skip_then_take",
            |q| q.select(&blap()?)?.skip(1)?.take(2)?.to_list(),
            |a| a.returns([1, 2]),
        )
        .step(
            "select_after_take",
            |q| q.take(2)?.select(&blap()?)?.to_list(),
            |a| {
                a.error_kind(ErrorKind::NotSupported)
                    .error("skip/take applied")
            },
        )
        .step(
            "take_zero",
            |q| q.take(0)?.to_list(),
            |a| a.empty(),
        )
        .step(
            "skip_past_end",
            |q| q.skip(10)?.to_list(),
            |a| a.empty(),
        )
        .step(
            "negative_take",
            |q| q.take(-1)?.to_list(),
            |a| a.error_kind(ErrorKind::ArgumentError),
        )
        .step(
            "negative_skip",
            |q| q.skip(-3)?.to_list(),
            |a| a.error_kind(ErrorKind::ArgumentError),
        ))
}

#[test]
fn test_filtering() {
    filtering().unwrap().run().unwrap();
}

#[test]
fn test_ordering() {
    ordering().unwrap().run().unwrap();
}

#[test]
fn test_row_limits() {
    row_limits().unwrap().run().unwrap();
}

#[test]
fn test_skip_take_compose_into_one_window() {
    // GIVEN
    let backend = int_backend(0..100);

    // WHEN
    let query = backend
        .query()
        .skip(1)
        .and_then(|q| q.take(50))
        .and_then(|q| q.skip(5))
        .and_then(|q| q.take(41))
        .unwrap();
    let rows = query.to_list().unwrap();

    // THEN
    assert_eq!(query.offset(), 6);
    assert_eq!(query.limit(), Some(41));
    assert_eq!(rows.len(), 41);
    assert_eq!(rows.first(), Some(&Value::Int32(6)));
    assert_eq!(rows.last(), Some(&Value::Int32(46)));
}

#[test]
fn test_no_op_composition_keeps_node() {
    let query = foo_backend().unwrap().query();

    assert!(query.skip(0).unwrap().same_as(&query));
    assert!(query.distinct().is_err());

    let empty = query.take(0).unwrap();
    assert!(empty.skip(3).unwrap().same_as(&empty));
    assert!(empty.filter(&blap_is(BinaryOp::Gt, 1).unwrap()).unwrap().same_as(&empty));
}

#[test]
fn test_always_true_filter_is_dropped() {
    let query = int_backend([1, 2, 3]).query();
    let always = Lambda::build("x", ValueType::Int32, |_| Ok(Expr::constant(true))).unwrap();

    let filtered = query.filter(&always).unwrap();

    assert!(filtered.same_as(&query));
    assert!(filtered.predicate().is_none());
}

#[test]
fn test_render_through_backend() {
    let query = foo_backend()
        .unwrap()
        .query()
        .filter(&blap_is(BinaryOp::Gt, 1).unwrap())
        .and_then(|q| q.order_by_descending(&blap().unwrap()))
        .and_then(|q| q.take(2))
        .unwrap();

    assert_eq!(
        query.to_string(),
        "from memory where f => (f.Blap > 1) order by f => f.Blap desc take 2"
    );
}
