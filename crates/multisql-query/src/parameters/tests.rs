//! Tests for placeholder detection and binding

use multisql_core::Value;
use pretty_assertions::assert_eq;

use super::{BindError, BindGroup, BindValues, PlaceholderKind, bind, extract_placeholders};
use crate::SplitError;
use crate::splitter::{SplitterOptions, Statement, split_with_placeholders};

fn extract(sql: &str) -> Result<super::Placeholders, SplitError> {
    extract_placeholders(sql, &SplitterOptions::default())
}

fn ints(range: std::ops::RangeInclusive<i64>) -> Vec<Value> {
    range.map(Value::Int64).collect()
}

#[test]
fn test_positional_count_is_number_of_question_marks() {
    let found = extract("INSERT INTO t VALUES (?, ?, ?)").unwrap();

    assert_eq!(found.kind, PlaceholderKind::Positional);
    assert_eq!(found.count, 3);
}

#[test]
fn test_question_marks_in_literals_and_comments_ignored() {
    let sql = "SELECT '?', \"a?\", $$ ? $$ FROM t -- ?\nWHERE a = ? /* ? */";
    let found = extract(sql).unwrap();

    assert_eq!(found.kind, PlaceholderKind::Positional);
    assert_eq!(found.count, 1);
}

#[test]
fn test_numbered_count_is_highest_index() {
    let found = extract("SELECT * FROM t WHERE a = $2 OR b = $1 OR c = $2").unwrap();

    assert_eq!(found.kind, PlaceholderKind::Numbered);
    assert_eq!(found.count, 2);
}

#[test]
fn test_dollar_digits_after_identifier_are_not_placeholders() {
    let found = extract("SELECT col$1 FROM t").unwrap();

    assert_eq!(found.kind, PlaceholderKind::None);
    assert_eq!(found.count, 0);
}

#[test]
fn test_named_count_is_distinct_names() {
    let found = extract("UPDATE t SET a = :a WHERE id = :id OR parent = :id").unwrap();

    assert_eq!(found.kind, PlaceholderKind::Named);
    assert_eq!(found.count, 2);
    assert_eq!(found.names, vec!["a".to_string(), "id".to_string()]);
}

#[test]
fn test_casts_are_not_named_placeholders() {
    let found = extract("SELECT a::text, :name FROM t").unwrap();

    assert_eq!(found.kind, PlaceholderKind::Named);
    assert_eq!(found.names, vec!["name".to_string()]);
}

#[test]
fn test_no_placeholders() {
    let found = extract("SELECT 1").unwrap();

    assert_eq!(found.kind, PlaceholderKind::None);
    assert_eq!(found.count, 0);
    assert!(found.names.is_empty());
}

#[test]
fn test_mixed_kinds_rejected() {
    let err = extract("SELECT * FROM t WHERE a = ? AND b = :b").unwrap_err();

    assert_eq!(
        err,
        SplitError::MixedPlaceholderKinds {
            statement: 0,
            first: PlaceholderKind::Positional,
            second: PlaceholderKind::Named,
        }
    );
}

#[test]
fn test_mixed_kinds_reports_statement_index() {
    let err = split_with_placeholders(
        "SELECT ?; SELECT $1, ?",
        &SplitterOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        SplitError::MixedPlaceholderKinds { statement: 1, .. }
    ));
}

#[test]
fn test_flat_partition_follows_counts() {
    let statements: Vec<Statement> = [0, 2, 0, 3, 2]
        .iter()
        .enumerate()
        .map(|(i, &count)| Statement::new(format!("s{i}")).with_placeholder_count(count))
        .collect();

    let groups = bind(&statements, BindValues::Flat(ints(1..=7))).unwrap();

    let expected: Vec<BindGroup> = vec![
        BindGroup::default(),
        ints(1..=2).into(),
        BindGroup::default(),
        ints(3..=5).into(),
        ints(6..=7).into(),
    ];
    assert_eq!(groups, expected);
}

#[test]
fn test_flat_without_counts_is_ambiguous() {
    let statements = vec![
        Statement::new("a").with_placeholder_count(1),
        Statement::new("b"),
    ];

    let err = bind(&statements, BindValues::Flat(ints(1..=1))).unwrap_err();

    assert_eq!(err, BindError::AmbiguousBind { statement_index: 1 });
}

#[test]
fn test_flat_length_must_match_total() {
    let statements = vec![Statement::new("a").with_placeholder_count(2)];

    let err = bind(&statements, BindValues::Flat(ints(1..=3))).unwrap_err();

    assert_eq!(
        err,
        BindError::ParameterCountMismatch {
            expected: 2,
            actual: 3
        }
    );
}

#[test]
fn test_grouped_pads_missing_and_ignores_extra() {
    let statements = vec![Statement::new("a"), Statement::new("b")];

    let short = bind(&statements, BindValues::Grouped(vec![ints(1..=1)])).unwrap();
    assert_eq!(short, vec![ints(1..=1).into(), BindGroup::default()]);

    let long = bind(
        &statements,
        BindValues::Grouped(vec![ints(1..=1), ints(2..=2), ints(3..=3)]),
    )
    .unwrap();
    assert_eq!(long.len(), 2);
    assert_eq!(long[1].values(), &[Value::Int64(2)]);
}

#[test]
fn test_none_gives_empty_groups() {
    let statements = vec![Statement::new("a"), Statement::new("b")];

    let groups = bind(&statements, BindValues::None).unwrap();

    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(BindGroup::is_empty));
}

#[test]
fn test_split_then_bind_flat() {
    let statements = split_with_placeholders(
        "INSERT INTO t VALUES (?, ?); SELECT 1; UPDATE t SET a = ? WHERE b = ?",
        &SplitterOptions::default(),
    )
    .unwrap();

    let groups = bind(&statements, BindValues::Flat(ints(1..=4))).unwrap();

    assert_eq!(
        groups
            .iter()
            .map(|g| g.len())
            .collect::<Vec<_>>(),
        vec![2, 0, 2]
    );
}
