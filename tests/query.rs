use std::collections::HashMap;

use siftable::Row;
use siftable::Table;

fn rows(data: &[&[&str]]) -> Vec<Row> {
    data.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

fn joined(found: &[&[String]]) -> Vec<String> {
    found.iter().map(|row| row.join(",")).collect()
}

#[test]
#[should_panic(expected = "query_by: clauses must not be empty")]
fn query_by_panics_on_empty_clauses() {
    Table::new().query_by(&HashMap::<usize, &str>::new());
}

#[test]
#[should_panic(expected = "query_by_holes: clauses must not be empty")]
fn query_by_holes_panics_on_empty_clauses() {
    Table::new().query_by_holes(&HashMap::<usize, &str>::new());
}

#[test]
#[should_panic(expected = "delete_by: clauses must not be empty")]
fn delete_by_panics_on_empty_clauses() {
    Table::new().delete_by(&HashMap::<usize, &str>::new());
}

#[test]
fn query_and_delete_across_buckets() {
    let mut table = Table::new();
    table
        .insert(rows(&[
            &["u1", "admin", "active"],
            &["u2", "member", "inactive"],
            &["u3", "admin", "inactive"],
        ]))
        .unwrap();
    let mut second = rows(&[&["u4", "member", "active"], &["u5", "guest", "active"]]);
    second.insert(1, Row::new());
    table.insert_holes(second).unwrap();
    table
        .insert(rows(&[&["u6", "guest", "inactive"], &["u7", "admin", "active"]]))
        .unwrap();

    // No-match queries come back empty.
    assert!(table.query_by(&HashMap::from([(0, "noone")])).is_empty());

    // Single-column query.
    assert_eq!(table.count(1, "admin"), 3);
    let admins = table.query_by(&HashMap::from([(1, "admin")]));
    assert_eq!(admins.len(), 3);
    for row in &admins {
        assert_eq!(row[1], "admin");
    }

    // Multi-column query, bucket order preserved.
    let active_admins = table.query_by(&HashMap::from([(1, "admin"), (2, "active")]));
    assert_eq!(
        joined(&active_admins),
        vec!["u1,admin,active", "u7,admin,active"]
    );

    // Queries never mutate.
    let before = joined(&table.all());
    table.query_by(&HashMap::from([(2, "inactive")]));
    assert_eq!(joined(&table.all()), before);

    // Delete the inactive rows.
    assert_eq!(table.delete_by(&HashMap::from([(2, "inactive")])), 3);
    assert!(table.query_by(&HashMap::from([(2, "inactive")])).is_empty());
    assert_ne!(table.count(2, "active"), 0);

    // Then every admin.
    table.delete_by(&HashMap::from([(1, "admin")]));
    assert!(table.query_by(&HashMap::from([(1, "admin")])).is_empty());

    // Deleting the same clause again is a no-op.
    assert_eq!(table.delete_by(&HashMap::from([(1, "admin")])), 0);
    assert!(table.query_by(&HashMap::from([(1, "admin")])).is_empty());

    // Finally everything active; nothing survives.
    table.delete_by(&HashMap::from([(2, "active")]));
    assert!(table.all().is_empty());
}
