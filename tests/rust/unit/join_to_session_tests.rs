use std::sync::Arc;

use deita::backend::{Cell, QueryResult};
use deita::catalog::{TableCatalog, TableRef};
use deita::join_builder::{JoinEvent, JoinGraphBuilder, JoinType};
use deita::session::{Completion, QuerySession};

fn catalog() -> Arc<TableCatalog> {
    Arc::new(TableCatalog::new(vec![
        TableRef::new("t-a", "A", &["id"]),
        TableRef::new("t-b", "B", &["id"]),
        TableRef::new("t-c", "C", &["id", "fk"]),
    ]))
}

fn rows(n: usize, has_more: bool) -> QueryResult {
    QueryResult {
        columns: vec!["id".to_string()],
        rows: (0..n).map(|i| vec![Cell::from(i as i64)]).collect(),
        has_more,
        time: 0.0,
    }
}

fn apply(session: &mut QuerySession, event: JoinEvent) -> deita::session::PageRequest {
    match event {
        JoinEvent::QueryChanged(query) => session.set_query(&query).unwrap(),
    }
}

#[test]
fn test_each_confirmed_edge_restarts_pagination() {
    let mut builder = JoinGraphBuilder::new(catalog());
    let mut session = QuerySession::new();

    builder.start_join(&"t-a".into()).unwrap();
    builder.add_table_to_join(&"t-b".into()).unwrap();
    let event = builder
        .confirm_join_edge(&"t-a".into(), &"t-b".into(), "id", "id", JoinType::Inner)
        .unwrap();
    let request = apply(&mut session, event);
    assert_eq!(request.page, 1);
    session.complete_page(request.ticket, Ok(rows(3, true)));

    let next = session.next_page().unwrap().unwrap();
    session.complete_page(next.ticket, Ok(rows(3, true)));
    assert_eq!(session.current_page(), 2);
    assert_eq!(session.page_size(), Some(3));
    let first_generation = session.generation();

    builder.select_join_anchor(&"t-b".into(), &"t-c".into()).unwrap();
    let event = builder
        .confirm_join_edge(&"t-b".into(), &"t-c".into(), "id", "fk", JoinType::Left)
        .unwrap();
    let request = apply(&mut session, event);

    assert_eq!(
        request.query,
        "SELECT * FROM \"A\"\nINNER JOIN \"B\" ON \"A\".\"id\" = \"B\".\"id\"\nLEFT JOIN \"C\" ON \"B\".\"id\" = \"C\".\"fk\""
    );
    assert_eq!(session.current_page(), 1);
    assert_eq!(session.page_size(), None);
    assert_eq!(session.total_count(), None);
    assert!(session.generation() > first_generation);
    assert!(session.pagination_message().is_none());
}

#[test]
fn test_page_in_flight_when_join_changes_is_discarded() {
    let mut builder = JoinGraphBuilder::new(catalog());
    let mut session = QuerySession::new();

    let first = apply(&mut session, builder.select_table(&"t-a".into()).unwrap());
    let second = apply(&mut session, builder.select_table(&"t-b".into()).unwrap());
    assert_ne!(first.ticket, second.ticket);

    assert_eq!(
        session.complete_page(first.ticket, Ok(rows(9, true))),
        Completion::Discarded
    );
    assert!(session.rows().is_empty());

    assert_eq!(
        session.complete_page(second.ticket, Ok(rows(2, false))),
        Completion::Applied(())
    );
    assert_eq!(session.query(), Some("SELECT * FROM \"B\""));
    assert_eq!(
        session.pagination_message().as_deref(),
        Some("Showing first 2 rows of")
    );
}

#[test]
fn test_cancel_keeps_last_query() {
    let mut builder = JoinGraphBuilder::new(catalog());
    let mut session = QuerySession::new();

    let request = apply(&mut session, builder.select_table(&"t-a".into()).unwrap());
    session.complete_page(request.ticket, Ok(rows(1, false)));

    builder.start_join(&"t-a".into()).unwrap();
    builder.add_table_to_join(&"t-b".into()).unwrap();
    builder.cancel_join();

    assert!(builder.state().selected_tables.is_empty());
    assert!(builder.state().edges.is_empty());
    assert_eq!(session.query(), Some("SELECT * FROM \"A\""));
    assert_eq!(session.rows().len(), 1);
}
