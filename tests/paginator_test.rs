//! Paginator adapter tests: deferral, windows, and identity-map dedup.

mod support;

use rowstead::prelude::*;
use serde_json::json;
use std::sync::Arc;
use support::{customer_row, AclRule, Customer, MockBackend};

fn persister(backend: Arc<MockBackend>) -> Persister {
    Persister::builder(backend)
        .register::<Customer>()
        .register::<AclRule>()
        .build()
}

#[tokio::test]
async fn fetch_page_defers_all_backend_work() {
    let backend = MockBackend::new();
    let persister = persister(backend.clone());

    let paginator = persister
        .fetch_page::<Customer>(&[
            RqlExpr::compare("status", "active"),
            RqlExpr::call("limit(30,10)"),
        ])
        .unwrap();

    assert_eq!(backend.statement_count(), 0);
    assert_eq!(paginator.page_number(), Some(4));
    assert_eq!(paginator.page_size(), Some(10));
}

#[tokio::test]
async fn items_applies_the_requested_window() {
    let backend = MockBackend::new();
    backend.queue_rows(vec![
        customer_row(7, "Tommy", "active"),
        customer_row(8, "Grace", "active"),
    ]);
    let persister = persister(backend.clone());

    let paginator = persister
        .fetch_page::<Customer>(&[RqlExpr::compare("status", "active")])
        .unwrap();
    let items = paginator.items(20, 2).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].lock().name, "Tommy");

    let fetch = backend.last_statement().unwrap();
    assert!(fetch.sql.contains("WHERE status = $1"));
    assert!(fetch.sql.ends_with("LIMIT 2 OFFSET 20"));
}

#[tokio::test]
async fn items_rejects_a_zero_count() {
    let backend = MockBackend::new();
    let persister = persister(backend.clone());

    let paginator = persister.fetch_page::<Customer>(&[]).unwrap();
    let result = paginator.items(0, 0).await;

    assert!(matches!(result, Err(PersistError::InvalidArgument(_))));
    assert_eq!(backend.statement_count(), 0);
}

#[tokio::test]
async fn identity_map_deduplicates_across_pages() {
    let backend = MockBackend::new();
    backend.queue_rows(vec![customer_row(7, "Tommy", "active")]);
    backend.queue_rows(vec![
        customer_row(7, "Tommy", "active"),
        customer_row(8, "Grace", "active"),
    ]);
    let persister = persister(backend);

    let paginator = persister.fetch_page::<Customer>(&[]).unwrap();
    let first_page = paginator.items(0, 1).await.unwrap();
    let second_page = paginator.items(0, 2).await.unwrap();

    assert!(second_page[0].same_instance(&first_page[0]));
    assert_eq!(second_page[1].lock().id, 8);
}

#[tokio::test]
async fn page_uses_the_translated_size() {
    let backend = MockBackend::new();
    backend.queue_rows(vec![customer_row(11, "Radia", "active")]);
    let persister = persister(backend.clone());

    let paginator = persister
        .fetch_page::<Customer>(&[RqlExpr::call("limit(0,10)")])
        .unwrap();
    let page = paginator.page(2).await.unwrap();

    assert_eq!(page.len(), 1);
    let fetch = backend.last_statement().unwrap();
    assert!(fetch.sql.ends_with("LIMIT 10 OFFSET 10"));
}

#[tokio::test]
async fn page_without_translated_size_is_rejected() {
    let persister = persister(MockBackend::new());
    let paginator = persister.fetch_page::<Customer>(&[]).unwrap();
    let result = paginator.page(1).await;
    assert!(matches!(result, Err(PersistError::InvalidArgument(_))));
}

#[tokio::test]
async fn caching_and_filtering_extensions_fail_loudly() {
    let persister = persister(MockBackend::new());
    let mut paginator = persister.fetch_page::<Customer>(&[]).unwrap();

    assert!(matches!(
        paginator.enable_caching(true),
        Err(PersistError::InvalidArgument(_))
    ));
    assert!(matches!(
        paginator.set_filter("status = active"),
        Err(PersistError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn paginator_pages_respect_composite_identifiers() {
    let backend = MockBackend::new();
    let mut row = Row::new();
    row.insert("role_id".into(), json!(1));
    row.insert("resource_id".into(), json!(2));
    row.insert("allowed".into(), json!(true));
    backend.queue_rows(vec![row.clone()]);
    backend.queue_rows(vec![row]);
    let persister = persister(backend);

    let paginator = persister.fetch_page::<AclRule>(&[]).unwrap();
    let first = paginator.items(0, 1).await.unwrap();
    let second = paginator.items(0, 1).await.unwrap();

    assert!(first[0].same_instance(&second[0]));
    assert!(first[0].lock().allowed);
}
