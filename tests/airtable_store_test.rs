use group_signup::adapters::AirtableStore;
use group_signup::config::StoreConfig;
use group_signup::domain::ports::RecordStore;
use group_signup::{AppError, GroupReconciler, GroupRules, ReconcileError};
use httpmock::prelude::*;
use httpmock::Method::PATCH;
use serde_json::json;
use std::sync::Arc;

fn store_for(server: &MockServer) -> AirtableStore {
    let config = StoreConfig {
        api_url: server.base_url(),
        api_key: Some("key123".to_string()),
        base_key: Some("appXYZ".to_string()),
        ..StoreConfig::default()
    };
    AirtableStore::new(&config).unwrap()
}

fn student_record(id: &str, code: &str, last: &str, first: &str) -> serde_json::Value {
    json!({
        "id": id,
        "createdTime": "2024-03-01T12:00:00.000Z",
        "fields": {"Código": code, "Apellidos": last, "Nombres": first}
    })
}

#[tokio::test]
async fn test_fetch_ungrouped_sends_filter_and_auth() {
    let server = MockServer::start();
    let list_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v0/appXYZ/Estudiantes")
            .header("Authorization", "Bearer key123")
            .query_param("filterByFormula", "{Grupo} = BLANK()")
            .query_param("maxRecords", "50");
        then.status(200).json_body(json!({
            "records": [
                student_record("rec1", "U2020AAAAA", "Pérez", "Ana"),
                student_record("rec2", "2021BBBBB", "Gómez", "Luis")
            ]
        }));
    });

    let students = store_for(&server).fetch_ungrouped_students(50).await.unwrap();

    list_mock.assert();
    assert_eq!(students.len(), 2);
    assert_eq!(students[0].id, "rec1");
    assert_eq!(students[0].code, "U2020AAAAA");
    assert!(students[1].is_ungrouped());
}

#[tokio::test]
async fn test_select_follows_offset_pages() {
    let server = MockServer::start();
    // 較具體的 mock 先註冊
    let second_page = server.mock(|when, then| {
        when.method(GET)
            .path("/v0/appXYZ/Estudiantes")
            .query_param("offset", "itr1");
        then.status(200).json_body(json!({
            "records": [student_record("rec3", "2022CCCCC", "Rojas", "Carla")]
        }));
    });
    let first_page = server.mock(|when, then| {
        when.method(GET).path("/v0/appXYZ/Estudiantes");
        then.status(200).json_body(json!({
            "records": [
                student_record("rec1", "2020AAAAA", "Pérez", "Ana"),
                student_record("rec2", "2021BBBBB", "Gómez", "Luis")
            ],
            "offset": "itr1"
        }));
    });

    let students = store_for(&server).fetch_ungrouped_students(50).await.unwrap();

    first_page.assert_hits(1);
    second_page.assert_hits(1);
    let ids: Vec<&str> = students.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["rec1", "rec2", "rec3"]);
}

#[tokio::test]
async fn test_create_group_posts_member_links() {
    let server = MockServer::start();
    let create_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v0/appXYZ/Grupos")
            .header("Authorization", "Bearer key123")
            .json_body(json!({"fields": {"Integrantes": ["rec1", "rec2"]}}));
        then.status(200).json_body(json!({
            "id": "recG1",
            "createdTime": "2024-03-01T12:00:00.000Z",
            "fields": {"Grupo": 7, "Integrantes": ["rec1", "rec2"], "Número de integrantes": 2}
        }));
    });

    let group = store_for(&server)
        .create_group(&["rec1".to_string(), "rec2".to_string()])
        .await
        .unwrap();

    create_mock.assert();
    assert_eq!(group.id, "recG1");
    assert_eq!(group.number, 7);
    assert_eq!(group.member_count, 2);
}

#[tokio::test]
async fn test_annotate_patches_order_field() {
    let server = MockServer::start();
    let patch_mock = server.mock(|when, then| {
        when.method(PATCH)
            .path("/v0/appXYZ/Estudiantes/rec1")
            .json_body(json!({"fields": {"Orden": 2}}));
        then.status(200).json_body(json!({
            "id": "rec1",
            "fields": {"Código": "2020AAAAA", "Orden": 2}
        }));
    });

    store_for(&server).annotate_student_order("rec1", 2).await.unwrap();
    patch_mock.assert();
}

#[tokio::test]
async fn test_fetch_students_splits_long_id_lists() {
    let server = MockServer::start();
    let lookup = server.mock(|when, then| {
        when.method(GET)
            .path("/v0/appXYZ/Estudiantes")
            .query_param_exists("filterByFormula");
        then.status(200).json_body(json!({
            "records": [student_record("rec1", "2020AAAAA", "Pérez", "Ana")]
        }));
    });

    let ids: Vec<String> = (0..150).map(|i| format!("rec{:014}", i)).collect();
    let students = store_for(&server).fetch_students(&ids).await.unwrap();

    lookup.assert_hits(2);
    assert_eq!(students.len(), 2);
}

#[tokio::test]
async fn test_fetch_students_with_no_ids_skips_request() {
    let server = MockServer::start();
    let lookup = server.mock(|when, then| {
        when.method(GET).path("/v0/appXYZ/Estudiantes");
        then.status(200).json_body(json!({"records": []}));
    });

    let students = store_for(&server).fetch_students(&[]).await.unwrap();

    lookup.assert_hits(0);
    assert!(students.is_empty());
}

#[tokio::test]
async fn test_error_reply_becomes_store_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v0/appXYZ/Grupos");
        then.status(403).json_body(json!({
            "error": {"type": "INVALID_PERMISSIONS_OR_MODEL_NOT_FOUND", "message": "Invalid permissions"}
        }));
    });

    let result = store_for(&server).list_groups(50).await;
    match result {
        Err(AppError::StoreResponseError { status, kind, .. }) => {
            assert_eq!(status, 403);
            assert_eq!(kind, "INVALID_PERMISSIONS_OR_MODEL_NOT_FOUND");
        }
        other => panic!("expected store error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unexpected_shape_is_rejected() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v0/appXYZ/Grupos");
        then.status(200).json_body(json!({"rows": []}));
    });

    let result = store_for(&server).list_groups(50).await;
    assert!(matches!(result, Err(AppError::SerializationError(_))));
}

#[tokio::test]
async fn test_reconcile_against_airtable() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v0/appXYZ/Estudiantes");
        then.status(200).json_body(json!({
            "records": [
                student_record("rec1", "u2020AAAAA", "Pérez", "Ana"),
                student_record("rec2", "2021BBBBB", "Gómez", "Luis")
            ]
        }));
    });
    let patch_mock = server.mock(|when, then| {
        when.method(PATCH).path_contains("/v0/appXYZ/Estudiantes/rec");
        then.status(200).json_body(json!({"id": "rec1", "fields": {}}));
    });
    let create_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v0/appXYZ/Grupos")
            .json_body(json!({"fields": {"Integrantes": ["rec2", "rec1"]}}));
        then.status(200).json_body(json!({
            "id": "recG",
            "fields": {"Grupo": 1, "Integrantes": ["rec2", "rec1"], "Número de integrantes": 2}
        }));
    });

    let reconciler =
        GroupReconciler::new(Arc::new(store_for(&server)), GroupRules::default()).unwrap();
    let group = reconciler
        .reconcile(&["2021bbbbb".to_string(), "U2020AAAAA".to_string()])
        .await
        .unwrap();

    patch_mock.assert_hits(2);
    create_mock.assert();
    assert_eq!(group.number, 1);
    assert_eq!(group.members[0].id, "rec2");
}

#[tokio::test]
async fn test_reconcile_surfaces_create_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v0/appXYZ/Estudiantes");
        then.status(200).json_body(json!({
            "records": [student_record("rec1", "2020AAAAA", "Pérez", "Ana")]
        }));
    });
    server.mock(|when, then| {
        when.method(PATCH).path("/v0/appXYZ/Estudiantes/rec1");
        then.status(200).json_body(json!({"id": "rec1", "fields": {}}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/v0/appXYZ/Grupos");
        then.status(422).json_body(json!({"error": "INVALID_REQUEST_UNKNOWN"}));
    });

    let reconciler =
        GroupReconciler::new(Arc::new(store_for(&server)), GroupRules::default()).unwrap();
    let result = reconciler.reconcile(&["2020AAAAA".to_string()]).await;

    assert!(matches!(
        result,
        Err(ReconcileError::StoreFailure(AppError::StoreResponseError { status: 422, .. }))
    ));
}
