//! Integration tests for `SqliteGateway` against an in-memory database.

use bytes::Bytes;
use portal_core::{
  gateway::{Gateway, IdentityMetadata, Query, Row, SessionChange, Table},
  user::{Role, UserType},
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{Error, GatewaySettings, SqliteGateway};

async fn gateway() -> SqliteGateway {
  SqliteGateway::open_in_memory(GatewaySettings::default())
    .await
    .expect("in-memory gateway")
}

fn row(value: Value) -> Row {
  match value {
    Value::Object(map) => map,
    other => panic!("not an object: {other}"),
  }
}

fn branch(name: &str) -> Row {
  row(json!({
    "name": name,
    "address": "Calle Mayor 1",
    "postal_code": "28001",
    "city": "Madrid",
    "province": "Madrid",
    "contact_person": "Ana",
    "email": "madrid@example.com",
  }))
}

fn metadata() -> IdentityMetadata {
  IdentityMetadata {
    name:      "Ana".into(),
    role:      Role::Admin,
    user_type: UserType::Administrator,
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_fills_id_and_timestamps() {
  let g = gateway().await;
  let stored = g.insert(Table::Branches, branch("Madrid")).await.unwrap();

  let id = Uuid::parse_str(stored["id"].as_str().unwrap()).unwrap();
  assert!(stored["created_at"].as_str().unwrap().ends_with('Z'));
  assert_eq!(stored["phone"], Value::Null);
  assert_eq!(g.select_one(Table::Branches, id).await.unwrap(), stored);
}

#[tokio::test]
async fn select_filters_and_orders() {
  let g = gateway().await;
  for name in ["Sevilla", "Bilbao", "Madrid"] {
    g.insert(Table::Branches, branch(name)).await.unwrap();
  }

  let names = |rows: Vec<Row>| {
    rows
      .into_iter()
      .map(|r| r["name"].as_str().unwrap().to_owned())
      .collect::<Vec<_>>()
  };

  let asc = g
    .select(Table::Branches, Query::all().order_by("name", true))
    .await
    .unwrap();
  assert_eq!(names(asc), ["Bilbao", "Madrid", "Sevilla"]);

  let desc = g
    .select(Table::Branches, Query::all().order_by("name", false))
    .await
    .unwrap();
  assert_eq!(names(desc), ["Sevilla", "Madrid", "Bilbao"]);

  let one = g
    .select(Table::Branches, Query::all().eq("name", "Bilbao"))
    .await
    .unwrap();
  assert_eq!(names(one), ["Bilbao"]);
}

#[tokio::test]
async fn unknown_filter_column_is_rejected() {
  let g = gateway().await;
  let err = g
    .select(Table::Branches, Query::all().eq("nope", "x"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UnknownColumn { .. }));
}

#[tokio::test]
async fn json_and_bool_columns_survive_storage() {
  let g = gateway().await;
  let stored = g
    .insert(
      Table::News,
      row(json!({
        "title": "Nueva tarifa",
        "content": "...",
        "category": "general",
        "author": "Ana",
        "featured": true,
        "tags": ["auto", "hogar"],
      })),
    )
    .await
    .unwrap();
  assert_eq!(stored["featured"], json!(true));
  assert_eq!(stored["tags"], json!(["auto", "hogar"]));
}

#[tokio::test]
async fn update_is_partial() {
  let g = gateway().await;
  let stored = g.insert(Table::Branches, branch("Madrid")).await.unwrap();
  let id = Uuid::parse_str(stored["id"].as_str().unwrap()).unwrap();

  g.update(Table::Branches, id, row(json!({ "phone": "910000000" })))
    .await
    .unwrap();

  let after = g.select_one(Table::Branches, id).await.unwrap();
  assert_eq!(after["phone"], json!("910000000"));
  assert_eq!(after["name"], json!("Madrid"));

  g.update(Table::Branches, id, row(json!({ "phone": null })))
    .await
    .unwrap();
  let cleared = g.select_one(Table::Branches, id).await.unwrap();
  assert_eq!(cleared["phone"], Value::Null);
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() {
  let g = gateway().await;
  let err = g
    .update(Table::Branches, Uuid::new_v4(), row(json!({ "name": "x" })))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { table: Table::Branches, .. }));
}

#[tokio::test]
async fn deleting_a_company_cascades_to_specifications() {
  let g = gateway().await;
  let company = g
    .insert(Table::Companies, row(json!({ "name": "Mapfre" })))
    .await
    .unwrap();
  let company_id = company["id"].as_str().unwrap().to_owned();
  g.insert(
    Table::CompanySpecifications,
    row(json!({ "category": "Auto", "content": "...", "company_id": company_id })),
  )
  .await
  .unwrap();

  let id = Uuid::parse_str(&company_id).unwrap();
  g.delete(Table::Companies, id).await.unwrap();

  let specs = g
    .select(
      Table::CompanySpecifications,
      Query::all().eq("company_id", company_id),
    )
    .await
    .unwrap();
  assert!(specs.is_empty());
  assert!(matches!(
    g.select_one(Table::Companies, id).await,
    Err(Error::NotFound { .. })
  ));
}

#[tokio::test]
async fn check_constraints_reject_unknown_roles() {
  let g = gateway().await;
  let err = g
    .insert(
      Table::Users,
      row(json!({ "name": "x", "email": "x@example.com", "role": "root", "type": "x" })),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Database(_)));
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sign_in_publishes_and_persists_the_session() {
  let g = gateway().await;
  let id = g
    .create_identity("Ana@Example.com".into(), "secreto1".into(), metadata())
    .await
    .unwrap();

  let mut events = g.subscribe();
  let session = g
    .sign_in_with_password("ana@example.com".into(), "secreto1".into())
    .await
    .unwrap();
  assert_eq!(session.user_id, id);
  assert_eq!(session.email, "ana@example.com");
  assert_eq!(events.recv().await, Some(SessionChange::SignedIn(session.clone())));

  assert_eq!(g.current_session().await.unwrap(), Some(session));
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
  let g = gateway().await;
  g.create_identity("ana@example.com".into(), "secreto1".into(), metadata())
    .await
    .unwrap();

  let wrong = g
    .sign_in_with_password("ana@example.com".into(), "secreto2".into())
    .await
    .unwrap_err();
  assert!(matches!(wrong, Error::InvalidCredentials));

  let unknown = g
    .sign_in_with_password("nadie@example.com".into(), "secreto1".into())
    .await
    .unwrap_err();
  assert_eq!(unknown.to_string(), wrong.to_string());
  assert_eq!(g.current_session().await.unwrap(), None);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
  let g = gateway().await;
  g.create_identity("ana@example.com".into(), "secreto1".into(), metadata())
    .await
    .unwrap();
  let err = g
    .create_identity("ANA@example.com".into(), "otro123".into(), metadata())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::EmailTaken(email) if email == "ana@example.com"));
}

#[tokio::test]
async fn sign_out_clears_the_session() {
  let g = gateway().await;
  g.create_identity("ana@example.com".into(), "secreto1".into(), metadata())
    .await
    .unwrap();
  g.sign_in_with_password("ana@example.com".into(), "secreto1".into())
    .await
    .unwrap();

  let mut events = g.subscribe();
  g.sign_out().await.unwrap();
  assert_eq!(events.recv().await, Some(SessionChange::SignedOut));
  assert_eq!(g.current_session().await.unwrap(), None);
}

#[tokio::test]
async fn expired_sessions_are_dropped() {
  let settings = GatewaySettings { session_ttl_hours: 0, ..Default::default() };
  let g = SqliteGateway::open_in_memory(settings).await.unwrap();
  g.create_identity("ana@example.com".into(), "secreto1".into(), metadata())
    .await
    .unwrap();
  g.sign_in_with_password("ana@example.com".into(), "secreto1".into())
    .await
    .unwrap();

  assert_eq!(g.current_session().await.unwrap(), None);
}

#[tokio::test]
async fn deleting_an_identity_ends_its_session() {
  let g = gateway().await;
  let id = g
    .create_identity("ana@example.com".into(), "secreto1".into(), metadata())
    .await
    .unwrap();
  g.sign_in_with_password("ana@example.com".into(), "secreto1".into())
    .await
    .unwrap();

  g.delete_identity(id).await.unwrap();
  assert_eq!(g.current_session().await.unwrap(), None);
  assert!(
    g.sign_in_with_password("ana@example.com".into(), "secreto1".into())
      .await
      .is_err()
  );
}

// ─── Blobs ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn blobs_store_and_remove() {
  let g = gateway().await;
  g.upload(
    "1700000000000_poliza.pdf".into(),
    Bytes::from_static(b"%PDF"),
    "application/pdf".into(),
  )
  .await
  .unwrap();

  let (content_type, bytes) = g.blob("1700000000000_poliza.pdf").await.unwrap().unwrap();
  assert_eq!(content_type, "application/pdf");
  assert_eq!(bytes, Bytes::from_static(b"%PDF"));

  g.remove("1700000000000_poliza.pdf".into()).await.unwrap();
  assert!(g.blob("1700000000000_poliza.pdf").await.unwrap().is_none());
  // Removing again is not an error.
  g.remove("1700000000000_poliza.pdf".into()).await.unwrap();
}

#[tokio::test]
async fn public_url_ends_with_the_path() {
  let settings = GatewaySettings {
    public_base_url: "https://files.example.com/".into(),
    ..Default::default()
  };
  let g = SqliteGateway::open_in_memory(settings).await.unwrap();
  assert_eq!(
    g.public_url("17_a.pdf"),
    "https://files.example.com/documents/17_a.pdf"
  );
}
