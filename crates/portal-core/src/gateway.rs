//! The `Gateway` trait: the hosted backend as seen by the portal.
//!
//! The trait is implemented by backends (`portal-store-sqlite`,
//! `portal-gateway-http`). The client layer depends on this abstraction,
//! never on a concrete backend.
//!
//! Rows cross the boundary in wire shape: JSON objects keyed by the
//! backend's snake_case column names. Translating them to domain types is
//! the caller's job.

use std::future::Future;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::user::{Role, UserType};

/// One table row in wire shape.
pub type Row = serde_json::Map<String, Value>;

/// The text form of a timestamp column: UTC with microseconds and a `Z`
/// suffix. Fixed width, so stored values sort lexicographically.
pub fn timestamp(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ─── Tables ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Table {
  Users,
  Branches,
  Companies,
  CompanySpecifications,
  Products,
  ProductCategories,
  Documents,
  News,
  CalendarEvents,
  /// Present on the backend; the portal keeps notifications in memory.
  Notifications,
}

// ─── Query ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
  pub column:    String,
  pub ascending: bool,
}

/// Parameters for [`Gateway::select`]: equality filters and an optional
/// ordering. The default query selects every row in backend order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
  pub filters: Vec<(String, Value)>,
  pub order:   Option<Order>,
}

impl Query {
  pub fn all() -> Self { Self::default() }

  /// Keep rows whose `column` equals `value`.
  pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
    self.filters.push((column.to_owned(), value.into()));
    self
  }

  pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
    self.order = Some(Order { column: column.to_owned(), ascending });
    self
  }

  /// Whether `row` satisfies every filter. Backends that filter in memory
  /// use this.
  pub fn matches(&self, row: &Row) -> bool {
    self
      .filters
      .iter()
      .all(|(column, value)| row.get(column) == Some(value))
  }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// An authenticated backend session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  /// Id of the authentication identity; equal to the profile row id.
  pub user_id:      Uuid,
  pub email:        String,
  pub access_token: String,
  pub expires_at:   Option<DateTime<Utc>>,
}

impl Session {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|at| at <= now)
  }
}

/// A change to the backend's current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
  SignedIn(Session),
  SignedOut,
}

/// A live subscription to [`SessionChange`] events.
///
/// Events are buffered from the moment of subscription, so a caller can
/// subscribe, perform other work, and then drain what happened meanwhile.
/// Dropping the subscription (or calling [`unsubscribe`](Self::unsubscribe))
/// ends it.
#[derive(Debug)]
pub struct SessionSubscription {
  rx: broadcast::Receiver<SessionChange>,
}

impl SessionSubscription {
  pub fn new(rx: broadcast::Receiver<SessionChange>) -> Self { Self { rx } }

  /// Wait for the next event. Returns `None` once the backend has gone
  /// away. If the subscriber fell behind, the oldest missed events are
  /// skipped.
  pub async fn recv(&mut self) -> Option<SessionChange> {
    loop {
      match self.rx.recv().await {
        Ok(change) => return Some(change),
        Err(broadcast::error::RecvError::Lagged(_)) => continue,
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }

  pub fn unsubscribe(self) {}
}

/// Metadata attached to a newly provisioned identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMetadata {
  pub name:      String,
  pub role:      Role,
  #[serde(rename = "type")]
  pub user_type: UserType,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the hosted backend: authentication, row storage and
/// blob storage.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tokio tasks.
pub trait Gateway: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Auth ──────────────────────────────────────────────────────────────

  /// The session currently held by the backend client, if any.
  fn current_session(
    &self,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// Subscribe to session changes. Events that occur after this call
  /// returns are never lost.
  fn subscribe(&self) -> SessionSubscription;

  /// Check credentials and establish a session. Publishes
  /// [`SessionChange::SignedIn`] on success.
  fn sign_in_with_password(
    &self,
    email: String,
    password: String,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + '_;

  /// Terminate the current session. Publishes [`SessionChange::SignedOut`].
  fn sign_out(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Provision an authentication identity and return its id.
  fn create_identity(
    &self,
    email: String,
    password: String,
    metadata: IdentityMetadata,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  /// Remove an authentication identity. Privileged.
  fn delete_identity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Rows ──────────────────────────────────────────────────────────────

  fn select(
    &self,
    table: Table,
    query: Query,
  ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send + '_;

  /// Fetch one row by primary key. A missing row is an error.
  fn select_one(
    &self,
    table: Table,
    id: Uuid,
  ) -> impl Future<Output = Result<Row, Self::Error>> + Send + '_;

  /// Insert a row and return it as stored, with server defaults applied.
  fn insert(
    &self,
    table: Table,
    row: Row,
  ) -> impl Future<Output = Result<Row, Self::Error>> + Send + '_;

  /// Apply a partial update: only the columns present in `patch` change.
  fn update(
    &self,
    table: Table,
    id: Uuid,
    patch: Row,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete(
    &self,
    table: Table,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Blobs ─────────────────────────────────────────────────────────────

  fn upload(
    &self,
    path: String,
    bytes: Bytes,
    content_type: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The publicly resolvable URL for a stored path. The last path segment
  /// of the URL is the storage path's last segment.
  fn public_url(&self, path: &str) -> String;

  fn remove(
    &self,
    path: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  #[test]
  fn table_names_are_snake_case() {
    assert_eq!(Table::CompanySpecifications.as_ref(), "company_specifications");
    assert_eq!(Table::CalendarEvents.to_string(), "calendar_events");
  }

  #[test]
  fn query_matches_equality_filters() {
    let user = Uuid::new_v4();
    let query = Query::all().eq("user_id", user.to_string());

    let mut row = Row::new();
    row.insert("user_id".into(), json!(user.to_string()));
    assert!(query.matches(&row));

    row.insert("user_id".into(), json!(Uuid::new_v4().to_string()));
    assert!(!query.matches(&row));
    assert!(Query::all().matches(&row));
  }

  #[tokio::test]
  async fn subscription_buffers_events() {
    let (tx, rx) = broadcast::channel(8);
    let mut sub = SessionSubscription::new(rx);
    tx.send(SessionChange::SignedOut).unwrap();
    drop(tx);
    assert_eq!(sub.recv().await, Some(SessionChange::SignedOut));
    assert_eq!(sub.recv().await, None);
  }

  #[test]
  fn timestamps_are_fixed_width_and_sort_chronologically() {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 59, 59).unwrap();
    let times = [
      base,
      base + chrono::Duration::milliseconds(500),
      base + chrono::Duration::seconds(1),
      base + chrono::Duration::microseconds(1_000_001),
    ];
    let texts: Vec<String> = times.iter().map(|t| timestamp(*t)).collect();

    assert_eq!(texts[0], "2024-03-01T09:59:59.000000Z");
    assert!(texts.iter().all(|t| t.len() == texts[0].len()));
    let mut sorted = texts.clone();
    sorted.sort();
    assert_eq!(sorted, texts);
  }
}
