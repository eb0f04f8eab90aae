//! Shared fixtures: an in-memory, call-recording [`Gateway`] and a harness
//! that signs a user in through it.


use std::{
  collections::{HashMap, HashSet},
  sync::{Arc, Mutex},
  time::Duration,
};

use bytes::Bytes;
use chrono::Utc;
use portal_core::{
  gateway::{
    Gateway, IdentityMetadata, Query, Row, Session, SessionChange,
    SessionSubscription, Table,
  },
  user::{Role, User, UserType},
};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{Portal, PortalConfig, lock, toast::MemoryToaster, wire::FromRow};

pub const PASSWORD: &str = "correct horse";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
  CurrentSession,
  SignIn(String),
  SignOut,
  CreateIdentity(String),
  DeleteIdentity(Uuid),
  Select(Table, Query),
  SelectOne(Table, Uuid),
  Insert(Table, Row),
  Update(Table, Uuid, Row),
  Delete(Table, Uuid),
  Upload(String),
  Remove(String),
}

/// Operations a test can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
  CreateIdentity,
  DeleteIdentity,
  Insert(Table),
  SelectOne(Table),
  Remove,
  SignOut,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct StubError(pub String);

pub struct StubGateway {
  calls:        Mutex<Vec<Call>>,
  tables:       Mutex<HashMap<Table, Vec<Row>>>,
  identities:   Mutex<HashMap<String, (String, Uuid)>>,
  session:      Mutex<Option<Session>>,
  failures:     Mutex<HashSet<Failure>>,
  select_delay: Mutex<Duration>,
  events:       broadcast::Sender<SessionChange>,
}

impl StubGateway {
  pub fn new() -> Self {
    Self {
      calls:        Mutex::new(Vec::new()),
      tables:       Mutex::new(HashMap::new()),
      identities:   Mutex::new(HashMap::new()),
      session:      Mutex::new(None),
      failures:     Mutex::new(HashSet::new()),
      select_delay: Mutex::new(Duration::ZERO),
      events:       broadcast::channel(16).0,
    }
  }

  pub fn calls(&self) -> Vec<Call> { lock(&self.calls).clone() }

  pub fn clear_calls(&self) { lock(&self.calls).clear() }

  pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
    lock(&self.calls).iter().filter(|c| pred(c)).count()
  }

  pub fn fail(&self, failure: Failure) { lock(&self.failures).insert(failure); }

  pub fn delay_selects(&self, delay: Duration) { *lock(&self.select_delay) = delay; }

  pub fn rows(&self, table: Table) -> Vec<Row> {
    lock(&self.tables).get(&table).cloned().unwrap_or_default()
  }

  /// Store a row as-is, filling in an id if it has none. Returns the id.
  pub fn put(&self, table: Table, value: Value) -> Uuid {
    let Value::Object(mut row) = value else { panic!("rows are objects") };
    let id = match row.get("id").and_then(Value::as_str) {
      Some(id) => Uuid::parse_str(id).unwrap(),
      None => {
        let id = Uuid::new_v4();
        row.insert("id".into(), json!(id));
        id
      }
    };
    lock(&self.tables).entry(table).or_default().push(row);
    id
  }

  /// A user with an identity (password [`PASSWORD`]) and a profile row.
  pub fn seed_user(&self, name: &str, role: Role) -> User {
    let email = format!("{}@example.com", name.to_lowercase());
    let id = self.put(
      Table::Users,
      json!({
        "name": name,
        "email": email,
        "role": role.as_ref(),
        "type": UserType::CentralServices.as_ref(),
        "created_at": Utc::now().to_rfc3339(),
      }),
    );
    lock(&self.identities).insert(email, (PASSWORD.to_string(), id));
    let row = self.rows(Table::Users).into_iter().find(|r| r["id"] == json!(id));
    User::from_row(row.unwrap()).unwrap()
  }

  /// Make `user` the current session without publishing an event, as if a
  /// session had been restored from storage.
  pub fn restore_session(&self, user: &User) {
    *lock(&self.session) = Some(session_for(user.id, &user.email));
  }

  /// Publish a session change, as the auth service would.
  pub fn emit(&self, change: SessionChange) {
    if let SessionChange::SignedIn(session) = &change {
      *lock(&self.session) = Some(session.clone());
    } else {
      *lock(&self.session) = None;
    }
    let _ = self.events.send(change);
  }

  fn record(&self, call: Call) { lock(&self.calls).push(call); }

  fn failing(&self, failure: Failure) -> Result<(), StubError> {
    if lock(&self.failures).contains(&failure) {
      return Err(StubError(format!("injected failure: {failure:?}")));
    }
    Ok(())
  }
}

fn session_for(user_id: Uuid, email: &str) -> Session {
  Session {
    user_id,
    email: email.to_string(),
    access_token: format!("token-{user_id}"),
    expires_at: None,
  }
}

fn row_id(row: &Row) -> Option<Uuid> {
  row.get("id").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

impl Gateway for StubGateway {
  type Error = StubError;

  async fn current_session(&self) -> Result<Option<Session>, StubError> {
    self.record(Call::CurrentSession);
    Ok(lock(&self.session).clone())
  }

  fn subscribe(&self) -> SessionSubscription {
    SessionSubscription::new(self.events.subscribe())
  }

  async fn sign_in_with_password(
    &self,
    email: String,
    password: String,
  ) -> Result<Session, StubError> {
    self.record(Call::SignIn(email.clone()));
    let identity = lock(&self.identities).get(&email).cloned();
    match identity {
      Some((expected, id)) if expected == password => {
        let session = session_for(id, &email);
        self.emit(SessionChange::SignedIn(session.clone()));
        Ok(session)
      }
      _ => Err(StubError("Invalid login credentials".into())),
    }
  }

  async fn sign_out(&self) -> Result<(), StubError> {
    self.record(Call::SignOut);
    self.failing(Failure::SignOut)?;
    self.emit(SessionChange::SignedOut);
    Ok(())
  }

  async fn create_identity(
    &self,
    email: String,
    password: String,
    _metadata: IdentityMetadata,
  ) -> Result<Uuid, StubError> {
    self.record(Call::CreateIdentity(email.clone()));
    self.failing(Failure::CreateIdentity)?;
    let id = Uuid::new_v4();
    lock(&self.identities).insert(email, (password, id));
    Ok(id)
  }

  async fn delete_identity(&self, id: Uuid) -> Result<(), StubError> {
    self.record(Call::DeleteIdentity(id));
    self.failing(Failure::DeleteIdentity)?;
    lock(&self.identities).retain(|_, (_, uid)| *uid != id);
    Ok(())
  }

  async fn select(&self, table: Table, query: Query) -> Result<Vec<Row>, StubError> {
    self.record(Call::Select(table, query.clone()));
    let delay = *lock(&self.select_delay);
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }

    let mut rows: Vec<Row> =
      self.rows(table).into_iter().filter(|r| query.matches(r)).collect();
    if let Some(order) = &query.order {
      let key = |r: &Row| r.get(&order.column).map(Value::to_string).unwrap_or_default();
      rows.sort_by_key(key);
      if !order.ascending {
        rows.reverse();
      }
    }
    Ok(rows)
  }

  async fn select_one(&self, table: Table, id: Uuid) -> Result<Row, StubError> {
    self.record(Call::SelectOne(table, id));
    self.failing(Failure::SelectOne(table))?;
    self
      .rows(table)
      .into_iter()
      .find(|r| row_id(r) == Some(id))
      .ok_or_else(|| StubError(format!("no {table} row {id}")))
  }

  async fn insert(&self, table: Table, row: Row) -> Result<Row, StubError> {
    self.record(Call::Insert(table, row.clone()));
    self.failing(Failure::Insert(table))?;

    let mut stored = row;
    stored.entry("id").or_insert_with(|| json!(Uuid::new_v4()));
    stored
      .entry("created_at")
      .or_insert_with(|| json!(Utc::now().to_rfc3339()));
    lock(&self.tables).entry(table).or_default().push(stored.clone());
    Ok(stored)
  }

  async fn update(&self, table: Table, id: Uuid, patch: Row) -> Result<(), StubError> {
    self.record(Call::Update(table, id, patch.clone()));
    let mut tables = lock(&self.tables);
    let row = tables
      .get_mut(&table)
      .and_then(|rows| rows.iter_mut().find(|r| row_id(r) == Some(id)))
      .ok_or_else(|| StubError(format!("no {table} row {id}")))?;
    row.extend(patch);
    Ok(())
  }

  async fn delete(&self, table: Table, id: Uuid) -> Result<(), StubError> {
    self.record(Call::Delete(table, id));
    if let Some(rows) = lock(&self.tables).get_mut(&table) {
      rows.retain(|r| row_id(r) != Some(id));
    }
    Ok(())
  }

  async fn upload(
    &self,
    path: String,
    _bytes: Bytes,
    _content_type: String,
  ) -> Result<(), StubError> {
    self.record(Call::Upload(path));
    Ok(())
  }

  fn public_url(&self, path: &str) -> String {
    format!("https://stub.local/storage/v1/object/public/documents/{path}")
  }

  async fn remove(&self, path: String) -> Result<(), StubError> {
    self.record(Call::Remove(path));
    self.failing(Failure::Remove)
  }
}

pub struct Harness {
  pub portal:  Portal<StubGateway>,
  pub toaster: Arc<MemoryToaster>,
}

impl Harness {
  /// A started portal with nobody signed in.
  pub async fn signed_out() -> Self {
    let toaster = Arc::new(MemoryToaster::new());
    let portal = Portal::new(StubGateway::new(), &PortalConfig::default(), toaster.clone());
    portal.start().await;
    Self { portal, toaster }
  }

  /// A started portal with a user of `role` signed in. Calls and toasts
  /// made while setting up are cleared.
  pub async fn signed_in(role: Role) -> (Self, User) {
    let toaster = Arc::new(MemoryToaster::new());
    let stub = StubGateway::new();
    let user = stub.seed_user("Carmen", role);
    stub.restore_session(&user);

    let portal = Portal::new(stub, &PortalConfig::default(), toaster.clone());
    portal.start().await;
    assert_eq!(portal.session().current_user().as_ref(), Some(&user));

    portal.gateway().clear_calls();
    toaster.drain();
    (Self { portal, toaster }, user)
  }

  pub fn stub(&self) -> &StubGateway { self.portal.gateway() }
}
