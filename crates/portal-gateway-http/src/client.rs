//! [`HttpGateway`]: the hosted backend reached over HTTPS.

use std::{
  path::PathBuf,
  sync::{Arc, PoisonError, RwLock},
  time::Duration,
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use portal_core::gateway::{
  Gateway, IdentityMetadata, Query, Row, Session, SessionChange,
  SessionSubscription, Table,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
  Error, Result,
  error::error_message,
  session_file,
};

const EVENT_BUFFER: usize = 16;

// ─── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
  /// Project base URL, e.g. `https://xyz.example.co`.
  pub url:          String,
  /// Public (anonymous) API key.
  pub anon_key:     String,
  /// Privileged key. Needed to create identities without signing them in
  /// and to delete identities.
  pub service_key:  Option<String>,
  pub bucket:       String,
  /// Where to keep the session between runs. In memory only when unset.
  pub session_file: Option<PathBuf>,
  pub timeout_secs: u64,
}

impl Default for HttpSettings {
  fn default() -> Self {
    Self {
      url:          "http://localhost:54321".into(),
      anon_key:     String::new(),
      service_key:  None,
      bucket:       "documents".into(),
      session_file: None,
      timeout_secs: 30,
    }
  }
}

// ─── Response shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AuthUser {
  id:    Uuid,
  email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: String,
  expires_in:   Option<i64>,
  expires_at:   Option<i64>,
  user:         AuthUser,
}

/// Sign-up answers with a session when confirmation is off and with the
/// bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
  WithSession { user: AuthUser },
  User(AuthUser),
}

impl SignUpResponse {
  fn id(&self) -> Uuid {
    match self {
      Self::WithSession { user } | Self::User(user) => user.id,
    }
  }
}

// ─── Gateway ─────────────────────────────────────────────────────────────────

/// Cheap to clone; clones share the HTTP client, the session and the
/// event channel.
#[derive(Clone)]
pub struct HttpGateway {
  client:   Client,
  settings: Arc<HttpSettings>,
  session:  Arc<RwLock<Option<Session>>>,
  events:   broadcast::Sender<SessionChange>,
}

impl HttpGateway {
  /// Build the client and restore the persisted session, if any.
  pub fn new(settings: HttpSettings) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(settings.timeout_secs))
      .build()?;
    let session = match &settings.session_file {
      Some(path) => session_file::load(path)?,
      None => None,
    };
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    Ok(Self {
      client,
      settings: Arc::new(settings),
      session: Arc::new(RwLock::new(session)),
      events,
    })
  }

  fn endpoint(&self, path: &str) -> String {
    format!("{}{path}", self.settings.url.trim_end_matches('/'))
  }

  fn rest_url(&self, table: Table) -> String { self.endpoint(&format!("/rest/v1/{table}")) }

  fn object_url(&self, path: &str) -> String {
    self.endpoint(&format!(
      "/storage/v1/object/{}/{}",
      self.settings.bucket,
      path.trim_start_matches('/')
    ))
  }

  fn token(&self) -> Option<String> {
    self
      .session
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .as_ref()
      .map(|s| s.access_token.clone())
  }

  /// A request authorized as the signed-in user, or anonymously.
  fn request(&self, method: Method, url: String) -> RequestBuilder {
    let bearer = self.token().unwrap_or_else(|| self.settings.anon_key.clone());
    self
      .client
      .request(method, url)
      .header("apikey", &self.settings.anon_key)
      .bearer_auth(bearer)
  }

  fn anonymous(&self, method: Method, url: String) -> RequestBuilder {
    self
      .client
      .request(method, url)
      .header("apikey", &self.settings.anon_key)
      .bearer_auth(&self.settings.anon_key)
  }

  fn privileged(&self, method: Method, url: String, what: &'static str) -> Result<RequestBuilder> {
    let key = self
      .settings
      .service_key
      .as_ref()
      .ok_or(Error::MissingServiceKey(what))?;
    Ok(self.client.request(method, url).header("apikey", key).bearer_auth(key))
  }

  async fn send(req: RequestBuilder) -> Result<Response> {
    let resp = req.send().await?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Status { status, message: error_message(status, &body) })
  }

  async fn set_session(&self, session: Option<Session>) -> Result<()> {
    *self.session.write().unwrap_or_else(PoisonError::into_inner) = session.clone();
    if let Some(path) = &self.settings.session_file {
      session_file::store(path, session.as_ref()).await?;
    }
    let change = match session {
      Some(session) => SessionChange::SignedIn(session),
      None => SessionChange::SignedOut,
    };
    let _ = self.events.send(change);
    Ok(())
  }

  async fn rows(&self, req: RequestBuilder) -> Result<Vec<Row>> {
    Ok(Self::send(req).await?.json().await?)
  }
}

/// Query-string parameters for a row select.
pub(crate) fn select_params(query: &Query) -> Vec<(String, String)> {
  let mut params = vec![("select".to_owned(), "*".to_owned())];
  for (column, value) in &query.filters {
    let condition = match value {
      Value::Null => "is.null".to_owned(),
      Value::String(s) => format!("eq.{s}"),
      other => format!("eq.{other}"),
    };
    params.push((column.clone(), condition));
  }
  if let Some(order) = &query.order {
    let direction = if order.ascending { "asc" } else { "desc" };
    params.push(("order".to_owned(), format!("{}.{direction}", order.column)));
  }
  params
}

fn by_id(id: Uuid) -> [(&'static str, String); 1] { [("id", format!("eq.{id}"))] }

fn expiry(token: &TokenResponse) -> Option<DateTime<Utc>> {
  token
    .expires_at
    .and_then(|secs| DateTime::from_timestamp(secs, 0))
    .or_else(|| {
      token
        .expires_in
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
    })
}

impl Gateway for HttpGateway {
  type Error = Error;

  // ── Auth ──────────────────────────────────────────────────────────────

  async fn current_session(&self) -> Result<Option<Session>> {
    let session = self
      .session
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    match session {
      Some(s) if s.is_expired(Utc::now()) => {
        tracing::debug!(user_id = %s.user_id, "dropping expired session");
        self.set_session(None).await?;
        Ok(None)
      }
      other => Ok(other),
    }
  }

  fn subscribe(&self) -> SessionSubscription {
    SessionSubscription::new(self.events.subscribe())
  }

  async fn sign_in_with_password(&self, email: String, password: String) -> Result<Session> {
    let req = self
      .anonymous(Method::POST, self.endpoint("/auth/v1/token"))
      .query(&[("grant_type", "password")])
      .json(&json!({ "email": email, "password": password }));
    let token: TokenResponse = Self::send(req).await?.json().await?;

    let session = Session {
      user_id:      token.user.id,
      email:        token.user.email.clone().unwrap_or(email),
      expires_at:   expiry(&token),
      access_token: token.access_token,
    };
    tracing::info!(user_id = %session.user_id, "signed in");
    self.set_session(Some(session.clone())).await?;
    Ok(session)
  }

  async fn sign_out(&self) -> Result<()> {
    let remote = match self.token() {
      Some(_) => {
        Self::send(self.request(Method::POST, self.endpoint("/auth/v1/logout")))
          .await
          .map(|_| ())
      }
      None => Ok(()),
    };
    // The local session ends even when the backend could not be reached.
    self.set_session(None).await?;
    tracing::info!("signed out");
    remote
  }

  async fn create_identity(
    &self,
    email: String,
    password: String,
    metadata: IdentityMetadata,
  ) -> Result<Uuid> {
    let id = if self.settings.service_key.is_some() {
      let req = self
        .privileged(Method::POST, self.endpoint("/auth/v1/admin/users"), "creating identities")?
        .json(&json!({
          "email": email,
          "password": password,
          "email_confirm": true,
          "user_metadata": metadata,
        }));
      let user: AuthUser = Self::send(req).await?.json().await?;
      user.id
    } else {
      let req = self
        .anonymous(Method::POST, self.endpoint("/auth/v1/signup"))
        .json(&json!({ "email": email, "password": password, "data": metadata }));
      let created: SignUpResponse = Self::send(req).await?.json().await?;
      created.id()
    };
    tracing::info!(%id, "identity created");
    Ok(id)
  }

  async fn delete_identity(&self, id: Uuid) -> Result<()> {
    let req = self.privileged(
      Method::DELETE,
      self.endpoint(&format!("/auth/v1/admin/users/{id}")),
      "deleting identities",
    )?;
    Self::send(req).await?;
    tracing::info!(%id, "identity deleted");
    Ok(())
  }

  // ── Rows ──────────────────────────────────────────────────────────────

  async fn select(&self, table: Table, query: Query) -> Result<Vec<Row>> {
    let req = self
      .request(Method::GET, self.rest_url(table))
      .query(&select_params(&query));
    self.rows(req).await
  }

  async fn select_one(&self, table: Table, id: Uuid) -> Result<Row> {
    let req = self
      .request(Method::GET, self.rest_url(table))
      .query(&[("select", "*")])
      .query(&by_id(id));
    self
      .rows(req)
      .await?
      .into_iter()
      .next()
      .ok_or(Error::NotFound { table, id })
  }

  async fn insert(&self, table: Table, row: Row) -> Result<Row> {
    let req = self
      .request(Method::POST, self.rest_url(table))
      .header("Prefer", "return=representation")
      .json(&row);
    self
      .rows(req)
      .await?
      .into_iter()
      .next()
      .ok_or(Error::UnexpectedResponse("insert returned no row"))
  }

  async fn update(&self, table: Table, id: Uuid, patch: Row) -> Result<()> {
    let req = self
      .request(Method::PATCH, self.rest_url(table))
      .query(&by_id(id))
      .header("Prefer", "return=representation")
      .json(&patch);
    if self.rows(req).await?.is_empty() {
      return Err(Error::NotFound { table, id });
    }
    Ok(())
  }

  async fn delete(&self, table: Table, id: Uuid) -> Result<()> {
    let req = self
      .request(Method::DELETE, self.rest_url(table))
      .query(&by_id(id));
    Self::send(req).await?;
    Ok(())
  }

  // ── Blobs ─────────────────────────────────────────────────────────────

  async fn upload(&self, path: String, bytes: Bytes, content_type: String) -> Result<()> {
    let size = bytes.len();
    let req = self
      .request(Method::POST, self.object_url(&path))
      .header("Content-Type", content_type)
      .body(bytes);
    Self::send(req).await?;
    tracing::debug!(%path, size, "blob uploaded");
    Ok(())
  }

  fn public_url(&self, path: &str) -> String {
    self.endpoint(&format!(
      "/storage/v1/object/public/{}/{}",
      self.settings.bucket,
      path.trim_start_matches('/')
    ))
  }

  async fn remove(&self, path: String) -> Result<()> {
    match Self::send(self.request(Method::DELETE, self.object_url(&path))).await {
      Ok(_) => Ok(()),
      Err(Error::Status { status: StatusCode::NOT_FOUND, .. }) => Ok(()),
      Err(e) => Err(e),
    }
  }
}
