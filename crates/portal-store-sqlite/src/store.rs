//! [`SqliteGateway`]: the SQLite implementation of [`Gateway`].

use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use portal_core::gateway::{
  Gateway, IdentityMetadata, Query, Row, Session, SessionChange,
  SessionSubscription, Table, timestamp,
};
use rusqlite::{OptionalExtension as _, types::Value as Sql};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
  Error, Result,
  auth::{hash_password, new_token, normalize_email, verify_password},
  schema::SCHEMA,
  tables::{quote, spec},
};

/// Capacity of the session event channel.
const EVENT_BUFFER: usize = 16;

// ─── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
  /// Prefix of the URLs returned by [`Gateway::public_url`].
  pub public_base_url:   String,
  /// Storage bucket that uploaded documents live in.
  pub bucket:            String,
  pub session_ttl_hours: i64,
}

impl Default for GatewaySettings {
  fn default() -> Self {
    Self {
      public_base_url:   "http://localhost:8080/storage".into(),
      bucket:            "documents".into(),
      session_ttl_hours: 24,
    }
  }
}

// ─── Gateway ─────────────────────────────────────────────────────────────────

/// A portal backend stored in a single SQLite file.
///
/// Cloning is cheap; clones share the connection and the session event
/// channel.
#[derive(Clone)]
pub struct SqliteGateway {
  conn:     tokio_rusqlite::Connection,
  settings: GatewaySettings,
  events:   broadcast::Sender<SessionChange>,
}

impl SqliteGateway {
  /// Open (or create) a database at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, settings: GatewaySettings) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, settings).await
  }

  /// Open an in-memory database; useful for testing.
  pub async fn open_in_memory(settings: GatewaySettings) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, settings).await
  }

  async fn init(conn: tokio_rusqlite::Connection, settings: GatewaySettings) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    Ok(Self { conn, settings, events })
  }

  pub fn settings(&self) -> &GatewaySettings { &self.settings }

  /// Read a stored blob back: its content type and bytes.
  pub async fn blob(&self, path: &str) -> Result<Option<(String, Bytes)>> {
    let path = path.to_owned();
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT content_type, bytes FROM blobs WHERE path = ?1",
              [path],
              |r| Ok((r.get::<_, String>(0)?, r.get::<_, Vec<u8>>(1)?)),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(found.map(|(content_type, bytes)| (content_type, Bytes::from(bytes))))
  }

  fn publish(&self, change: SessionChange) {
    // No subscribers is fine.
    let _ = self.events.send(change);
  }

  async fn query_rows(
    &self,
    table: Table,
    sql: String,
    params: Vec<Sql>,
  ) -> Result<Vec<Row>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let width = stmt.column_count();
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            (0..width)
              .map(|i| row.get::<_, Sql>(i))
              .collect::<rusqlite::Result<Vec<Sql>>>()
          })?
          .collect::<rusqlite::Result<Vec<Vec<Sql>>>>()?;
        Ok(rows)
      })
      .await?;

    let spec = spec(table);
    raws.into_iter().map(|values| spec.decode_row(values)).collect()
  }

  async fn session_row(&self) -> Result<Option<(Session, String)>> {
    let raw = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT access_token, user_id, email, expires_at FROM sessions LIMIT 1",
              [],
              |r| {
                Ok((
                  r.get::<_, String>(0)?,
                  r.get::<_, String>(1)?,
                  r.get::<_, String>(2)?,
                  r.get::<_, String>(3)?,
                ))
              },
            )
            .optional()?,
        )
      })
      .await?;

    let Some((access_token, user_id, email, expires_at)) = raw else {
      return Ok(None);
    };
    let user_id = Uuid::parse_str(&user_id).map_err(|_| Error::InvalidValue {
      table:    Table::Users,
      column:   "id".into(),
      expected: "a uuid",
    })?;
    let expires: DateTime<Utc> = DateTime::parse_from_rfc3339(&expires_at)
      .map(|at| at.with_timezone(&Utc))
      .map_err(|_| Error::InvalidValue {
        table:    Table::Users,
        column:   "expires_at".into(),
        expected: "an RFC 3339 timestamp",
      })?;
    let session = Session {
      user_id,
      email,
      access_token: access_token.clone(),
      expires_at: Some(expires),
    };
    Ok(Some((session, access_token)))
  }
}

impl Gateway for SqliteGateway {
  type Error = Error;

  // ── Auth ──────────────────────────────────────────────────────────────

  async fn current_session(&self) -> Result<Option<Session>> {
    let Some((session, token)) = self.session_row().await? else {
      return Ok(None);
    };
    if !session.is_expired(Utc::now()) {
      return Ok(Some(session));
    }

    tracing::debug!(user_id = %session.user_id, "dropping expired session");
    self
      .conn
      .call(move |conn| {
        conn.execute("DELETE FROM sessions WHERE access_token = ?1", [token])?;
        Ok(())
      })
      .await?;
    Ok(None)
  }

  fn subscribe(&self) -> SessionSubscription {
    SessionSubscription::new(self.events.subscribe())
  }

  async fn sign_in_with_password(&self, email: String, password: String) -> Result<Session> {
    let email = normalize_email(&email);
    let lookup = email.clone();
    let identity = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, password_hash FROM identities WHERE email = ?1",
              [lookup],
              |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let Some((id, phc)) = identity else {
      tracing::info!(%email, "sign-in for unknown email");
      return Err(Error::InvalidCredentials);
    };
    verify_password(&password, &phc)?;

    let user_id = Uuid::parse_str(&id).map_err(|_| Error::InvalidCredentials)?;
    let now = Utc::now();
    let expires_at = now + Duration::hours(self.settings.session_ttl_hours);
    let session = Session {
      user_id,
      email: email.clone(),
      access_token: new_token(),
      expires_at: Some(expires_at),
    };

    let (token, created, expires) =
      (session.access_token.clone(), timestamp(now), timestamp(expires_at));
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM sessions", [])?;
        tx.execute(
          "INSERT INTO sessions (access_token, user_id, email, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![token, id, email, created, expires],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::info!(%user_id, "signed in");
    self.publish(SessionChange::SignedIn(session.clone()));
    Ok(session)
  }

  async fn sign_out(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute("DELETE FROM sessions", [])?;
        Ok(())
      })
      .await?;
    tracing::info!("signed out");
    self.publish(SessionChange::SignedOut);
    Ok(())
  }

  async fn create_identity(
    &self,
    email: String,
    password: String,
    metadata: IdentityMetadata,
  ) -> Result<Uuid> {
    let email = normalize_email(&email);
    let hash = hash_password(&password)?;
    let metadata = serde_json::to_string(&metadata)?;
    let id = Uuid::new_v4();

    let (row_id, row_email) = (id.to_string(), email.clone());
    let created = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let taken = tx
          .query_row("SELECT 1 FROM identities WHERE email = ?1", [&row_email], |_| {
            Ok(())
          })
          .optional()?
          .is_some();
        if taken {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO identities (id, email, password_hash, metadata, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![row_id, row_email, hash, metadata, timestamp(Utc::now())],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !created {
      return Err(Error::EmailTaken(email));
    }
    tracing::info!(%id, "identity created");
    Ok(id)
  }

  async fn delete_identity(&self, id: Uuid) -> Result<()> {
    let key = id.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute("DELETE FROM identities WHERE id = ?1", [key])?;
        Ok(())
      })
      .await?;
    tracing::info!(%id, "identity deleted");
    Ok(())
  }

  // ── Rows ──────────────────────────────────────────────────────────────

  async fn select(&self, table: Table, query: Query) -> Result<Vec<Row>> {
    let spec = spec(table);
    let mut sql = format!("SELECT {} FROM {}", spec.select_list(), quote(spec.name()));
    let mut params = Vec::with_capacity(query.filters.len());

    for (i, (column, value)) in query.filters.iter().enumerate() {
      let (column, kind) = spec.column(column)?;
      sql.push_str(if i == 0 { " WHERE " } else { " AND " });
      if value.is_null() {
        sql.push_str(&format!("{} IS NULL", quote(column)));
      } else {
        sql.push_str(&format!("{} = ?{}", quote(column), params.len() + 1));
        params.push(spec.encode(column, kind, value)?);
      }
    }
    if let Some(order) = &query.order {
      let (column, _) = spec.column(&order.column)?;
      let direction = if order.ascending { "ASC" } else { "DESC" };
      sql.push_str(&format!(" ORDER BY {} {direction}", quote(column)));
    }

    self.query_rows(table, sql, params).await
  }

  async fn select_one(&self, table: Table, id: Uuid) -> Result<Row> {
    let spec = spec(table);
    let sql = format!(
      "SELECT {} FROM {} WHERE \"id\" = ?1",
      spec.select_list(),
      quote(spec.name())
    );
    self
      .query_rows(table, sql, vec![Sql::Text(id.to_string())])
      .await?
      .into_iter()
      .next()
      .ok_or(Error::NotFound { table, id })
  }

  async fn insert(&self, table: Table, row: Row) -> Result<Row> {
    let spec = spec(table);
    let row = spec.with_defaults(row);
    let id = row
      .get("id")
      .and_then(|v| v.as_str())
      .and_then(|s| Uuid::parse_str(s).ok())
      .ok_or_else(|| Error::InvalidValue {
        table,
        column: "id".into(),
        expected: "a uuid",
      })?;

    let mut columns = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len());
    for (name, value) in &row {
      let (column, kind) = spec.column(name)?;
      columns.push(quote(column));
      params.push(spec.encode(column, kind, value)?);
    }
    let placeholders = (1..=params.len())
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "INSERT INTO {} ({}) VALUES ({placeholders})",
      quote(spec.name()),
      columns.join(", ")
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(&sql, rusqlite::params_from_iter(params))?;
        Ok(())
      })
      .await?;
    tracing::debug!(%table, %id, "row inserted");

    self.select_one(table, id).await
  }

  async fn update(&self, table: Table, id: Uuid, patch: Row) -> Result<()> {
    if patch.is_empty() {
      return self.select_one(table, id).await.map(|_| ());
    }

    let spec = spec(table);
    let mut assignments = Vec::with_capacity(patch.len());
    let mut params = Vec::with_capacity(patch.len() + 1);
    for (name, value) in &patch {
      let (column, kind) = spec.column(name)?;
      if column == "id" {
        return Err(Error::InvalidValue {
          table,
          column: "id".into(),
          expected: "no change to the primary key",
        });
      }
      params.push(spec.encode(column, kind, value)?);
      assignments.push(format!("{} = ?{}", quote(column), params.len()));
    }
    params.push(Sql::Text(id.to_string()));
    let sql = format!(
      "UPDATE {} SET {} WHERE \"id\" = ?{}",
      quote(spec.name()),
      assignments.join(", "),
      params.len()
    );

    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params_from_iter(params))?))
      .await?;
    if changed == 0 {
      return Err(Error::NotFound { table, id });
    }
    tracing::debug!(%table, %id, "row updated");
    Ok(())
  }

  async fn delete(&self, table: Table, id: Uuid) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE \"id\" = ?1", quote(spec(table).name()));
    let key = id.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(&sql, [key])?;
        Ok(())
      })
      .await?;
    tracing::debug!(%table, %id, "row deleted");
    Ok(())
  }

  // ── Blobs ─────────────────────────────────────────────────────────────

  async fn upload(&self, path: String, bytes: Bytes, content_type: String) -> Result<()> {
    let size = bytes.len();
    let key = path.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO blobs (path, content_type, bytes, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![key, content_type, bytes.to_vec(), timestamp(Utc::now())],
        )?;
        Ok(())
      })
      .await?;
    tracing::debug!(%path, size, "blob stored");
    Ok(())
  }

  fn public_url(&self, path: &str) -> String {
    format!(
      "{}/{}/{}",
      self.settings.public_base_url.trim_end_matches('/'),
      self.settings.bucket,
      path.trim_start_matches('/')
    )
  }

  async fn remove(&self, path: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute("DELETE FROM blobs WHERE path = ?1", [path])?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
