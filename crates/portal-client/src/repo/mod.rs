//! Entity repositories.
//!
//! Every mutation follows the same sequence: validate ids and required
//! fields, check the signed-in role, write through the gateway, invalidate
//! the cache keys the write affects, and report the outcome as a toast.
//! Reads go through the shared [`QueryCache`] and are not role-checked.

pub mod branches;
pub mod companies;
pub mod documents;
pub mod events;
pub mod news;
pub mod products;
pub mod users;

use std::sync::Arc;

use portal_core::{
  gateway::{Gateway, Query, Row, Table},
  user::User,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  cache::{CacheKey, QueryCache},
  session::SessionContext,
  toast::{Toast, Toaster},
  wire::FromRow,
};

pub(crate) struct RepoContext<G: Gateway> {
  pub gateway: Arc<G>,
  pub cache:   QueryCache,
  pub session: Arc<SessionContext<G>>,
  pub toaster: Arc<dyn Toaster>,
}

impl<G: Gateway> Clone for RepoContext<G> {
  fn clone(&self) -> Self {
    Self {
      gateway: Arc::clone(&self.gateway),
      cache:   self.cache.clone(),
      session: Arc::clone(&self.session),
      toaster: Arc::clone(&self.toaster),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verb {
  Create,
  Update,
  Delete,
}

impl Verb {
  fn past(self) -> &'static str {
    match self {
      Self::Create => "created",
      Self::Update => "updated",
      Self::Delete => "deleted",
    }
  }

  fn progressive(self) -> &'static str {
    match self {
      Self::Create => "creating",
      Self::Update => "updating",
      Self::Delete => "deleting",
    }
  }
}

/// Collections whose rows embed or filter by rows of `table`.
fn dependents(table: Table) -> &'static [Table] {
  match table {
    Table::Companies => &[Table::Products, Table::Documents, Table::News],
    Table::Branches => &[Table::Users],
    Table::Products => &[Table::Documents],
    _ => &[],
  }
}

/// The keys a successful write to `table` makes stale.
pub(crate) fn affected_keys(table: Table, verb: Verb, id: Uuid) -> Vec<CacheKey> {
  let mut keys = vec![CacheKey::Collection(table)];
  if verb != Verb::Create {
    keys.push(CacheKey::Entity(table, id));
    keys.extend(dependents(table).iter().map(|t| CacheKey::Collection(*t)));
  }
  keys
}

impl<G: Gateway> RepoContext<G> {
  pub fn current_user(&self) -> Result<User> {
    self.session.current_user().ok_or_else(Error::not_authenticated)
  }

  pub fn invalidate(&self, table: Table, verb: Verb, id: Uuid) {
    self.cache.invalidate_all(affected_keys(table, verb, id));
  }

  /// Log and toast the outcome of a mutation, passing it through.
  pub fn report<T>(&self, noun: &str, verb: Verb, result: Result<T>) -> Result<T> {
    match &result {
      Ok(_) => {
        tracing::info!(entity = noun, action = verb.past(), "mutation succeeded");
        self.toaster.toast(Toast::success(
          format!("{} {}", capitalize(noun), verb.past()),
          format!("The {noun} was {} successfully.", verb.past()),
        ));
      }
      Err(err) => {
        tracing::error!(entity = noun, action = verb.progressive(), error = %err, "mutation failed");
        self.toaster.toast(Toast::failure(
          format!("Error {} {noun}", verb.progressive()),
          err.to_string(),
        ));
      }
    }
    result
  }

  pub async fn list<T>(&self, key: CacheKey, query: Query) -> Result<Vec<T>>
  where
    T: FromRow + Clone + Send + Sync + 'static,
  {
    let gateway = &*self.gateway;
    self
      .cache
      .fetch(key, move || async move {
        let rows = gateway
          .select(T::TABLE, query)
          .await
          .map_err(Error::repository)?;
        T::from_rows(rows)
      })
      .await
  }

  pub async fn get<T>(&self, id: Uuid) -> Result<T>
  where
    T: FromRow + Clone + Send + Sync + 'static,
  {
    let gateway = &*self.gateway;
    self
      .cache
      .fetch(CacheKey::Entity(T::TABLE, id), move || async move {
        let row = gateway
          .select_one(T::TABLE, id)
          .await
          .map_err(Error::repository)?;
        T::from_row(row)
      })
      .await
  }

  /// Read one row straight from the gateway, bypassing the cache. Used to
  /// check a record before mutating it.
  pub async fn load<T: FromRow>(&self, id: Uuid) -> Result<T> {
    let row = self
      .gateway
      .select_one(T::TABLE, id)
      .await
      .map_err(Error::repository)?;
    T::from_row(row)
  }

  pub async fn insert(&self, table: Table, row: Row) -> Result<Row> {
    self.gateway.insert(table, row).await.map_err(Error::repository)
  }

  pub async fn update(&self, table: Table, id: Uuid, patch: Row) -> Result<()> {
    if patch.is_empty() {
      return Err(Error::Validation("nothing to update".into()));
    }
    self
      .gateway
      .update(table, id, patch)
      .await
      .map_err(Error::repository)
  }

  pub async fn delete(&self, table: Table, id: Uuid) -> Result<()> {
    self.gateway.delete(table, id).await.map_err(Error::repository)
  }
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}
