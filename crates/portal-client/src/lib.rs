//! The portal's data synchronization and authorization layer.
//!
//! [`Portal`] wires a [`Gateway`] to a shared [`QueryCache`], a
//! [`SessionContext`] that tracks who is signed in, a [`NotificationCenter`],
//! and one repository per entity. Repositories validate ids, check the
//! signed-in role, write through the gateway, invalidate the cache keys a
//! write affects, and report every outcome to a [`Toaster`].

pub mod cache;
pub mod error;
pub mod gate;
pub mod notifications;
pub mod repo;
pub mod session;
pub mod toast;
mod wire;

#[cfg(test)]
mod tests;

use std::{
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

pub use cache::{CacheKey, QueryCache};
pub use error::{Error, Result};
pub use gate::{AuthorizationGate, GateDecision, View};
pub use notifications::{NotificationCenter, demo_notifications};
use portal_core::gateway::Gateway;
pub use repo::{
  branches::BranchRepository, companies::CompanyRepository,
  documents::DocumentRepository, events::CalendarEventRepository,
  news::NewsRepository, products::ProductRepository, users::UserRepository,
};
use repo::RepoContext;
use serde::Deserialize;
pub use session::{AuthState, SessionContext};
pub use toast::{LogToaster, MemoryToaster, Toast, ToastVariant, Toaster};

/// Client-side tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
  /// How long a fetched query stays fresh, in seconds.
  pub stale_time_secs:    u64,
  /// Start the notification center with the sample feed.
  pub demo_notifications: bool,
}

impl Default for PortalConfig {
  fn default() -> Self { Self { stale_time_secs: 60, demo_notifications: false } }
}

impl PortalConfig {
  pub fn stale_time(&self) -> Duration { Duration::from_secs(self.stale_time_secs) }
}

/// Entry point: one per process (or per signed-in UI).
pub struct Portal<G: Gateway> {
  ctx:           RepoContext<G>,
  notifications: Arc<NotificationCenter>,
}

impl<G: Gateway + 'static> Portal<G> {
  pub fn new(gateway: G, config: &PortalConfig, toaster: Arc<dyn Toaster>) -> Self {
    let gateway = Arc::new(gateway);
    let cache = QueryCache::new(config.stale_time());
    let session = Arc::new(SessionContext::new(
      Arc::clone(&gateway),
      cache.clone(),
      Arc::clone(&toaster),
    ));
    let notifications = Arc::new(NotificationCenter::new(Arc::clone(&toaster)));
    if config.demo_notifications {
      notifications.seed(demo_notifications());
    }

    Self {
      ctx: RepoContext { gateway, cache, session, toaster },
      notifications,
    }
  }

  /// Resolve the backend's current session and start following session
  /// changes.
  pub async fn start(&self) { self.ctx.session.start().await }

  /// Stop following session changes.
  pub fn dispose(&self) { self.ctx.session.dispose() }

  pub fn gateway(&self) -> &Arc<G> { &self.ctx.gateway }

  pub fn cache(&self) -> &QueryCache { &self.ctx.cache }

  pub fn session(&self) -> &Arc<SessionContext<G>> { &self.ctx.session }

  pub fn notifications(&self) -> &Arc<NotificationCenter> { &self.notifications }

  pub fn gate(&self, view: &View) -> GateDecision {
    AuthorizationGate::decide(&self.ctx.session.state(), view)
  }

  pub fn users(&self) -> UserRepository<G> { UserRepository::new(self.ctx.clone()) }

  pub fn branches(&self) -> BranchRepository<G> {
    BranchRepository::new(self.ctx.clone())
  }

  pub fn companies(&self) -> CompanyRepository<G> {
    CompanyRepository::new(self.ctx.clone())
  }

  pub fn products(&self) -> ProductRepository<G> {
    ProductRepository::new(self.ctx.clone())
  }

  pub fn documents(&self) -> DocumentRepository<G> {
    DocumentRepository::new(self.ctx.clone())
  }

  pub fn news(&self) -> NewsRepository<G> { NewsRepository::new(self.ctx.clone()) }

  pub fn events(&self) -> CalendarEventRepository<G> {
    CalendarEventRepository::new(self.ctx.clone())
  }
}

/// Lock a mutex, ignoring poisoning.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
