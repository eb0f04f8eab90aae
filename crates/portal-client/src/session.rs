//! Who is signed in.
//!
//! [`SessionContext`] follows the gateway's session and resolves it to a
//! profile row. The result is published as an [`AuthState`] on a `watch`
//! channel. State only moves in response to session events (plus the
//! initial check and an explicit sign-out); `sign_in` itself never sets it.
//!
//! ```text
//! AuthenticatingSession ──(no session)──────────▶ Unauthenticated
//!         │                                          │  ▲
//!   (session found)                        (signed in)│  │(signed out)
//!         ▼                                          ▼  │
//!   profile lookup ──ok──▶ Authenticated ◀──ok── profile lookup
//!         └──────err────▶ AuthError
//! ```

use std::{
  sync::{Arc, Mutex},
  time::Duration,
};

use portal_core::{
  access::{Action, Resource},
  gateway::{Gateway, Session, SessionChange, Table},
  id,
  user::User,
};
use tokio::{sync::watch, task::JoinHandle};
use uuid::Uuid;

use crate::{
  Error, Result,
  cache::QueryCache,
  lock,
  toast::{Toast, Toaster},
  wire::FromRow,
};

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
  Unauthenticated,
  /// A session exists (or is being looked for) and its profile is loading.
  AuthenticatingSession,
  Authenticated(User),
  /// A session exists but its profile could not be loaded.
  AuthError(String),
}

impl AuthState {
  pub fn user(&self) -> Option<&User> {
    match self {
      Self::Authenticated(user) => Some(user),
      _ => None,
    }
  }
}

pub struct SessionContext<G: Gateway> {
  gateway:    Arc<G>,
  cache:      QueryCache,
  toaster:    Arc<dyn Toaster>,
  state:      watch::Sender<AuthState>,
  /// The session the current state was derived from.
  session:    Mutex<Option<Session>>,
  last_error: Mutex<Option<String>>,
  listener:   Mutex<Option<JoinHandle<()>>>,
}

impl<G: Gateway> SessionContext<G> {
  pub fn new(gateway: Arc<G>, cache: QueryCache, toaster: Arc<dyn Toaster>) -> Self {
    let (state, _) = watch::channel(AuthState::AuthenticatingSession);
    Self {
      gateway,
      cache,
      toaster,
      state,
      session: Mutex::new(None),
      last_error: Mutex::new(None),
      listener: Mutex::new(None),
    }
  }

  /// Stop following session changes.
  pub fn dispose(&self) {
    if let Some(handle) = lock(&self.listener).take() {
      handle.abort();
    }
  }

  async fn resolve(&self, session: Option<Session>) {
    let user_id = session.as_ref().map(|s| s.user_id);
    let previous = std::mem::replace(&mut *lock(&self.session), session);
    if previous.map(|s| s.user_id) != user_id {
      self.cache.clear();
    }

    let Some(user_id) = user_id else {
      self.publish(AuthState::Unauthenticated);
      return;
    };

    self.publish(AuthState::AuthenticatingSession);
    let profile = self.load_profile(user_id).await;

    // A sign-out (or another identity) may have landed while loading.
    if lock(&self.session).as_ref().map(|s| s.user_id) != Some(user_id) {
      tracing::debug!(%user_id, "discarding profile for a superseded session");
      return;
    }

    match profile {
      Ok(user) => {
        tracing::info!(%user_id, role = %user.role, "session resolved");
        self.publish(AuthState::Authenticated(user));
      }
      Err(err) => {
        tracing::error!(%user_id, error = %err, "could not load user profile");
        self.toaster.toast(Toast::failure(
          "Authentication error",
          "Your user profile could not be loaded.",
        ));
        self.publish(AuthState::AuthError(err.to_string()));
      }
    }
  }

  async fn load_profile(&self, user_id: Uuid) -> Result<User> {
    let row = self
      .gateway
      .select_one(Table::Users, user_id)
      .await
      .map_err(Error::repository)?;
    User::from_row(row)
  }

  fn publish(&self, state: AuthState) { self.state.send_replace(state); }

  /// Reload the signed-in user's profile, e.g. after it was edited.
  pub async fn reload_profile(&self) -> Result<User> {
    let user_id = self
      .session()
      .map(|s| s.user_id)
      .ok_or_else(Error::not_authenticated)?;
    let user = self.load_profile(user_id).await?;
    if lock(&self.session).as_ref().map(|s| s.user_id) == Some(user_id) {
      self.publish(AuthState::Authenticated(user.clone()));
    }
    Ok(user)
  }

  /// Check credentials. On success the state changes once the gateway
  /// reports the new session; pass the returned session's `user_id` to
  /// [`wait_for_profile`](Self::wait_for_profile) to wait for it.
  pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
    if let Err(err) = id::require("email", email).and(id::require("password", password)) {
      return Err(self.sign_in_failed(err.to_string()));
    }

    match self
      .gateway
      .sign_in_with_password(email.trim().to_owned(), password.to_owned())
      .await
    {
      Ok(session) => {
        tracing::info!(user_id = %session.user_id, "signed in");
        *lock(&self.last_error) = None;
        self.toaster.toast(Toast::success("Signed in", "Welcome back."));
        Ok(session)
      }
      Err(err) => Err(self.sign_in_failed(err.to_string())),
    }
  }

  fn sign_in_failed(&self, message: String) -> Error {
    tracing::warn!(error = %message, "sign-in failed");
    self.toaster.toast(Toast::failure("Sign-in failed", message.clone()));
    *lock(&self.last_error) = Some(message.clone());
    Error::Auth(message)
  }

  /// End the session. The local state is signed out even if the gateway
  /// call fails.
  pub async fn sign_out(&self) -> Result<()> {
    let result = self.gateway.sign_out().await;

    *lock(&self.session) = None;
    self.cache.clear();
    self.publish(AuthState::Unauthenticated);

    match result {
      Ok(()) => {
        tracing::info!("signed out");
        self.toaster.toast(Toast::success("Signed out", "See you soon."));
        Ok(())
      }
      Err(err) => {
        let message = err.to_string();
        tracing::error!(error = %message, "sign-out failed");
        self.toaster.toast(Toast::failure("Sign-out failed", message.clone()));
        *lock(&self.last_error) = Some(message.clone());
        Err(Error::Auth(message))
      }
    }
  }

  /// Wait until the session of `user_id` resolves to a profile (or fails
  /// to). States that still belong to a previous identity are skipped.
  pub async fn wait_for_profile(&self, user_id: Uuid, timeout: Duration) -> Result<User> {
    let mut rx = self.state.subscribe();
    let settled = tokio::time::timeout(
      timeout,
      rx.wait_for(|state| match state {
        AuthState::Authenticated(user) => user.id == user_id,
        AuthState::AuthError(_) => {
          lock(&self.session).as_ref().map(|s| s.user_id) == Some(user_id)
        }
        _ => false,
      }),
    )
    .await;

    match settled {
      Ok(Ok(state)) => match &*state {
        AuthState::Authenticated(user) => Ok(user.clone()),
        AuthState::AuthError(message) => Err(Error::Auth(message.clone())),
        _ => Err(Error::not_authenticated()),
      },
      Ok(Err(_)) => Err(Error::not_authenticated()),
      Err(_) => Err(Error::Auth("timed out waiting for the session".into())),
    }
  }

  pub fn state(&self) -> AuthState { self.state.borrow().clone() }

  pub fn subscribe_state(&self) -> watch::Receiver<AuthState> { self.state.subscribe() }

  pub fn current_user(&self) -> Option<User> { self.state.borrow().user().cloned() }

  pub fn session(&self) -> Option<Session> { lock(&self.session).clone() }

  pub fn last_error(&self) -> Option<String> { lock(&self.last_error).clone() }

  /// The signed-in user, if their role allows `action` on `resource`.
  pub(crate) fn authorize(&self, resource: Resource, action: Action) -> Result<User> {
    let user = self.current_user().ok_or_else(Error::not_authenticated)?;
    if !user.role.allows(resource, action) {
      return Err(Error::Forbidden(format!(
        "role {} may not {action} {resource}",
        user.role
      )));
    }
    Ok(user)
  }
}

impl<G: Gateway + 'static> SessionContext<G> {
  /// Check for an existing session, then follow session changes until
  /// [`dispose`](Self::dispose).
  ///
  /// The subscription is taken before the check so that a change racing
  /// with it is queued rather than lost; queued changes are applied after
  /// the check, in order.
  pub async fn start(self: &Arc<Self>) {
    let mut subscription = self.gateway.subscribe();

    let initial = match self.gateway.current_session().await {
      Ok(session) => session,
      Err(err) => {
        tracing::warn!(error = %err, "could not read current session");
        None
      }
    };
    self.resolve(initial).await;

    let weak = Arc::downgrade(self);
    let handle = tokio::spawn(async move {
      while let Some(change) = subscription.recv().await {
        let Some(this) = weak.upgrade() else { break };
        match change {
          SessionChange::SignedIn(session) => {
            tracing::debug!(user_id = %session.user_id, "session event: signed in");
            this.resolve(Some(session)).await
          }
          SessionChange::SignedOut => {
            tracing::debug!("session event: signed out");
            this.resolve(None).await
          }
        }
      }
    });

    if let Some(previous) = lock(&self.listener).replace(handle) {
      previous.abort();
    }
  }
}

impl<G: Gateway> Drop for SessionContext<G> {
  fn drop(&mut self) {
    if let Some(handle) = lock(&self.listener).take() {
      handle.abort();
    }
  }
}
