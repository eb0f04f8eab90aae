//! User profiles.
//!
//! A user is two records: an authentication identity owned by the
//! backend's auth service and a profile row in `users` sharing its id.
//! Creation provisions the identity first and rolls it back if the profile
//! cannot be written; deletion removes the profile first.

use portal_core::{
  access::{Action, Resource, authorize_user_update},
  gateway::{Gateway, IdentityMetadata, Query, Table},
  id::{parse_id, require},
  user::{NewUser, User, UserUpdate},
};

use super::{RepoContext, Verb};
use crate::{
  Error, Result,
  cache::CacheKey,
  wire::{FromRow, RowBuilder},
};

const MIN_PASSWORD_LEN: usize = 6;

pub struct UserRepository<G: Gateway> {
  ctx: RepoContext<G>,
}

impl<G: Gateway> UserRepository<G> {
  pub(crate) fn new(ctx: RepoContext<G>) -> Self { Self { ctx } }

  pub async fn list(&self) -> Result<Vec<User>> {
    self
      .ctx
      .list(
        CacheKey::Collection(Table::Users),
        Query::all().order_by("name", true),
      )
      .await
  }

  pub async fn get(&self, id: &str) -> Result<User> {
    let id = parse_id(id)?;
    self.ctx.get(id).await
  }

  pub async fn create(&self, new: NewUser) -> Result<User> {
    let result = self.try_create(new).await;
    self.ctx.report("user", Verb::Create, result)
  }

  async fn try_create(&self, new: NewUser) -> Result<User> {
    require("name", &new.name)?;
    require("email", &new.email)?;
    if new.password.chars().count() < MIN_PASSWORD_LEN {
      return Err(Error::Validation(format!(
        "password must be at least {MIN_PASSWORD_LEN} characters"
      )));
    }
    self.ctx.session.authorize(Resource::Users, Action::Create)?;

    let metadata = IdentityMetadata {
      name:      new.name.clone(),
      role:      new.role,
      user_type: new.user_type,
    };
    let user_id = self
      .ctx
      .gateway
      .create_identity(new.email.clone(), new.password, metadata)
      .await
      .map_err(Error::repository)?;
    tracing::debug!(%user_id, "identity provisioned");

    let row = RowBuilder::new()
      .set("id", user_id)
      .set("name", new.name)
      .set("email", new.email)
      .set("role", new.role)
      .set("type", new.user_type)
      .opt("avatar", new.avatar)
      .opt("branch_id", new.branch_id)
      .opt("position", new.position)
      .opt("extension", new.extension)
      .opt("social_contact", new.social_contact)
      .build();

    let stored = match self.ctx.insert(Table::Users, row).await {
      Ok(stored) => stored,
      Err(err) => {
        if let Err(cleanup) = self.ctx.gateway.delete_identity(user_id).await {
          tracing::warn!(%user_id, error = %cleanup, "could not roll back identity");
        }
        return Err(err);
      }
    };

    self.ctx.invalidate(Table::Users, Verb::Create, user_id);
    User::from_row(stored)
  }

  /// Apply a profile update. Non-admins may only change their own display
  /// fields.
  pub async fn update(&self, id: &str, update: UserUpdate) -> Result<()> {
    let result = self.try_update(id, update).await;
    self.ctx.report("user", Verb::Update, result)
  }

  async fn try_update(&self, id: &str, update: UserUpdate) -> Result<()> {
    let id = parse_id(id)?;
    let actor = self.ctx.current_user()?;
    authorize_user_update(&actor, id, &update)?;

    let patch = RowBuilder::new()
      .required("name", update.name)?
      .required("email", update.email)?
      .required("role", update.role)?
      .required("type", update.user_type)?
      .patch("branch_id", update.branch_id)
      .patch("avatar", update.avatar)
      .patch("position", update.position)
      .patch("extension", update.extension)
      .patch("social_contact", update.social_contact)
      .build();

    self.ctx.update(Table::Users, id, patch).await?;
    self.ctx.invalidate(Table::Users, Verb::Update, id);

    if id == actor.id {
      if let Err(err) = self.ctx.session.reload_profile().await {
        tracing::warn!(error = %err, "could not refresh own profile");
      }
    }
    Ok(())
  }

  pub async fn delete(&self, id: &str) -> Result<()> {
    let result = self.try_delete(id).await;
    self.ctx.report("user", Verb::Delete, result)
  }

  async fn try_delete(&self, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    self.ctx.session.authorize(Resource::Users, Action::Delete)?;

    self.ctx.delete(Table::Users, id).await?;
    self.ctx.invalidate(Table::Users, Verb::Delete, id);

    if let Err(err) = self.ctx.gateway.delete_identity(id).await {
      tracing::warn!(user_id = %id, error = %err, "profile deleted but identity remains");
    }
    Ok(())
  }
}
