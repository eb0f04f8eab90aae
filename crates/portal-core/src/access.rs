//! Role-based access control.
//!
//! A single matrix answers "may this role perform this action on this kind
//! of record". Field-level rules for user profiles sit on top of it in
//! [`authorize_user_update`].

use strum::{Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

use crate::user::{Role, User, UserUpdate};

/// Kinds of record subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
  Users,
  Branches,
  Companies,
  Products,
  Documents,
  News,
  CalendarEvents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Action {
  Read,
  Create,
  Update,
  Delete,
}

impl Resource {
  /// Records shared across the whole network, as opposed to users'
  /// personal data.
  pub fn is_operational(self) -> bool {
    matches!(
      self,
      Self::Branches
        | Self::Companies
        | Self::Products
        | Self::Documents
        | Self::News
    )
  }
}

impl Role {
  /// The role matrix.
  ///
  /// Calendar events are always scoped to their owner by the caller, so
  /// every role may manage its own.
  pub fn allows(self, resource: Resource, action: Action) -> bool {
    match (self, resource) {
      (Role::Admin, _) => true,
      (_, Resource::CalendarEvents) => true,
      (Role::Manager, Resource::Users) => action == Action::Read,
      (Role::Manager, r) if r.is_operational() => true,
      (_, Resource::Users) => false,
      (_, _) => action == Action::Read,
    }
  }

  /// Whether this role may open the user-management screens.
  pub fn can_manage_users(self) -> bool {
    self.allows(Resource::Users, Action::Read)
  }
}

/// Why an action was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct Denied(pub String);

/// Check a user-profile update against the field-level rules.
///
/// Administrators may change anything on anyone. Everyone else may change
/// only their own display fields (name, avatar, position, extension,
/// social contact).
pub fn authorize_user_update(
  actor: &User,
  target: Uuid,
  update: &UserUpdate,
) -> Result<(), Denied> {
  if actor.role == Role::Admin {
    return Ok(());
  }
  if actor.id != target {
    return Err(Denied(format!(
      "role {} may only edit its own profile",
      actor.role
    )));
  }
  if update.touches_privileged() {
    return Err(Denied(format!(
      "role {} may not change email, role, type or branch",
      actor.role
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{Patch, user::UserType};

  fn user(role: Role) -> User {
    User {
      id: Uuid::new_v4(),
      name: "Ana".into(),
      email: "ana@example.com".into(),
      role,
      user_type: UserType::CentralServices,
      avatar: None,
      branch_id: None,
      position: None,
      extension: None,
      social_contact: None,
      created_at: Utc::now(),
    }
  }

  #[test]
  fn admin_may_do_everything() {
    for resource in [Resource::Users, Resource::Branches, Resource::News] {
      for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
        assert!(Role::Admin.allows(resource, action));
      }
    }
  }

  #[test]
  fn manager_lists_users_but_cannot_provision() {
    assert!(Role::Manager.allows(Resource::Users, Action::Read));
    assert!(!Role::Manager.allows(Resource::Users, Action::Create));
    assert!(!Role::Manager.allows(Resource::Users, Action::Delete));
    assert!(Role::Manager.allows(Resource::Companies, Action::Delete));
    assert!(Role::Manager.allows(Resource::Documents, Action::Create));
  }

  #[test]
  fn staff_roles_read_shared_and_own_events() {
    for role in [Role::Delegate, Role::Employee, Role::Collaborator] {
      assert!(role.allows(Resource::Products, Action::Read));
      assert!(!role.allows(Resource::Products, Action::Update));
      assert!(!role.allows(Resource::Branches, Action::Create));
      assert!(!role.can_manage_users());
      assert!(role.allows(Resource::CalendarEvents, Action::Create));
      assert!(role.allows(Resource::CalendarEvents, Action::Delete));
    }
  }

  #[test]
  fn non_admin_edits_only_own_display_fields() {
    let employee = user(Role::Employee);
    let display = UserUpdate {
      extension: Patch::Set("204".into()),
      ..Default::default()
    };
    assert!(authorize_user_update(&employee, employee.id, &display).is_ok());
    assert!(authorize_user_update(&employee, Uuid::new_v4(), &display).is_err());

    let promote = UserUpdate { role: Some(Role::Admin), ..Default::default() };
    assert!(authorize_user_update(&employee, employee.id, &promote).is_err());

    let manager = user(Role::Manager);
    let email = UserUpdate { email: Some("x@y.com".into()), ..Default::default() };
    assert!(authorize_user_update(&manager, manager.id, &email).is_err());
  }

  #[test]
  fn admin_edits_anyone() {
    let admin = user(Role::Admin);
    let update = UserUpdate { role: Some(Role::Manager), ..Default::default() };
    assert!(authorize_user_update(&admin, Uuid::new_v4(), &update).is_ok());
  }
}
