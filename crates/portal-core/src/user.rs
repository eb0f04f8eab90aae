//! Staff members of the franchise network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::Patch;

// ─── Role ────────────────────────────────────────────────────────────────────

/// Authorization role. Drives every permission decision; see
/// [`crate::access`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  Admin,
  Manager,
  Delegate,
  Employee,
  Collaborator,
}

// ─── UserType ────────────────────────────────────────────────────────────────

/// Display category shown next to a user's name.
///
/// Independent of [`Role`]: the stored data shows no reliable 1:1 mapping
/// between the two, so neither is derived from the other.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
pub enum UserType {
  #[serde(rename = "Administrador")]
  #[strum(serialize = "Administrador")]
  Administrator,
  #[serde(rename = "Responsable de Departamento")]
  #[strum(serialize = "Responsable de Departamento")]
  DepartmentHead,
  #[serde(rename = "Delegación")]
  #[strum(serialize = "Delegación")]
  Branch,
  #[serde(rename = "Empleado SSCC")]
  #[strum(serialize = "Empleado SSCC")]
  CentralServices,
  #[serde(rename = "Colaborador")]
  #[strum(serialize = "Colaborador")]
  Collaborator,
}

// ─── User ────────────────────────────────────────────────────────────────────

/// A staff profile. The id is shared with the user's authentication
/// identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id:             Uuid,
  pub name:           String,
  pub email:          String,
  pub role:           Role,
  #[serde(rename = "type")]
  pub user_type:      UserType,
  pub avatar:         Option<String>,
  /// Weak reference; the branch may no longer exist.
  pub branch_id:      Option<Uuid>,
  pub position:       Option<String>,
  pub extension:      Option<String>,
  pub social_contact: Option<String>,
  pub created_at:     DateTime<Utc>,
}

/// Input to the two-phase user provisioning flow.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub name:           String,
  pub email:          String,
  /// Initial password for the authentication identity. Never stored in the
  /// profile row.
  pub password:       String,
  pub role:           Role,
  pub user_type:      UserType,
  pub avatar:         Option<String>,
  pub branch_id:      Option<Uuid>,
  pub position:       Option<String>,
  pub extension:      Option<String>,
  pub social_contact: Option<String>,
}

/// A partial update of a user profile.
///
/// `None` / [`Patch::Keep`] fields are left untouched server-side.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
  pub name:           Option<String>,
  pub email:          Option<String>,
  pub role:           Option<Role>,
  pub user_type:      Option<UserType>,
  pub branch_id:      Patch<Uuid>,
  pub avatar:         Patch<String>,
  pub position:       Patch<String>,
  pub extension:      Patch<String>,
  pub social_contact: Patch<String>,
}

impl UserUpdate {
  /// Whether this update touches a field only administrators may change.
  pub fn touches_privileged(&self) -> bool {
    self.email.is_some()
      || self.role.is_some()
      || self.user_type.is_some()
      || !self.branch_id.is_keep()
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn user_type_uses_display_labels() {
    assert_eq!(UserType::CentralServices.as_ref(), "Empleado SSCC");
    assert_eq!(
      UserType::from_str("Delegación").unwrap(),
      UserType::Branch
    );
    assert_eq!(
      serde_json::to_value(UserType::DepartmentHead).unwrap(),
      serde_json::json!("Responsable de Departamento")
    );
  }

  #[test]
  fn role_round_trips_lowercase() {
    assert_eq!(Role::from_str("collaborator").unwrap(), Role::Collaborator);
    assert_eq!(Role::Manager.to_string(), "manager");
    assert!(Role::from_str("root").is_err());
  }

  #[test]
  fn privileged_fields() {
    let display_only = UserUpdate {
      name: Some("Ana".into()),
      position: Patch::Set("Gerente".into()),
      ..Default::default()
    };
    assert!(!display_only.touches_privileged());

    let clears_branch = UserUpdate {
      branch_id: Patch::Clear,
      ..Default::default()
    };
    assert!(clears_branch.touches_privileged());
  }
}
