//! Route-level access decisions.

use portal_core::access::{Action, Resource};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::AuthState;

/// The portal's screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "view", content = "id")]
pub enum View {
  Login,
  Dashboard,
  Companies,
  CompanyCreate,
  CompanyDetail(Uuid),
  Documents,
  DocumentUpload,
  Products,
  ProductDetail(Uuid),
  Branches,
  Users,
  UserDetail(Uuid),
  News,
  NewsCreate,
  NewsEdit(Uuid),
  ManagementPortal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
  Allow,
  Redirect(View),
  /// The session is still being resolved; render nothing yet.
  Wait,
}

pub struct AuthorizationGate;

impl AuthorizationGate {
  pub fn decide(state: &AuthState, view: &View) -> GateDecision {
    let user = match state {
      AuthState::AuthenticatingSession => return GateDecision::Wait,
      AuthState::Unauthenticated | AuthState::AuthError(_) => {
        return match view {
          View::Login => GateDecision::Allow,
          _ => GateDecision::Redirect(View::Login),
        };
      }
      AuthState::Authenticated(user) => user,
    };

    let role = user.role;
    let allowed = match view {
      View::Login => return GateDecision::Redirect(View::Dashboard),
      View::CompanyCreate => role.allows(Resource::Companies, Action::Create),
      View::DocumentUpload => role.allows(Resource::Documents, Action::Create),
      View::NewsCreate => role.allows(Resource::News, Action::Create),
      View::NewsEdit(_) => role.allows(Resource::News, Action::Update),
      View::Users => role.can_manage_users(),
      View::UserDetail(id) => *id == user.id || role.can_manage_users(),
      View::Dashboard
      | View::Companies
      | View::CompanyDetail(_)
      | View::Documents
      | View::Products
      | View::ProductDetail(_)
      | View::Branches
      | View::News
      | View::ManagementPortal => true,
    };

    if allowed {
      GateDecision::Allow
    } else {
      tracing::debug!(?view, %role, "view denied");
      GateDecision::Redirect(View::Dashboard)
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use portal_core::user::{Role, User, UserType};

  use super::*;

  fn signed_in(role: Role) -> (AuthState, Uuid) {
    let id = Uuid::new_v4();
    let user = User {
      id,
      name: "Marta".into(),
      email: "marta@example.com".into(),
      role,
      user_type: UserType::CentralServices,
      avatar: None,
      branch_id: None,
      position: None,
      extension: None,
      social_contact: None,
      created_at: Utc::now(),
    };
    (AuthState::Authenticated(user), id)
  }

  #[test]
  fn employee_is_sent_to_dashboard_from_user_admin() {
    let (state, _) = signed_in(Role::Employee);
    assert_eq!(
      AuthorizationGate::decide(&state, &View::Users),
      GateDecision::Redirect(View::Dashboard)
    );
    assert_eq!(
      AuthorizationGate::decide(&state, &View::CompanyCreate),
      GateDecision::Redirect(View::Dashboard)
    );
    assert_eq!(AuthorizationGate::decide(&state, &View::Products), GateDecision::Allow);
  }

  #[test]
  fn own_profile_is_always_viewable() {
    let (state, id) = signed_in(Role::Collaborator);
    assert_eq!(AuthorizationGate::decide(&state, &View::UserDetail(id)), GateDecision::Allow);
    assert_eq!(
      AuthorizationGate::decide(&state, &View::UserDetail(Uuid::new_v4())),
      GateDecision::Redirect(View::Dashboard)
    );
  }

  #[test]
  fn manager_reaches_user_admin_and_create_screens() {
    let (state, _) = signed_in(Role::Manager);
    for view in [View::Users, View::CompanyCreate, View::DocumentUpload, View::NewsCreate] {
      assert_eq!(AuthorizationGate::decide(&state, &view), GateDecision::Allow);
    }
  }

  #[test]
  fn signed_out_goes_to_login_and_resolving_waits() {
    for state in [AuthState::Unauthenticated, AuthState::AuthError("boom".into())] {
      assert_eq!(
        AuthorizationGate::decide(&state, &View::Dashboard),
        GateDecision::Redirect(View::Login)
      );
      assert_eq!(AuthorizationGate::decide(&state, &View::Login), GateDecision::Allow);
    }
    assert_eq!(
      AuthorizationGate::decide(&AuthState::AuthenticatingSession, &View::News),
      GateDecision::Wait
    );
  }

  #[test]
  fn login_while_signed_in_redirects_home() {
    let (state, _) = signed_in(Role::Admin);
    assert_eq!(
      AuthorizationGate::decide(&state, &View::Login),
      GateDecision::Redirect(View::Dashboard)
    );
  }
}
