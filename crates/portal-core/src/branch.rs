//! Franchise branches (offices).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Patch;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
  pub id:             Uuid,
  pub name:           String,
  pub address:        String,
  pub postal_code:    String,
  pub city:           String,
  pub province:       String,
  pub contact_person: String,
  pub email:          String,
  pub phone:          Option<String>,
  pub website:        Option<String>,
  pub created_at:     DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBranch {
  pub name:           String,
  pub address:        String,
  pub postal_code:    String,
  pub city:           String,
  pub province:       String,
  pub contact_person: String,
  pub email:          String,
  pub phone:          Option<String>,
  pub website:        Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BranchUpdate {
  pub name:           Option<String>,
  pub address:        Option<String>,
  pub postal_code:    Option<String>,
  pub city:           Option<String>,
  pub province:       Option<String>,
  pub contact_person: Option<String>,
  pub email:          Option<String>,
  pub phone:          Patch<String>,
  pub website:        Patch<String>,
}
