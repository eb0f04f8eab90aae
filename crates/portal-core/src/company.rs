//! Insurance companies and their owned specification rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Patch;

// ─── Company ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
  pub id:               Uuid,
  pub name:             String,
  pub logo:             Option<String>,
  pub website:          Option<String>,
  pub agent_access_url: Option<String>,
  pub contact_email:    Option<String>,
  pub classification:   Option<String>,
  pub created_at:       DateTime<Utc>,
  pub last_updated:     DateTime<Utc>,
  /// Empty in collection reads; populated by a single-company read.
  pub specifications:   Vec<CompanySpecification>,
}

#[derive(Debug, Clone)]
pub struct NewCompany {
  pub name:             String,
  pub logo:             Option<String>,
  pub website:          Option<String>,
  pub agent_access_url: Option<String>,
  pub contact_email:    Option<String>,
  pub classification:   Option<String>,
  pub specifications:   Vec<NewSpecification>,
}

/// A partial company update. Specification changes travel with it: this is
/// the only path through which specifications are mutated.
#[derive(Debug, Clone, Default)]
pub struct CompanyUpdate {
  pub name:             Option<String>,
  pub logo:             Patch<String>,
  pub website:          Patch<String>,
  pub agent_access_url: Patch<String>,
  pub contact_email:    Patch<String>,
  pub classification:   Patch<String>,
  pub specifications:   Vec<SpecificationChange>,
}

// ─── Specifications ──────────────────────────────────────────────────────────

/// A categorised block of text describing one aspect of a company's offer.
/// Deleted together with its company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySpecification {
  pub id:         Uuid,
  pub category:   String,
  pub content:    String,
  pub company_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSpecification {
  pub category: String,
  pub content:  String,
}

/// One specification edit applied as part of a [`CompanyUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecificationChange {
  Add(NewSpecification),
  Edit {
    id:       Uuid,
    category: String,
    content:  String,
  },
  Remove(Uuid),
}
