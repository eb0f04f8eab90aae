//! Internal news posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Patch;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct News {
  pub id:           Uuid,
  pub title:        String,
  pub content:      String,
  pub excerpt:      Option<String>,
  pub featured:     bool,
  pub cover_image:  Option<String>,
  pub category:     String,
  pub company_id:   Option<Uuid>,
  pub tags:         Vec<String>,
  pub author:       Uuid,
  pub published_at: DateTime<Utc>,
}

/// Input to news creation. `author` is stamped from the session.
#[derive(Debug, Clone)]
pub struct NewNews {
  pub title:       String,
  pub content:     String,
  pub excerpt:     Option<String>,
  pub featured:    bool,
  pub cover_image: Option<String>,
  pub category:    String,
  pub company_id:  Option<Uuid>,
  pub tags:        Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewsUpdate {
  pub title:       Option<String>,
  pub content:     Option<String>,
  pub excerpt:     Patch<String>,
  pub featured:    Option<bool>,
  pub cover_image: Patch<String>,
  pub category:    Option<String>,
  pub company_id:  Patch<Uuid>,
  pub tags:        Patch<Vec<String>>,
}
