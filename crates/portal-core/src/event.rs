//! Personal calendar events, partitioned by owning user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Patch;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
  pub id:          Uuid,
  pub title:       String,
  pub description: Option<String>,
  pub location:    Option<String>,
  pub start_date:  DateTime<Utc>,
  pub end_date:    DateTime<Utc>,
  pub category:    String,
  /// The user this event belongs to; only they may change it.
  pub owner_id:    Uuid,
}

#[derive(Debug, Clone)]
pub struct NewCalendarEvent {
  pub title:       String,
  pub description: Option<String>,
  pub location:    Option<String>,
  pub start_date:  DateTime<Utc>,
  pub end_date:    DateTime<Utc>,
  pub category:    String,
}

#[derive(Debug, Clone, Default)]
pub struct CalendarEventUpdate {
  pub title:       Option<String>,
  pub description: Patch<String>,
  pub location:    Patch<String>,
  pub start_date:  Option<DateTime<Utc>>,
  pub end_date:    Option<DateTime<Utc>>,
  pub category:    Option<String>,
}
