//! User-facing alerts held by the notification center.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationKind {
  Document,
  Product,
  Company,
  News,
  System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub id:         Uuid,
  #[serde(rename = "type")]
  pub kind:       NotificationKind,
  pub title:      String,
  pub message:    String,
  pub read:       bool,
  /// In-app location the notification points at, e.g. `/documents`.
  pub link:       Option<String>,
  pub created_at: DateTime<Utc>,
}

/// A notification before the center assigns its id, read flag and
/// creation time.
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub kind:    NotificationKind,
  pub title:   String,
  pub message: String,
  pub link:    Option<String>,
}
