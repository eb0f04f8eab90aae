//! Document repository items: metadata rows paired with a stored blob.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
  pub id:                     Uuid,
  pub title:                  String,
  pub description:            Option<String>,
  /// Free-form document category (e.g. "policies", "forms").
  pub category_id:            String,
  pub company_id:             Option<Uuid>,
  pub product_category_id:    Option<Uuid>,
  pub product_subcategory_id: Option<Uuid>,
  pub product_id:             Option<Uuid>,
  pub tags:                   Vec<String>,
  /// Public URL of the stored blob.
  pub file_url:               String,
  pub file_type:              String,
  pub file_size:              i64,
  pub uploaded_by:            Uuid,
  pub uploaded_at:            DateTime<Utc>,
}

/// Document metadata supplied by the uploader. File fields and
/// `uploaded_by` are filled in by the repository.
#[derive(Debug, Clone)]
pub struct NewDocument {
  pub title:                  String,
  pub description:            Option<String>,
  pub category_id:            String,
  pub company_id:             Option<Uuid>,
  pub product_category_id:    Option<Uuid>,
  pub product_subcategory_id: Option<Uuid>,
  pub product_id:             Option<Uuid>,
  pub tags:                   Vec<String>,
}

/// The binary being uploaded.
#[derive(Debug, Clone)]
pub struct FileUpload {
  pub file_name:    String,
  pub content_type: String,
  pub bytes:        Bytes,
}

impl FileUpload {
  pub fn size(&self) -> i64 { self.bytes.len() as i64 }

  /// A storage-safe rendition of the file name: a single path segment
  /// with no whitespace.
  pub fn sanitized_name(&self) -> String {
    let name: String = self
      .file_name
      .chars()
      .map(|c| if c == '/' || c == '\\' || c.is_whitespace() { '_' } else { c })
      .collect();
    if name.is_empty() { "file".to_string() } else { name }
  }
}
