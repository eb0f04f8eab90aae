//! Translation between backend rows and domain types.
//!
//! Rows arrive keyed by snake_case column names with nullable columns that
//! may hold `null` or an empty string interchangeably. Each `Raw*` struct
//! mirrors one table; `into_domain` normalises blanks to `None` and missing
//! collections to empty. Outgoing rows are assembled with [`RowBuilder`],
//! which is where the partial-update rules live.

use chrono::{DateTime, Utc};
use portal_core::{
  Patch,
  branch::Branch,
  company::{Company, CompanySpecification},
  document::Document,
  event::CalendarEvent,
  gateway::{Row, Table, timestamp},
  news::News,
  product::{Product, ProductCategory, ProductStatus},
  user::{Role, User, UserType},
};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Error)]
#[error("malformed {table} row: {source}")]
struct DecodeError {
  table:  Table,
  source: serde_json::Error,
}

fn decode<R: DeserializeOwned>(table: Table, row: Row) -> Result<R> {
  serde_json::from_value(Value::Object(row))
    .map_err(|source| Error::repository(DecodeError { table, source }))
}

fn non_empty(value: Option<String>) -> Option<String> {
  value.filter(|s| !s.trim().is_empty())
}

/// Optional foreign keys: `null`, absent and `""` all mean "none".
fn lenient_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw: Option<String> = Option::deserialize(deserializer)?;
  match raw.as_deref().map(str::trim) {
    None | Some("") => Ok(None),
    Some(s) => Uuid::parse_str(s).map(Some).map_err(serde::de::Error::custom),
  }
}

/// A domain type read from one table.
pub(crate) trait FromRow: Sized {
  const TABLE: Table;

  fn from_row(row: Row) -> Result<Self>;

  fn from_rows(rows: Vec<Row>) -> Result<Vec<Self>> {
    rows.into_iter().map(Self::from_row).collect()
  }
}

macro_rules! from_raw {
  ($domain:ty, $raw:ty, $table:expr) => {
    impl FromRow for $domain {
      const TABLE: Table = $table;

      fn from_row(row: Row) -> Result<Self> {
        decode::<$raw>(Self::TABLE, row).map(<$raw>::into_domain)
      }
    }
  };
}

// ─── Row types ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawUser {
  id:             Uuid,
  name:           String,
  email:          String,
  role:           Role,
  #[serde(rename = "type")]
  user_type:      UserType,
  avatar:         Option<String>,
  #[serde(default, deserialize_with = "lenient_uuid")]
  branch_id:      Option<Uuid>,
  position:       Option<String>,
  extension:      Option<String>,
  social_contact: Option<String>,
  created_at:     DateTime<Utc>,
}

impl RawUser {
  fn into_domain(self) -> User {
    User {
      id:             self.id,
      name:           self.name,
      email:          self.email,
      role:           self.role,
      user_type:      self.user_type,
      avatar:         non_empty(self.avatar),
      branch_id:      self.branch_id,
      position:       non_empty(self.position),
      extension:      non_empty(self.extension),
      social_contact: non_empty(self.social_contact),
      created_at:     self.created_at,
    }
  }
}

from_raw!(User, RawUser, Table::Users);

#[derive(Deserialize)]
struct RawBranch {
  id:             Uuid,
  name:           String,
  address:        String,
  postal_code:    String,
  city:           String,
  province:       String,
  contact_person: String,
  email:          String,
  phone:          Option<String>,
  website:        Option<String>,
  created_at:     DateTime<Utc>,
}

impl RawBranch {
  fn into_domain(self) -> Branch {
    Branch {
      id:             self.id,
      name:           self.name,
      address:        self.address,
      postal_code:    self.postal_code,
      city:           self.city,
      province:       self.province,
      contact_person: self.contact_person,
      email:          self.email,
      phone:          non_empty(self.phone),
      website:        non_empty(self.website),
      created_at:     self.created_at,
    }
  }
}

from_raw!(Branch, RawBranch, Table::Branches);

#[derive(Deserialize)]
struct RawCompany {
  id:               Uuid,
  name:             String,
  logo:             Option<String>,
  website:          Option<String>,
  agent_access_url: Option<String>,
  contact_email:    Option<String>,
  classification:   Option<String>,
  created_at:       DateTime<Utc>,
  last_updated:     Option<DateTime<Utc>>,
}

impl RawCompany {
  /// Specifications live in their own table and are attached by the
  /// repository when it loads them.
  fn into_domain(self) -> Company {
    Company {
      id:               self.id,
      name:             self.name,
      logo:             non_empty(self.logo),
      website:          non_empty(self.website),
      agent_access_url: non_empty(self.agent_access_url),
      contact_email:    non_empty(self.contact_email),
      classification:   non_empty(self.classification),
      created_at:       self.created_at,
      last_updated:     self.last_updated.unwrap_or(self.created_at),
      specifications:   Vec::new(),
    }
  }
}

from_raw!(Company, RawCompany, Table::Companies);

#[derive(Deserialize)]
struct RawSpecification {
  id:         Uuid,
  category:   String,
  content:    String,
  company_id: Uuid,
}

impl RawSpecification {
  fn into_domain(self) -> CompanySpecification {
    CompanySpecification {
      id:         self.id,
      category:   self.category,
      content:    self.content,
      company_id: self.company_id,
    }
  }
}

from_raw!(CompanySpecification, RawSpecification, Table::CompanySpecifications);

#[derive(Deserialize)]
struct RawProduct {
  id:             Uuid,
  name:           String,
  category_id:    Uuid,
  #[serde(default, deserialize_with = "lenient_uuid")]
  subcategory_id: Option<Uuid>,
  company_id:     Uuid,
  description:    Option<String>,
  #[serde(default)]
  status:         Option<ProductStatus>,
  tags:           Option<Vec<String>>,
  created_at:     DateTime<Utc>,
  updated_at:     Option<DateTime<Utc>>,
  author:         Uuid,
}

impl RawProduct {
  fn into_domain(self) -> Product {
    Product {
      id:             self.id,
      name:           self.name,
      category_id:    self.category_id,
      subcategory_id: self.subcategory_id,
      company_id:     self.company_id,
      description:    non_empty(self.description),
      status:         self.status.unwrap_or_default(),
      tags:           self.tags.unwrap_or_default(),
      created_at:     self.created_at,
      updated_at:     self.updated_at.unwrap_or(self.created_at),
      author:         self.author,
    }
  }
}

from_raw!(Product, RawProduct, Table::Products);

#[derive(Deserialize)]
struct RawCategory {
  id:        Uuid,
  name:      String,
  #[serde(default, deserialize_with = "lenient_uuid")]
  parent_id: Option<Uuid>,
}

impl RawCategory {
  fn into_domain(self) -> ProductCategory {
    ProductCategory { id: self.id, name: self.name, parent_id: self.parent_id }
  }
}

from_raw!(ProductCategory, RawCategory, Table::ProductCategories);

#[derive(Deserialize)]
struct RawDocument {
  id:                     Uuid,
  title:                  String,
  description:            Option<String>,
  category_id:            String,
  #[serde(default, deserialize_with = "lenient_uuid")]
  company_id:             Option<Uuid>,
  #[serde(default, deserialize_with = "lenient_uuid")]
  product_category_id:    Option<Uuid>,
  #[serde(default, deserialize_with = "lenient_uuid")]
  product_subcategory_id: Option<Uuid>,
  #[serde(default, deserialize_with = "lenient_uuid")]
  product_id:             Option<Uuid>,
  tags:                   Option<Vec<String>>,
  file_url:               String,
  file_type:              String,
  file_size:              i64,
  uploaded_by:            Uuid,
  uploaded_at:            DateTime<Utc>,
}

impl RawDocument {
  fn into_domain(self) -> Document {
    Document {
      id:                     self.id,
      title:                  self.title,
      description:            non_empty(self.description),
      category_id:            self.category_id,
      company_id:             self.company_id,
      product_category_id:    self.product_category_id,
      product_subcategory_id: self.product_subcategory_id,
      product_id:             self.product_id,
      tags:                   self.tags.unwrap_or_default(),
      file_url:               self.file_url,
      file_type:              self.file_type,
      file_size:              self.file_size,
      uploaded_by:            self.uploaded_by,
      uploaded_at:            self.uploaded_at,
    }
  }
}

from_raw!(Document, RawDocument, Table::Documents);

#[derive(Deserialize)]
struct RawNews {
  id:           Uuid,
  title:        String,
  content:      String,
  excerpt:      Option<String>,
  featured:     Option<bool>,
  cover_image:  Option<String>,
  category:     String,
  #[serde(default, deserialize_with = "lenient_uuid")]
  company_id:   Option<Uuid>,
  tags:         Option<Vec<String>>,
  author:       Uuid,
  published_at: DateTime<Utc>,
}

impl RawNews {
  fn into_domain(self) -> News {
    News {
      id:           self.id,
      title:        self.title,
      content:      self.content,
      excerpt:      non_empty(self.excerpt),
      featured:     self.featured.unwrap_or(false),
      cover_image:  non_empty(self.cover_image),
      category:     self.category,
      company_id:   self.company_id,
      tags:         self.tags.unwrap_or_default(),
      author:       self.author,
      published_at: self.published_at,
    }
  }
}

from_raw!(News, RawNews, Table::News);

#[derive(Deserialize)]
struct RawEvent {
  id:          Uuid,
  title:       String,
  description: Option<String>,
  location:    Option<String>,
  start_date:  DateTime<Utc>,
  end_date:    DateTime<Utc>,
  category:    String,
  user_id:     Uuid,
}

impl RawEvent {
  fn into_domain(self) -> CalendarEvent {
    CalendarEvent {
      id:          self.id,
      title:       self.title,
      description: non_empty(self.description),
      location:    non_empty(self.location),
      start_date:  self.start_date,
      end_date:    self.end_date,
      category:    self.category,
      owner_id:    self.user_id,
    }
  }
}

from_raw!(CalendarEvent, RawEvent, Table::CalendarEvents);

// ─── Outgoing rows ───────────────────────────────────────────────────────────

/// A value that can be written to a column.
pub(crate) trait ToWire {
  fn to_wire(self) -> Value;

  /// Blank text is never written; it is omitted on insert and cleared on
  /// update.
  fn is_blank(&self) -> bool { false }
}

impl ToWire for String {
  fn to_wire(self) -> Value { Value::String(self) }

  fn is_blank(&self) -> bool { self.trim().is_empty() }
}

impl ToWire for &str {
  fn to_wire(self) -> Value { Value::String(self.to_owned()) }

  fn is_blank(&self) -> bool { self.trim().is_empty() }
}

impl ToWire for Uuid {
  fn to_wire(self) -> Value { Value::String(self.hyphenated().to_string()) }
}

impl ToWire for bool {
  fn to_wire(self) -> Value { Value::Bool(self) }
}

impl ToWire for i64 {
  fn to_wire(self) -> Value { Value::from(self) }
}

impl ToWire for DateTime<Utc> {
  fn to_wire(self) -> Value { Value::String(timestamp(self)) }
}

impl ToWire for Vec<String> {
  fn to_wire(self) -> Value {
    Value::Array(self.into_iter().map(Value::String).collect())
  }
}

macro_rules! to_wire_as_str {
  ($($ty:ty),*) => {$(
    impl ToWire for $ty {
      fn to_wire(self) -> Value { Value::String(self.as_ref().to_owned()) }
    }
  )*};
}

to_wire_as_str!(Role, UserType, ProductStatus);

#[derive(Debug, Default)]
pub(crate) struct RowBuilder {
  row: Row,
}

impl RowBuilder {
  pub fn new() -> Self { Self::default() }

  pub fn set(mut self, column: &str, value: impl ToWire) -> Self {
    self.row.insert(column.to_owned(), value.to_wire());
    self
  }

  /// Write the column only when a non-blank value is given.
  pub fn opt<T: ToWire>(self, column: &str, value: Option<T>) -> Self {
    match value {
      Some(v) if !v.is_blank() => self.set(column, v),
      _ => self,
    }
  }

  /// For non-null columns on update: `None` omits the column, blank text
  /// is rejected.
  pub fn required<T: ToWire>(self, column: &str, value: Option<T>) -> Result<Self> {
    match value {
      None => Ok(self),
      Some(v) if v.is_blank() => Err(Error::Validation(format!("{column} cannot be blank"))),
      Some(v) => Ok(self.set(column, v)),
    }
  }

  /// `Keep` omits the column, `Clear` and blank text send `null`.
  pub fn patch<T: ToWire>(mut self, column: &str, value: Patch<T>) -> Self {
    match value {
      Patch::Keep => self,
      Patch::Set(v) if !v.is_blank() => self.set(column, v),
      Patch::Set(_) | Patch::Clear => {
        self.row.insert(column.to_owned(), Value::Null);
        self
      }
    }
  }

  pub fn is_empty(&self) -> bool { self.row.is_empty() }

  pub fn build(self) -> Row { self.row }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn row(value: Value) -> Row {
    match value {
      Value::Object(map) => map,
      _ => unreachable!(),
    }
  }

  #[test]
  fn user_row_maps_snake_case_and_blanks() {
    let id = Uuid::new_v4();
    let user = User::from_row(row(json!({
      "id": id,
      "name": "Lucía",
      "email": "lucia@example.com",
      "role": "delegate",
      "type": "Delegación",
      "avatar": "",
      "branch_id": "",
      "position": null,
      "extension": "204",
      "created_at": "2024-03-01T09:00:00+00:00",
    })))
    .unwrap();

    assert_eq!(user.id, id);
    assert_eq!(user.role, Role::Delegate);
    assert_eq!(user.user_type, UserType::Branch);
    assert_eq!(user.avatar, None);
    assert_eq!(user.branch_id, None);
    assert_eq!(user.extension.as_deref(), Some("204"));
    assert_eq!(user.social_contact, None);
  }

  #[test]
  fn news_defaults_featured_and_tags() {
    let news = News::from_row(row(json!({
      "id": Uuid::new_v4(),
      "title": "Nueva tarifa",
      "content": "...",
      "featured": null,
      "category": "productos",
      "author": Uuid::new_v4(),
      "published_at": "2024-03-01T09:00:00Z",
    })))
    .unwrap();
    assert!(!news.featured);
    assert!(news.tags.is_empty());
  }

  #[test]
  fn event_owner_comes_from_user_id() {
    let owner = Uuid::new_v4();
    let event = CalendarEvent::from_row(row(json!({
      "id": Uuid::new_v4(),
      "title": "Reunión",
      "start_date": "2024-03-01T09:00:00Z",
      "end_date": "2024-03-01T10:00:00Z",
      "category": "meeting",
      "user_id": owner,
    })))
    .unwrap();
    assert_eq!(event.owner_id, owner);
  }

  #[test]
  fn malformed_row_names_the_table() {
    let err = Branch::from_row(row(json!({ "id": "nope" }))).unwrap_err();
    assert!(err.to_string().contains("branches"));
  }

  #[test]
  fn patch_omits_keep_and_nulls_clear() {
    let row = RowBuilder::new()
      .opt("name", Some("Sede".to_string()))
      .opt("phone", Some(" ".to_string()))
      .opt::<String>("website", None)
      .patch::<String>("logo", Patch::Keep)
      .patch::<String>("contact_email", Patch::Clear)
      .patch("classification", Patch::Set(String::new()))
      .patch("extension", Patch::Set("204".to_string()))
      .build();

    let mut keys: Vec<_> = row.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["classification", "contact_email", "extension", "name"]);
    assert_eq!(row["contact_email"], Value::Null);
    assert_eq!(row["classification"], Value::Null);
    assert_eq!(row["extension"], json!("204"));
  }

  #[test]
  fn required_columns_reject_blanks() {
    let row = RowBuilder::new()
      .required("name", Some("Sede".to_string()))
      .unwrap()
      .required::<String>("city", None)
      .unwrap()
      .build();
    assert_eq!(row.keys().map(String::as_str).collect::<Vec<_>>(), ["name"]);

    let err = RowBuilder::new().required("name", Some("  ".to_string())).unwrap_err();
    assert!(matches!(err, Error::Validation(ref m) if m.contains("name")));
  }

  #[test]
  fn timestamps_use_the_fixed_width_form() {
    let at = Utc::now();
    let row = RowBuilder::new().set("published_at", at).build();
    assert_eq!(row["published_at"], json!(timestamp(at)));
    assert!(row["published_at"].as_str().unwrap().ends_with('Z'));
  }

  #[test]
  fn enums_use_backend_labels() {
    let row = RowBuilder::new()
      .set("role", Role::Manager)
      .set("type", UserType::DepartmentHead)
      .set("status", ProductStatus::Published)
      .build();
    assert_eq!(row["role"], json!("manager"));
    assert_eq!(row["type"], json!("Responsable de Departamento"));
    assert_eq!(row["status"], json!("published"));
  }
}
