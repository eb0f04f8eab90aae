//! Column layout of each portal table and the conversion between JSON row
//! values and SQLite values.
//!
//! Rows cross the gateway as JSON objects. Every column name a caller
//! supplies is checked against the table's column list before it reaches
//! SQL, so identifiers are never taken from input verbatim.

use chrono::Utc;
use portal_core::gateway::{Row, Table, timestamp};
use rusqlite::types::Value as Sql;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
  Text,
  Integer,
  /// Stored as 0/1.
  Bool,
  /// Stored as JSON text.
  Json,
}

pub struct TableSpec {
  pub table:   Table,
  pub columns: &'static [(&'static str, Kind)],
  /// Timestamp columns filled with the current time when an insert omits
  /// them.
  pub stamped: &'static [&'static str],
}

use Kind::{Bool, Integer, Json, Text};

const USERS: TableSpec = TableSpec {
  table:   Table::Users,
  columns: &[
    ("id", Text),
    ("name", Text),
    ("email", Text),
    ("role", Text),
    ("type", Text),
    ("avatar", Text),
    ("branch_id", Text),
    ("position", Text),
    ("extension", Text),
    ("social_contact", Text),
    ("created_at", Text),
  ],
  stamped: &["created_at"],
};

const BRANCHES: TableSpec = TableSpec {
  table:   Table::Branches,
  columns: &[
    ("id", Text),
    ("name", Text),
    ("address", Text),
    ("postal_code", Text),
    ("city", Text),
    ("province", Text),
    ("contact_person", Text),
    ("email", Text),
    ("phone", Text),
    ("website", Text),
    ("created_at", Text),
  ],
  stamped: &["created_at"],
};

const COMPANIES: TableSpec = TableSpec {
  table:   Table::Companies,
  columns: &[
    ("id", Text),
    ("name", Text),
    ("logo", Text),
    ("website", Text),
    ("agent_access_url", Text),
    ("contact_email", Text),
    ("classification", Text),
    ("created_at", Text),
    ("last_updated", Text),
  ],
  stamped: &["created_at", "last_updated"],
};

const COMPANY_SPECIFICATIONS: TableSpec = TableSpec {
  table:   Table::CompanySpecifications,
  columns: &[
    ("id", Text),
    ("category", Text),
    ("content", Text),
    ("company_id", Text),
  ],
  stamped: &[],
};

const PRODUCTS: TableSpec = TableSpec {
  table:   Table::Products,
  columns: &[
    ("id", Text),
    ("name", Text),
    ("category_id", Text),
    ("subcategory_id", Text),
    ("company_id", Text),
    ("description", Text),
    ("status", Text),
    ("tags", Json),
    ("created_at", Text),
    ("updated_at", Text),
    ("author", Text),
  ],
  stamped: &["created_at", "updated_at"],
};

const PRODUCT_CATEGORIES: TableSpec = TableSpec {
  table:   Table::ProductCategories,
  columns: &[("id", Text), ("name", Text), ("parent_id", Text)],
  stamped: &[],
};

const DOCUMENTS: TableSpec = TableSpec {
  table:   Table::Documents,
  columns: &[
    ("id", Text),
    ("title", Text),
    ("description", Text),
    ("category_id", Text),
    ("company_id", Text),
    ("product_category_id", Text),
    ("product_subcategory_id", Text),
    ("product_id", Text),
    ("tags", Json),
    ("file_url", Text),
    ("file_type", Text),
    ("file_size", Integer),
    ("uploaded_by", Text),
    ("uploaded_at", Text),
  ],
  stamped: &["uploaded_at"],
};

const NEWS: TableSpec = TableSpec {
  table:   Table::News,
  columns: &[
    ("id", Text),
    ("title", Text),
    ("content", Text),
    ("excerpt", Text),
    ("featured", Bool),
    ("cover_image", Text),
    ("category", Text),
    ("company_id", Text),
    ("tags", Json),
    ("author", Text),
    ("published_at", Text),
  ],
  stamped: &["published_at"],
};

const CALENDAR_EVENTS: TableSpec = TableSpec {
  table:   Table::CalendarEvents,
  columns: &[
    ("id", Text),
    ("title", Text),
    ("description", Text),
    ("location", Text),
    ("start_date", Text),
    ("end_date", Text),
    ("category", Text),
    ("user_id", Text),
  ],
  stamped: &[],
};

const NOTIFICATIONS: TableSpec = TableSpec {
  table:   Table::Notifications,
  columns: &[
    ("id", Text),
    ("type", Text),
    ("title", Text),
    ("message", Text),
    ("read", Bool),
    ("link", Text),
    ("user_id", Text),
    ("created_at", Text),
  ],
  stamped: &["created_at"],
};

pub fn spec(table: Table) -> &'static TableSpec {
  match table {
    Table::Users => &USERS,
    Table::Branches => &BRANCHES,
    Table::Companies => &COMPANIES,
    Table::CompanySpecifications => &COMPANY_SPECIFICATIONS,
    Table::Products => &PRODUCTS,
    Table::ProductCategories => &PRODUCT_CATEGORIES,
    Table::Documents => &DOCUMENTS,
    Table::News => &NEWS,
    Table::CalendarEvents => &CALENDAR_EVENTS,
    Table::Notifications => &NOTIFICATIONS,
  }
}

impl TableSpec {
  pub fn name(&self) -> &str { self.table.as_ref() }

  /// Look up a caller-supplied column name.
  pub fn column(&self, name: &str) -> Result<(&'static str, Kind)> {
    self
      .columns
      .iter()
      .find(|(column, _)| *column == name)
      .copied()
      .ok_or_else(|| Error::UnknownColumn {
        table:  self.table,
        column: name.to_owned(),
      })
  }

  /// Comma-separated column list for `SELECT`.
  pub fn select_list(&self) -> String {
    self
      .columns
      .iter()
      .map(|(column, _)| quote(column))
      .collect::<Vec<_>>()
      .join(", ")
  }

  /// Fill in the id and server timestamps an insert left out.
  pub fn with_defaults(&self, mut row: Row) -> Row {
    row
      .entry("id")
      .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
    let now = timestamp(Utc::now());
    for column in self.stamped {
      match row.get(*column) {
        Some(Value::Null) | None => {
          row.insert((*column).to_owned(), Value::String(now.clone()));
        }
        Some(_) => {}
      }
    }
    row
  }

  /// Convert one JSON value for `column` to its stored form.
  pub fn encode(&self, column: &str, kind: Kind, value: &Value) -> Result<Sql> {
    let mismatch = |expected| Error::InvalidValue {
      table: self.table,
      column: column.to_owned(),
      expected,
    };
    Ok(match (kind, value) {
      (_, Value::Null) => Sql::Null,
      (Text, Value::String(s)) => Sql::Text(s.clone()),
      (Text, _) => return Err(mismatch("a string")),
      (Integer, Value::Number(n)) => Sql::Integer(n.as_i64().ok_or(mismatch("an integer"))?),
      (Integer, _) => return Err(mismatch("an integer")),
      (Bool, Value::Bool(b)) => Sql::Integer(i64::from(*b)),
      (Bool, _) => return Err(mismatch("a boolean")),
      (Json, other) => Sql::Text(serde_json::to_string(other)?),
    })
  }

  /// Convert one stored value back to JSON.
  pub fn decode(&self, column: &str, kind: Kind, value: Sql) -> Result<Value> {
    Ok(match (kind, value) {
      (_, Sql::Null) => Value::Null,
      (Json, Sql::Text(s)) => serde_json::from_str(&s)?,
      (Bool, Sql::Integer(i)) => Value::Bool(i != 0),
      (_, Sql::Integer(i)) => Value::from(i),
      (_, Sql::Real(f)) => Value::from(f),
      (_, Sql::Text(s)) => Value::String(s),
      (_, Sql::Blob(_)) => {
        return Err(Error::InvalidValue {
          table:    self.table,
          column:   column.to_owned(),
          expected: "a non-blob value",
        });
      }
    })
  }

  /// Build a JSON row from one result row in [`select_list`](Self::select_list)
  /// order.
  pub fn decode_row(&self, values: Vec<Sql>) -> Result<Row> {
    let mut row = Row::new();
    for ((column, kind), value) in self.columns.iter().zip(values) {
      row.insert((*column).to_owned(), self.decode(column, *kind, value)?);
    }
    Ok(row)
  }
}

/// Quote an identifier that has already been checked against a spec.
pub fn quote(identifier: &str) -> String { format!("\"{identifier}\"") }

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn unknown_columns_are_rejected() {
    let err = spec(Table::Branches).column("name; DROP TABLE users").unwrap_err();
    assert!(matches!(err, Error::UnknownColumn { table: Table::Branches, .. }));
  }

  #[test]
  fn json_and_bool_columns_round_trip_through_sql() {
    let news = spec(Table::News);
    let tags = news.encode("tags", Json, &json!(["a", "b"])).unwrap();
    assert_eq!(tags, Sql::Text("[\"a\",\"b\"]".into()));
    assert_eq!(news.decode("tags", Json, tags).unwrap(), json!(["a", "b"]));

    let featured = news.encode("featured", Bool, &json!(true)).unwrap();
    assert_eq!(featured, Sql::Integer(1));
    assert_eq!(news.decode("featured", Bool, featured).unwrap(), json!(true));
  }

  #[test]
  fn type_mismatch_names_the_column() {
    let err = spec(Table::Documents)
      .encode("file_size", Integer, &json!("big"))
      .unwrap_err();
    assert_eq!(err.to_string(), "documents.file_size expects an integer");
  }

  #[test]
  fn defaults_fill_id_and_stamps_only_when_missing() {
    let stamp = "2024-01-01T00:00:00+00:00";
    let row = match json!({ "name": "Axa", "created_at": stamp }) {
      Value::Object(map) => map,
      _ => unreachable!(),
    };
    let row = spec(Table::Companies).with_defaults(row);
    assert!(row["id"].is_string());
    assert_eq!(row["created_at"], json!(stamp));
    assert!(row["last_updated"].is_string());
  }
}
