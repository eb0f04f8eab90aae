//! Product catalog entries and their category hierarchy.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::Patch;

// ─── Product ─────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
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
pub enum ProductStatus {
  #[default]
  Draft,
  Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id:             Uuid,
  pub name:           String,
  pub category_id:    Uuid,
  pub subcategory_id: Option<Uuid>,
  pub company_id:     Uuid,
  pub description:    Option<String>,
  pub status:         ProductStatus,
  pub tags:           Vec<String>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
  /// Id of the user who created the entry.
  pub author:         Uuid,
}

/// Input to product creation. `author` is stamped from the session.
#[derive(Debug, Clone)]
pub struct NewProduct {
  pub name:           String,
  pub category_id:    Uuid,
  pub subcategory_id: Option<Uuid>,
  pub company_id:     Uuid,
  pub description:    Option<String>,
  pub status:         ProductStatus,
  pub tags:           Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
  pub name:           Option<String>,
  pub category_id:    Option<Uuid>,
  pub subcategory_id: Patch<Uuid>,
  pub company_id:     Option<Uuid>,
  pub description:    Patch<String>,
  pub status:         Option<ProductStatus>,
  pub tags:           Patch<Vec<String>>,
}

// ─── Categories ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCategory {
  pub id:        Uuid,
  pub name:      String,
  pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewProductCategory {
  pub name:      String,
  pub parent_id: Option<Uuid>,
}

/// A category with its subcategories nested beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
  #[serde(flatten)]
  pub category:      ProductCategory,
  pub subcategories: Vec<CategoryNode>,
}

impl CategoryNode {
  /// Nest a flat category list into a forest.
  ///
  /// Categories with no parent, or whose parent is not in the list, become
  /// roots. Siblings are ordered by name. A parent cycle is broken by
  /// promoting its members to roots.
  pub fn build(categories: Vec<ProductCategory>) -> Vec<CategoryNode> {
    let ids: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();
    let mut children: HashMap<Uuid, Vec<ProductCategory>> = HashMap::new();
    let mut roots = Vec::new();

    for category in categories {
      match category.parent_id {
        Some(parent) if ids.contains(&parent) && parent != category.id => {
          children.entry(parent).or_default().push(category);
        }
        _ => roots.push(category),
      }
    }

    let mut forest: Vec<CategoryNode> = roots
      .into_iter()
      .map(|c| Self::attach(c, &mut children))
      .collect();

    // Whatever is still unattached sits on a cycle.
    let orphans: Vec<ProductCategory> =
      children.drain().flat_map(|(_, v)| v).collect();
    for category in orphans {
      forest.push(Self::attach(category, &mut children));
    }

    forest.sort_by(|a, b| a.category.name.cmp(&b.category.name));
    forest
  }

  fn attach(
    category: ProductCategory,
    children: &mut HashMap<Uuid, Vec<ProductCategory>>,
  ) -> CategoryNode {
    let mut subcategories: Vec<CategoryNode> = children
      .remove(&category.id)
      .unwrap_or_default()
      .into_iter()
      .map(|c| Self::attach(c, children))
      .collect();
    subcategories.sort_by(|a, b| a.category.name.cmp(&b.category.name));
    CategoryNode { category, subcategories }
  }
}
