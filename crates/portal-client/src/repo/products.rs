use chrono::Utc;
use portal_core::{
  access::{Action, Resource},
  gateway::{Gateway, Query, Table},
  id::{parse_id, require},
  product::{
    CategoryNode, NewProduct, NewProductCategory, Product, ProductCategory,
    ProductUpdate,
  },
};

use super::{RepoContext, Verb};
use crate::{
  Result,
  cache::CacheKey,
  wire::{FromRow, RowBuilder},
};

pub struct ProductRepository<G: Gateway> {
  ctx: RepoContext<G>,
}

impl<G: Gateway> ProductRepository<G> {
  pub(crate) fn new(ctx: RepoContext<G>) -> Self { Self { ctx } }

  pub async fn list(&self) -> Result<Vec<Product>> {
    self
      .ctx
      .list(
        CacheKey::Collection(Table::Products),
        Query::all().order_by("name", true),
      )
      .await
  }

  pub async fn get(&self, id: &str) -> Result<Product> {
    let id = parse_id(id)?;
    self.ctx.get(id).await
  }

  /// Create a product authored by the signed-in user.
  pub async fn create(&self, new: NewProduct) -> Result<Product> {
    let result = self.try_create(new).await;
    self.ctx.report("product", Verb::Create, result)
  }

  async fn try_create(&self, new: NewProduct) -> Result<Product> {
    require("name", &new.name)?;
    let author = self.ctx.session.authorize(Resource::Products, Action::Create)?;

    let row = RowBuilder::new()
      .set("name", new.name)
      .set("category_id", new.category_id)
      .opt("subcategory_id", new.subcategory_id)
      .set("company_id", new.company_id)
      .opt("description", new.description)
      .set("status", new.status)
      .set("tags", new.tags)
      .set("author", author.id)
      .build();

    let product = Product::from_row(self.ctx.insert(Table::Products, row).await?)?;
    self.ctx.invalidate(Table::Products, Verb::Create, product.id);
    Ok(product)
  }

  pub async fn update(&self, id: &str, update: ProductUpdate) -> Result<()> {
    let result = self.try_update(id, update).await;
    self.ctx.report("product", Verb::Update, result)
  }

  async fn try_update(&self, id: &str, update: ProductUpdate) -> Result<()> {
    let id = parse_id(id)?;
    self.ctx.session.authorize(Resource::Products, Action::Update)?;

    let patch = RowBuilder::new()
      .required("name", update.name)?
      .required("category_id", update.category_id)?
      .patch("subcategory_id", update.subcategory_id)
      .required("company_id", update.company_id)?
      .patch("description", update.description)
      .required("status", update.status)?
      .patch("tags", update.tags)
      .set("updated_at", Utc::now())
      .build();

    self.ctx.update(Table::Products, id, patch).await?;
    self.ctx.invalidate(Table::Products, Verb::Update, id);
    Ok(())
  }

  pub async fn delete(&self, id: &str) -> Result<()> {
    let result = self.try_delete(id).await;
    self.ctx.report("product", Verb::Delete, result)
  }

  async fn try_delete(&self, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    self.ctx.session.authorize(Resource::Products, Action::Delete)?;
    self.ctx.delete(Table::Products, id).await?;
    self.ctx.invalidate(Table::Products, Verb::Delete, id);
    Ok(())
  }

  // ── Categories ────────────────────────────────────────────────────────

  pub async fn categories(&self) -> Result<Vec<ProductCategory>> {
    self
      .ctx
      .list(
        CacheKey::Collection(Table::ProductCategories),
        Query::all().order_by("name", true),
      )
      .await
  }

  /// Categories nested under their parents.
  pub async fn category_tree(&self) -> Result<Vec<CategoryNode>> {
    self.categories().await.map(CategoryNode::build)
  }

  pub async fn create_category(
    &self,
    new: NewProductCategory,
  ) -> Result<ProductCategory> {
    let result = self.try_create_category(new).await;
    self.ctx.report("category", Verb::Create, result)
  }

  async fn try_create_category(
    &self,
    new: NewProductCategory,
  ) -> Result<ProductCategory> {
    require("name", &new.name)?;
    self.ctx.session.authorize(Resource::Products, Action::Create)?;

    let row = RowBuilder::new()
      .set("name", new.name)
      .opt("parent_id", new.parent_id)
      .build();
    let category =
      ProductCategory::from_row(self.ctx.insert(Table::ProductCategories, row).await?)?;
    self.ctx.invalidate(Table::ProductCategories, Verb::Create, category.id);
    Ok(category)
  }
}
