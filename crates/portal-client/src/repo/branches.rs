use portal_core::{
  access::{Action, Resource},
  branch::{Branch, BranchUpdate, NewBranch},
  gateway::{Gateway, Query, Table},
  id::{parse_id, require},
};

use super::{RepoContext, Verb};
use crate::{
  Result,
  cache::CacheKey,
  wire::{FromRow, RowBuilder},
};

pub struct BranchRepository<G: Gateway> {
  ctx: RepoContext<G>,
}

impl<G: Gateway> BranchRepository<G> {
  pub(crate) fn new(ctx: RepoContext<G>) -> Self { Self { ctx } }

  /// All branches, by name.
  pub async fn list(&self) -> Result<Vec<Branch>> {
    self
      .ctx
      .list(
        CacheKey::Collection(Table::Branches),
        Query::all().order_by("name", true),
      )
      .await
  }

  pub async fn get(&self, id: &str) -> Result<Branch> {
    let id = parse_id(id)?;
    self.ctx.get(id).await
  }

  pub async fn create(&self, new: NewBranch) -> Result<Branch> {
    let result = self.try_create(new).await;
    self.ctx.report("branch", Verb::Create, result)
  }

  async fn try_create(&self, new: NewBranch) -> Result<Branch> {
    for (field, value) in [
      ("name", &new.name),
      ("address", &new.address),
      ("postal_code", &new.postal_code),
      ("city", &new.city),
      ("province", &new.province),
      ("contact_person", &new.contact_person),
      ("email", &new.email),
    ] {
      require(field, value)?;
    }
    self.ctx.session.authorize(Resource::Branches, Action::Create)?;

    let row = RowBuilder::new()
      .set("name", new.name)
      .set("address", new.address)
      .set("postal_code", new.postal_code)
      .set("city", new.city)
      .set("province", new.province)
      .set("contact_person", new.contact_person)
      .set("email", new.email)
      .opt("phone", new.phone)
      .opt("website", new.website)
      .build();

    let stored = self.ctx.insert(Table::Branches, row).await?;
    let branch = Branch::from_row(stored)?;
    self.ctx.invalidate(Table::Branches, Verb::Create, branch.id);
    Ok(branch)
  }

  pub async fn update(&self, id: &str, update: BranchUpdate) -> Result<()> {
    let result = self.try_update(id, update).await;
    self.ctx.report("branch", Verb::Update, result)
  }

  async fn try_update(&self, id: &str, update: BranchUpdate) -> Result<()> {
    let id = parse_id(id)?;
    self.ctx.session.authorize(Resource::Branches, Action::Update)?;

    let patch = RowBuilder::new()
      .required("name", update.name)?
      .required("address", update.address)?
      .required("postal_code", update.postal_code)?
      .required("city", update.city)?
      .required("province", update.province)?
      .required("contact_person", update.contact_person)?
      .required("email", update.email)?
      .patch("phone", update.phone)
      .patch("website", update.website)
      .build();

    self.ctx.update(Table::Branches, id, patch).await?;
    self.ctx.invalidate(Table::Branches, Verb::Update, id);
    Ok(())
  }

  pub async fn delete(&self, id: &str) -> Result<()> {
    let result = self.try_delete(id).await;
    self.ctx.report("branch", Verb::Delete, result)
  }

  async fn try_delete(&self, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    self.ctx.session.authorize(Resource::Branches, Action::Delete)?;
    self.ctx.delete(Table::Branches, id).await?;
    self.ctx.invalidate(Table::Branches, Verb::Delete, id);
    Ok(())
  }
}
