//! Insurance companies and their specification sheets.
//!
//! Specifications are rows in their own table. They are only loaded by
//! [`CompanyRepository::get`] and only written through company create and
//! update.

use chrono::Utc;
use portal_core::{
  access::{Action, Resource},
  company::{
    Company, CompanySpecification, CompanyUpdate, NewCompany, NewSpecification,
    SpecificationChange,
  },
  gateway::{Gateway, Query, Table},
  id::{parse_id, require},
};
use uuid::Uuid;

use super::{RepoContext, Verb};
use crate::{
  Error, Result,
  cache::CacheKey,
  error::Message,
  wire::{FromRow, RowBuilder},
};

pub struct CompanyRepository<G: Gateway> {
  ctx: RepoContext<G>,
}

impl<G: Gateway> CompanyRepository<G> {
  pub(crate) fn new(ctx: RepoContext<G>) -> Self { Self { ctx } }

  /// All companies, by name, without specifications.
  pub async fn list(&self) -> Result<Vec<Company>> {
    self
      .ctx
      .list(
        CacheKey::Collection(Table::Companies),
        Query::all().order_by("name", true),
      )
      .await
  }

  /// One company with its specifications.
  pub async fn get(&self, id: &str) -> Result<Company> {
    let id = parse_id(id)?;
    let gateway = &*self.ctx.gateway;
    self
      .ctx
      .cache
      .fetch(CacheKey::Entity(Table::Companies, id), move || async move {
        let row = gateway
          .select_one(Table::Companies, id)
          .await
          .map_err(Error::repository)?;
        let mut company = Company::from_row(row)?;

        let specs = gateway
          .select(
            Table::CompanySpecifications,
            Query::all().eq("company_id", id.to_string()),
          )
          .await
          .map_err(Error::repository)?;
        company.specifications = CompanySpecification::from_rows(specs)?;
        Ok(company)
      })
      .await
  }

  pub async fn create(&self, new: NewCompany) -> Result<Company> {
    let result = self.try_create(new).await;
    self.ctx.report("company", Verb::Create, result)
  }

  async fn try_create(&self, new: NewCompany) -> Result<Company> {
    require("name", &new.name)?;
    for spec in &new.specifications {
      validate_spec(&spec.category, &spec.content)?;
    }
    self.ctx.session.authorize(Resource::Companies, Action::Create)?;

    let row = RowBuilder::new()
      .set("name", new.name)
      .opt("logo", new.logo)
      .opt("website", new.website)
      .opt("agent_access_url", new.agent_access_url)
      .opt("contact_email", new.contact_email)
      .opt("classification", new.classification)
      .build();
    let mut company = Company::from_row(self.ctx.insert(Table::Companies, row).await?)?;
    self.ctx.invalidate(Table::Companies, Verb::Create, company.id);

    for spec in new.specifications {
      match self.insert_spec(company.id, spec).await {
        Ok(stored) => company.specifications.push(stored),
        Err(err) => {
          if let Err(cleanup) = self.ctx.delete(Table::Companies, company.id).await {
            tracing::warn!(
              company_id = %company.id,
              error = %cleanup,
              "could not roll back company after specification failure"
            );
          }
          self.ctx.invalidate(Table::Companies, Verb::Delete, company.id);
          return Err(err);
        }
      }
    }

    Ok(company)
  }

  /// Patch the company row, then apply specification changes in order.
  pub async fn update(&self, id: &str, update: CompanyUpdate) -> Result<()> {
    let result = self.try_update(id, update).await;
    self.ctx.report("company", Verb::Update, result)
  }

  async fn try_update(&self, id: &str, update: CompanyUpdate) -> Result<()> {
    let id = parse_id(id)?;
    for change in &update.specifications {
      match change {
        SpecificationChange::Add(spec) => validate_spec(&spec.category, &spec.content)?,
        SpecificationChange::Edit { category, content, .. } => {
          validate_spec(category, content)?
        }
        SpecificationChange::Remove(_) => {}
      }
    }
    self.ctx.session.authorize(Resource::Companies, Action::Update)?;

    let patch = RowBuilder::new()
      .required("name", update.name)?
      .patch("logo", update.logo)
      .patch("website", update.website)
      .patch("agent_access_url", update.agent_access_url)
      .patch("contact_email", update.contact_email)
      .patch("classification", update.classification)
      .set("last_updated", Utc::now())
      .build();
    self.check_spec_owner(id, &update.specifications).await?;
    self.ctx.update(Table::Companies, id, patch).await?;

    let specs = self.apply_spec_changes(id, update.specifications).await;
    self.ctx.invalidate(Table::Companies, Verb::Update, id);
    specs
  }

  /// Every edited or removed specification must belong to `company_id`.
  async fn check_spec_owner(
    &self,
    company_id: Uuid,
    changes: &[SpecificationChange],
  ) -> Result<()> {
    let targets: Vec<Uuid> = changes
      .iter()
      .filter_map(|change| match change {
        SpecificationChange::Edit { id, .. } | SpecificationChange::Remove(id) => Some(*id),
        SpecificationChange::Add(_) => None,
      })
      .collect();
    if targets.is_empty() {
      return Ok(());
    }

    let rows = self
      .ctx
      .gateway
      .select(
        Table::CompanySpecifications,
        Query::all().eq("company_id", company_id.to_string()),
      )
      .await
      .map_err(Error::repository)?;
    let owned = CompanySpecification::from_rows(rows)?;

    match targets.iter().find(|id| !owned.iter().any(|s| s.id == **id)) {
      Some(missing) => Err(Error::repository(Message(format!(
        "company {company_id} has no specification {missing}"
      )))),
      None => Ok(()),
    }
  }

  async fn apply_spec_changes(
    &self,
    company_id: Uuid,
    changes: Vec<SpecificationChange>,
  ) -> Result<()> {
    for change in changes {
      match change {
        SpecificationChange::Add(spec) => {
          self.insert_spec(company_id, spec).await?;
        }
        SpecificationChange::Edit { id, category, content } => {
          let patch = RowBuilder::new()
            .set("category", category)
            .set("content", content)
            .build();
          self.ctx.update(Table::CompanySpecifications, id, patch).await?;
        }
        SpecificationChange::Remove(id) => {
          self.ctx.delete(Table::CompanySpecifications, id).await?;
        }
      }
    }
    Ok(())
  }

  async fn insert_spec(
    &self,
    company_id: Uuid,
    spec: NewSpecification,
  ) -> Result<CompanySpecification> {
    let row = RowBuilder::new()
      .set("category", spec.category)
      .set("content", spec.content)
      .set("company_id", company_id)
      .build();
    CompanySpecification::from_row(self.ctx.insert(Table::CompanySpecifications, row).await?)
  }

  /// Delete a company. Its specifications go with it.
  pub async fn delete(&self, id: &str) -> Result<()> {
    let result = self.try_delete(id).await;
    self.ctx.report("company", Verb::Delete, result)
  }

  async fn try_delete(&self, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    self.ctx.session.authorize(Resource::Companies, Action::Delete)?;
    self.ctx.delete(Table::Companies, id).await?;
    self.ctx.invalidate(Table::Companies, Verb::Delete, id);
    Ok(())
  }
}

fn validate_spec(category: &str, content: &str) -> Result<()> {
  require("specification category", category)?;
  require("specification content", content)?;
  Ok(())
}
