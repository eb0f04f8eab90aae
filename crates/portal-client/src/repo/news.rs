use chrono::Utc;
use portal_core::{
  access::{Action, Resource},
  gateway::{Gateway, Query, Table},
  id::{parse_id, require},
  news::{News, NewNews, NewsUpdate},
};

use super::{RepoContext, Verb};
use crate::{
  Result,
  cache::CacheKey,
  wire::{FromRow, RowBuilder},
};

pub struct NewsRepository<G: Gateway> {
  ctx: RepoContext<G>,
}

impl<G: Gateway> NewsRepository<G> {
  pub(crate) fn new(ctx: RepoContext<G>) -> Self { Self { ctx } }

  /// All news, most recently published first.
  pub async fn list(&self) -> Result<Vec<News>> {
    self
      .ctx
      .list(
        CacheKey::Collection(Table::News),
        Query::all().order_by("published_at", false),
      )
      .await
  }

  pub async fn get(&self, id: &str) -> Result<News> {
    let id = parse_id(id)?;
    self.ctx.get(id).await
  }

  pub async fn create(&self, new: NewNews) -> Result<News> {
    let result = self.try_create(new).await;
    self.ctx.report("news item", Verb::Create, result)
  }

  async fn try_create(&self, new: NewNews) -> Result<News> {
    require("title", &new.title)?;
    require("content", &new.content)?;
    require("category", &new.category)?;
    let author = self.ctx.session.authorize(Resource::News, Action::Create)?;

    let row = RowBuilder::new()
      .set("title", new.title)
      .set("content", new.content)
      .opt("excerpt", new.excerpt)
      .set("featured", new.featured)
      .opt("cover_image", new.cover_image)
      .set("category", new.category)
      .opt("company_id", new.company_id)
      .set("tags", new.tags)
      .set("author", author.id)
      .set("published_at", Utc::now())
      .build();

    let news = News::from_row(self.ctx.insert(Table::News, row).await?)?;
    self.ctx.invalidate(Table::News, Verb::Create, news.id);
    Ok(news)
  }

  pub async fn update(&self, id: &str, update: NewsUpdate) -> Result<()> {
    let result = self.try_update(id, update).await;
    self.ctx.report("news item", Verb::Update, result)
  }

  async fn try_update(&self, id: &str, update: NewsUpdate) -> Result<()> {
    let id = parse_id(id)?;
    self.ctx.session.authorize(Resource::News, Action::Update)?;

    let patch = RowBuilder::new()
      .required("title", update.title)?
      .required("content", update.content)?
      .patch("excerpt", update.excerpt)
      .required("featured", update.featured)?
      .patch("cover_image", update.cover_image)
      .required("category", update.category)?
      .patch("company_id", update.company_id)
      .patch("tags", update.tags)
      .build();

    self.ctx.update(Table::News, id, patch).await?;
    self.ctx.invalidate(Table::News, Verb::Update, id);
    Ok(())
  }

  pub async fn delete(&self, id: &str) -> Result<()> {
    let result = self.try_delete(id).await;
    self.ctx.report("news item", Verb::Delete, result)
  }

  async fn try_delete(&self, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    self.ctx.session.authorize(Resource::News, Action::Delete)?;
    self.ctx.delete(Table::News, id).await?;
    self.ctx.invalidate(Table::News, Verb::Delete, id);
    Ok(())
  }
}
