//! Documents: a metadata row paired with an uploaded blob.
//!
//! The blob is uploaded first so the row can carry its public URL. Deleting
//! a document removes the blob and then the row; a blob that cannot be
//! removed is logged and left behind rather than blocking the row delete.

use chrono::Utc;
use portal_core::{
  access::{Action, Resource},
  document::{Document, FileUpload, NewDocument},
  gateway::{Gateway, Query, Table},
  id::{parse_id, require},
};

use super::{RepoContext, Verb};
use crate::{
  Error, Result,
  cache::CacheKey,
  wire::{FromRow, RowBuilder},
};

pub struct DocumentRepository<G: Gateway> {
  ctx: RepoContext<G>,
}

impl<G: Gateway> DocumentRepository<G> {
  pub(crate) fn new(ctx: RepoContext<G>) -> Self { Self { ctx } }

  /// All documents, newest upload first.
  pub async fn list(&self) -> Result<Vec<Document>> {
    self
      .ctx
      .list(
        CacheKey::Collection(Table::Documents),
        Query::all().order_by("uploaded_at", false),
      )
      .await
  }

  pub async fn get(&self, id: &str) -> Result<Document> {
    let id = parse_id(id)?;
    self.ctx.get(id).await
  }

  pub async fn create(&self, new: NewDocument, file: FileUpload) -> Result<Document> {
    let result = self.try_create(new, file).await;
    self.ctx.report("document", Verb::Create, result)
  }

  async fn try_create(&self, new: NewDocument, file: FileUpload) -> Result<Document> {
    require("title", &new.title)?;
    require("category", &new.category_id)?;
    if file.bytes.is_empty() {
      return Err(Error::Validation("the uploaded file is empty".into()));
    }
    let uploader = self.ctx.session.authorize(Resource::Documents, Action::Create)?;

    let path = storage_path(&file);
    let size = file.size();
    self
      .ctx
      .gateway
      .upload(path.clone(), file.bytes, file.content_type.clone())
      .await
      .map_err(Error::repository)?;
    let url = self.ctx.gateway.public_url(&path);
    tracing::debug!(%path, %url, "document blob uploaded");

    let row = RowBuilder::new()
      .set("title", new.title)
      .opt("description", new.description)
      .set("category_id", new.category_id)
      .opt("company_id", new.company_id)
      .opt("product_category_id", new.product_category_id)
      .opt("product_subcategory_id", new.product_subcategory_id)
      .opt("product_id", new.product_id)
      .set("tags", new.tags)
      .set("file_url", url)
      .set("file_type", file.content_type)
      .set("file_size", size)
      .set("uploaded_by", uploader.id)
      .set("uploaded_at", Utc::now())
      .build();

    let stored = match self.ctx.insert(Table::Documents, row).await {
      Ok(stored) => stored,
      Err(err) => {
        if let Err(cleanup) = self.ctx.gateway.remove(path.clone()).await {
          tracing::warn!(%path, error = %cleanup, "could not remove orphaned blob");
        }
        return Err(err);
      }
    };

    let document = Document::from_row(stored)?;
    self.ctx.invalidate(Table::Documents, Verb::Create, document.id);
    Ok(document)
  }

  /// Remove the blob, then the row.
  pub async fn delete(&self, id: &str) -> Result<()> {
    let result = self.try_delete(id).await;
    self.ctx.report("document", Verb::Delete, result)
  }

  async fn try_delete(&self, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    self.ctx.session.authorize(Resource::Documents, Action::Delete)?;

    let document: Document = self.ctx.load(id).await?;
    match blob_path(&document.file_url) {
      Some(path) => {
        if let Err(err) = self.ctx.gateway.remove(path.to_owned()).await {
          tracing::warn!(document_id = %id, %path, error = %err, "could not remove document blob");
        }
      }
      None => {
        tracing::warn!(document_id = %id, url = %document.file_url, "document has no blob path")
      }
    }

    self.ctx.delete(Table::Documents, id).await?;
    self.ctx.invalidate(Table::Documents, Verb::Delete, id);
    Ok(())
  }
}

/// `<millis>_<name>`: unique per upload and a single path segment.
fn storage_path(file: &FileUpload) -> String {
  format!("{}_{}", Utc::now().timestamp_millis(), file.sanitized_name())
}

/// The storage path of a public URL: its last segment, without query.
fn blob_path(url: &str) -> Option<&str> {
  let path = url.split(['?', '#']).next().unwrap_or(url);
  path.rsplit('/').next().filter(|segment| !segment.is_empty())
}
