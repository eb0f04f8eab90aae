//! Personal calendar events.
//!
//! Every event belongs to the user who created it. Listing returns only the
//! signed-in user's events; updating or deleting someone else's is refused
//! whatever the role.

use portal_core::{
  access::{Action, Resource},
  event::{CalendarEvent, CalendarEventUpdate, NewCalendarEvent},
  gateway::{Gateway, Query, Table},
  id::{parse_id, require},
  user::User,
};
use uuid::Uuid;

use super::{RepoContext, Verb};
use crate::{
  Error, Result,
  cache::CacheKey,
  wire::{FromRow, RowBuilder},
};

pub struct CalendarEventRepository<G: Gateway> {
  ctx: RepoContext<G>,
}

impl<G: Gateway> CalendarEventRepository<G> {
  pub(crate) fn new(ctx: RepoContext<G>) -> Self { Self { ctx } }

  /// The signed-in user's events by start date. Empty when signed out.
  pub async fn list(&self) -> Result<Vec<CalendarEvent>> {
    let Some(user) = self.ctx.session.current_user() else {
      return Ok(Vec::new());
    };
    self
      .ctx
      .list(
        CacheKey::Collection(Table::CalendarEvents),
        Query::all()
          .eq("user_id", user.id.to_string())
          .order_by("start_date", true),
      )
      .await
  }

  pub async fn create(&self, new: NewCalendarEvent) -> Result<CalendarEvent> {
    let result = self.try_create(new).await;
    self.ctx.report("event", Verb::Create, result)
  }

  async fn try_create(&self, new: NewCalendarEvent) -> Result<CalendarEvent> {
    require("title", &new.title)?;
    require("category", &new.category)?;
    if new.end_date < new.start_date {
      return Err(Error::Validation("an event cannot end before it starts".into()));
    }
    let owner = self.ctx.session.authorize(Resource::CalendarEvents, Action::Create)?;

    let row = RowBuilder::new()
      .set("title", new.title)
      .opt("description", new.description)
      .opt("location", new.location)
      .set("start_date", new.start_date)
      .set("end_date", new.end_date)
      .set("category", new.category)
      .set("user_id", owner.id)
      .build();

    let event = CalendarEvent::from_row(self.ctx.insert(Table::CalendarEvents, row).await?)?;
    self.ctx.invalidate(Table::CalendarEvents, Verb::Create, event.id);
    Ok(event)
  }

  pub async fn update(&self, id: &str, update: CalendarEventUpdate) -> Result<()> {
    let result = self.try_update(id, update).await;
    self.ctx.report("event", Verb::Update, result)
  }

  async fn try_update(&self, id: &str, update: CalendarEventUpdate) -> Result<()> {
    let id = parse_id(id)?;
    let user = self.ctx.session.authorize(Resource::CalendarEvents, Action::Update)?;
    let event = self.owned(&user, id).await?;

    let start = update.start_date.unwrap_or(event.start_date);
    let end = update.end_date.unwrap_or(event.end_date);
    if end < start {
      return Err(Error::Validation("an event cannot end before it starts".into()));
    }

    let patch = RowBuilder::new()
      .required("title", update.title)?
      .patch("description", update.description)
      .patch("location", update.location)
      .required("start_date", update.start_date)?
      .required("end_date", update.end_date)?
      .required("category", update.category)?
      .build();

    self.ctx.update(Table::CalendarEvents, id, patch).await?;
    self.ctx.invalidate(Table::CalendarEvents, Verb::Update, id);
    Ok(())
  }

  pub async fn delete(&self, id: &str) -> Result<()> {
    let result = self.try_delete(id).await;
    self.ctx.report("event", Verb::Delete, result)
  }

  async fn try_delete(&self, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let user = self.ctx.session.authorize(Resource::CalendarEvents, Action::Delete)?;
    self.owned(&user, id).await?;

    self.ctx.delete(Table::CalendarEvents, id).await?;
    self.ctx.invalidate(Table::CalendarEvents, Verb::Delete, id);
    Ok(())
  }

  async fn owned(&self, user: &User, id: Uuid) -> Result<CalendarEvent> {
    let event: CalendarEvent = self.ctx.load(id).await?;
    if event.owner_id != user.id {
      return Err(Error::Forbidden("events can only be changed by their owner".into()));
    }
    Ok(event)
  }
}
