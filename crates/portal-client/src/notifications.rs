//! In-process notification center.
//!
//! Notifications are held in memory for the life of the process. New ones
//! are announced with a toast.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

use chrono::{Duration, Utc};
use portal_core::notification::{NewNotification, Notification, NotificationKind};
use uuid::Uuid;

use crate::toast::{Toast, Toaster};

pub struct NotificationCenter {
  items:   RwLock<Vec<Notification>>,
  toaster: Arc<dyn Toaster>,
}

impl NotificationCenter {
  pub fn new(toaster: Arc<dyn Toaster>) -> Self {
    Self { items: RwLock::new(Vec::new()), toaster }
  }

  fn read(&self) -> RwLockReadGuard<'_, Vec<Notification>> {
    self.items.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, Vec<Notification>> {
    self.items.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Newest first.
  pub fn list(&self) -> Vec<Notification> {
    let mut items = self.read().clone();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
  }

  pub fn unread_count(&self) -> usize {
    self.read().iter().filter(|n| !n.read).count()
  }

  /// Mark one notification read. Returns `false` if no notification has
  /// this id. Marking an already-read notification is a no-op.
  pub fn mark_as_read(&self, id: Uuid) -> bool {
    match self.write().iter_mut().find(|n| n.id == id) {
      Some(notification) => {
        notification.read = true;
        true
      }
      None => false,
    }
  }

  pub fn mark_all_as_read(&self) {
    for notification in self.write().iter_mut() {
      notification.read = true;
    }
  }

  pub fn add(&self, new: NewNotification) -> Notification {
    let notification = Notification {
      id:         Uuid::new_v4(),
      kind:       new.kind,
      title:      new.title,
      message:    new.message,
      read:       false,
      link:       new.link,
      created_at: Utc::now(),
    };
    self.write().insert(0, notification.clone());
    tracing::debug!(id = %notification.id, kind = %notification.kind, "notification added");

    self.toaster.toast(Toast::success(
      notification.title.clone(),
      notification.message.clone(),
    ));
    notification
  }

  /// Load existing notifications, e.g. [`demo_notifications`] at startup.
  pub fn seed(&self, items: impl IntoIterator<Item = Notification>) {
    self.write().extend(items);
  }
}

/// The sample feed shown on a fresh install: a document and a news item
/// still unread, and an older company update already read.
pub fn demo_notifications() -> Vec<Notification> {
  let now = Utc::now();
  let item = |kind, title: &str, message: &str, link: &str, age: Duration, read| Notification {
    id: Uuid::new_v4(),
    kind,
    title: title.to_owned(),
    message: message.to_owned(),
    read,
    link: Some(link.to_owned()),
    created_at: now - age,
  };
  vec![
    item(
      NotificationKind::Document,
      "Nuevo documento",
      "Se ha añadido un nuevo documento de pólizas",
      "/documents",
      Duration::minutes(30),
      false,
    ),
    item(
      NotificationKind::News,
      "Nueva noticia",
      "Se ha publicado una nueva noticia importante",
      "/news",
      Duration::hours(2),
      false,
    ),
    item(
      NotificationKind::Company,
      "Actualización de compañía",
      "Albroksa ha actualizado su información",
      "/companies",
      Duration::days(1),
      true,
    ),
  ]
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::toast::MemoryToaster;

  fn center() -> (NotificationCenter, Arc<MemoryToaster>) {
    let toaster = Arc::new(MemoryToaster::new());
    (NotificationCenter::new(toaster.clone()), toaster)
  }

  fn seeded(title: &str, minutes_ago: i64, read: bool) -> Notification {
    Notification {
      id: Uuid::new_v4(),
      kind: NotificationKind::System,
      title: title.into(),
      message: String::new(),
      read,
      link: None,
      created_at: Utc::now() - Duration::minutes(minutes_ago),
    }
  }

  #[test]
  fn add_prepends_unread_and_toasts() {
    let (center, toaster) = center();
    center.seed([seeded("old", 60, true)]);

    let added = center.add(NewNotification {
      kind:    NotificationKind::Document,
      title:   "Nuevo documento".into(),
      message: "Condiciones generales 2024".into(),
      link:    Some("/documents".into()),
    });

    let list = center.list();
    assert_eq!(list[0].id, added.id);
    assert!(!list[0].read);
    assert_eq!(center.unread_count(), 1);

    let toasts = toaster.drain();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].title, "Nuevo documento");
  }

  #[test]
  fn list_is_newest_first_regardless_of_seed_order() {
    let (center, _) = center();
    center.seed([seeded("b", 30, false), seeded("a", 5, false), seeded("c", 90, false)]);
    let titles: Vec<_> = center.list().into_iter().map(|n| n.title).collect();
    assert_eq!(titles, ["a", "b", "c"]);
  }

  #[test]
  fn mark_as_read_is_idempotent() {
    let (center, _) = center();
    let n = seeded("x", 1, false);
    let id = n.id;
    center.seed([n, seeded("y", 2, false)]);

    assert!(center.mark_as_read(id));
    assert!(center.mark_as_read(id));
    assert_eq!(center.unread_count(), 1);
    assert!(!center.mark_as_read(Uuid::new_v4()));

    center.mark_all_as_read();
    assert_eq!(center.unread_count(), 0);
  }

  #[test]
  fn demo_feed_lists_unread_items_first() {
    let (center, toaster) = center();
    center.seed(demo_notifications());

    let list = center.list();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0].kind, NotificationKind::Document);
    assert_eq!(list[2].kind, NotificationKind::Company);
    assert_eq!(center.unread_count(), 2);
    assert!(toaster.drain().is_empty());
  }
}
