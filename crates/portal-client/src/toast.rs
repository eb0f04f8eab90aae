//! The user-facing confirmation/failure signal.
//!
//! Repositories and the session context report outcomes through a
//! [`Toaster`]. Reporting is synchronous and infallible so it can never
//! hold up or alter the operation being reported.

use std::sync::Mutex;

use crate::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastVariant {
  Default,
  Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
  pub title:       String,
  pub description: String,
  pub variant:     ToastVariant,
}

impl Toast {
  pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      title:       title.into(),
      description: description.into(),
      variant:     ToastVariant::Default,
    }
  }

  pub fn failure(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      title:       title.into(),
      description: description.into(),
      variant:     ToastVariant::Destructive,
    }
  }

  pub fn is_failure(&self) -> bool { self.variant == ToastVariant::Destructive }
}

pub trait Toaster: Send + Sync {
  fn toast(&self, toast: Toast);
}

/// Writes toasts to the log. The default for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogToaster;

impl Toaster for LogToaster {
  fn toast(&self, toast: Toast) {
    match toast.variant {
      ToastVariant::Default => {
        tracing::info!(title = %toast.title, "{}", toast.description)
      }
      ToastVariant::Destructive => {
        tracing::warn!(title = %toast.title, "{}", toast.description)
      }
    }
  }
}

/// Keeps toasts in memory until a presenter drains them.
#[derive(Debug, Default)]
pub struct MemoryToaster {
  toasts: Mutex<Vec<Toast>>,
}

impl MemoryToaster {
  pub fn new() -> Self { Self::default() }

  pub fn drain(&self) -> Vec<Toast> { std::mem::take(&mut *lock(&self.toasts)) }

  pub fn snapshot(&self) -> Vec<Toast> { lock(&self.toasts).clone() }
}

impl Toaster for MemoryToaster {
  fn toast(&self, toast: Toast) { lock(&self.toasts).push(toast); }
}
