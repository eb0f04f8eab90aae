//! Optional on-disk persistence of the current session, so a CLI can stay
//! signed in between runs.

use std::{io, path::Path};

use portal_core::gateway::Session;

use crate::Result;

pub fn load(path: &Path) -> Result<Option<Session>> {
  match std::fs::read_to_string(path) {
    Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(e.into()),
  }
}

pub async fn store(path: &Path, session: Option<&Session>) -> Result<()> {
  match session {
    Some(session) => {
      if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
      }
      tokio::fs::write(path, serde_json::to_vec_pretty(session)?).await?;
    }
    None => match tokio::fs::remove_file(path).await {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(e.into()),
    },
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;

  #[tokio::test]
  async fn round_trip_and_clear() {
    let path = std::env::temp_dir()
      .join(format!("portal-session-{}", Uuid::new_v4()))
      .join("session.json");
    assert_eq!(load(&path).unwrap(), None);

    let session = Session {
      user_id:      Uuid::new_v4(),
      email:        "ana@example.com".into(),
      access_token: "tok".into(),
      expires_at:   Some(Utc::now()),
    };
    store(&path, Some(&session)).await.unwrap();
    assert_eq!(load(&path).unwrap(), Some(session));

    store(&path, None).await.unwrap();
    assert_eq!(load(&path).unwrap(), None);
    // Clearing twice is fine.
    store(&path, None).await.unwrap();
  }
}
