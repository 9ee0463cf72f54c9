//! Session ownership and persistence across restarts.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex as StdMutex,
};

use shared::domain::{Role, Session};
use tracing::{info, warn};

/// File name of the persisted session inside the client data directory.
pub const SESSION_KEY: &str = "current_user.json";

pub trait SessionStore: Send + Sync {
    /// Returns the persisted session. Missing or unreadable contents yield
    /// `None`; startup must never fail because of them.
    fn load(&self) -> Option<Session>;
    fn save(&self, session: &Session) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SESSION_KEY),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Session> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "session: unable to read persisted session");
                return None;
            }
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "session: ignoring corrupt persisted session");
                None
            }
        }
    }

    fn save(&self, session: &Session) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(session).map_err(io::Error::other)?;
        fs::write(&self.path, raw)
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Keeps the serialized session in memory, the way browser storage would.
#[derive(Default)]
pub struct MemorySessionStore {
    raw: StdMutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with arbitrary contents, valid or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: StdMutex::new(Some(raw.into())),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().map(|guard| guard.clone()).unwrap_or(None)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Session> {
        let raw = self.raw()?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(%err, "session: ignoring corrupt persisted session");
                None
            }
        }
    }

    fn save(&self, session: &Session) -> io::Result<()> {
        let raw = serde_json::to_string(session).map_err(io::Error::other)?;
        let mut guard = self
            .raw
            .lock()
            .map_err(|_| io::Error::other("session store poisoned"))?;
        *guard = Some(raw);
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        let mut guard = self
            .raw
            .lock()
            .map_err(|_| io::Error::other("session store poisoned"))?;
        *guard = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(Session),
}

impl SessionState {
    pub fn current(&self) -> Option<&Session> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated(session) => Some(session),
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.current().map(|session| session.role)
    }

    pub fn set(&mut self, session: Session) {
        info!(user_id = session.id.0, role = %session.role, "session: authenticated");
        *self = SessionState::Authenticated(session);
    }

    pub fn clear(&mut self) {
        if let SessionState::Authenticated(session) = self {
            info!(user_id = session.id.0, "session: cleared");
        }
        *self = SessionState::Anonymous;
    }

    /// Applies server-echoed profile fields. Id and role stay fixed.
    pub fn apply_profile(&mut self, name: Option<String>, email: Option<String>) {
        if let SessionState::Authenticated(session) = self {
            if let Some(name) = name {
                session.name = name;
            }
            if let Some(email) = email {
                session.email = email;
            }
        }
    }
}

/// Up to two upper-cased initials taken from the display name.
pub fn avatar_initials(name: &str) -> String {
    let initials: String = name
        .split_whitespace()
        .take(2)
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .collect();
    if initials.is_empty() {
        "U".to_string()
    } else {
        initials
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use shared::domain::UserId;

    use super::*;

    fn sample_session() -> Session {
        Session {
            id: UserId(5),
            name: "Sam Lee".into(),
            email: "sam@x.com".into(),
            role: Role::Student,
        }
    }

    fn temp_dir() -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        env::temp_dir().join(format!("campus_session_test_{suffix}"))
    }

    #[test]
    fn file_store_round_trips_and_clears() {
        let dir = temp_dir();
        let store = FileSessionStore::new(&dir);
        assert_eq!(store.load(), None);

        store.save(&sample_session()).expect("save");
        assert_eq!(store.load(), Some(sample_session()));

        store.clear().expect("clear");
        assert_eq!(store.load(), None);
        store.clear().expect("clearing twice is fine");

        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn corrupt_file_falls_back_to_anonymous() {
        let dir = temp_dir();
        fs::create_dir_all(&dir).expect("dir");
        fs::write(dir.join(SESSION_KEY), "{not json").expect("write");

        assert_eq!(FileSessionStore::new(&dir).load(), None);

        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn memory_store_ignores_wrong_shape() {
        let store = MemorySessionStore::with_raw(r#"{"id":1,"name":"x"}"#);
        assert_eq!(store.load(), None);
    }

    #[test]
    fn profile_update_keeps_id_and_role() {
        let mut state = SessionState::default();
        state.set(sample_session());
        state.apply_profile(Some("Samantha Lee".into()), None);

        let session = state.current().expect("session");
        assert_eq!(session.name, "Samantha Lee");
        assert_eq!(session.email, "sam@x.com");
        assert_eq!(session.id, UserId(5));
        assert_eq!(session.role, Role::Student);
    }

    #[test]
    fn initials_cover_empty_and_long_names() {
        assert_eq!(avatar_initials("sam lee jones"), "SL");
        assert_eq!(avatar_initials("  "), "U");
        assert_eq!(avatar_initials("ada"), "A");
    }
}
