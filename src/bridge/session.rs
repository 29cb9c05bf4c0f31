use crate::provider::Content;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_APP_NAME: &str = "MultiURLBrowserAgent";
pub const DEFAULT_USER_ID: &str = "multiurlbrowser_agent_user";

/// Conversational state for one A2A context, owned by the task bridge.
#[derive(Debug, Clone)]
pub struct Session {
    pub app_name: String,
    pub user_id: String,
    pub id: String,
    pub state: Map<String, Value>,
    pub history: Vec<Content>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(app_name: &str, user_id: &str, id: &str) -> Self {
        let now = Utc::now();
        Self {
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            id: id.to_string(),
            state: Map::new(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn append(&mut self, content: Content) {
        self.history.push(content);
        self.updated_at = Utc::now();
    }
}

/// A session shared between the registry and a running provider turn.
///
/// A provider holds the lock for the whole turn, so concurrent turns on one
/// session run one after the other.
pub type SessionHandle = Arc<Mutex<Session>>;

/// In-memory sessions keyed by id, scoped to one application and user.
#[derive(Debug)]
pub struct SessionRegistry {
    app_name: String,
    user_id: String,
    sessions: DashMap<String, SessionHandle>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_APP_NAME, DEFAULT_USER_ID)
    }
}

impl SessionRegistry {
    pub fn new(app_name: &str, user_id: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            sessions: DashMap::new(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Returns the session for `session_id`, creating it with empty state if
    /// absent. The flag is true when this call created it.
    pub fn get_or_create(&self, session_id: &str) -> (SessionHandle, bool) {
        let mut created = false;
        let handle = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(Mutex::new(Session::new(&self.app_name, &self.user_id, session_id)))
            })
            .value()
            .clone();
        if created {
            info!(%session_id, app_name = %self.app_name, "Created new session.");
        } else {
            debug!(%session_id, "Reusing existing session.");
        }
        (handle, created)
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.remove(session_id).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
