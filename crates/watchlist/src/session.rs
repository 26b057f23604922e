use std::collections::HashMap;
use uuid::Uuid;

/// A player currently connected to the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub uuid: Uuid,
    pub ip: Option<String>,
}

/// Live view of connected players, provided by the host proxy.
pub trait SessionLookup: Send + Sync {
    fn session(&self, name: &str) -> Option<Session>;

    fn online_names(&self) -> Vec<String>;
}

/// Nobody is online (offline tooling).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSessions;

impl SessionLookup for NoSessions {
    fn session(&self, _name: &str) -> Option<Session> {
        None
    }

    fn online_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Fixed set of sessions.
#[derive(Debug, Clone, Default)]
pub struct StaticSessions {
    sessions: HashMap<String, Session>,
}

impl StaticSessions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, name: &str, uuid: Uuid, ip: Option<String>) {
        self.sessions.insert(
            name.to_lowercase(),
            Session {
                name: name.to_string(),
                uuid,
                ip,
            },
        );
    }

    pub fn with(mut self, name: &str, uuid: Uuid, ip: Option<&str>) -> Self {
        self.connect(name, uuid, ip.map(str::to_string));
        self
    }
}

impl SessionLookup for StaticSessions {
    fn session(&self, name: &str) -> Option<Session> {
        self.sessions.get(&name.to_lowercase()).cloned()
    }

    fn online_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.values().map(|s| s.name.clone()).collect();
        names.sort();
        names
    }
}
