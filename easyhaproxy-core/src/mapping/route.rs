use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const HTTPS_PORT: u16 = 443;

/// Address of one backend server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Unix socket path, used verbatim.
    Socket(String),
    Inet { host: String, port: u16 },
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Socket(path) => f.write_str(path),
            Backend::Inet { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

// Backends sort by their rendered address.
impl Ord for Backend {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl PartialOrd for Backend {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Backend {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One `(port, hostname)` route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostDef {
    pub backends: BTreeSet<Backend>,
    pub balance: String,
    pub certbot: bool,
    pub redirect_ssl: bool,
    pub proto: String,
    pub plugin_fragments: Vec<String>,
}

impl HostDef {
    pub fn new(proto: impl Into<String>) -> Self {
        Self {
            backends: BTreeSet::new(),
            balance: "roundrobin".to_string(),
            certbot: false,
            redirect_ssl: false,
            proto: proto.into(),
            plugin_fragments: Vec::new(),
        }
    }
}

/// Everything served on one listen port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenDef {
    pub port: u16,
    pub mode: String,
    pub ssl: bool,
    pub ssl_check: String,
    pub hosts: BTreeMap<String, HostDef>,
    /// `from_host -> to_url`.
    pub redirect: BTreeMap<String, String>,
}

impl ListenDef {
    pub fn new(port: u16, mode: impl Into<String>) -> Self {
        Self {
            port,
            mode: mode.into(),
            ssl: false,
            ssl_check: String::new(),
            hosts: BTreeMap::new(),
            redirect: BTreeMap::new(),
        }
    }
}

/// Listen port to listen definition, ordered numerically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RouteTable {
    listens: BTreeMap<u16, ListenDef>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, port: u16) -> Option<&ListenDef> {
        self.listens.get(&port)
    }

    pub fn get_mut(&mut self, port: u16) -> Option<&mut ListenDef> {
        self.listens.get_mut(&port)
    }

    pub fn host(&self, port: u16, hostname: &str) -> Option<&HostDef> {
        self.listens.get(&port).and_then(|l| l.hosts.get(hostname))
    }

    /// The listen for `port`, created with `mode` when missing.
    pub fn listen_mut(&mut self, port: u16, mode: &str) -> &mut ListenDef {
        self.listens
            .entry(port)
            .or_insert_with(|| ListenDef::new(port, mode))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ListenDef> {
        self.listens.values()
    }

    pub fn is_empty(&self) -> bool {
        self.listens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listens.len()
    }
}
