//! Encrypted database configuration file
//!
//! The MongoDB connection details and the per-collection encryption keys
//! live in one JSON document sealed with the master key (`ENCRYPTION_KEY`).
//! Every write produces the main file plus two identical backups
//! (`<file>.1.bckp`, `<file>.2.bckp`); reads fall back to the backups when
//! the main file cannot be opened.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use mongodb::options::{ConnectionString, HostInfo, ServerAddress};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::crypto::{decrypt_bytes, encrypt_bytes, FieldKey, StaticKeyProvider};
use crate::types::{CafeError, Result};

const DEFAULT_PORT: u16 = 27017;

/// Connection details and collection keys
#[derive(Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DbConfig {
    /// Seed list as `host:port`, or the single DNS name when `srv` is set
    pub hosts: Vec<String>,
    /// `mongodb+srv://` scheme
    #[serde(default)]
    pub srv: bool,
    /// Database name
    pub name: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auth_source: Option<String>,
    /// Every other URI option (`replicaSet`, `tls`, ...), kept verbatim
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Collection name to base64 key
    #[serde(default)]
    pub collection_encryption: BTreeMap<String, String>,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("hosts", &self.hosts)
            .field("srv", &self.srv)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auth_source", &self.auth_source)
            .field("options", &self.options)
            .field(
                "collection_encryption",
                &self.collection_encryption.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn host_port(address: &ServerAddress) -> String {
    let (host, port) = match address {
        ServerAddress::Tcp { host, port } => (host.clone(), port.unwrap_or(DEFAULT_PORT)),
        #[cfg(unix)]
        ServerAddress::Unix { path } => (path.to_string_lossy().into_owned(), DEFAULT_PORT),
        _ => (address.to_string(), DEFAULT_PORT),
    };
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

impl DbConfig {
    /// Parse a `mongodb://` or `mongodb+srv://` URI with the driver and
    /// generate fresh collection keys. Options other than `authSource` are
    /// carried through to [`connection_string`](Self::connection_string).
    pub fn from_connection_string(uri: &str) -> Result<Self> {
        let parsed = ConnectionString::parse(uri)
            .map_err(|e| CafeError::Config(format!("Invalid connection string: {e}")))?;

        let (hosts, srv) = match &parsed.host_info {
            HostInfo::HostIdentifiers(addresses) => {
                (addresses.iter().map(host_port).collect::<Vec<_>>(), false)
            }
            HostInfo::DnsRecord(name) => (vec![name.clone()], true),
            _ => {
                return Err(CafeError::Config(
                    "Unsupported host list in connection string".into(),
                ))
            }
        };

        let (user, password, auth_source) = match &parsed.credential {
            Some(credential) => (
                credential.username.clone(),
                credential.password.clone(),
                credential.source.clone(),
            ),
            None => (None, None, None),
        };

        let query = uri.split_once('?').map(|(_, q)| q).unwrap_or("");
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| CafeError::Config(format!("Invalid connection string options: {e}")))?;
        let mut auth_source = auth_source;
        let mut options = BTreeMap::new();
        for (key, value) in pairs {
            if key.eq_ignore_ascii_case("authSource") {
                auth_source.get_or_insert(value);
            } else {
                options.insert(key, value);
            }
        }

        Ok(Self {
            hosts,
            srv,
            name: parsed.default_database.clone().unwrap_or_default(),
            user,
            password,
            auth_source,
            options,
            collection_encryption: StaticKeyProvider::generate().to_encoded(),
        })
    }

    /// Build the MongoDB connection string
    pub fn connection_string(&self) -> String {
        let mut uri = String::from(if self.srv { "mongodb+srv://" } else { "mongodb://" });
        if let Some(user) = &self.user {
            uri.push_str(&urlencoding::encode(user));
            if let Some(password) = &self.password {
                uri.push(':');
                uri.push_str(&urlencoding::encode(password));
            }
            uri.push('@');
        }
        uri.push_str(&self.hosts.join(","));
        uri.push('/');
        uri.push_str(&self.name);

        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(source) = &self.auth_source {
            query.push(("authSource", source));
        }
        query.extend(self.options.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Ok(encoded) = serde_urlencoded::to_string(&query) {
            if !encoded.is_empty() {
                uri.push('?');
                uri.push_str(&encoded);
            }
        }
        uri
    }

    /// Keys for the encrypted collections
    pub fn key_provider(&self) -> Result<StaticKeyProvider> {
        StaticKeyProvider::from_encoded(&self.collection_encryption)
    }
}

/// The config file and its backups on disk
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Main file first, then the backups in order
    pub fn candidates(&self) -> [PathBuf; 3] {
        let backup = |n: u8| {
            let mut name = self.path.clone().into_os_string();
            name.push(format!(".{n}.bckp"));
            PathBuf::from(name)
        };
        [self.path.clone(), backup(1), backup(2)]
    }

    /// Seal and write the config to the main file and both backups.
    pub fn write(&self, config: &DbConfig, master: &FieldKey) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let json = serde_json::to_vec(config)?;
        let sealed = STANDARD.encode(encrypt_bytes(&json, master)?);
        for path in self.candidates() {
            fs::write(&path, &sealed)?;
        }
        Ok(())
    }

    /// Read the first openable copy.
    ///
    /// Returns `None` when no copy exists at all. When only a backup could
    /// be opened, the main file and backups are rewritten from it.
    pub fn load(&self, master: &FieldKey) -> Result<Option<DbConfig>> {
        let mut failures = 0;

        for (index, path) in self.candidates().iter().enumerate() {
            if !path.exists() {
                continue;
            }
            match open(path, master) {
                Ok(config) => {
                    if index > 0 {
                        warn!(backup = %path.display(), "Recovered database config from backup");
                        self.write(&config, master)?;
                    }
                    return Ok(Some(config));
                }
                Err(e) => {
                    warn!(path = %path.display(), "Database config unreadable: {}", e);
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            return Err(CafeError::Config(format!(
                "The config file {} and its backups are corrupted or sealed with another key. \
                 Replace it with a good backup or remove all copies to generate a new one.",
                self.path.display()
            )));
        }
        Ok(None)
    }

    /// Load the config, or create and write one with `create` if none exists.
    pub fn load_or_create<F>(&self, master: &FieldKey, create: F) -> Result<DbConfig>
    where
        F: FnOnce() -> Result<DbConfig>,
    {
        if let Some(config) = self.load(master)? {
            return Ok(config);
        }

        let config = create()?;
        self.write(&config, master)?;
        info!(path = %self.path.display(), "Created database config with fresh collection keys");
        Ok(config)
    }
}

fn open(path: &Path, master: &FieldKey) -> Result<DbConfig> {
    let text = fs::read_to_string(path)?;
    let sealed = STANDARD
        .decode(text.trim())
        .map_err(|e| CafeError::Crypto(format!("Config file is not valid base64: {e}")))?;
    let json = decrypt_bytes(&sealed, master)?;
    serde_json::from_slice(&json)
        .map_err(|e| CafeError::Config(format!("Config file is not valid JSON: {e}")))
}
