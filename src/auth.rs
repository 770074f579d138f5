//! Credential Resolution
//!
//! Resolves GitHub API credentials from the environment or a netrc-style
//! per-machine credentials file, following the lookup rules of the original
//! `gh` tool: an explicit token in the environment wins, then a
//! `user@host` entry (when an account override is set), then the plain
//! host entry, then the `default` entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable holding a personal access token
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Application-specific override for the account name used in netrc lookups
pub const USER_ENV_VAR: &str = "GH_USER";

/// Environment variable overriding the netrc file location
pub const NETRC_ENV_VAR: &str = "NETRC";

/// Resolved API credentials
///
/// The output contract of credential resolution: either a personal access
/// token (with the login name, when known) or a login/password pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Credentials {
    Token {
        login: Option<String>,
        token: String,
    },
    Basic {
        login: String,
        password: String,
    },
}

impl Credentials {
    /// Login name carried by the credentials, if any
    pub fn login(&self) -> Option<&str> {
        match self {
            Credentials::Token { login, .. } => login.as_deref(),
            Credentials::Basic { login, .. } => Some(login.as_str()),
        }
    }
}

/// One `machine` entry of a netrc file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Machine {
    pub login: Option<String>,
    pub account: Option<String>,
    pub password: Option<String>,
}

impl Machine {
    /// Turn a netrc entry into usable credentials
    ///
    /// A password literally equal to `token` means the `account` field
    /// holds a personal access token.
    fn to_credentials(&self) -> Option<Credentials> {
        match (&self.login, &self.account, &self.password) {
            (login, Some(account), Some(password)) if password == "token" => {
                Some(Credentials::Token {
                    login: login.clone(),
                    token: account.clone(),
                })
            }
            (Some(login), _, Some(password)) => Some(Credentials::Basic {
                login: login.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

/// Parsed netrc-style credentials file, keyed by machine name
#[derive(Debug, Clone, Default)]
pub struct Netrc {
    machines: HashMap<String, Machine>,
}

impl Netrc {
    /// Parse netrc file content
    ///
    /// Recognizes `machine`, `default`, `login`, `account`, `password` and
    /// skips `macdef` bodies up to the next blank line. Unknown tokens are
    /// ignored rather than rejected, matching the lenient readers used by
    /// other netrc consumers.
    pub fn parse(content: &str) -> Self {
        let mut machines = HashMap::new();
        let mut current: Option<String> = None;

        let mut lines = content.lines().peekable();
        while let Some(line) = lines.next() {
            let mut words = line.split_whitespace();
            while let Some(word) = words.next() {
                match word {
                    "machine" => {
                        if let Some(name) = words.next() {
                            machines.entry(name.to_string()).or_insert_with(Machine::default);
                            current = Some(name.to_string());
                        }
                    }
                    "default" => {
                        machines
                            .entry("default".to_string())
                            .or_insert_with(Machine::default);
                        current = Some("default".to_string());
                    }
                    "login" => {
                        if let (Some(value), Some(name)) = (words.next(), &current) {
                            if let Some(entry) = machines.get_mut(name) {
                                entry.login = Some(value.to_string());
                            }
                        }
                    }
                    "account" => {
                        if let (Some(value), Some(name)) = (words.next(), &current) {
                            if let Some(entry) = machines.get_mut(name) {
                                entry.account = Some(value.to_string());
                            }
                        }
                    }
                    "password" => {
                        if let (Some(value), Some(name)) = (words.next(), &current) {
                            if let Some(entry) = machines.get_mut(name) {
                                entry.password = Some(value.to_string());
                            }
                        }
                    }
                    "macdef" => {
                        // Macro definitions run to the next blank line
                        words = "".split_whitespace();
                        while let Some(next) = lines.peek() {
                            if next.trim().is_empty() {
                                break;
                            }
                            lines.next();
                        }
                    }
                    _ => {}
                }
            }
        }

        Self { machines }
    }

    /// Load and parse a netrc file from disk
    ///
    /// # Errors
    /// Returns an error if the file cannot be read
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Look up the entry for a machine name
    pub fn machine(&self, name: &str) -> Option<&Machine> {
        self.machines.get(name)
    }

    /// Resolve credentials for a hostname
    ///
    /// When `user` is set, a `user@host` entry takes precedence over the
    /// plain `host` entry; the `default` entry is the last resort.
    pub fn credentials_for(&self, hostname: &str, user: Option<&str>) -> Option<Credentials> {
        if let Some(user) = user {
            let keyed = format!("{}@{}", user, hostname);
            if let Some(creds) = self.machine(&keyed).and_then(Machine::to_credentials) {
                return Some(creds);
            }
        }
        self.machine(hostname)
            .or_else(|| self.machine("default"))
            .and_then(Machine::to_credentials)
    }
}

/// Default netrc file location (`$NETRC` or `~/.netrc`)
pub fn netrc_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(NETRC_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".netrc"))
}

/// Resolve credentials for the given API hostname
///
/// # Errors
/// Returns [`Error::Authentication`] if no usable credentials are found
pub fn resolve_credentials(hostname: &str) -> Result<Credentials> {
    let user = std::env::var(USER_ENV_VAR).ok();
    let token = std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty());
    resolve_from_sources(hostname, user.as_deref(), token, load_default_netrc())
}

fn load_default_netrc() -> Netrc {
    netrc_path()
        .filter(|path| path.exists())
        .and_then(|path| Netrc::load(path).ok())
        .unwrap_or_default()
}

/// Resolution core, separated from the environment for testability
fn resolve_from_sources(
    hostname: &str,
    user: Option<&str>,
    env_token: Option<String>,
    netrc: Netrc,
) -> Result<Credentials> {
    if let Some(token) = env_token {
        return Ok(Credentials::Token {
            login: user.map(str::to_string),
            token,
        });
    }

    netrc
        .credentials_for(hostname, user)
        .ok_or_else(|| Error::Authentication(hostname.to_string()))
}
