//! Host argument vector.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::DaemonError;

/// `<root> --key=value ...` as passed on the OS command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostArgs {
    pub root: PathBuf,
    /// Keys have their leading dashes stripped (`log.level`).
    pub params: BTreeMap<String, String>,
}

impl HostArgs {
    /// Parse arguments, excluding the program name.
    pub fn parse<I, S>(args: I) -> Result<Self, DaemonError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let root = args
            .next()
            .filter(|r| !r.is_empty() && !r.starts_with("--"))
            .ok_or_else(|| DaemonError::Host {
                message: "missing installation root argument".to_string(),
            })?;

        let mut params = BTreeMap::new();
        for arg in args {
            let token = arg.trim_start_matches('-');
            if let Some((key, value)) = token.split_once('=') {
                if !key.is_empty() {
                    params.insert(key.to_string(), value.to_string());
                }
            }
        }

        Ok(Self {
            root: PathBuf::from(root),
            params,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
