//! Satis configuration writer.
//!
//! Registers mirror URLs in the `repositories` section of a Satis
//! configuration file. Everything else in the file is kept as-is.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::path::Path;

use crate::runtime::Runtime;

const REPOSITORIES_KEY: &str = "repositories";

#[derive(Debug, Clone, PartialEq)]
pub struct SatisConfig {
    document: Map<String, Value>,
    repositories: Vec<Value>,
}

impl SatisConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).context("Failed to parse JSON")?;
        let Value::Object(mut document) = value else {
            bail!("Satis configuration must be a JSON object");
        };

        // Taking the value leaves the key in place, so the file keeps its key order.
        let existing = match document.get_mut(REPOSITORIES_KEY).map(Value::take) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries,
            Some(_) => bail!("\"{}\" must be an array", REPOSITORIES_KEY),
        };

        let mut config = Self {
            document,
            repositories: Vec::with_capacity(existing.len()),
        };
        let mut seen = HashSet::new();
        for entry in existing {
            match entry.get("url").and_then(Value::as_str) {
                Some(url) if !seen.insert(url.to_string()) => {
                    debug!("Dropping duplicate repository {}", url);
                }
                _ => config.repositories.push(entry),
            }
        }
        Ok(config)
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load(runtime: &dyn Runtime, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Can't read Satis configuration {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid Satis configuration {}", path.display()))
    }

    pub fn repository_urls(&self) -> Vec<&str> {
        self.repositories
            .iter()
            .filter_map(|r| r.get("url").and_then(Value::as_str))
            .collect()
    }

    /// Add a git repository. Returns false if the URL is already listed.
    pub fn add_repository(&mut self, url: &str) -> bool {
        if self.repository_urls().contains(&url) {
            return false;
        }
        self.repositories.push(json!({ "type": "git", "url": url }));
        true
    }

    /// Add every URL in `urls`. Returns how many were new.
    pub fn add_repositories<'a, I>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        urls.into_iter()
            .filter(|url| self.add_repository(url))
            .count()
    }

    /// Serialize with 4-space indentation.
    pub fn to_json(&self) -> Result<String> {
        let mut document = self.document.clone();
        document.insert(
            REPOSITORIES_KEY.to_string(),
            Value::Array(self.repositories.clone()),
        );

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        Value::Object(document)
            .serialize(&mut serializer)
            .context("Failed to serialize Satis configuration")?;
        buf.push(b'\n');

        String::from_utf8(buf).context("Satis configuration is not valid UTF-8")
    }

    pub fn write(&self, runtime: &dyn Runtime, path: &Path) -> Result<()> {
        let content = self.to_json()?;
        runtime
            .write(path, content.as_bytes())
            .with_context(|| format!("Writing Satis configuration to {} failed", path.display()))?;
        info!("Satis configuration written to {}", path.display());
        Ok(())
    }
}

/// Add `urls` to the Satis configuration at `path` and write it back.
pub fn register_repositories(runtime: &dyn Runtime, path: &Path, urls: &[String]) -> Result<usize> {
    let mut satis = SatisConfig::load(runtime, path)?;
    let added = satis.add_repositories(urls.iter().map(String::as_str));
    satis.write(runtime, path)?;
    Ok(added)
}
