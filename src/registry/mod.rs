//! Package registry abstraction.
//!
//! The resolver only needs one thing from a registry: given a package name,
//! the package's canonical name, repository URL and the requirements of each
//! of its versions.

mod packagist;
mod rename;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

pub use packagist::{DEFAULT_REGISTRY_URL, PackagistClient};
pub use rename::RenameTable;

/// Metadata of a single package as reported by the registry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PackageMetadata {
    /// Canonical name, e.g. "symfony/console"
    #[serde(default)]
    pub name: String,
    /// Repository URL the package is developed in
    #[serde(default)]
    pub repository: String,
    /// Every released version and branch, keyed by version label
    #[serde(default, deserialize_with = "lenient_map")]
    pub versions: BTreeMap<String, VersionMetadata>,
}

/// The part of a version's composer.json we care about.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VersionMetadata {
    /// Required package name -> version constraint. Only the keys are used.
    #[serde(default, deserialize_with = "lenient_map")]
    pub require: BTreeMap<String, String>,
}

impl PackageMetadata {
    /// Names required by any version of this package.
    pub fn all_requirements(&self) -> BTreeSet<&str> {
        self.versions
            .values()
            .flat_map(|v| v.require.keys().map(String::as_str))
            .collect()
    }
}

/// Registries serialize empty maps as `[]`; treat anything but an object as empty.
fn lenient_map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| serde_json::from_value(v).map(|t| (k, t)))
            .collect::<Result<_, _>>()
            .map_err(D::Error::custom),
        _ => Ok(BTreeMap::new()),
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Look up `name`.
    ///
    /// Transport errors and non-2xx answers are `Err`. A successful answer
    /// without a package payload is `Ok(None)`.
    async fn get_package_by_name(&self, name: &str) -> Result<Option<PackageMetadata>>;
}
