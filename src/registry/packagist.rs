//! Packagist registry client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;

use crate::http::HttpClient;

use super::{PackageMetadata, RegistryClient};

pub const DEFAULT_REGISTRY_URL: &str = "https://packagist.org";

/// Packagist API response types (internal).
mod api {
    use serde::Deserialize;

    use super::PackageMetadata;

    /// `GET /packages/{name}.json`
    #[derive(Deserialize, Debug)]
    pub struct PackageResponse {
        pub package: Option<PackageMetadata>,
    }
}

/// Client for a Packagist-compatible registry.
pub struct PackagistClient {
    http_client: HttpClient,
    base_url: String,
}

impl PackagistClient {
    /// Create a client for the registry at `base_url` (e.g. "https://packagist.org").
    pub fn new(http_client: HttpClient, base_url: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            anyhow::bail!("Registry URL is empty");
        }

        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn package_url(&self, name: &str) -> String {
        let name = name.trim_matches('/');
        format!("{}/packages/{}.json", self.base_url, name)
    }
}

#[async_trait]
impl RegistryClient for PackagistClient {
    #[tracing::instrument(skip(self))]
    async fn get_package_by_name(&self, name: &str) -> Result<Option<PackageMetadata>> {
        let url = self.package_url(name);
        debug!("Fetching package metadata from {}...", url);

        let response: api::PackageResponse = self
            .http_client
            .get_json(&url)
            .await
            .with_context(|| format!("Registry request for package \"{}\" failed", name))?;

        Ok(response.package.filter(|p| !p.name.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;

    fn client_for(url: &str) -> PackagistClient {
        PackagistClient::new(HttpClient::new(Client::new()), url).unwrap()
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = client_for("https://packagist.org/");
        assert_eq!(client.base_url(), "https://packagist.org");
        assert_eq!(
            client.package_url("symfony/console"),
            "https://packagist.org/packages/symfony/console.json"
        );
    }

    #[test]
    fn test_new_rejects_empty_url() {
        assert!(PackagistClient::new(HttpClient::new(Client::new()), " ").is_err());
    }

    #[tokio::test]
    async fn test_get_package_by_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/packages/symfony/debug.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "package": {
                        "name": "symfony/debug",
                        "repository": "https://github.com/symfony/debug",
                        "downloads": { "total": 1 },
                        "versions": {
                            "v3.0.0": { "require": { "php": ">=5.5.9", "psr/log": "~1.0" } }
                        }
                    }
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let package = client
            .get_package_by_name("symfony/debug")
            .await
            .unwrap()
            .unwrap();

        mock.assert_async().await;
        assert_eq!(package.name, "symfony/debug");
        assert_eq!(package.repository, "https://github.com/symfony/debug");
        assert!(package.all_requirements().contains("psr/log"));
    }

    #[tokio::test]
    async fn test_get_package_by_name_without_payload() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/packages/api/empty.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "ok"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let package = client.get_package_by_name("api/empty").await.unwrap();

        assert!(package.is_none());
    }

    #[tokio::test]
    async fn test_get_package_by_name_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/packages/api/error.json")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.get_package_by_name("api/error").await.unwrap_err();

        assert!(err.to_string().contains("api/error"));
        assert!(
            err.downcast_ref::<crate::http::NonRetryableError>()
                .is_some_and(|e| e.status() == 404)
        );
    }
}
