use anyhow::Result;
use log::{info, warn};
use std::path::PathBuf;

use crate::{
    mirror::{MirrorEngine, MirrorResult},
    package::Package,
    satis::register_repositories,
};

mod add;
mod mirror;
mod services;
mod update;

pub use add::add;
pub use mirror::mirror;
pub use services::{Services, build_registry, default_workers};
pub use update::update;

/// Global command line options shared by all commands.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Explicit config file; searched for when absent
    pub config_path: Option<PathBuf>,
    /// Worker pool size; one per CPU when absent
    pub workers: Option<usize>,
    /// Registry base URL; Packagist when absent
    pub registry_url: Option<String>,
}

/// Mirror `packages` and return the mirror URLs to register with Satis.
///
/// Mirrors that already exist are registered too. Failed packages are
/// logged and left out.
pub(crate) async fn mirror_packages(
    services: &Services,
    packages: Vec<Package>,
) -> Result<Vec<String>> {
    let mut engine = MirrorEngine::new(
        services.workers,
        services.config.repo_dir.clone(),
        services.transport.clone(),
        services.runtime.clone(),
    )?;

    let count = engine.mirror(packages)?;
    let mut urls = Vec::with_capacity(count);
    for _ in 0..count {
        let Some(result) = engine.next_result().await else {
            break;
        };
        if report(&result) {
            urls.push(services.config.mirror_url(&result.package.name));
        }
    }
    engine.close();

    Ok(urls)
}

/// Log the outcome of one package. Returns true if the mirror is usable.
fn report(result: &MirrorResult) -> bool {
    let name = &result.package.name;
    match &result.error {
        None => {
            info!("Mirroring of package {} successful", name);
            true
        }
        Some(_) if result.already_exists() => {
            info!(
                "Package {} exists on disk. Try updating it instead. Skipping.",
                name
            );
            true
        }
        Some(e) => {
            warn!("Error while mirroring package {}: {}", name, e);
            false
        }
    }
}

/// Register `urls` in the configured Satis file, if one is configured.
pub(crate) fn write_satis(services: &Services, urls: &[String]) -> Result<()> {
    let Some(path) = &services.config.satis_config else {
        info!("No Satis configuration specified. Skipping to write a satis configuration.");
        return Ok(());
    };

    let added = register_repositories(services.runtime.as_ref(), path, urls)?;
    info!("Registered {} new repository(ies) in {}", added, path.display());
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::mirror::MockMirrorTransport;
    use crate::registry::MockRegistryClient;
    use anyhow::anyhow;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_mirror_packages_skips_failed_and_keeps_existing() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("psr/log.git")).unwrap();

        let mut transport = MockMirrorTransport::new();
        transport.expect_mirror_clone().returning(|url, _| {
            if url.contains("broken") {
                Err(anyhow!("fatal: repository not found"))
            } else {
                Ok(())
            }
        });
        transport.expect_update_server_info().returning(|_| Ok(()));
        transport.expect_fsck().returning(|_| Ok(()));

        let services = services(config(dir.path()), MockRegistryClient::new(), transport);
        let packages = vec![
            Package::with_repository("twig/twig", "https://github.com/twigphp/Twig.git").unwrap(),
            Package::with_repository("psr/log", "https://github.com/php-fig/log.git").unwrap(),
            Package::with_repository("acme/broken", "https://example.com/broken.git").unwrap(),
        ];

        let mut urls = mirror_packages(&services, packages).await.unwrap();
        urls.sort();

        assert_eq!(urls.len(), 2);
        assert!(urls[0].ends_with("/psr/log.git"));
        assert!(urls[1].ends_with("/twig/twig.git"));
        assert!(urls.iter().all(|u| u.starts_with("file:///")));
    }

    #[test]
    fn test_write_satis_without_config_is_noop() {
        let dir = tempdir().unwrap();
        let services = services(
            config(dir.path()),
            MockRegistryClient::new(),
            MockMirrorTransport::new(),
        );
        write_satis(&services, &["file:///x/a/b.git".to_string()]).unwrap();
    }

    #[test]
    fn test_write_satis_registers_urls() {
        let dir = tempdir().unwrap();
        let satis = dir.path().join("satis.json");
        std::fs::write(&satis, r#"{"name": "mirror", "repositories": []}"#).unwrap();

        let mut config = config(dir.path());
        config.satis_config = Some(satis.clone());
        let services = services(config, MockRegistryClient::new(), MockMirrorTransport::new());

        write_satis(&services, &["https://satis.example.com/git/a/b.git".to_string()]).unwrap();

        let written = std::fs::read_to_string(&satis).unwrap();
        assert!(written.contains("https://satis.example.com/git/a/b.git"));
        assert!(written.contains("\"name\": \"mirror\""));
    }
}
