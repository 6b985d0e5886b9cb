//! Installers used by `obr deploy`.
//!
//! [`DirectoryInstaller`] copies bundles into a deploy directory and keeps a
//! `deployment.json` manifest of what it installed and started.
//! [`DryRunInstaller`] only records what would happen.

use chrono::{DateTime, Utc};
use obr_core::loader::uri_to_path;
use obr_core::{DeploymentError, Installer};
use obr_schema::{Resource, ResourceId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Manifest file name inside the deploy directory.
pub const MANIFEST_FILE: &str = "deployment.json";

/// One installed bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedBundle {
    /// Resource id.
    pub id: ResourceId,
    /// Bundle symbolic name.
    pub symbolic_name: String,
    /// Version.
    pub version: String,
    /// File name inside the deploy directory.
    pub file: String,
    /// Install time.
    pub installed_at: DateTime<Utc>,
    /// Whether the bundle was started.
    pub started: bool,
}

/// Contents of `deployment.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Installed bundles in install order.
    pub bundles: Vec<DeployedBundle>,
}

impl Manifest {
    /// Read the manifest in `dir`, or an empty one if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::Io`] if the file exists but cannot be read
    /// or parsed.
    pub fn load(dir: &Path) -> Result<Self, DeploymentError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| DeploymentError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| DeploymentError::Io {
            path,
            source: e.into(),
        })
    }

    fn save(&self, dir: &Path) -> Result<(), DeploymentError> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| DeploymentError::Io {
            path: path.clone(),
            source: e.into(),
        })?;
        std::fs::write(&path, json).map_err(|source| DeploymentError::Io { path, source })
    }

    fn upsert(&mut self, bundle: DeployedBundle) {
        match self.bundles.iter_mut().find(|b| b.id == bundle.id) {
            Some(slot) => *slot = bundle,
            None => self.bundles.push(bundle),
        }
    }
}

/// Copies bundles into a directory.
#[derive(Debug)]
pub struct DirectoryInstaller {
    dir: PathBuf,
    manifest: Manifest,
}

impl DirectoryInstaller {
    /// Open (creating if needed) a deploy directory.
    ///
    /// # Errors
    ///
    /// Returns [`DeploymentError::Io`] if the directory cannot be created or
    /// its manifest cannot be read.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DeploymentError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| DeploymentError::Io {
            path: dir.clone(),
            source,
        })?;
        let manifest = Manifest::load(&dir)?;
        Ok(Self { dir, manifest })
    }

    /// The deploy directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// What has been deployed so far.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

impl Installer for DirectoryInstaller {
    type Handle = ResourceId;

    fn install(&mut self, resource: &Resource) -> Result<ResourceId, DeploymentError> {
        if resource.uri().is_empty() {
            return Err(DeploymentError::MissingUri(resource.to_string()));
        }
        let source = uri_to_path(resource.uri()).ok_or_else(|| DeploymentError::Install {
            resource: resource.to_string(),
            message: format!("unsupported location {}", resource.uri()),
        })?;

        let file = format!("{}-{}.jar", resource.symbolic_name(), resource.version());
        let target = self.dir.join(&file);
        std::fs::copy(&source, &target).map_err(|e| DeploymentError::Install {
            resource: resource.to_string(),
            message: format!("{}: {e}", source.display()),
        })?;
        tracing::debug!("Copied {} to {}", source.display(), target.display());

        self.manifest.upsert(DeployedBundle {
            id: resource.id().clone(),
            symbolic_name: resource.symbolic_name().to_string(),
            version: resource.version().to_string(),
            file,
            installed_at: Utc::now(),
            started: false,
        });
        self.manifest.save(&self.dir)?;
        Ok(resource.id().clone())
    }

    fn update(
        &mut self,
        installed: &Resource,
        resource: &Resource,
    ) -> Result<ResourceId, DeploymentError> {
        let handle = self.install(resource)?;
        let Some(idx) = self
            .manifest
            .bundles
            .iter()
            .position(|b| &b.id == installed.id())
        else {
            return Ok(handle);
        };

        let old = self.manifest.bundles.remove(idx);
        if self.manifest.bundles.iter().any(|b| b.file == old.file) {
            return self.manifest.save(&self.dir).map(|()| handle);
        }
        let path = self.dir.join(&old.file);
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(DeploymentError::Io { path, source }),
        }
        self.manifest.save(&self.dir)?;
        Ok(handle)
    }

    fn start(&mut self, handle: &ResourceId) -> Result<(), DeploymentError> {
        let bundle = self
            .manifest
            .bundles
            .iter_mut()
            .find(|b| &b.id == handle)
            .ok_or_else(|| DeploymentError::Start {
                resource: handle.to_string(),
                message: "not installed".to_string(),
            })?;
        bundle.started = true;
        self.manifest.save(&self.dir)
    }
}

/// Records installs without touching the filesystem.
#[derive(Debug, Default)]
pub struct DryRunInstaller {
    /// `install`, `update` and `start` lines in call order.
    pub actions: Vec<String>,
}

impl Installer for DryRunInstaller {
    type Handle = String;

    fn install(&mut self, resource: &Resource) -> Result<String, DeploymentError> {
        self.actions.push(format!("install {resource}"));
        Ok(resource.to_string())
    }

    fn update(
        &mut self,
        installed: &Resource,
        resource: &Resource,
    ) -> Result<String, DeploymentError> {
        self.actions.push(format!("update {installed} to {resource}"));
        Ok(resource.to_string())
    }

    fn start(&mut self, handle: &String) -> Result<(), DeploymentError> {
        self.actions.push(format!("start {handle}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obr_schema::Version;
    use tempfile::TempDir;

    #[test]
    fn test_install_copies_and_records() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("api.jar");
        std::fs::write(&jar, b"PK").unwrap();
        let resource = Resource::new("org.api", Version::new(1, 0, 0))
            .with_uri(format!("file://{}", jar.display()));

        let deploy_dir = dir.path().join("deploy");
        let mut installer = DirectoryInstaller::open(&deploy_dir).unwrap();
        let handle = installer.install(&resource).unwrap();
        installer.start(&handle).unwrap();

        assert!(deploy_dir.join("org.api-1.0.0.jar").exists());
        let manifest = Manifest::load(&deploy_dir).unwrap();
        assert_eq!(manifest.bundles.len(), 1);
        assert!(manifest.bundles[0].started);

        // Reinstalling replaces the entry.
        let mut again = DirectoryInstaller::open(&deploy_dir).unwrap();
        again.install(&resource).unwrap();
        assert_eq!(again.manifest().bundles.len(), 1);
        assert!(!again.manifest().bundles[0].started);
    }

    #[test]
    fn test_update_replaces_the_older_bundle() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("api.jar");
        std::fs::write(&jar, b"PK").unwrap();
        let uri = format!("file://{}", jar.display());
        let old = Resource::new("org.api", Version::new(1, 0, 0)).with_uri(&uri);
        let new = Resource::new("org.api", Version::new(1, 1, 0)).with_uri(&uri);

        let deploy_dir = dir.path().join("deploy");
        let mut installer = DirectoryInstaller::open(&deploy_dir).unwrap();
        installer.install(&old).unwrap();
        let handle = installer.update(&old, &new).unwrap();

        assert_eq!(&handle, new.id());
        assert!(!deploy_dir.join("org.api-1.0.0.jar").exists());
        assert!(deploy_dir.join("org.api-1.1.0.jar").exists());
        let manifest = Manifest::load(&deploy_dir).unwrap();
        assert_eq!(manifest.bundles.len(), 1);
        assert_eq!(manifest.bundles[0].version, "1.1.0");
    }

    #[test]
    fn test_install_failures() {
        let dir = TempDir::new().unwrap();
        let mut installer = DirectoryInstaller::open(dir.path()).unwrap();

        let no_uri = Resource::new("a", Version::new(1, 0, 0));
        assert!(matches!(
            installer.install(&no_uri),
            Err(DeploymentError::MissingUri(_))
        ));

        let remote = no_uri.clone().with_uri("https://example.com/a.jar");
        assert!(matches!(
            installer.install(&remote),
            Err(DeploymentError::Install { .. })
        ));

        let missing = no_uri.with_uri("file:///nonexistent/a.jar");
        assert!(installer.install(&missing).is_err());
        assert!(installer.manifest().bundles.is_empty());
    }
}
