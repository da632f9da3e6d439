use super::{ExtensionDir, ExtensionId, Manifest, Registration};
use crate::{config::Config, log_internal, plugin::Plugin};
use anyhow::{anyhow, Result};
use serenity::all::CreateCommand;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::RwLock;

/// An extension currently installed in the dispatcher
#[derive(Clone)]
pub struct LoadedExtension {
    pub id: ExtensionId,
    pub manifest: PathBuf,
    pub plugin: Arc<dyn Plugin>,
}

/// Extension table.  The dispatcher reads a snapshot of it for every event.
pub struct Extensions {
    dir: ExtensionDir,
    registry: Vec<Registration>,
    loaded: RwLock<Vec<LoadedExtension>>,
}

impl Extensions {
    pub fn new(dir: ExtensionDir, registry: Vec<Registration>) -> Self {
        Self {
            dir,
            registry,
            loaded: RwLock::new(Vec::new()),
        }
    }

    /// Discover and load every extension.  Stops at the first failure.
    pub async fn load_all(&self, cfg: &Config) -> Result<()> {
        let ids = self.dir.discover();
        log_internal!(
            "Found {} extension(s) in `{}{}`",
            ids.len(),
            self.dir.base(),
            self.dir.folder()
        );

        for id in ids {
            self.load(&id, cfg).await?;
        }

        Ok(())
    }

    /// Read `id`'s manifest, build its plugin and install it.
    ///
    /// Nothing is installed if any step fails.
    pub async fn load(&self, id: &ExtensionId, cfg: &Config) -> Result<()> {
        if self.is_loaded(id).await {
            return Err(already_loaded(id));
        }

        let (manifest, plugin) = self.build(id, cfg).await?;

        let mut loaded = self.loaded.write().await;
        if loaded.iter().any(|ext| &ext.id == id) {
            return Err(already_loaded(id));
        }
        loaded.push(LoadedExtension {
            id: id.clone(),
            manifest,
            plugin,
        });
        log_internal!("Loaded extension `{}`", id);

        Ok(())
    }

    /// Build `id` again from a freshly read manifest and swap it in place.
    ///
    /// The extension keeps its position and stays visible to events while it is rebuilt.  If
    /// building fails the extension is unloaded.
    pub async fn reload(&self, id: &ExtensionId, cfg: &Config) -> Result<()> {
        let built = self.build(id, cfg).await;

        let mut loaded = self.loaded.write().await;
        let idx = loaded.iter().position(|ext| &ext.id == id);
        match (built, idx) {
            (Ok((manifest, plugin)), Some(idx)) => {
                loaded[idx] = LoadedExtension {
                    id: id.clone(),
                    manifest,
                    plugin,
                };
                log_internal!("Reloaded extension `{}`", id);
                Ok(())
            }
            (Ok((manifest, plugin)), None) => {
                loaded.push(LoadedExtension {
                    id: id.clone(),
                    manifest,
                    plugin,
                });
                log_internal!("Loaded extension `{}`", id);
                Ok(())
            }
            (Err(e), idx) => {
                if let Some(idx) = idx {
                    loaded.remove(idx);
                    log::warn!("Extension `{}` unloaded after failed reload", id);
                }
                Err(e)
            }
        }
    }

    /// Look `id` up in the registry and run its setup on the manifest.  Touches no shared state.
    async fn build(&self, id: &ExtensionId, cfg: &Config) -> Result<(PathBuf, Arc<dyn Plugin>)> {
        let registration = self
            .registry
            .iter()
            .find(|r| r.id == id.as_str())
            .ok_or(anyhow!("No extension named `{}` is compiled in", id))?;

        let path = self.dir.manifest_path(id);
        let manifest = read_manifest(&path).await?;
        let plugin = (registration.setup)(&manifest, cfg)?;
        Ok((path, plugin))
    }

    pub async fn unload(&self, id: &ExtensionId) -> Result<()> {
        match self.remove(id).await {
            Some(_) => {
                log_internal!("Unloaded extension `{}`", id);
                Ok(())
            }
            None => Err(anyhow!("Extension `{}` is not loaded", id)),
        }
    }

    async fn remove(&self, id: &ExtensionId) -> Option<LoadedExtension> {
        let mut loaded = self.loaded.write().await;
        let idx = loaded.iter().position(|ext| &ext.id == id)?;
        Some(loaded.remove(idx))
    }

    /// Plugins in load order
    pub async fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.loaded
            .read()
            .await
            .iter()
            .map(|ext| ext.plugin.clone())
            .collect()
    }

    pub async fn loaded(&self) -> Vec<LoadedExtension> {
        self.loaded.read().await.clone()
    }

    pub async fn is_loaded(&self, id: &ExtensionId) -> bool {
        self.loaded.read().await.iter().any(|ext| &ext.id == id)
    }

    /// Application commands of every loaded extension
    pub async fn commands(&self) -> Vec<CreateCommand> {
        self.plugins()
            .await
            .iter()
            .flat_map(|plugin| plugin.commands())
            .collect()
    }
}

fn already_loaded(id: &ExtensionId) -> anyhow::Error {
    anyhow!("Extension `{}` is already loaded", id)
}

async fn read_manifest(path: &Path) -> Result<Manifest> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        anyhow!(
            "Could not read extension manifest at `{}`: {}",
            path.to_string_lossy(),
            e
        )
    })?;

    toml::from_str(&contents).map_err(|e| {
        anyhow!(
            "Could not parse extension manifest at `{}`: {}",
            path.to_string_lossy(),
            e
        )
    })
}
