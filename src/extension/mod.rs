//! Extensions are plugins enabled by a manifest file under the `exts` folder.
//!
//! Each manifest `exts/<path>.toml` names an extension by its dotted path (`exts.self_roles`)
//! and carries that extension's settings.  The identifier is looked up in [`registry`] to find
//! the code that builds the plugin.

mod discovery;
mod loader;

pub use discovery::{ExtensionDir, DEFAULT_FOLDER};
pub use loader::Extensions;

use crate::{config::Config, plugin::Plugin};
use anyhow::Result;
use std::sync::Arc;

/// Dotted name of an extension, derived from its manifest path
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionId(String);

impl ExtensionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed contents of an extension's manifest file
pub type Manifest = toml::Table;

/// Registration entry point.  Builds a fresh plugin instance from its manifest.
pub type Setup = fn(&Manifest, &Config) -> Result<Arc<dyn Plugin>>;

#[derive(Clone, Copy)]
pub struct Registration {
    pub id: &'static str,
    pub setup: Setup,
}

/// Every extension compiled into the bot
pub fn registry() -> Vec<Registration> {
    use crate::plugin::*;

    vec![
        Registration {
            id: "exts.say_cmds",
            setup: say_cmds::setup,
        },
        Registration {
            id: "exts.self_roles",
            setup: self_roles::setup,
        },
    ]
}
