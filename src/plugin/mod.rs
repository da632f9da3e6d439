use crate::{config::Config, context::Context, event::Event, event::EventHandled};
use serenity::all::{Command, CreateCommand};
use std::sync::Arc;

mod debug;
mod extensions;
mod help;
mod ready;
pub mod say_cmds;
pub mod self_roles;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Used for debug
    fn name(&self) -> &'static str;
    /// Help message line.  None if no help message
    fn usage(&self, cfg: &Config) -> Option<String>;
    /// Application (slash and context menu) commands this plugin answers
    fn commands(&self) -> Vec<CreateCommand> {
        Vec::new()
    }
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err(CommandError::Invalid) if the user asked for something we can't do
    /// - Err(CommandError::Internal) if an error occurred
    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> CommandResult;
}

pub type CommandResult = Result<EventHandled, CommandError>;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Shown to the user as-is
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CommandError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }
}

impl From<serenity::Error> for CommandError {
    fn from(e: serenity::Error) -> Self {
        Self::Internal(e.into())
    }
}

impl From<reqwest::Error> for CommandError {
    fn from(e: reqwest::Error) -> Self {
        Self::Internal(e.into())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.into())
    }
}

/// Ordered list of core plugins.  These run before any extension.
pub fn plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        // Core bot operations
        Arc::new(debug::Debug),
        Arc::new(ready::Ready),
        Arc::new(help::Help),
        Arc::new(extensions::ExtensionAdmin),
    ]
}

/// Replace the global application commands with those of the loaded extensions
pub async fn sync_commands(ctx: &Context<'_>) -> anyhow::Result<()> {
    let commands = ctx.extensions.commands().await;
    let count = commands.len();
    Command::set_global_commands(ctx.cache_http, commands).await?;
    crate::log_internal!("Registered {} application command(s)", count);
    Ok(())
}
