//! The Serenity crate we're using for the Discord API is designed around callbacks to handle
//! events.  However, this does not mesh well with our plugin framework here.  To resolve this,
//! the handler translates the callbacks to a distinct Event enum, which is then offered to each
//! plugin in turn.

use crate::{
    config::Config,
    context::Context,
    plugin::{CommandError, Plugin},
    report::{Origin, Visibility},
};
use serenity::all::{GuildId, Interaction, Message, Ready};
use std::sync::Arc;

/// A Discord event
pub enum Event {
    Ready(Ready),
    Resume,
    Message(Message),
    Interaction(Interaction),
}

pub enum EventHandled {
    Yes,
    No,
}

impl Event {
    // When an event occurs, iterate over all the plugins to see if any can/should handle it.
    pub async fn handle(self, ctx: Context<'_>) {
        // Core plugins see everything.  Extensions only see guild events once we're ready.
        let core = crate::plugin::plugins().into_iter().map(|p| (p, false));
        let extensions = ctx.extensions.plugins().await.into_iter().map(|p| (p, true));

        for (plugin, checked) in core.chain(extensions) {
            if checked && !self.passes_global_check(ctx.status.is_ready()) {
                continue;
            }

            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => {
                    self.report(&ctx, plugin, err).await;
                    return;
                }
            }
        }
    }

    async fn report(&self, ctx: &Context<'_>, plugin: Arc<dyn Plugin>, err: CommandError) {
        match err {
            CommandError::Invalid(reason) => {
                let Some(origin) = self.origin() else {
                    return;
                };
                if let Err(e) = ctx.reporter.courier().reply(&origin, &reason).await {
                    log::debug!("Could not tell user about invalid input: {:#}", e);
                }
            }
            CommandError::Internal(err) => {
                let err = err.context(format!("Error in plugin {}", plugin.name()));
                ctx.reporter.handle(err, self.origin()).await;
            }
        }
    }

    /// Extensions only run in guilds, and only once the connection is ready.
    pub fn passes_global_check(&self, ready: bool) -> bool {
        ready && self.guild_id().is_some()
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            Event::Ready(_) | Event::Resume => None,
            Event::Message(msg) => msg.guild_id,
            Event::Interaction(Interaction::Command(cmd)) => cmd.guild_id,
            Event::Interaction(Interaction::Autocomplete(cmd)) => cmd.guild_id,
            Event::Interaction(Interaction::Component(comp)) => comp.guild_id,
            Event::Interaction(Interaction::Modal(modal)) => modal.guild_id,
            Event::Interaction(_) => None,
        }
    }

    /// Where to answer if handling this event goes wrong.
    ///
    /// Messages are answered in public.  Every interaction this bot handles is answered
    /// ephemerally, so errors are too.
    pub fn origin(&self) -> Option<Origin> {
        match self {
            Event::Ready(_) | Event::Resume => None,
            Event::Message(msg) => Some(Origin::message(msg.channel_id, msg.id)),
            Event::Interaction(Interaction::Command(cmd)) => Some(Origin::interaction(
                cmd.id,
                &cmd.token,
                Visibility::Ephemeral,
            )),
            Event::Interaction(Interaction::Component(comp)) => Some(Origin::interaction(
                comp.id,
                &comp.token,
                Visibility::Ephemeral,
            )),
            Event::Interaction(Interaction::Modal(modal)) => Some(Origin::interaction(
                modal.id,
                &modal.token,
                Visibility::Ephemeral,
            )),
            Event::Interaction(_) => None,
        }
    }

    // Check if a message should be interpreted as a special bot command.
    //
    // These are prefixed with the configured prefix, e. g. `;cmd foo bar baz`.  Returns the
    // message and everything after the command name.
    pub fn is_bot_cmd<'a>(&'a self, cfg: &Config, cmd: &str) -> Option<(&'a Message, &'a str)> {
        let Event::Message(msg) = self else {
            return None;
        };
        if msg.author.bot {
            return None;
        }

        command_args(&msg.content, &cfg.command_prefix, cmd).map(|args| (msg, args))
    }
}

/// Arguments of `content` if it invokes `cmd` with `prefix`
fn command_args<'a>(content: &'a str, prefix: &str, cmd: &str) -> Option<&'a str> {
    let rest = content.trim_start().strip_prefix(prefix)?.strip_prefix(cmd)?;

    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_with_args() {
        assert_eq!(command_args(";say hi there", ";", "say"), Some("hi there"));
    }

    #[test]
    fn command_without_args() {
        assert_eq!(command_args(";help", ";", "help"), Some(""));
    }

    #[test]
    fn command_name_must_match_whole_word() {
        assert_eq!(command_args(";sayonara", ";", "say"), None);
        assert_eq!(command_args(";edit-message 1", ";", "edit"), None);
    }

    #[test]
    fn prefix_required() {
        assert_eq!(command_args("say hi", ";", "say"), None);
        assert_eq!(command_args("!say hi", ";", "say"), None);
    }

    #[test]
    fn multi_character_prefix() {
        assert_eq!(command_args("osc!say hi", "osc!", "say"), Some("hi"));
    }

    #[test]
    fn lifecycle_events_fail_global_check() {
        assert!(!Event::Resume.passes_global_check(true));
        assert!(Event::Resume.origin().is_none());
    }
}
