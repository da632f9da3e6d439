use crate::{
    event::*,
    extension::ExtensionId,
    helper::{make_embed, split_word, MessageHelper},
    plugin::*,
};
use serenity::all::CreateMessage;

/// Load, reload and unload extensions at runtime
pub struct ExtensionAdmin;

enum Action<'a> {
    List,
    Load(&'a str),
    Reload(&'a str),
    Unload(&'a str),
}

impl<'a> Action<'a> {
    fn parse(args: &'a str) -> Option<Self> {
        let (verb, rest) = split_word(args);
        let (id, _) = split_word(rest);

        match (verb, id) {
            ("list", _) => Some(Action::List),
            (_, "") => None,
            ("load", id) => Some(Action::Load(id)),
            ("reload", id) => Some(Action::Reload(id)),
            ("unload", id) => Some(Action::Unload(id)),
            _ => None,
        }
    }
}

#[serenity::async_trait]
impl Plugin for ExtensionAdmin {
    fn name(&self) -> &'static str {
        "ext"
    }

    fn usage(&self, cfg: &Config) -> Option<String> {
        Some(format!(
            "{}{} list|load|reload|unload [id] - manage extensions (bot owner only)",
            cfg.command_prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> CommandResult {
        let Some((msg, args)) = event.is_bot_cmd(ctx.cfg, self.name()) else {
            return Ok(EventHandled::No);
        };
        if !msg.is_from_owner(ctx) {
            return Ok(EventHandled::Yes);
        }

        let Some(action) = Action::parse(args) else {
            return Err(CommandError::invalid(format!(
                "Usage: {}{} list|load|reload|unload <id>",
                ctx.cfg.command_prefix,
                self.name()
            )));
        };

        let reply = match action {
            Action::List => {
                let loaded = ctx.extensions.loaded().await;
                if loaded.is_empty() {
                    "No extensions loaded.".to_owned()
                } else {
                    loaded
                        .iter()
                        .map(|ext| format!("`{}` ({})", ext.id, ext.manifest.display()))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Action::Load(id) => {
                let id = ExtensionId::new(id);
                ctx.extensions
                    .load(&id, ctx.cfg)
                    .await
                    .map_err(|e| CommandError::invalid(format!("{:#}", e)))?;
                sync_commands(ctx).await?;
                format!("Loaded `{}`.", id)
            }
            Action::Reload(id) => {
                let id = ExtensionId::new(id);
                ctx.extensions
                    .reload(&id, ctx.cfg)
                    .await
                    .map_err(|e| CommandError::invalid(format!("{:#}", e)))?;
                sync_commands(ctx).await?;
                format!("Reloaded `{}`.", id)
            }
            Action::Unload(id) => {
                let id = ExtensionId::new(id);
                ctx.extensions
                    .unload(&id)
                    .await
                    .map_err(|e| CommandError::invalid(format!("{:#}", e)))?;
                sync_commands(ctx).await?;
                format!("Unloaded `{}`.", id)
            }
        };

        msg.channel_id
            .send_message(
                ctx.cache_http,
                CreateMessage::new()
                    .embed(make_embed(ctx.cfg.color, reply))
                    .reference_message(msg),
            )
            .await?;
        Ok(EventHandled::Yes)
    }
}
