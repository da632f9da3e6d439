use crate::{event::*, log_event, plugin::*};
use serenity::all::Interaction;

/// Logs every event
pub struct Debug;

#[serenity::async_trait]
impl Plugin for Debug {
    fn name(&self) -> &'static str {
        "debug"
    }

    fn usage(&self, _cfg: &Config) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> CommandResult {
        match event {
            Event::Ready(ready) => {
                log_event!(
                    "Connected to {} server(s) as {}",
                    ready.guilds.len(),
                    ready.user.name,
                );
            }
            Event::Resume => log_event!("Resumed connection"),
            Event::Message(msg) => {
                let guild = msg
                    .guild_id
                    .and_then(|id| ctx.cache.guild(id).map(|g| g.name.clone()))
                    .unwrap_or_else(|| "DM".to_owned());
                log_event!(
                    "{} #{} {}: {}",
                    guild,
                    msg.channel_id,
                    msg.author.name,
                    msg.content
                );
            }
            Event::Interaction(interaction) => match interaction {
                Interaction::Command(cmd) => {
                    log_event!("{} used command `{}`", cmd.user.name, cmd.data.name)
                }
                Interaction::Component(comp) => log_event!(
                    "{} pressed component `{}`",
                    comp.user.name,
                    comp.data.custom_id
                ),
                Interaction::Modal(modal) => log_event!(
                    "{} submitted modal `{}`",
                    modal.user.name,
                    modal.data.custom_id
                ),
                _ => log_event!("Unhandled interaction {}", interaction.id()),
            },
        }

        Ok(EventHandled::No)
    }
}
