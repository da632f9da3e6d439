use crate::{event::*, plugin::*};

pub struct Help;

#[serenity::async_trait]
impl Plugin for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    fn usage(&self, cfg: &Config) -> Option<String> {
        Some(format!(
            "{}{} - show this help message",
            cfg.command_prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> CommandResult {
        let Some((msg, _)) = event.is_bot_cmd(ctx.cfg, self.name()) else {
            return Ok(EventHandled::No);
        };

        let plugins = crate::plugin::plugins()
            .into_iter()
            .chain(ctx.extensions.plugins().await);
        let reply = help_text(plugins.filter_map(|plugin| plugin.usage(ctx.cfg)));

        msg.reply(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

fn help_text(lines: impl Iterator<Item = String>) -> String {
    let mut reply = String::new();
    reply.push_str("```\n");
    reply.push_str("Commands:\n");
    for usage in lines {
        reply.push_str(&usage);
        reply.push('\n');
    }
    reply.push_str("```\n");
    reply
}
