use crate::{event::*, log_internal, plugin::*};
use serenity::all::{ActivityData, CreateMessage, OnlineStatus};

pub const STATUS: &str = "Watching over OSC";

/// Marks the bot ready once the gateway connection is up
pub struct Ready;

#[serenity::async_trait]
impl Plugin for Ready {
    fn name(&self) -> &'static str {
        "ready"
    }

    fn usage(&self, _cfg: &Config) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> CommandResult {
        match event {
            Event::Ready(ready) => {
                let first_login = ctx.status.mark_ready();
                log_internal!("Logged in as {}", ready.user.name);

                ctx.cache_http.set_presence(
                    Some(ActivityData::custom(STATUS)),
                    OnlineStatus::Online,
                );

                let content = login_message(first_login, chrono::Utc::now().timestamp());
                if let Err(e) = ctx
                    .owner
                    .direct_message(ctx.cache_http, CreateMessage::new().content(content))
                    .await
                {
                    log::debug!("Could not tell owner about login: {:#}", e);
                }

                sync_commands(ctx).await?;
            }
            Event::Resume => {
                ctx.cache_http.set_presence(
                    Some(ActivityData::custom(STATUS)),
                    OnlineStatus::Online,
                );
            }
            _ => {}
        }

        Ok(EventHandled::No)
    }
}

fn login_message(first_login: bool, timestamp: i64) -> String {
    if first_login {
        format!("Logged in at <t:{}:f>!", timestamp)
    } else {
        format!("Reconnected at <t:{}:f>!", timestamp)
    }
}
