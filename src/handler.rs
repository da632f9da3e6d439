use crate::{
    config::Config,
    context::{Context, Status},
    event::Event,
    extension::Extensions,
    report::{DiscordCourier, ErrorPipeline},
    tasks::BackgroundTasks,
};
use serenity::all::{Interaction, Message, Ready, ResumedEvent, UserId};
use std::sync::Arc;

/// Discord event handler
pub struct Handler {
    cfg: Arc<Config>,
    owner: UserId,
    extensions: Arc<Extensions>,
    tasks: Arc<BackgroundTasks>,
    status: Status,
}

impl<'a> Handler {
    pub fn new(
        cfg: Arc<Config>,
        owner: UserId,
        extensions: Arc<Extensions>,
        tasks: Arc<BackgroundTasks>,
    ) -> Self {
        Self {
            cfg,
            owner,
            extensions,
            tasks,
            status: Status::default(),
        }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        let courier = DiscordCourier::new(discord_ctx.http.clone(), self.owner);
        Context {
            cfg: &self.cfg,
            owner: self.owner,
            extensions: &self.extensions,
            status: &self.status,
            reporter: ErrorPipeline::new(Arc::new(courier), self.tasks.clone()),
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        Event::Ready(ready).handle(self.ctx(&discord_ctx)).await;
    }

    async fn resume(&self, discord_ctx: serenity::all::Context, _: ResumedEvent) {
        Event::Resume.handle(self.ctx(&discord_ctx)).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        Event::Message(msg).handle(self.ctx(&discord_ctx)).await;
    }

    async fn interaction_create(&self, discord_ctx: serenity::all::Context, interaction: Interaction) {
        Event::Interaction(interaction)
            .handle(self.ctx(&discord_ctx))
            .await;
    }
}
