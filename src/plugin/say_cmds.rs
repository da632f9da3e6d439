//! Speak and edit messages as the bot.
//!
//! Slash commands and context menus open a modal; the modal submission does the work.  The
//! target channel or message travels in the modal's custom id as `<kind>|<snowflake>`.

use crate::{
    event::*,
    extension::Manifest,
    helper::{make_embed, natural_size, parse_message_ref, split_channel, split_word, MessageHelper},
    plugin::*,
};
use anyhow::Result;
use serenity::all::{
    ActionRowComponent, ChannelId, ChannelType, CommandInteraction, CommandOptionType,
    CommandType, CreateActionRow, CreateAttachment, CreateCommand, CreateCommandOption,
    CreateEmbed, CreateInputText, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateMessage, CreateModal, EditAttachments, EditMessage, Embed, InputTextStyle, Interaction,
    Message, MessageId, ModalInteraction, ModalInteractionData, Permissions, ResolvedTarget,
};
use serde_json::Value;
use std::sync::Arc;

/// Raw embed JSON longer than this is refused
pub const RAW_EMBED_LIMIT: usize = 7000;

const SAY: &str = "say-cmd";
const RAW_EMBED_SAY: &str = "raw-embed-say";
const RAW_EMBED_EDIT: &str = "raw-embed-edit";
const EDIT_MESSAGE: &str = "edit-message";

const EDIT_EMBED_MENU: &str = "Edit Embed (Raw)";
const EDIT_MESSAGE_MENU: &str = "Edit Message";

const NO_PERMISSION: &str = "You do not have permission to use this command.";
const NOTHING_TO_SEND: &str = "You must provide content or files.";
const BAD_EMBED: &str = "Could not parse the raw embed.";

pub struct SayCmds {
    color: u32,
    client: reqwest::Client,
}

pub fn setup(_manifest: &Manifest, cfg: &Config) -> Result<Arc<dyn Plugin>> {
    Ok(Arc::new(SayCmds {
        color: cfg.color,
        client: reqwest::Client::new(),
    }))
}

#[serenity::async_trait]
impl Plugin for SayCmds {
    fn name(&self) -> &'static str {
        "say"
    }

    fn usage(&self, cfg: &Config) -> Option<String> {
        Some(format!(
            "{p}say [#channel] <content> - send a message as the bot\n\
             {p}edit-message <message> <content> - edit a message sent by the bot",
            p = cfg.command_prefix
        ))
    }

    fn commands(&self) -> Vec<CreateCommand> {
        vec![
            CreateCommand::new("say")
                .description("Allows you to send a message as the bot")
                .default_member_permissions(Permissions::MANAGE_MESSAGES)
                .add_option(channel_option("The channel to send the message in.")),
            CreateCommand::new("raw-embed-say")
                .description("Allows you to send an embed from the raw embed JSON format.")
                .default_member_permissions(Permissions::MANAGE_MESSAGES)
                .add_option(channel_option("The channel to send the embed in.")),
            CreateCommand::new(EDIT_EMBED_MENU)
                .kind(CommandType::Message)
                .default_member_permissions(Permissions::MANAGE_MESSAGES)
                .dm_permission(false),
            CreateCommand::new(EDIT_MESSAGE_MENU)
                .kind(CommandType::Message)
                .default_member_permissions(Permissions::MANAGE_MESSAGES)
                .dm_permission(false),
        ]
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> CommandResult {
        match event {
            Event::Interaction(Interaction::Command(cmd)) => self.command(ctx, cmd).await,
            Event::Interaction(Interaction::Modal(modal)) => self.modal(ctx, modal).await,
            Event::Message(_) => {
                if let Some((msg, args)) = event.is_bot_cmd(ctx.cfg, "say") {
                    self.say(ctx, msg, args).await
                } else if let Some((msg, args)) = event.is_bot_cmd(ctx.cfg, EDIT_MESSAGE) {
                    self.edit_message(ctx, msg, args).await
                } else {
                    Ok(EventHandled::No)
                }
            }
            _ => Ok(EventHandled::No),
        }
    }
}

impl SayCmds {
    async fn command(&self, ctx: &Context<'_>, cmd: &CommandInteraction) -> CommandResult {
        let modal = match cmd.data.name.as_str() {
            "say" => CreateModal::new(format!("{}|{}", SAY, target_channel(cmd)), "Say Command")
                .components(vec![input(
                    "Enter the content you want to send:",
                    "say-content",
                    None,
                )]),
            "raw-embed-say" => CreateModal::new(
                format!("{}|{}", RAW_EMBED_SAY, target_channel(cmd)),
                "Raw Embed Say",
            )
            .components(vec![input(
                "Enter the embed you want to send:",
                "embed-say",
                None,
            )]),
            EDIT_EMBED_MENU => {
                let target = target_message(cmd)?;
                let Some(embed) = target.embeds.first() else {
                    return Err(CommandError::invalid("No embeds found."));
                };
                if !target.is_mine(ctx) {
                    return Err(CommandError::invalid(
                        "You can only edit embeds sent by the bot.",
                    ));
                }

                let json = serde_json::to_string_pretty(embed)?;
                CreateModal::new(format!("{}|{}", RAW_EMBED_EDIT, target.id), "Raw Embed Edit")
                    .components(vec![input(
                        "Enter the embed you want to edit:",
                        "embed-edit",
                        Some(json),
                    )])
            }
            EDIT_MESSAGE_MENU => {
                let target = target_message(cmd)?;
                if !target.is_mine(ctx) {
                    return Err(CommandError::invalid(
                        "You can only edit messages sent by the bot.",
                    ));
                }

                let content = match target.content.as_str() {
                    "" => "N/A".to_owned(),
                    content => content.to_owned(),
                };
                CreateModal::new(format!("{}|{}", EDIT_MESSAGE, target.id), "Edit Message")
                    .components(vec![input(
                        "Enter what you want to edit the message to:",
                        "edit-content",
                        Some(content),
                    )])
            }
            _ => return Ok(EventHandled::No),
        };

        cmd.create_response(ctx.cache_http, CreateInteractionResponse::Modal(modal))
            .await?;
        Ok(EventHandled::Yes)
    }

    async fn modal(&self, ctx: &Context<'_>, modal: &ModalInteraction) -> CommandResult {
        let Some((kind, id)) = parse_custom_id(&modal.data.custom_id) else {
            return Ok(EventHandled::No);
        };
        if ![SAY, RAW_EMBED_SAY, RAW_EMBED_EDIT, EDIT_MESSAGE].contains(&kind) {
            return Ok(EventHandled::No);
        }

        modal.defer_ephemeral(ctx.cache_http).await?;

        let reply = match kind {
            SAY => {
                let channel_id = fetch_channel(ctx, ChannelId::new(id)).await?;
                let content = modal_value(&modal.data, "say-content").unwrap_or_default();
                let sent = channel_id
                    .send_message(ctx.cache_http, CreateMessage::new().content(content))
                    .await?;
                format!("Sent! See it at {}.", sent.link())
            }
            RAW_EMBED_SAY => {
                let channel_id = fetch_channel(ctx, ChannelId::new(id)).await?;
                let raw = modal_value(&modal.data, "embed-say").unwrap_or_default();
                let embed = parse_raw_embed(raw).ok_or(CommandError::invalid(BAD_EMBED))?;
                let sent = channel_id
                    .send_message(
                        ctx.cache_http,
                        CreateMessage::new().embed(CreateEmbed::from(embed)),
                    )
                    .await?;
                format!("Sent! See it at {}.", sent.link())
            }
            RAW_EMBED_EDIT => {
                let raw = modal_value(&modal.data, "embed-edit").unwrap_or_default();
                let embed = parse_raw_embed(raw).ok_or(CommandError::invalid(BAD_EMBED))?;
                let mut message = fetch_message(ctx, modal.channel_id, MessageId::new(id)).await?;
                message
                    .edit(
                        ctx.cache_http,
                        EditMessage::new().embed(CreateEmbed::from(embed)),
                    )
                    .await?;
                "Edited!".to_owned()
            }
            _ => {
                let content = modal_value(&modal.data, "edit-content").unwrap_or_default();
                let mut message = fetch_message(ctx, modal.channel_id, MessageId::new(id)).await?;
                message
                    .edit(ctx.cache_http, EditMessage::new().content(content))
                    .await?;
                "Edited!".to_owned()
            }
        };

        modal
            .create_followup(
                ctx.cache_http,
                CreateInteractionResponseFollowup::new()
                    .embed(make_embed(self.color, reply))
                    .ephemeral(true),
            )
            .await?;
        Ok(EventHandled::Yes)
    }

    async fn say(&self, ctx: &Context<'_>, msg: &Message, args: &str) -> CommandResult {
        if !msg.is_from_moderator(ctx).await? {
            return Err(CommandError::invalid(NO_PERMISSION));
        }

        let (channel, content) = split_channel(args);
        let channel_id = channel.unwrap_or(msg.channel_id);
        let files = self.download_attachments(ctx, msg).await?;
        if files.is_empty() && content.is_empty() {
            return Err(CommandError::invalid(NOTHING_TO_SEND));
        }

        let mut builder = CreateMessage::new().add_files(files);
        if !content.is_empty() {
            builder = builder.content(content);
        }
        let sent = channel_id.send_message(ctx.cache_http, builder).await?;

        if channel_id != msg.channel_id {
            self.reply(ctx, msg, format!("Sent! See it at {}.", sent.link()))
                .await?;
        }
        Ok(EventHandled::Yes)
    }

    async fn edit_message(&self, ctx: &Context<'_>, msg: &Message, args: &str) -> CommandResult {
        if !msg.is_from_moderator(ctx).await? {
            return Err(CommandError::invalid(NO_PERMISSION));
        }

        let (reference, content) = split_word(args);
        let Some((channel_id, message_id)) = parse_message_ref(reference, msg.channel_id) else {
            return Err(CommandError::invalid("Could not find that message."));
        };
        let mut message = fetch_message(ctx, channel_id, message_id).await?;
        if !message.is_mine(ctx) {
            return Err(CommandError::invalid(
                "You can only edit messages sent by the bot.",
            ));
        }

        let files = self.download_attachments(ctx, msg).await?;
        if files.is_empty() && content.is_empty() {
            return Err(CommandError::invalid(NOTHING_TO_SEND));
        }

        let mut builder = EditMessage::new();
        if !content.is_empty() {
            builder = builder.content(content);
        }
        if !files.is_empty() {
            let attachments = files
                .into_iter()
                .fold(EditAttachments::new(), |attachments, file| attachments.add(file));
            builder = builder.attachments(attachments);
        }
        message.edit(ctx.cache_http, builder).await?;

        if message.channel_id != msg.channel_id {
            self.reply(ctx, msg, format!("Edited! See it at {}.", message.link()))
                .await?;
        }
        Ok(EventHandled::Yes)
    }

    /// Fetch the invoking message's attachments so they can be sent again
    async fn download_attachments(
        &self,
        ctx: &Context<'_>,
        msg: &Message,
    ) -> Result<Vec<CreateAttachment>, CommandError> {
        let limit = msg.upload_limit(ctx);
        let mut files = Vec::with_capacity(msg.attachments.len());

        for attachment in &msg.attachments {
            if u64::from(attachment.size) > limit {
                return Err(CommandError::invalid(format!(
                    "Attachments must be less than {} in size.",
                    natural_size(limit)
                )));
            }

            let response = self.client.get(&attachment.url).send().await?;
            if !response.status().is_success() {
                log::warn!(
                    "Skipping attachment {}: HTTP {}",
                    attachment.filename,
                    response.status()
                );
                continue;
            }
            let data = response.bytes().await?;
            files.push(CreateAttachment::bytes(
                data.to_vec(),
                attachment.filename.clone(),
            ));
        }

        Ok(files)
    }

    async fn reply(&self, ctx: &Context<'_>, msg: &Message, text: String) -> Result<()> {
        msg.channel_id
            .send_message(
                ctx.cache_http,
                CreateMessage::new()
                    .embed(make_embed(self.color, text))
                    .reference_message(msg),
            )
            .await?;
        Ok(())
    }
}

fn channel_option(description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::Channel, "channel", description)
        .required(false)
        .channel_types(vec![ChannelType::Text])
}

fn input(label: &str, custom_id: &str, value: Option<String>) -> CreateActionRow {
    let mut input = CreateInputText::new(InputTextStyle::Paragraph, label, custom_id);
    if let Some(value) = value {
        input = input.value(value);
    }
    CreateActionRow::InputText(input)
}

/// Channel option of a slash command, defaulting to where it was used
fn target_channel(cmd: &CommandInteraction) -> ChannelId {
    cmd.data
        .options
        .iter()
        .find(|option| option.name == "channel")
        .and_then(|option| option.value.as_channel_id())
        .unwrap_or(cmd.channel_id)
}

fn target_message(cmd: &CommandInteraction) -> Result<&Message, CommandError> {
    match cmd.data.target() {
        Some(ResolvedTarget::Message(message)) => Ok(message),
        _ => Err(CommandError::invalid("Could not get message.")),
    }
}

async fn fetch_channel(ctx: &Context<'_>, channel_id: ChannelId) -> Result<ChannelId, CommandError> {
    channel_id
        .to_channel(ctx.cache_http)
        .await
        .map(|channel| channel.id())
        .map_err(|_| CommandError::invalid("Could not get channel."))
}

async fn fetch_message(
    ctx: &Context<'_>,
    channel_id: ChannelId,
    message_id: MessageId,
) -> Result<Message, CommandError> {
    channel_id
        .message(ctx.cache_http, message_id)
        .await
        .map_err(|_| CommandError::invalid("Could not get message."))
}

/// Split `kind|snowflake`
fn parse_custom_id(custom_id: &str) -> Option<(&str, u64)> {
    let (kind, id) = custom_id.split_once('|')?;
    let id = id.parse::<u64>().ok().filter(|id| *id != 0)?;
    Some((kind, id))
}

fn modal_value<'a>(data: &'a ModalInteractionData, custom_id: &str) -> Option<&'a str> {
    data.components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(text) if text.custom_id == custom_id => {
                text.value.as_deref()
            }
            _ => None,
        })
}

/// Parse an embed from its JSON form.
///
/// Also accepts a whole message body, in which case the first of its `embeds` is used.
pub fn parse_raw_embed(raw: &str) -> Option<Embed> {
    if raw.chars().count() > RAW_EMBED_LIMIT {
        return None;
    }

    let mut value: Value = serde_json::from_str(raw).ok()?;
    if let Some(first) = value
        .get("embeds")
        .and_then(Value::as_array)
        .and_then(|embeds| embeds.first())
        .cloned()
    {
        value = first;
    }
    if !value.is_object() {
        return None;
    }

    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_embed() {
        let embed = parse_raw_embed(r#"{"title": "Hello", "description": "World"}"#).unwrap();
        assert_eq!(embed.title.as_deref(), Some("Hello"));
        assert_eq!(embed.description.as_deref(), Some("World"));
    }

    #[test]
    fn raw_embed_from_message_body() {
        let raw = r#"{"content": "hi", "embeds": [{"title": "First"}, {"title": "Second"}]}"#;
        let embed = parse_raw_embed(raw).unwrap();
        assert_eq!(embed.title.as_deref(), Some("First"));
    }

    #[test]
    fn raw_embed_rejects_garbage() {
        assert!(parse_raw_embed("not json").is_none());
        assert!(parse_raw_embed("[1, 2, 3]").is_none());
        assert!(parse_raw_embed("\"title\"").is_none());
    }

    #[test]
    fn raw_embed_rejects_oversized_input() {
        let description = "a".repeat(RAW_EMBED_LIMIT);
        let raw = format!(r#"{{"description": "{}"}}"#, description);
        assert!(parse_raw_embed(&raw).is_none());
    }

    #[test]
    fn custom_ids() {
        assert_eq!(parse_custom_id("say-cmd|123"), Some(("say-cmd", 123)));
        assert_eq!(
            parse_custom_id("raw-embed-edit|456"),
            Some(("raw-embed-edit", 456))
        );
        assert_eq!(parse_custom_id("say-cmd"), None);
        assert_eq!(parse_custom_id("say-cmd|abc"), None);
        assert_eq!(parse_custom_id("say-cmd|0"), None);
    }
}
