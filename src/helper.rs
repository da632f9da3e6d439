//! Miscellaneous convenience methods

use crate::context::Context;
use anyhow::Result;
use serenity::all::{
    ChannelId, Colour, CreateEmbed, Message, MessageId, PremiumTier, Timestamp,
};

/// Material orange
const ERROR_COLOR: u32 = 0xFF9800;
const MIB: u64 = 1024 * 1024;

/// Embed in the bot's accent color
pub fn make_embed(color: u32, description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .description(description)
        .colour(Colour::new(color))
        .timestamp(Timestamp::now())
}

pub fn error_embed(description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .title("Error")
        .description(description)
        .colour(Colour::new(ERROR_COLOR))
        .timestamp(Timestamp::now())
}

/// Largest attachment a guild at `tier` accepts, in bytes
pub fn upload_limit(tier: PremiumTier) -> u64 {
    match tier {
        PremiumTier::Tier2 => 50 * MIB,
        PremiumTier::Tier3 => 100 * MIB,
        _ => 25 * MIB,
    }
}

/// Binary-prefixed size, e.g. `25.0 MiB`
pub fn natural_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes < 1024 {
        return match bytes {
            1 => "1 Byte".to_owned(),
            n => format!("{} Bytes", n),
        };
    }

    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// Split a leading `<#channel>` mention off of command arguments
pub fn split_channel(args: &str) -> (Option<ChannelId>, &str) {
    let args = args.trim_start();
    let (first, rest) = args
        .split_once(char::is_whitespace)
        .unwrap_or((args, ""));

    match serenity::utils::parse_channel_mention(first) {
        Some(channel_id) => (Some(channel_id), rest.trim_start()),
        None => (None, args),
    }
}

/// Accept a message link, or a bare message id in `default_channel`
pub fn parse_message_ref(arg: &str, default_channel: ChannelId) -> Option<(ChannelId, MessageId)> {
    if let Some((_, channel_id, message_id)) = serenity::utils::parse_message_url(arg) {
        return Some((channel_id, message_id));
    }

    arg.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(|id| (default_channel, MessageId::new(id)))
}

/// Split the first whitespace-delimited word off of `args`
pub fn split_word(args: &str) -> (&str, &str) {
    let args = args.trim_start();
    match args.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (args, ""),
    }
}

#[serenity::async_trait]
pub trait MessageHelper {
    async fn is_from_moderator(&self, ctx: &Context) -> Result<bool>;
    fn is_from_owner(&self, ctx: &Context) -> bool;
    fn is_mine(&self, ctx: &Context) -> bool;
    fn upload_limit(&self, ctx: &Context) -> u64;
}

#[serenity::async_trait]
impl MessageHelper for Message {
    /// Administrator or Manage Messages in the guild the message was sent in
    async fn is_from_moderator(&self, ctx: &Context) -> Result<bool> {
        let Some(guild_id) = self.guild_id else {
            return Ok(false);
        };

        let member = guild_id.member(ctx.cache_http, self.author.id).await?;
        let permissions = match ctx.cache.guild(guild_id) {
            Some(guild) => guild.member_permissions(&member),
            None => return Ok(false),
        };

        Ok(permissions.administrator() || permissions.manage_messages())
    }

    fn is_from_owner(&self, ctx: &Context) -> bool {
        self.author.id == ctx.owner
    }

    fn is_mine(&self, ctx: &Context) -> bool {
        self.author.id == ctx.cache.current_user().id
    }

    fn upload_limit(&self, ctx: &Context) -> u64 {
        let tier = self
            .guild(ctx.cache)
            .map(|guild| guild.premium_tier)
            .unwrap_or(PremiumTier::Tier0);
        upload_limit(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_by_tier() {
        assert_eq!(upload_limit(PremiumTier::Tier0), 25 * MIB);
        assert_eq!(upload_limit(PremiumTier::Tier1), 25 * MIB);
        assert_eq!(upload_limit(PremiumTier::Tier2), 50 * MIB);
        assert_eq!(upload_limit(PremiumTier::Tier3), 100 * MIB);
    }

    #[test]
    fn natural_sizes() {
        assert_eq!(natural_size(1), "1 Byte");
        assert_eq!(natural_size(300), "300 Bytes");
        assert_eq!(natural_size(1536), "1.5 KiB");
        assert_eq!(natural_size(25 * MIB), "25.0 MiB");
    }

    #[test]
    fn channel_mention_is_split_off() {
        let (channel, rest) = split_channel("<#123456> hello there");
        assert_eq!(channel, Some(ChannelId::new(123456)));
        assert_eq!(rest, "hello there");
    }

    #[test]
    fn no_channel_mention() {
        let (channel, rest) = split_channel("hello <#123456>");
        assert_eq!(channel, None);
        assert_eq!(rest, "hello <#123456>");
    }

    #[test]
    fn channel_mention_alone() {
        let (channel, rest) = split_channel("<#42>");
        assert_eq!(channel, Some(ChannelId::new(42)));
        assert_eq!(rest, "");
    }

    #[test]
    fn message_link() {
        let parsed = parse_message_ref(
            "https://discord.com/channels/1/2/3",
            ChannelId::new(9),
        );
        assert_eq!(parsed, Some((ChannelId::new(2), MessageId::new(3))));
    }

    #[test]
    fn bare_message_id_uses_default_channel() {
        let parsed = parse_message_ref("3", ChannelId::new(9));
        assert_eq!(parsed, Some((ChannelId::new(9), MessageId::new(3))));
    }

    #[test]
    fn garbage_message_ref() {
        assert_eq!(parse_message_ref("hello", ChannelId::new(9)), None);
        assert_eq!(parse_message_ref("0", ChannelId::new(9)), None);
    }

    #[test]
    fn words() {
        assert_eq!(split_word("  load exts.a  "), ("load", "exts.a  "));
        assert_eq!(split_word("list"), ("list", ""));
        assert_eq!(split_word(""), ("", ""));
    }
}
