//! Button menus that let members toggle roles on themselves.

use crate::{
    event::*,
    extension::Manifest,
    helper::{make_embed, parse_message_ref, MessageHelper},
    plugin::*,
};
use anyhow::{anyhow, Context as _, Result};
use serde::Deserialize;
use serenity::all::{
    ButtonStyle, ComponentInteraction, Colour, CreateActionRow, CreateButton, CreateEmbed,
    CreateInteractionResponseFollowup, CreateMessage, EditMessage, Interaction, Message,
    ReactionType, RoleId,
};
use std::sync::Arc;

pub const BUTTON_PREFIX: &str = "rolebutton|";
const BUTTONS_PER_ROW: usize = 5;
const MAX_ROWS: usize = 5;

const NO_PERMISSION: &str = "You do not have permission to use this command.";
const TRY_AGAIN: &str = "An error occurred. Please try again.";

#[derive(Debug, Deserialize)]
struct Settings {
    project: Menu,
    other: Menu,
}

/// One role menu: an embed with a grid of buttons beneath it
#[derive(Clone, Debug, Deserialize)]
pub struct Menu {
    pub title: String,
    pub description: String,
    /// Defaults to the bot's accent color
    pub color: Option<u32>,
    pub roles: Vec<RoleButton>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RoleButton {
    pub label: String,
    pub id: u64,
    pub emoji: String,
}

impl Menu {
    fn validate(&self) -> Result<()> {
        if self.roles.len() > BUTTONS_PER_ROW * MAX_ROWS {
            return Err(anyhow!(
                "Menu `{}` has {} roles, at most {} fit",
                self.title,
                self.roles.len(),
                BUTTONS_PER_ROW * MAX_ROWS
            ));
        }
        if let Some(role) = self.roles.iter().find(|role| role.id == 0) {
            return Err(anyhow!("Role `{}` has an invalid id", role.label));
        }
        Ok(())
    }

    /// Buttons sorted by label, a row at a time
    pub fn rows(&self) -> Vec<Vec<&RoleButton>> {
        let mut roles: Vec<&RoleButton> = self.roles.iter().collect();
        roles.sort_by(|a, b| a.label.cmp(&b.label));
        roles
            .chunks(BUTTONS_PER_ROW)
            .map(<[&RoleButton]>::to_vec)
            .collect()
    }

    fn components(&self) -> Vec<CreateActionRow> {
        self.rows()
            .into_iter()
            .map(|row| {
                CreateActionRow::Buttons(
                    row.into_iter()
                        .map(|role| {
                            CreateButton::new(format!("{}{}", BUTTON_PREFIX, role.id))
                                .label(role.label.clone())
                                .emoji(ReactionType::Unicode(role.emoji.clone()))
                                .style(ButtonStyle::Secondary)
                        })
                        .collect(),
                )
            })
            .collect()
    }

    fn embed(&self, default_color: u32) -> CreateEmbed {
        CreateEmbed::new()
            .title(self.title.clone())
            .description(self.description.clone())
            .colour(Colour::new(self.color.unwrap_or(default_color)))
    }
}

pub struct SelfRoles {
    color: u32,
    project: Menu,
    other: Menu,
}

pub fn setup(manifest: &Manifest, cfg: &Config) -> Result<Arc<dyn Plugin>> {
    let settings: Settings = toml::Value::Table(manifest.clone())
        .try_into()
        .context("Invalid self roles settings")?;
    settings.project.validate()?;
    settings.other.validate()?;

    Ok(Arc::new(SelfRoles {
        color: cfg.color,
        project: settings.project,
        other: settings.other,
    }))
}

#[serenity::async_trait]
impl Plugin for SelfRoles {
    fn name(&self) -> &'static str {
        "self roles"
    }

    fn usage(&self, cfg: &Config) -> Option<String> {
        Some(format!(
            "{p}send_project_roles | {p}send_other_roles - post a role menu\n\
             {p}edit_project_roles <message> | {p}edit_other_roles <message> - rewrite a role menu",
            p = cfg.command_prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> CommandResult {
        if let Event::Interaction(Interaction::Component(comp)) = event {
            return self.toggle(ctx, comp).await;
        }

        for (name, menu) in [("project", &self.project), ("other", &self.other)] {
            if let Some((msg, _)) = event.is_bot_cmd(ctx.cfg, &format!("send_{}_roles", name)) {
                return self.send(ctx, msg, menu).await;
            }
            if let Some((msg, args)) = event.is_bot_cmd(ctx.cfg, &format!("edit_{}_roles", name))
            {
                return self.edit(ctx, msg, args, menu).await;
            }
        }

        Ok(EventHandled::No)
    }
}

impl SelfRoles {
    async fn send(&self, ctx: &Context<'_>, msg: &Message, menu: &Menu) -> CommandResult {
        if !msg.is_from_moderator(ctx).await? {
            return Err(CommandError::invalid(NO_PERMISSION));
        }

        msg.channel_id
            .send_message(
                ctx.cache_http,
                CreateMessage::new()
                    .embed(menu.embed(self.color))
                    .components(menu.components()),
            )
            .await?;
        msg.delete(ctx.cache_http).await?;
        Ok(EventHandled::Yes)
    }

    async fn edit(&self, ctx: &Context<'_>, msg: &Message, args: &str, menu: &Menu) -> CommandResult {
        if !msg.is_from_moderator(ctx).await? {
            return Err(CommandError::invalid(NO_PERMISSION));
        }

        let Some((channel_id, message_id)) = parse_message_ref(args.trim(), msg.channel_id) else {
            return Err(CommandError::invalid("Could not find that message."));
        };
        let mut target = channel_id
            .message(ctx.cache_http, message_id)
            .await
            .map_err(|_| CommandError::invalid("Could not get message."))?;

        target
            .edit(
                ctx.cache_http,
                EditMessage::new()
                    .embed(menu.embed(self.color))
                    .components(menu.components()),
            )
            .await?;

        msg.channel_id
            .send_message(
                ctx.cache_http,
                CreateMessage::new()
                    .embed(make_embed(self.color, "Done!"))
                    .reference_message(msg),
            )
            .await?;
        Ok(EventHandled::Yes)
    }

    async fn toggle(&self, ctx: &Context<'_>, comp: &ComponentInteraction) -> CommandResult {
        let Some(role_id) = parse_button_id(&comp.data.custom_id) else {
            return Ok(EventHandled::No);
        };

        comp.defer_ephemeral(ctx.cache_http).await?;

        let (Some(member), Some(guild_id)) = (&comp.member, comp.guild_id) else {
            return Err(CommandError::invalid(TRY_AGAIN));
        };

        let cached = ctx
            .cache
            .guild(guild_id)
            .map(|guild| guild.roles.contains_key(&role_id));
        let role_exists = match cached {
            Some(exists) => exists,
            None => guild_id.roles(ctx.http).await?.contains_key(&role_id),
        };
        if !role_exists {
            return Err(CommandError::invalid(TRY_AGAIN));
        }

        let reply = if member.roles.contains(&role_id) {
            member.remove_role(ctx.http, role_id).await?;
            format!("Removed <@&{}>.", role_id)
        } else {
            member.add_role(ctx.http, role_id).await?;
            format!("Added <@&{}>.", role_id)
        };

        comp.create_followup(
            ctx.cache_http,
            CreateInteractionResponseFollowup::new()
                .embed(make_embed(self.color, reply))
                .ephemeral(true),
        )
        .await?;
        Ok(EventHandled::Yes)
    }
}

fn parse_button_id(custom_id: &str) -> Option<RoleId> {
    custom_id
        .strip_prefix(BUTTON_PREFIX)?
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(RoleId::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
        [project]
        title = "Project Roles"
        description = "Click on the buttons below to toggle project roles."
        roles = [
            { label = "Manim", id = 1078453174144356464, emoji = "📈" },
            { label = "Alarm Clock", id = 1200207061363998810, emoji = "⏰" },
            { label = "Jukebox", id = 1153816806654492672, emoji = "🎶" },
        ]

        [other]
        title = "Other Roles"
        description = "Click on the buttons below to toggle the roles you want."
        color = 0x607D8B
        roles = [
            { label = "Archive Viewer", id = 1235104106855665716, emoji = "📜" },
        ]
    "#;

    fn menu(count: usize) -> Menu {
        Menu {
            title: "Test".to_owned(),
            description: "Test".to_owned(),
            color: None,
            roles: (0..count)
                .map(|i| RoleButton {
                    label: format!("role {:02}", count - i),
                    id: i as u64 + 1,
                    emoji: "⭐".to_owned(),
                })
                .collect(),
        }
    }

    fn cfg() -> Config {
        Config::from_sources(None, |key| match key {
            "MAIN_TOKEN" => Some("token".to_owned()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn menus_are_read_from_manifest() {
        let manifest: Manifest = toml::from_str(MANIFEST).unwrap();
        let settings: Settings = toml::Value::Table(manifest).try_into().unwrap();

        assert_eq!(settings.project.roles.len(), 3);
        assert_eq!(settings.project.color, None);
        assert_eq!(settings.other.color, Some(0x607D8B));
        assert_eq!(settings.other.roles[0].label, "Archive Viewer");
        assert_eq!(settings.other.roles[0].id, 1235104106855665716);
    }

    #[test]
    fn setup_accepts_manifest() {
        let manifest: Manifest = toml::from_str(MANIFEST).unwrap();
        assert!(setup(&manifest, &cfg()).is_ok());
    }

    #[test]
    fn shipped_manifest_is_valid() {
        let manifest: Manifest = toml::from_str(include_str!("../../exts/self_roles.toml")).unwrap();
        assert!(setup(&manifest, &cfg()).is_ok());
    }

    #[test]
    fn setup_rejects_missing_menu() {
        let manifest: Manifest = toml::from_str("[project]\ntitle = \"x\"").unwrap();
        assert!(setup(&manifest, &cfg()).is_err());
    }

    #[test]
    fn buttons_sorted_by_label() {
        let manifest: Manifest = toml::from_str(MANIFEST).unwrap();
        let settings: Settings = toml::Value::Table(manifest).try_into().unwrap();
        let rows = settings.project.rows();

        assert_eq!(rows.len(), 1);
        let labels: Vec<&str> = rows[0].iter().map(|role| role.label.as_str()).collect();
        assert_eq!(labels, vec!["Alarm Clock", "Jukebox", "Manim"]);
    }

    #[test]
    fn five_buttons_per_row() {
        let menu = menu(12);
        let rows = menu.rows();
        let sizes: Vec<usize> = rows.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(rows[0][0].label, "role 01");
    }

    #[test]
    fn too_many_roles() {
        assert!(menu(25).validate().is_ok());
        assert!(menu(26).validate().is_err());
    }

    #[test]
    fn button_ids() {
        assert_eq!(
            parse_button_id("rolebutton|1153818324745072650"),
            Some(RoleId::new(1153818324745072650))
        );
        assert_eq!(parse_button_id("rolebutton|nope"), None);
        assert_eq!(parse_button_id("say-cmd|1"), None);
    }
}
