//! Discord gateway adapter: event handling, roster snapshots, and DM
//! delivery over the live serenity client.

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::orchestrator::{DirectMessenger, MessageEvent, Orchestrator, TurnRequest};
use crate::roster::{AliasTable, Identity, RosterSnapshot};
use crate::ConversationKey;

use serenity::all::{
    Command, Context, EventHandler, GuildId, Interaction, Member, Message, ReactionType, Ready,
    User, UserId,
};
use std::sync::Arc;

/// Keyword-triggered emoji reactions. Delivery is best effort: a failed
/// reaction is logged at debug and forgotten.
const KEYWORD_REACTIONS: &[(&str, &str)] = &[("ice", "🥶"), ("snake", "🐍")];

const REPLY_INTERNAL_ERROR: &str = "Sorry, something went wrong on my end. I've noted it.";

/// Serenity event handler wiring Discord events into the orchestrator.
pub struct DiscordGateway {
    orchestrator: Arc<Orchestrator>,
    config: Arc<Config>,
}

impl DiscordGateway {
    pub fn new(orchestrator: Arc<Orchestrator>, config: Arc<Config>) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    async fn handle_message(&self, ctx: &Context, msg: &Message) -> Result<()> {
        self.react_to_keywords(ctx, msg).await;

        if msg.content.trim().eq_ignore_ascii_case("!help") {
            return self.reply_help(ctx, msg).await;
        }

        let key = ConversationKey(msg.channel_id.get());
        let is_private = msg.guild_id.is_none();
        let mentions_bot = msg.mentions_me(&ctx.http).await.unwrap_or(false);

        let event = MessageEvent {
            key,
            guild_id: msg.guild_id.map(|guild_id| guild_id.get()),
            text: msg.content.clone(),
            mentions_bot,
        };

        let Some(reason) = self.orchestrator.should_engage(&event) else {
            // passive capture keeps the surrounding conversation available
            // to later engaged turns
            self.orchestrator
                .observe(key, is_private, user_display(&msg.author), &msg.content);
            return Ok(());
        };
        tracing::debug!(?reason, channel = %msg.channel_id, "engaging with message");

        let typing = msg.channel_id.start_typing(&ctx.http);

        let roster = match msg.guild_id {
            Some(guild_id) => snapshot_roster(ctx, guild_id, &self.config.aliases).await,
            None => None,
        };

        let request = TurnRequest {
            key,
            question: msg.content.clone(),
            speaker: user_display(&msg.author).to_string(),
            speaker_id: msg.author.id.get(),
            is_private,
        };

        let messenger = DiscordMessenger::new(ctx);
        let reply = self
            .orchestrator
            .respond(request, roster.as_ref(), &messenger)
            .await;

        typing.stop();
        msg.reply(&ctx.http, reply)
            .await
            .map_err(GatewayError::from)?;
        Ok(())
    }

    async fn reply_help(&self, ctx: &Context, msg: &Message) -> Result<()> {
        let is_dedicated = msg.guild_id.is_some_and(|guild_id| {
            self.orchestrator
                .channels()
                .is_dedicated(guild_id.get(), msg.channel_id.get())
        });

        let closer = if is_dedicated {
            "or just chat normally here!"
        } else {
            "or mention me with your question!"
        };
        let help = format!(
            "Use slash commands: `/greet`, `/ask`, `/roll`, `/members`, `/dm`, `/setchannel`, {closer}"
        );

        msg.reply(&ctx.http, help)
            .await
            .map_err(GatewayError::from)?;
        Ok(())
    }

    async fn react_to_keywords(&self, ctx: &Context, msg: &Message) {
        let lower = msg.content.to_lowercase();
        for (keyword, emoji) in KEYWORD_REACTIONS {
            if lower.contains(keyword) {
                let reaction = ReactionType::Unicode((*emoji).to_string());
                if let Err(error) = msg.react(&ctx.http, reaction).await {
                    tracing::debug!(%error, keyword, "reaction skipped");
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for DiscordGateway {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, "connected to Discord");

        match Command::set_global_commands(
            &ctx.http,
            super::commands::definitions(&self.config.bot_name),
        )
        .await
        {
            Ok(registered) => {
                tracing::info!(count = registered.len(), "registered slash commands");
            }
            Err(error) => tracing::error!(%error, "failed to register slash commands"),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        if let Err(error) = self.handle_message(&ctx, &msg).await {
            tracing::error!(%error, channel = %msg.channel_id, "message handling failed");
            // one best-effort apology; never a crash, never silence
            let _ = msg.reply(&ctx.http, REPLY_INTERNAL_ERROR).await;
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            super::commands::dispatch(self, &ctx, &command).await;
        }
    }
}

/// Snapshot the live non-automated membership of a guild, attaching
/// configured aliases. Returns `None` when the fetch fails; callers treat
/// a missing roster as "audience unknown".
pub async fn snapshot_roster(
    ctx: &Context,
    guild_id: GuildId,
    aliases: &AliasTable,
) -> Option<RosterSnapshot> {
    match guild_id.members(&ctx.http, None, None).await {
        Ok(members) => Some(RosterSnapshot::new(
            members
                .iter()
                .filter(|member| !member.user.bot)
                .map(|member| identity_of(member, aliases))
                .collect(),
        )),
        Err(error) => {
            tracing::warn!(%error, %guild_id, "failed to fetch guild members");
            None
        }
    }
}

fn identity_of(member: &Member, aliases: &AliasTable) -> Identity {
    Identity {
        user_id: member.user.id.get(),
        handle: member.user.name.clone(),
        display_name: member.display_name().to_string(),
        nickname: member.nick.clone(),
        aliases: aliases.aliases_for(&member.user.name).to_vec(),
    }
}

/// Preferred display form for a bare user (no guild membership at hand).
pub fn user_display(user: &User) -> &str {
    user.global_name.as_deref().unwrap_or(&user.name)
}

/// DM capability backed by the live serenity HTTP client.
pub struct DiscordMessenger {
    http: Arc<serenity::http::Http>,
}

impl DiscordMessenger {
    pub fn new(ctx: &Context) -> Self {
        Self {
            http: ctx.http.clone(),
        }
    }
}

#[async_trait::async_trait]
impl DirectMessenger for DiscordMessenger {
    async fn send_direct(&self, recipient: &Identity, text: &str) -> std::result::Result<(), String> {
        let user = UserId::new(recipient.user_id);
        let channel = user
            .create_dm_channel(&self.http)
            .await
            .map_err(|error| error.to_string())?;
        channel
            .id
            .say(&self.http, text)
            .await
            .map_err(|error| error.to_string())?;
        Ok(())
    }
}
