//! Slash-command definitions and dispatch.

use crate::error::{Error, GatewayError, Result};
use crate::messaging::discord::{
    snapshot_roster, user_display, DiscordGateway, DiscordMessenger,
};
use crate::orchestrator::{truncate_reply, DirectMessenger, TurnRequest};
use crate::roster::Identity;
use crate::ConversationKey;

use rand::Rng as _;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context, CreateCommand, CreateCommandOption,
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    ResolvedValue, User,
};

/// Global command set, registered on ready.
pub fn definitions(bot_name: &str) -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("greet").description("Say hello"),
        CreateCommand::new("ask")
            .description(format!("Ask {bot_name} a question"))
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "question",
                    "Your question",
                )
                .required(true),
            ),
        CreateCommand::new("roll")
            .description("Roll dice")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "dice",
                    "Number of dice (1-20, default: 1)",
                )
                .min_int_value(1)
                .max_int_value(20),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "sides",
                    "Number of sides (2-100, default: 6)",
                )
                .min_int_value(2)
                .max_int_value(100),
            ),
        CreateCommand::new("members").description("List server members"),
        CreateCommand::new("dm")
            .description("Send a direct message through the bot")
            .add_option(
                CreateCommandOption::new(CommandOptionType::User, "user", "Recipient")
                    .required(true),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "message", "What to send")
                    .required(true),
            ),
        CreateCommand::new("setchannel")
            .description(format!(
                "Toggle this channel as {bot_name}'s dedicated channel"
            ))
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Boolean,
                    "enable",
                    "Enable or disable",
                )
                .required(true),
            ),
    ]
}

/// Route one command interaction. Expired interactions are dropped without
/// a second reply attempt; any other failure gets one apologetic reply.
pub async fn dispatch(gateway: &DiscordGateway, ctx: &Context, command: &CommandInteraction) {
    let result = match command.data.name.as_str() {
        "greet" => greet(ctx, command).await,
        "ask" => ask(gateway, ctx, command).await,
        "roll" => roll(ctx, command).await,
        "members" => members(gateway, ctx, command).await,
        "dm" => send_dm(gateway, ctx, command).await,
        "setchannel" => set_channel(gateway, ctx, command).await,
        other => {
            tracing::warn!(command = other, "unknown slash command");
            Ok(())
        }
    };

    let Err(error) = result else { return };

    if let Error::Gateway(gateway_error) = &error {
        if gateway_error.is_interaction_gone() {
            tracing::warn!(%error, command = %command.data.name, "interaction expired before reply");
            return;
        }
    }

    tracing::error!(%error, command = %command.data.name, "command failed");

    let apology = "Sorry, I hit an internal error handling that.";
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new().content(apology),
    );
    if command.create_response(&ctx.http, response).await.is_err() {
        // already acknowledged (e.g. deferred), edit instead
        let _ = command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(apology))
            .await;
    }
}

async fn greet(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    respond_now(
        ctx,
        command,
        format!("Hello {}! 👋", user_display(&command.user)),
    )
    .await
}

async fn ask(gateway: &DiscordGateway, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let Some(question) = str_option(command, "question") else {
        return respond_now(ctx, command, "You need to actually ask something.").await;
    };

    command.defer(&ctx.http).await.map_err(GatewayError::from)?;

    let roster = match command.guild_id {
        Some(guild_id) => snapshot_roster(ctx, guild_id, &gateway.config().aliases).await,
        None => None,
    };

    let request = TurnRequest {
        key: ConversationKey(command.channel_id.get()),
        question: question.to_string(),
        speaker: user_display(&command.user).to_string(),
        speaker_id: command.user.id.get(),
        is_private: command.guild_id.is_none(),
    };

    let messenger = DiscordMessenger::new(ctx);
    let answer = gateway
        .orchestrator()
        .respond(request, roster.as_ref(), &messenger)
        .await;

    let content = truncate_reply(&format!(
        "**Question:** {question}\n\n**{}:** {answer}",
        gateway.config().bot_name
    ));
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await
        .map_err(GatewayError::from)?;
    Ok(())
}

async fn roll(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let dice = int_option(command, "dice").unwrap_or(1).clamp(1, 20);
    let sides = int_option(command, "sides").unwrap_or(6).clamp(2, 100);

    let content = {
        let mut rng = rand::rng();
        let rolls: Vec<i64> = (0..dice).map(|_| rng.random_range(1..=sides)).collect();

        if dice == 1 {
            format!("🎲 Rolling 1d{sides}:\n**Result:** {}", rolls[0])
        } else {
            let listing = rolls
                .iter()
                .map(|roll| roll.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let total: i64 = rolls.iter().sum();
            format!("🎲 Rolling {dice}d{sides}:\n**Rolls:** [{listing}]\n**Total:** {total}")
        }
    };

    respond_now(ctx, command, content).await
}

async fn members(
    gateway: &DiscordGateway,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond_now(ctx, command, "That only works inside a server.").await;
    };

    let Some(roster) = snapshot_roster(ctx, guild_id, &gateway.config().aliases).await else {
        return respond_now(ctx, command, "I couldn't fetch the member list just now.").await;
    };

    let mut listing = format!("**Server members ({}):**\n", roster.members().len());
    for member in roster.members() {
        listing.push_str(&format!("**{}**", member.display_name));
        if member.handle != member.display_name {
            listing.push_str(&format!(" ({})", member.handle));
        }
        listing.push('\n');
    }

    respond_now(ctx, command, truncate_reply(&listing)).await
}

async fn send_dm(
    gateway: &DiscordGateway,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let Some(target) = user_option(command, "user") else {
        return respond_now(ctx, command, "Pick someone to message.").await;
    };
    let Some(text) = str_option(command, "message") else {
        return respond_now(ctx, command, "There's no message to send.").await;
    };

    if target.id == command.user.id || target.bot {
        return respond_now(ctx, command, "You can't DM yourself through me! 😄").await;
    }

    command
        .defer_ephemeral(&ctx.http)
        .await
        .map_err(GatewayError::from)?;

    let recipient = Identity {
        user_id: target.id.get(),
        handle: target.name.clone(),
        display_name: user_display(target).to_string(),
        nickname: None,
        aliases: gateway.config().aliases.aliases_for(&target.name).to_vec(),
    };

    let wrapped = format!(
        "📩 **Message from {}:**\n{text}\n\n*Sent via {}*",
        user_display(&command.user),
        gateway.config().bot_name
    );

    let messenger = DiscordMessenger::new(ctx);
    let content = match messenger.send_direct(&recipient, &wrapped).await {
        Ok(()) => {
            gateway
                .orchestrator()
                .actions()
                .record_success(&recipient.handle, text);
            format!("✅ Sent your message to {}.", recipient.display_name)
        }
        Err(detail) => {
            tracing::warn!(recipient = %recipient.handle, %detail, "relayed DM failed");
            gateway
                .orchestrator()
                .actions()
                .record_failure(&recipient.handle, text, &detail);
            format!(
                "❌ Couldn't deliver that to {}. They may have DMs disabled.",
                recipient.display_name
            )
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await
        .map_err(GatewayError::from)?;
    Ok(())
}

async fn set_channel(
    gateway: &DiscordGateway,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond_now(ctx, command, "That only works inside a server.").await;
    };

    let enable = bool_option(command, "enable").unwrap_or(true);
    let channels = gateway.orchestrator().channels();

    let content = if enable {
        channels.designate(guild_id.get(), command.channel_id.get());
        "✅ This is now my dedicated channel. Just chat normally here."
    } else {
        channels.clear(guild_id.get());
        "❌ Dedicated channel disabled. Mention me when you need me."
    };

    respond_now(ctx, command, content).await
}

async fn respond_now(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new().content(content.into()),
    );
    command
        .create_response(&ctx.http, response)
        .await
        .map_err(GatewayError::from)?;
    Ok(())
}

fn str_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options()
        .into_iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            ResolvedValue::String(value) => Some(value),
            _ => None,
        })
}

fn int_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options()
        .into_iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            ResolvedValue::Integer(value) => Some(value),
            _ => None,
        })
}

fn bool_option(command: &CommandInteraction, name: &str) -> Option<bool> {
    command
        .data
        .options()
        .into_iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            ResolvedValue::Boolean(value) => Some(value),
            _ => None,
        })
}

fn user_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a User> {
    command
        .data
        .options()
        .into_iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            ResolvedValue::User(user, _) => Some(user),
            _ => None,
        })
}
