use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandDataOption, CommandInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info, warn};

use crate::{
    audio::{queue::LoopMode, registry::GuildQueue},
    bot::RitmoBot,
    ui::embeds,
};

const NOTHING_PLAYING: &str = "❌ No hay música reproduciéndose";

/// Los comandos públicos como variantes cerradas: agregar uno nuevo obliga
/// a extender el match de despacho en tiempo de compilación.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Play,
    Skip,
    Pause,
    Resume,
    Stop,
    Loop,
    Queue,
}

impl BotCommand {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "play" => Some(Self::Play),
            "skip" => Some(Self::Skip),
            "pause" => Some(Self::Pause),
            "resume" => Some(Self::Resume),
            "stop" => Some(Self::Stop),
            "loop" => Some(Self::Loop),
            "queue" => Some(Self::Queue),
            _ => None,
        }
    }
}

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond_text(ctx, &command, "❌ Este comando solo funciona en un servidor", true)
            .await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let Some(kind) = BotCommand::from_name(&command.data.name) else {
        return respond_text(ctx, &command, "❌ Comando no reconocido", true).await;
    };

    match kind {
        BotCommand::Play => handle_play(ctx, &command, bot, guild_id).await,
        BotCommand::Skip => handle_skip(ctx, &command, bot, guild_id).await,
        BotCommand::Pause => handle_pause(ctx, &command, bot, guild_id).await,
        BotCommand::Resume => handle_resume(ctx, &command, bot, guild_id).await,
        BotCommand::Stop => handle_stop(ctx, &command, bot, guild_id).await,
        BotCommand::Loop => handle_loop(ctx, &command, bot, guild_id).await,
        BotCommand::Queue => handle_queue(ctx, &command, bot, guild_id).await,
    }
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    // Discord valida las opciones requeridas, pero un payload malformado
    // no debe dejar la interacción sin respuesta
    let Some(query) = string_option(&command.data.options, "query").map(str::to_string) else {
        return respond_text(ctx, command, "❌ Argumentos inválidos", true).await;
    };

    // Quien pide debe estar en un canal de voz
    let Some(user_channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond_text(ctx, command, "🔇 Debes estar en un canal de voz", true).await;
    };

    // Defer: la resolución puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let song = match bot.resolver.resolve(&query, command.user.id).await {
        Ok(song) => song,
        Err(e) => {
            warn!("Resolución fallida para '{}': {:?}", query, e);
            return edit_text(ctx, command, e.user_message()).await;
        }
    };

    if !super::bot_has_voice_access(ctx, guild_id, user_channel) {
        return edit_text(ctx, command, "🔒 Necesito permisos de Conectar y Hablar en tu canal")
            .await;
    }

    // Adjuntar la canción a la cola de la guild. Si la entrada observada
    // está en pleno desmontaje (released bajo su propio mutex), reintentar:
    // la siguiente vuelta crea una cola fresca
    let (queue, created, pushed) = loop {
        let (queue, created) = bot.registry.get_or_create(guild_id, || {
            GuildQueue::new(
                song.clone(),
                command.channel_id,
                user_channel,
                ctx.http.clone(),
                bot.config.max_queue_size,
            )
        });

        if created {
            break (queue, true, Ok(false));
        }

        let attach = {
            let mut q = queue.lock();
            if q.released {
                None
            } else {
                Some((q.tracks.push(song.clone()), q.voice_channel != user_channel))
            }
        };

        match attach {
            Some((pushed, needs_move)) => break (queue, false, pushed.map(|()| needs_move)),
            None => continue,
        }
    };

    if created {
        // Primera canción de la guild: abrir sesión de voz y arrancar el driver
        if let Err(e) = bot.driver.songbird().join(guild_id, user_channel).await {
            error!("No se pudo conectar al canal de voz en guild {}: {:?}", guild_id, e);
            bot.registry.detach(guild_id);
            return edit_text(ctx, command, "❌ No pude conectarme al canal de voz").await;
        }

        if let Err(e) = bot.driver.start(guild_id).await {
            error!("Error al arrancar reproducción en guild {}: {:?}", guild_id, e);
            bot.driver.teardown(guild_id, None).await;
            return edit_text(ctx, command, "❌ Error al arrancar la reproducción").await;
        }
    } else {
        // Cola existente: si el usuario está en otro canal, mover la sesión
        match pushed {
            Ok(needs_move) => {
                if needs_move {
                    match bot.driver.songbird().join(guild_id, user_channel).await {
                        Ok(_) => queue.lock().voice_channel = user_channel,
                        Err(e) => warn!(
                            "No se pudo mover al canal del usuario en guild {}: {:?}",
                            guild_id, e
                        ),
                    }
                }
            }
            Err(e) => return edit_text(ctx, command, &format!("📦 {}", e)).await,
        }
    }

    let view = queue.lock().tracks.view(embeds::UPCOMING_PREVIEW);
    if let Some(view) = view {
        command
            .edit_response(
                &ctx.http,
                EditInteractionResponse::new().embed(embeds::queue_embed(&view)),
            )
            .await?;
    }

    Ok(())
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(queue) = bot.registry.get(guild_id) else {
        return respond_text(ctx, command, NOTHING_PLAYING, true).await;
    };

    // El skip descarta la canción actual sin importar el modo de loop;
    // detener el track dispara la misma señal de fin que un final natural.
    let handle = {
        let mut q = queue.lock();
        q.skip_pending = true;
        q.current.clone()
    };

    if let Some(handle) = handle {
        let _ = handle.stop();
    }

    respond_text(ctx, command, "⏭️ Saltada", false).await
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(queue) = bot.registry.get(guild_id) else {
        return respond_text(ctx, command, NOTHING_PLAYING, true).await;
    };

    {
        let q = queue.lock();
        if let Some(handle) = &q.current {
            let _ = handle.pause();
        }
    }

    respond_text(ctx, command, "⏸️ Pausada", false).await
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(queue) = bot.registry.get(guild_id) else {
        return respond_text(ctx, command, NOTHING_PLAYING, true).await;
    };

    {
        let q = queue.lock();
        if let Some(handle) = &q.current {
            let _ = handle.play();
        }
    }

    respond_text(ctx, command, "▶️ Reanudada", false).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(queue) = bot.registry.get(guild_id) else {
        return respond_text(ctx, command, NOTHING_PLAYING, true).await;
    };

    {
        queue.lock().tracks.clear();
    }
    bot.driver.teardown(guild_id, None).await;

    respond_text(ctx, command, "⏹️ Detenida", false).await
}

async fn handle_loop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(queue) = bot.registry.get(guild_id) else {
        return respond_text(ctx, command, NOTHING_PLAYING, true).await;
    };

    let Some(mode) =
        string_option(&command.data.options, "mode").and_then(LoopMode::from_option_value)
    else {
        return respond_text(ctx, command, "❌ Argumentos inválidos", true).await;
    };

    queue.lock().tracks.set_loop_mode(mode);

    respond_text(
        ctx,
        command,
        &format!("🔁 Modo de repetición: **{}**", mode.as_str()),
        false,
    )
    .await
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(queue) = bot.registry.get(guild_id) else {
        return respond_text(ctx, command, NOTHING_PLAYING, true).await;
    };

    let view = queue.lock().tracks.view(embeds::UPCOMING_PREVIEW);
    let Some(view) = view else {
        return respond_text(ctx, command, NOTHING_PLAYING, true).await;
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embeds::queue_embed(&view)),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

async fn respond_text(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;

    Ok(())
}

async fn edit_text(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

/// Valor de una opción de texto del comando, si está presente.
fn string_option<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_names_map_to_variants() {
        assert_eq!(BotCommand::from_name("play"), Some(BotCommand::Play));
        assert_eq!(BotCommand::from_name("skip"), Some(BotCommand::Skip));
        assert_eq!(BotCommand::from_name("pause"), Some(BotCommand::Pause));
        assert_eq!(BotCommand::from_name("resume"), Some(BotCommand::Resume));
        assert_eq!(BotCommand::from_name("stop"), Some(BotCommand::Stop));
        assert_eq!(BotCommand::from_name("loop"), Some(BotCommand::Loop));
        assert_eq!(BotCommand::from_name("queue"), Some(BotCommand::Queue));
        assert_eq!(BotCommand::from_name("volume"), None);
    }

    fn options_from_json(raw: &str) -> Vec<CommandDataOption> {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn string_option_reads_named_value() {
        let options =
            options_from_json(r#"[{"name":"query","type":3,"value":"nirvana come as you are"}]"#);
        assert_eq!(string_option(&options, "query"), Some("nirvana come as you are"));
    }

    #[test]
    fn missing_or_mistyped_option_yields_none() {
        // Un payload sin la opción requerida no debe derivar en un error
        // propagado que deje la interacción sin respuesta
        assert_eq!(string_option(&[], "query"), None);

        let options = options_from_json(r#"[{"name":"mode","type":4,"value":3}]"#);
        assert_eq!(string_option(&options, "mode"), None);
        assert_eq!(string_option(&options, "query"), None);
    }
}
