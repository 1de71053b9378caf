use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

/// Los seis comandos públicos del bot. Nombres y formas de opciones son
/// parte de la interfaz estable: no cambiarlos sin migración.
fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        skip_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        loop_command(),
        queue_command(),
    ]
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción de YouTube o Spotify")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL de YouTube, enlace de Spotify o término de búsqueda",
            )
            .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta la canción actual")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la canción")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la canción")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la música y desconecta el bot")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Configura el modo de repetición")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "mode", "off, song o queue")
                .add_string_choice("Off", "off")
                .add_string_choice("Song", "song")
                .add_string_choice("Queue", "queue")
                .required(true),
        )
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola actual")
}
