//! Implementación del bot de Discord.
//!
//! [`RitmoBot`] implementa el [`EventHandler`] de serenity y conecta las
//! tres piezas del sistema: el registro de colas por guild, el driver de
//! reproducción y el resolutor de canciones. También aloja el monitor de
//! residencia: cuando un usuario se mueve de canal de voz, el bot lo sigue
//! si tiene permisos, conservando la cola intacta.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Permissions, Ready, VoiceState},
    async_trait,
};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{driver::PlaybackDriver, registry::QueueRegistry},
    config::Config,
    sources::Resolver,
};

pub struct RitmoBot {
    pub config: Arc<Config>,
    /// Registro proceso-global guild → cola, inyectado al driver y a los
    /// handlers; nunca se accede como estado global ambiente
    pub registry: Arc<QueueRegistry>,
    pub driver: PlaybackDriver,
    pub resolver: Resolver,
}

impl RitmoBot {
    pub fn new(config: Config, songbird: Arc<Songbird>) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(QueueRegistry::new());
        let driver = PlaybackDriver::new(registry.clone(), songbird, config.clone());

        Self {
            config,
            registry,
            driver,
            resolver: Resolver::new(),
        }
    }

    /// Registra los comandos slash, globales o por guild según configuración.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("🌐 Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for RitmoBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Monitor de residencia de voz.
    ///
    /// - El propio bot desconectado externamente: limpiar el estado de la
    ///   guild, equivalente a un `/stop` sin aviso.
    /// - Un usuario se mueve entre dos canales: si la guild tiene cola y el
    ///   destino difiere del canal del bot, relocalizar la sesión al nuevo
    ///   canal (misma cola, mismo player) si hay permisos de Conectar y
    ///   Hablar. Entradas a voz desde cero y salidas completas se ignoran.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let bot_id = ctx.cache.current_user().id;

        if new.user_id == bot_id {
            match new.channel_id {
                // Desconexión externa del bot: limpiar el estado local
                None => {
                    if old.is_some() && self.registry.get(guild_id).is_some() {
                        self.driver.handle_disconnect(guild_id).await;
                    }
                }
                // Un admin arrastró al bot (o es el eco de un join propio):
                // reflejar el canal real para que las comparaciones de
                // relocalización no usen uno viejo
                Some(channel_id) => {
                    record_bot_channel(&self.registry, guild_id, channel_id);
                }
            }
            return;
        }

        let (Some(_), Some(destination)) = (old.and_then(|o| o.channel_id), new.channel_id) else {
            return;
        };

        let Some(queue) = self.registry.get(guild_id) else {
            return;
        };

        let current = { queue.lock().voice_channel };
        if current == destination {
            return;
        }

        if !bot_has_voice_access(&ctx, guild_id, destination) {
            debug!(
                "Sin permisos para seguir al usuario al canal {} en guild {}",
                destination, guild_id
            );
            return;
        }

        match self.driver.songbird().join(guild_id, destination).await {
            Ok(_) => {
                queue.lock().voice_channel = destination;
                info!("🚚 Sesión de voz movida al canal {} en guild {}", destination, guild_id);
            }
            Err(e) => warn!(
                "No se pudo relocalizar la sesión de voz en guild {}: {:?}",
                guild_id, e
            ),
        }
    }
}

/// Registra el canal de voz donde realmente reside el bot.
fn record_bot_channel(registry: &QueueRegistry, guild_id: GuildId, channel_id: ChannelId) {
    let Some(queue) = registry.get(guild_id) else {
        return;
    };

    let mut q = queue.lock();
    if q.voice_channel != channel_id {
        info!("🚚 El bot fue movido al canal {} en guild {}", channel_id, guild_id);
        q.voice_channel = channel_id;
    }
}

/// Verifica por caché que el bot pueda Conectar y Hablar en el canal.
pub(crate) fn bot_has_voice_access(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> bool {
    let bot_id = ctx.cache.current_user().id;

    let Some(guild) = ctx.cache.guild(guild_id) else {
        return false;
    };

    let Some(member) = guild.members.get(&bot_id) else {
        // Sin el member en caché no hay forma de calcular permisos;
        // el join posterior reporta la falta de permisos por sí solo
        return true;
    };

    let Some(channel) = guild.channels.get(&channel_id) else {
        return false;
    };

    guild
        .user_permissions_in(channel, member)
        .contains(Permissions::CONNECT | Permissions::SPEAK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{queue::Song, registry::GuildQueue};
    use pretty_assertions::assert_eq;
    use serenity::{http::Http, model::id::UserId};
    use std::time::Duration;

    fn queue_in_channel(voice_channel: ChannelId) -> GuildQueue {
        let song = Song {
            title: "prueba".to_string(),
            url: "https://www.youtube.com/watch?v=abc123".to_string(),
            duration: Some(Duration::from_secs(120)),
            requested_by: UserId::new(7),
        };
        GuildQueue::new(song, ChannelId::new(10), voice_channel, Arc::new(Http::new("")), 100)
    }

    #[test]
    fn dragging_the_bot_updates_its_tracked_channel() {
        let registry = QueueRegistry::new();
        let guild = GuildId::new(1);
        let (queue, _) = registry.get_or_create(guild, || queue_in_channel(ChannelId::new(20)));

        // Un admin mueve al bot a otro canal
        record_bot_channel(&registry, guild, ChannelId::new(30));
        assert_eq!(queue.lock().voice_channel, ChannelId::new(30));

        // El eco del propio join no cambia nada
        record_bot_channel(&registry, guild, ChannelId::new(30));
        assert_eq!(queue.lock().voice_channel, ChannelId::new(30));
    }

    #[test]
    fn bot_moves_without_queue_are_ignored() {
        let registry = QueueRegistry::new();
        record_bot_channel(&registry, GuildId::new(1), ChannelId::new(30));
        assert!(registry.get(GuildId::new(1)).is_none());
    }
}
