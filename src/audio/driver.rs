use anyhow::Result;
use parking_lot::Mutex;
use serenity::{builder::CreateMessage, model::id::GuildId};
use songbird::{
    input::YoutubeDl, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        queue::Advance,
        registry::{GuildQueue, QueueRegistry},
    },
    config::Config,
    ui::embeds,
};

/// Máquina de transiciones de reproducción.
///
/// Arranca el head de la cola de una guild y se rearma con la señal de fin
/// de cada track: cada recurso reproducido registra sus propios handlers de
/// `End` y `Error`, de modo que la señal dispara exactamente una vez por
/// track y el ciclo continúa hasta agotar la cola o un `/stop`.
pub struct PlaybackDriver {
    registry: Arc<QueueRegistry>,
    songbird: Arc<Songbird>,
    config: Arc<Config>,
    http_client: reqwest::Client,
}

impl Clone for PlaybackDriver {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            songbird: self.songbird.clone(),
            config: self.config.clone(),
            http_client: self.http_client.clone(),
        }
    }
}

impl PlaybackDriver {
    pub fn new(registry: Arc<QueueRegistry>, songbird: Arc<Songbird>, config: Arc<Config>) -> Self {
        Self {
            registry,
            songbird,
            config,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn songbird(&self) -> &Arc<Songbird> {
        &self.songbird
    }

    /// Arranca la reproducción del head de `pending` en la guild.
    ///
    /// Cada arranque exitoso envía el embed de estado al canal de texto
    /// asociado a la cola.
    pub async fn start(&self, guild_id: GuildId) -> Result<()> {
        let Some(queue) = self.registry.get(guild_id) else {
            return Ok(());
        };

        let (song, notify_channel, http) = {
            let q = queue.lock();
            match q.tracks.current() {
                Some(song) => (song.clone(), q.notify_channel, q.http.clone()),
                None => return Ok(()),
            }
        };

        let call = self
            .songbird
            .get(guild_id)
            .ok_or_else(|| anyhow::anyhow!("Sin sesión de voz para guild {}", guild_id))?;

        info!("🎵 Reproduciendo: {} en guild {}", song.title, guild_id);

        // Input perezoso: songbird recién resuelve el stream al reproducir
        let input = YoutubeDl::new(self.http_client.clone(), song.url.clone());
        let handle = {
            let mut call = call.lock().await;
            call.play_input(input.into())
        };
        let _ = handle.set_volume(self.config.default_volume);

        handle
            .add_event(
                Event::Track(TrackEvent::End),
                SongEndHandler {
                    driver: self.clone(),
                    guild_id,
                },
            )
            .map_err(|e| anyhow::anyhow!("Error al registrar handler de fin: {}", e))?;

        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                SongErrorHandler {
                    driver: self.clone(),
                    guild_id,
                },
            )
            .map_err(|e| anyhow::anyhow!("Error al registrar handler de error: {}", e))?;

        let view = {
            let mut q = queue.lock();
            q.current = Some(handle);
            // Un skip pedido mientras no sonaba nada queda sin efecto
            q.skip_pending = false;
            q.tracks.view(embeds::UPCOMING_PREVIEW)
        };

        if let Some(view) = view {
            let message = CreateMessage::new().embed(embeds::queue_embed(&view));
            if let Err(e) = notify_channel.send_message(&http, message).await {
                warn!("No se pudo enviar la notificación de reproducción: {:?}", e);
            }
        }

        Ok(())
    }

    /// Señal de fin del track actual: avanza la cola según el modo de loop
    /// y arranca el siguiente head, o libera la sesión si no queda nada.
    async fn on_track_end(&self, guild_id: GuildId) {
        let Some(queue) = self.registry.get(guild_id) else {
            // La cola fue desmontada (p. ej. /stop) mientras el track moría
            debug!("Fin de track en guild {} sin cola activa", guild_id);
            return;
        };

        let advance = {
            let mut q = queue.lock();
            let forced = std::mem::take(&mut q.skip_pending);
            q.current = None;
            q.tracks.advance(forced)
        };

        match advance {
            Advance::Continue => {
                if let Err(e) = self.start(guild_id).await {
                    error!(
                        "Error al arrancar el siguiente track en guild {}: {:?}",
                        guild_id, e
                    );
                    self.teardown(guild_id, Some("⚠️ Error de reproducción. Saliendo del canal de voz."))
                        .await;
                }
            }
            Advance::Finished => {
                // El retiro del registro re-verifica el head en la misma
                // región crítica: un /play que llegó entre la señal de fin
                // y este punto gana y la cola sigue
                if self.registry.detach_if_drained(guild_id, &queue) {
                    self.release_session(
                        guild_id,
                        Some(&queue),
                        Some("📭 Cola terminada. Saliendo del canal de voz."),
                    )
                    .await;
                } else if let Err(e) = self.start(guild_id).await {
                    error!(
                        "Error al arrancar el track llegado durante el cierre en guild {}: {:?}",
                        guild_id, e
                    );
                    self.teardown(guild_id, Some("⚠️ Error de reproducción. Saliendo del canal de voz."))
                        .await;
                }
            }
        }
    }

    /// Falla de transporte o del stream: equivale a un `/stop`.
    async fn on_track_error(&self, guild_id: GuildId) {
        error!("❌ Falla de reproducción en guild {}, liberando sesión", guild_id);
        self.teardown(guild_id, Some("⚠️ Error de reproducción. Saliendo del canal de voz."))
            .await;
    }

    /// Desmonta la cola de la guild: detiene el track actual, elimina la
    /// entrada del registro y libera la sesión de voz.
    pub async fn teardown(&self, guild_id: GuildId, notice: Option<&str>) {
        let queue = self.registry.detach(guild_id);
        self.release_session(guild_id, queue.as_ref(), notice).await;
    }

    /// Libera la sesión de voz de una cola ya retirada del registro.
    async fn release_session(
        &self,
        guild_id: GuildId,
        queue: Option<&Arc<Mutex<GuildQueue>>>,
        notice: Option<&str>,
    ) {
        if let Err(e) = self.songbird.remove(guild_id).await {
            debug!("La sesión de voz de guild {} ya estaba liberada: {:?}", guild_id, e);
        }

        if let Some(queue) = queue {
            let (notify_channel, http, handle) = {
                let mut q = queue.lock();
                (q.notify_channel, q.http.clone(), q.current.take())
            };

            if let Some(handle) = handle {
                let _ = handle.stop();
            }

            if let Some(notice) = notice {
                if let Err(e) = notify_channel.say(&http, notice).await {
                    warn!("No se pudo avisar el fin de la cola: {:?}", e);
                }
            }
        }

        info!("👋 Sesión de voz liberada en guild {}", guild_id);
    }

    /// El bot fue desconectado externamente del canal de voz: la sesión ya
    /// no existe, solo queda limpiar el estado local.
    pub async fn handle_disconnect(&self, guild_id: GuildId) {
        info!("🔌 Bot desconectado en guild {}", guild_id);
        self.teardown(guild_id, None).await;
    }
}

/// Señal de fin de un recurso reproducido; una por track.
struct SongEndHandler {
    driver: PlaybackDriver,
    guild_id: GuildId,
}

#[async_trait::async_trait]
impl VoiceEventHandler for SongEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.driver.on_track_end(self.guild_id).await;
        None
    }
}

struct SongErrorHandler {
    driver: PlaybackDriver,
    guild_id: GuildId,
}

#[async_trait::async_trait]
impl VoiceEventHandler for SongErrorHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.driver.on_track_error(self.guild_id).await;
        None
    }
}
