use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::{
    http::Http,
    model::id::{ChannelId, GuildId},
};
use songbird::tracks::TrackHandle;
use std::sync::Arc;
use tracing::info;

use crate::audio::queue::{Song, TrackQueue};

/// Estado mutable de una guild con sesión de voz activa.
///
/// Existe en el registro si y solo si el bot mantiene (o está estableciendo)
/// una conexión de voz en esa guild. Toda mutación ocurre dentro de un scope
/// sincrónico del mutex que lo envuelve; los awaits quedan siempre afuera.
pub struct GuildQueue {
    pub tracks: TrackQueue,
    /// Canal de texto al que se envían los embeds de estado
    pub notify_channel: ChannelId,
    /// Canal de voz donde reside el bot, para decidir relocalizaciones
    pub voice_channel: ChannelId,
    pub http: Arc<Http>,
    /// Handle del track sonando en songbird
    pub current: Option<TrackHandle>,
    /// Marcado por `/skip`: el próximo fin de track descarta la canción
    /// sin importar el modo de loop
    pub skip_pending: bool,
    /// Marcada dentro de la misma región crítica que retira la cola del
    /// registro. Quien todavía tenga el `Arc` no debe agregar canciones:
    /// irían a parar a una cola huérfana
    pub released: bool,
}

impl GuildQueue {
    pub fn new(
        first: Song,
        notify_channel: ChannelId,
        voice_channel: ChannelId,
        http: Arc<Http>,
        max_size: usize,
    ) -> Self {
        Self {
            tracks: TrackQueue::new(first, max_size),
            notify_channel,
            voice_channel,
            http,
            current: None,
            skip_pending: false,
            released: false,
        }
    }
}

/// Registro proceso-global de colas por guild.
///
/// Dos `/play` concurrentes en la misma guild nunca crean dos colas: el
/// perdedor de la carrera de `get_or_create` observa la cola del ganador
/// y agrega su canción ahí.
pub struct QueueRegistry {
    guilds: DashMap<GuildId, Arc<Mutex<GuildQueue>>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self {
            guilds: DashMap::new(),
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Mutex<GuildQueue>>> {
        self.guilds.get(&guild_id).map(|q| q.clone())
    }

    /// Devuelve la cola de la guild, creándola si no existe.
    /// El booleano indica si esta llamada fue la que la creó.
    pub fn get_or_create(
        &self,
        guild_id: GuildId,
        make: impl FnOnce() -> GuildQueue,
    ) -> (Arc<Mutex<GuildQueue>>, bool) {
        let mut created = false;
        let queue = self
            .guilds
            .entry(guild_id)
            .or_insert_with(|| {
                created = true;
                info!("🆕 Cola creada para guild {}", guild_id);
                Arc::new(Mutex::new(make()))
            })
            .clone();
        (queue, created)
    }

    /// Retira la cola de la guild, marcándola como liberada dentro de la
    /// misma región crítica que la saca del mapa. Un `/play` que conserve
    /// el `Arc` observa `released` bajo el mismo mutex y reintenta en vez
    /// de agregar a una cola huérfana.
    pub fn detach(&self, guild_id: GuildId) -> Option<Arc<Mutex<GuildQueue>>> {
        let queue = self.get(guild_id)?;
        {
            let mut q = queue.lock();
            q.released = true;
            self.guilds.remove(&guild_id);
        }
        info!("🗑️ Cola eliminada para guild {}", guild_id);
        Some(queue)
    }

    /// Variante para el fin natural de la cola: retira solo si `pending`
    /// sigue vacía. La verificación del head y el retiro del registro son
    /// una sola región crítica, así un `/play` que llegó entre la señal de
    /// fin y el desmontaje gana y la cola sigue registrada.
    pub fn detach_if_drained(&self, guild_id: GuildId, queue: &Arc<Mutex<GuildQueue>>) -> bool {
        let mut q = queue.lock();
        if q.tracks.current().is_some() {
            return false;
        }
        q.released = true;
        self.guilds.remove(&guild_id);
        info!("🗑️ Cola eliminada para guild {}", guild_id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::queue::Advance;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::time::Duration;

    fn sample_song(title: &str) -> Song {
        Song {
            title: title.to_string(),
            url: "https://www.youtube.com/watch?v=abc123".to_string(),
            duration: Some(Duration::from_secs(120)),
            requested_by: UserId::new(7),
        }
    }

    fn sample_queue() -> GuildQueue {
        GuildQueue::new(
            sample_song("prueba"),
            ChannelId::new(10),
            ChannelId::new(20),
            Arc::new(Http::new("")),
            100,
        )
    }

    #[test]
    fn second_create_observes_first_queue() {
        let registry = QueueRegistry::new();
        let guild = GuildId::new(1);

        let (first, created_first) = registry.get_or_create(guild, sample_queue);
        let (second, created_second) = registry.get_or_create(guild, sample_queue);

        assert!(created_first);
        assert!(!created_second);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn detach_makes_guild_report_nothing_playing() {
        let registry = QueueRegistry::new();
        let guild = GuildId::new(1);

        registry.get_or_create(guild, sample_queue);
        assert!(registry.get(guild).is_some());

        let queue = registry.detach(guild).unwrap();
        assert!(registry.get(guild).is_none());
        assert!(queue.lock().released);
        // Un segundo detach es inocuo
        assert!(registry.detach(guild).is_none());
    }

    #[test]
    fn song_arriving_in_drain_window_keeps_queue_registered() {
        // Interleaving fin-de-track vs /play: la cola queda vacía, pero
        // otra reacción agrega una canción antes de que el desmontaje
        // retire la entrada del registro. La canción agregada debe sonar.
        let registry = QueueRegistry::new();
        let guild = GuildId::new(1);
        let (queue, _) = registry.get_or_create(guild, sample_queue);

        let advance = queue.lock().tracks.advance(false);
        assert_eq!(advance, Advance::Finished);

        // El /play concurrente gana la ventana
        queue.lock().tracks.push(sample_song("rescatada")).unwrap();

        assert!(!registry.detach_if_drained(guild, &queue));
        let registered = registry.get(guild).unwrap();
        assert!(Arc::ptr_eq(&registered, &queue));
        assert!(!queue.lock().released);
        assert_eq!(queue.lock().tracks.current().unwrap().title, "rescatada");
    }

    #[test]
    fn drained_queue_without_late_arrivals_is_detached() {
        let registry = QueueRegistry::new();
        let guild = GuildId::new(1);
        let (queue, _) = registry.get_or_create(guild, sample_queue);

        assert_eq!(queue.lock().tracks.advance(false), Advance::Finished);

        assert!(registry.detach_if_drained(guild, &queue));
        assert!(registry.get(guild).is_none());
        assert!(queue.lock().released);
    }
}
