use anyhow::Result;
use serenity::model::id::UserId;
use std::{collections::VecDeque, time::Duration};
use tracing::info;

/// Una canción lista para reproducir. Inmutable una vez agregada:
/// la URL nunca se vuelve a resolver mientras viva en la cola.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub title: String,
    pub url: String,
    pub duration: Option<Duration>,
    pub requested_by: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Off,
    Song,
    Queue,
}

impl LoopMode {
    pub fn from_option_value(value: &str) -> Option<Self> {
        match value {
            "off" => Some(Self::Off),
            "song" => Some(Self::Song),
            "queue" => Some(Self::Queue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Song => "song",
            Self::Queue => "queue",
        }
    }
}

/// Resultado de avanzar la cola tras terminar un track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Hay un nuevo head en `pending`; hay que arrancarlo.
    Continue,
    /// La cola se agotó; corresponde liberar la sesión de voz.
    Finished,
}

/// Cola de reproducción de una guild.
///
/// `pending[0]` es siempre la canción que está sonando (o a punto de sonar).
/// `history` guarda todas las canciones agregadas y solo se usa para
/// reconstruir `pending` cuando el loop de cola da la vuelta completa.
#[derive(Debug)]
pub struct TrackQueue {
    pending: VecDeque<Song>,
    history: Vec<Song>,
    loop_mode: LoopMode,
    max_size: usize,
}

impl TrackQueue {
    pub fn new(first: Song, max_size: usize) -> Self {
        Self {
            pending: VecDeque::from([first.clone()]),
            history: vec![first],
            loop_mode: LoopMode::Off,
            max_size,
        }
    }

    /// Agrega una canción al final de la cola y al historial.
    pub fn push(&mut self, song: Song) -> Result<()> {
        if self.pending.len() >= self.max_size {
            anyhow::bail!("La cola está llena (máximo {} canciones)", self.max_size);
        }

        info!("➕ Agregado a la cola: {}", song.title);
        self.pending.push_back(song.clone());
        self.history.push(song);
        Ok(())
    }

    /// La canción en reproducción (head de `pending`).
    pub fn current(&self) -> Option<&Song> {
        self.pending.front()
    }

    /// Canciones que esperan turno, sin contar la actual.
    pub fn upcoming(&self) -> impl Iterator<Item = &Song> {
        self.pending.iter().skip(1)
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        match mode {
            LoopMode::Off => info!("➡️ Repetición desactivada"),
            LoopMode::Song => info!("🔂 Repetir canción activado"),
            LoopMode::Queue => info!("🔁 Repetir cola activado"),
        }
    }

    /// Vacía `pending`. El historial se conserva hasta el teardown.
    pub fn clear(&mut self) {
        self.pending.clear();
        info!("🗑️ Cola limpiada");
    }

    /// Instantánea de la canción actual y las próximas `limit`, para
    /// renderizar el embed sin retener el lock de la guild.
    pub fn view(&self, limit: usize) -> Option<QueueView> {
        let current = self.current()?.clone();
        let upcoming = self.upcoming().take(limit).cloned().collect();
        Some(QueueView { current, upcoming })
    }

    /// Avanza la cola tras una señal de fin de track.
    ///
    /// `forced` marca un `/skip`: la canción actual se descarta este paso
    /// sin importar el modo de loop. Con fin natural:
    /// - `Song`: el head no se mueve y vuelve a sonar.
    /// - `Queue`: el head recién terminado rota al final de la cola.
    /// - `Off`: el head se elimina definitivamente.
    ///
    /// Si `pending` queda vacía y el loop de cola está activo, se rellena
    /// con una copia del historial en el mismo orden.
    pub fn advance(&mut self, forced: bool) -> Advance {
        match self.loop_mode {
            LoopMode::Song if !forced => {
                if let Some(current) = self.pending.front() {
                    info!("🔂 Repitiendo track: {}", current.title);
                }
            }
            LoopMode::Queue if !forced => {
                // Rotación con el head previo a la mutación
                if let Some(finished) = self.pending.pop_front() {
                    info!("🔁 Rotando al final de la cola: {}", finished.title);
                    self.pending.push_back(finished);
                }
            }
            _ => {
                if let Some(finished) = self.pending.pop_front() {
                    info!("➡️ Track terminado y descartado: {}", finished.title);
                }
            }
        }

        if self.pending.is_empty() {
            if self.loop_mode == LoopMode::Queue && !self.history.is_empty() {
                info!("🔁 Cola agotada, rellenando desde el historial");
                self.pending = self.history.iter().cloned().collect();
            } else {
                info!("📭 Cola agotada");
                return Advance::Finished;
            }
        }

        Advance::Continue
    }
}

/// Instantánea de la cola para presentación.
#[derive(Debug, Clone)]
pub struct QueueView {
    pub current: Song,
    pub upcoming: Vec<Song>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn song(title: &str) -> Song {
        Song {
            title: title.to_string(),
            url: format!("https://www.youtube.com/watch?v={}", title),
            duration: Some(Duration::from_secs(180)),
            requested_by: UserId::new(42),
        }
    }

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue.pending.iter().map(|s| s.title.clone()).collect()
    }

    #[test]
    fn push_preserves_call_order() {
        let mut queue = TrackQueue::new(song("a"), 100);
        queue.push(song("b")).unwrap();
        queue.push(song("c")).unwrap();

        assert_eq!(titles(&queue), vec!["a", "b", "c"]);
        assert_eq!(queue.current().unwrap().title, "a");
        assert_eq!(
            queue.upcoming().map(|s| s.title.as_str()).collect::<Vec<_>>(),
            vec!["b", "c"]
        );
    }

    #[test]
    fn push_rejects_when_full() {
        let mut queue = TrackQueue::new(song("a"), 2);
        queue.push(song("b")).unwrap();
        assert!(queue.push(song("c")).is_err());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn advance_off_removes_head() {
        let mut queue = TrackQueue::new(song("a"), 100);
        queue.push(song("b")).unwrap();
        queue.push(song("c")).unwrap();

        assert_eq!(queue.advance(false), Advance::Continue);
        assert_eq!(titles(&queue), vec!["b", "c"]);
    }

    #[test]
    fn advance_song_replays_head() {
        let mut queue = TrackQueue::new(song("a"), 100);
        queue.push(song("b")).unwrap();
        queue.set_loop_mode(LoopMode::Song);

        assert_eq!(queue.advance(false), Advance::Continue);
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn advance_queue_rotates_head_to_tail() {
        let mut queue = TrackQueue::new(song("a"), 100);
        queue.push(song("b")).unwrap();
        queue.push(song("c")).unwrap();
        queue.set_loop_mode(LoopMode::Queue);

        assert_eq!(queue.advance(false), Advance::Continue);
        assert_eq!(titles(&queue), vec!["b", "c", "a"]);
    }

    #[test]
    fn queue_loop_cycles_without_touching_history() {
        let mut queue = TrackQueue::new(song("a"), 100);
        queue.push(song("b")).unwrap();
        queue.set_loop_mode(LoopMode::Queue);

        queue.advance(false);
        assert_eq!(titles(&queue), vec!["b", "a"]);
        queue.advance(false);
        assert_eq!(titles(&queue), vec!["a", "b"]);

        let history: Vec<_> = queue.history.iter().map(|s| s.title.clone()).collect();
        assert_eq!(history, vec!["a", "b"]);
    }

    #[test]
    fn queue_loop_refills_from_history_after_forced_advance() {
        let mut queue = TrackQueue::new(song("a"), 100);
        queue.push(song("b")).unwrap();
        queue.set_loop_mode(LoopMode::Queue);

        // Dos skips vacían pending; el loop de cola la reconstruye verbatim
        assert_eq!(queue.advance(true), Advance::Continue);
        assert_eq!(titles(&queue), vec!["b"]);
        assert_eq!(queue.advance(true), Advance::Continue);
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn advance_finishes_when_exhausted_without_queue_loop() {
        let mut queue = TrackQueue::new(song("a"), 100);
        assert_eq!(queue.advance(false), Advance::Finished);
        assert!(queue.is_empty());
    }

    #[test]
    fn forced_advance_discards_head_even_in_song_loop() {
        let mut queue = TrackQueue::new(song("a"), 100);
        queue.push(song("b")).unwrap();
        queue.set_loop_mode(LoopMode::Song);

        assert_eq!(queue.advance(true), Advance::Continue);
        assert_eq!(titles(&queue), vec!["b"]);
    }

    #[test]
    fn play_then_finish_scenario() {
        // play(song1) → play(song2) → fin natural → fin natural → cola agotada
        let mut queue = TrackQueue::new(song("song1"), 100);
        queue.push(song("song2")).unwrap();

        assert_eq!(queue.advance(false), Advance::Continue);
        assert_eq!(queue.current().unwrap().title, "song2");
        assert_eq!(queue.advance(false), Advance::Finished);
    }

    #[test]
    fn loop_mode_option_values_round_trip() {
        for mode in [LoopMode::Off, LoopMode::Song, LoopMode::Queue] {
            assert_eq!(LoopMode::from_option_value(mode.as_str()), Some(mode));
        }
        assert_eq!(LoopMode::from_option_value("track"), None);
    }
}
