pub mod spotify;
pub mod youtube;

use serenity::model::id::UserId;
use thiserror::Error;
use tracing::info;

pub use spotify::SpotifyClient;
pub use youtube::YouTubeClient;

use crate::audio::queue::Song;

/// Fallas del resolutor, separadas para que el handler de `/play` pueda
/// responder distinto en cada caso. Ninguna deja estado a medias: la canción
/// se agrega a la cola recién después de una resolución completa.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// El enlace de catálogo (Spotify) no se pudo traducir a una búsqueda
    #[error("no se pudo traducir el enlace de catálogo: {0}")]
    CatalogLookup(anyhow::Error),
    /// La búsqueda no devolvió ningún resultado
    #[error("sin resultados para la búsqueda")]
    NoResults,
    /// yt-dlp o la red fallaron al obtener metadata del track
    #[error("error al obtener el track: {0}")]
    TrackFetch(anyhow::Error),
}

impl ResolveError {
    /// Mensaje para el usuario que pidió la canción.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::CatalogLookup(_) => "❌ No se pudo leer el enlace de Spotify",
            Self::NoResults => "🔍 No se encontraron resultados",
            Self::TrackFetch(_) => "❌ Error al obtener este track",
        }
    }
}

/// Traduce el texto libre de `/play` en una canción reproducible:
/// enlace de Spotify → términos de búsqueda, URL de YouTube → metadata
/// directa, cualquier otra cosa → búsqueda en YouTube.
pub struct Resolver {
    youtube: YouTubeClient,
    spotify: SpotifyClient,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            youtube: YouTubeClient::new(),
            spotify: SpotifyClient::new(),
        }
    }

    pub async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Song, ResolveError> {
        let query = if SpotifyClient::is_spotify_url(query) {
            let terms = self
                .spotify
                .search_terms(query)
                .await
                .map_err(ResolveError::CatalogLookup)?;
            info!("🎧 Enlace de Spotify traducido a búsqueda: {}", terms);
            terms
        } else {
            query.to_string()
        };

        let meta = if YouTubeClient::is_youtube_url(&query) {
            self.youtube
                .get_info(&query)
                .await
                .map_err(ResolveError::TrackFetch)?
        } else {
            self.youtube
                .search_one(&query)
                .await
                .map_err(ResolveError::TrackFetch)?
                .ok_or(ResolveError::NoResults)?
        };

        Ok(Song {
            title: meta.title,
            url: meta.url,
            duration: meta.duration,
            requested_by,
        })
    }
}
