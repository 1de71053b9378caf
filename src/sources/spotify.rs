use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

/// Cliente para traducir enlaces de Spotify a términos de búsqueda.
///
/// No reproduce desde Spotify: usa el endpoint público de oEmbed para
/// recuperar título y artista del enlace y buscar ese texto en YouTube.
pub struct SpotifyClient {
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OembedInfo {
    title: String,
    author_name: Option<String>,
}

impl SpotifyClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub fn is_spotify_url(url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_owned))
            .is_some_and(|host| host == "open.spotify.com" || host.ends_with(".spotify.com"))
    }

    /// Traduce un enlace de Spotify en términos de búsqueda ("título artista").
    pub async fn search_terms(&self, link: &str) -> Result<String> {
        let response = self
            .http
            .get("https://open.spotify.com/oembed")
            .query(&[("url", link)])
            .send()
            .await
            .context("Error al consultar oEmbed de Spotify")?
            .error_for_status()
            .context("oEmbed de Spotify respondió con error")?;

        let info: OembedInfo = response
            .json()
            .await
            .context("Error al parsear respuesta de oEmbed")?;

        Ok(match info.author_name {
            Some(artist) => format!("{} {}", info.title, artist),
            None => info.title,
        })
    }
}
