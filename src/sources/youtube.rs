use anyhow::{Context, Result};
use async_process::Command;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Metadata mínima de un track resuelta por yt-dlp.
#[derive(Debug, Clone)]
pub struct TrackMetadata {
    pub title: String,
    pub url: String,
    pub duration: Option<Duration>,
}

/// Cliente para interactuar con YouTube vía yt-dlp.
pub struct YouTubeClient {
    // Limitar requests concurrentes para evitar rate limiting
    rate_limiter: tokio::sync::Semaphore,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    webpage_url: String,
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            rate_limiter: tokio::sync::Semaphore::new(3),
        }
    }

    /// Obtiene metadata de una URL de YouTube.
    pub async fn get_info(&self, url: &str) -> Result<TrackMetadata> {
        let _permit = self.rate_limiter.acquire().await?;

        debug!("📊 Obteniendo info de: {}", url);

        let output = Command::new("yt-dlp")
            .args(["--no-playlist", "--dump-json", "--no-warnings", url])
            .output()
            .await
            .context("Error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info: YtDlpInfo =
            serde_json::from_str(&stdout).context("Error al parsear respuesta de yt-dlp")?;

        Ok(info.into())
    }

    /// Busca en YouTube y devuelve el primer resultado, si hay alguno.
    pub async fn search_one(&self, query: &str) -> Result<Option<TrackMetadata>> {
        let _permit = self.rate_limiter.acquire().await?;

        info!("🔍 Buscando en YouTube: {}", query);

        let search_query = format!("ytsearch1:{}", query);

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "--no-warnings",
                search_query.as_str(),
            ])
            .output()
            .await
            .context("Error al ejecutar yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let first = stdout
            .lines()
            .find_map(|line| serde_json::from_str::<YtDlpInfo>(line).ok());

        Ok(first.map(Into::into))
    }

    /// Verifica si una URL es de YouTube.
    pub fn is_youtube_url(url: &str) -> bool {
        let youtube_regex = Regex::new(
            r"^(https?://)?(www\.)?(youtube\.com/(watch\?v=|embed/|v/)|youtu\.be/|music\.youtube\.com/)",
        )
        .expect("regex de YouTube inválida");

        youtube_regex.is_match(url)
    }
}

impl From<YtDlpInfo> for TrackMetadata {
    fn from(info: YtDlpInfo) -> Self {
        Self {
            title: info.title,
            url: info.webpage_url,
            duration: info.duration.map(Duration::from_secs_f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YouTubeClient::is_youtube_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YouTubeClient::is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(YouTubeClient::is_youtube_url(
            "https://music.youtube.com/watch?v=test"
        ));
        assert!(!YouTubeClient::is_youtube_url("https://example.com/video"));
        assert!(!YouTubeClient::is_youtube_url("una búsqueda cualquiera"));
    }

    #[test]
    fn test_ytdlp_info_to_metadata() {
        let info: YtDlpInfo = serde_json::from_str(
            r#"{"title":"Prueba","duration":213.0,"webpage_url":"https://www.youtube.com/watch?v=abc"}"#,
        )
        .unwrap();
        let meta = TrackMetadata::from(info);

        assert_eq!(meta.title, "Prueba");
        assert_eq!(meta.duration, Some(Duration::from_secs(213)));
        assert_eq!(meta.url, "https://www.youtube.com/watch?v=abc");
    }
}
