use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::fmt::Write as _;
use std::time::Duration;
use url::Url;

use crate::audio::queue::{QueueView, Song};

/// Cantidad máxima de canciones próximas en el resumen de la cola.
pub const UPCOMING_PREVIEW: usize = 10;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Ritmo Bot";

/// Embed con la canción actual y las próximas de la cola.
pub fn queue_embed(view: &QueueView) -> CreateEmbed {
    let upcoming = if view.upcoming.is_empty() {
        "No hay más canciones en la cola".to_string()
    } else {
        let mut lines = String::new();
        for (i, song) in view.upcoming.iter().enumerate() {
            let _ = writeln!(lines, "**{}.** {}", i + 2, song_line(song));
        }
        lines.trim_end().to_string()
    };

    let mut embed = CreateEmbed::default()
        .title("🎶 Cola de Reproducción")
        .color(colors::MUSIC_PURPLE)
        .description(format!(
            "**Reproduciendo ahora:**\n{}\n\n**A continuación:**\n{}",
            song_line(&view.current),
            upcoming
        ))
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(id) = youtube_video_id(&view.current.url) {
        embed = embed.thumbnail(format!("https://img.youtube.com/vi/{}/hqdefault.jpg", id));
    }

    embed
}

fn song_line(song: &Song) -> String {
    format!(
        "{} | {} | Pedida por <@{}>",
        song.title,
        format_duration(song.duration),
        song.requested_by
    )
}

fn format_duration(duration: Option<Duration>) -> String {
    let Some(duration) = duration else {
        return "N/A".to_string();
    };

    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Extrae el id de video de una URL de YouTube, para derivar la miniatura.
pub fn youtube_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;

    if host == "youtu.be" {
        return parsed
            .path_segments()?
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string);
    }

    if host == "youtube.com" || host.ends_with(".youtube.com") {
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_video_id_from_watch_url() {
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=30"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn extracts_video_id_from_short_url() {
        assert_eq!(
            youtube_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn no_video_id_for_other_urls() {
        assert_eq!(youtube_video_id("https://example.com/watch?v=abc"), None);
        assert_eq!(youtube_video_id("no es una url"), None);
    }

    #[test]
    fn formats_durations_with_na_sentinel() {
        assert_eq!(format_duration(None), "N/A");
        assert_eq!(format_duration(Some(Duration::from_secs(75))), "1:15");
        assert_eq!(format_duration(Some(Duration::from_secs(3671))), "1:01:11");
    }
}
