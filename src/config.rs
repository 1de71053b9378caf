use anyhow::Result;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Reproducción
    pub default_volume: f32,
    pub max_queue_size: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!(
                "Default volume must be between 0.0 and 2.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        Ok(())
    }

    /// Resumen de la configuración para el log de arranque, sin el token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Playback: {}% vol, {} queue max",
            self.application_id,
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            discord_token: "token".to_string(),
            application_id: 1,
            guild_id: None,
            default_volume: 0.5,
            max_queue_size: 100,
        }
    }

    #[test]
    fn validate_accepts_sane_values() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_volume() {
        let mut config = sample();
        config.default_volume = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_queue_limit() {
        let mut config = sample();
        config.max_queue_size = 0;
        assert!(config.validate().is_err());
    }
}
