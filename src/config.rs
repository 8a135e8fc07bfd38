use serde::Deserialize;

const DEFAULT_GEOCODER_BASE_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Settings for the address geocoding provider.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderSettings {
    pub base_url: String,
    pub country_codes: String,
    pub user_agent: String,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOCODER_BASE_URL.to_string(),
            country_codes: "ph".to_string(),
            user_agent: format!("crime-report-api/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub geocoder: GeocoderSettings,
    /// Report orphan cleanup failures as response warnings on delete.
    pub strict_cleanup: bool,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = GeocoderSettings::default();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable required"))
                .and_then(|secret| {
                    if secret.trim().len() < 32 {
                        anyhow::bail!("JWT_SECRET must be at least 32 characters");
                    }
                    Ok(secret)
                })?,
            geocoder: GeocoderSettings {
                base_url: std::env::var("GEOCODER_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(|url| {
                        url::Url::parse(&url)
                            .ok()
                            .filter(|u| u.scheme() == "http" || u.scheme() == "https")
                            .map(|_| url)
                            .ok_or_else(|| {
                                anyhow::anyhow!(
                                    "GEOCODER_BASE_URL must be an http:// or https:// URL"
                                )
                            })
                    })
                    .transpose()?
                    .unwrap_or(defaults.base_url),
                country_codes: std::env::var("GEOCODER_COUNTRY_CODES")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(defaults.country_codes),
                user_agent: std::env::var("GEOCODER_USER_AGENT")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(defaults.user_agent),
            },
            strict_cleanup: parse_flag("STRICT_CLEANUP", false)?,
            run_migrations: parse_flag("RUN_MIGRATIONS", true)?,
        };

        // Never log secrets
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database URL: {}", redact_database_url(&config.database_url));
        tracing::debug!("Geocoder Base URL: {}", config.geocoder.base_url);
        tracing::debug!("Server Port: {}", config.port);
        if config.strict_cleanup {
            tracing::info!("Strict cleanup mode enabled");
        }

        Ok(config)
    }
}

/// Database URL with the password masked, for logging.
///
/// Unparseable URLs are replaced wholesale since their credentials cannot be located.
fn redact_database_url(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("****")).is_err() {
                return "<redacted>".to_string();
            }
            url.to_string()
        }
        Err(_) => "<redacted>".to_string(),
    }
}

fn parse_flag(name: &str, default: bool) -> anyhow::Result<bool> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("{} must be a boolean, got '{}'", name, other),
        },
    }
}
