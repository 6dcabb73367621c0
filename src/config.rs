use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Teams incoming-webhook URL. None disables notification delivery.
    pub teams_webhook_url: Option<String>,
    /// Public base URL used to build the approve/reject links.
    /// Empty means the links degrade to absolute paths.
    pub base_public_url: String,
    /// Shared HMAC key for intake verification. None disables it.
    pub hmac_key: Option<String>,
    /// When true, only speculative plans wait for a human; everything
    /// else is auto-passed straight back to the run.
    pub filter_speculative_plans_only: bool,
    pub redis_url: Option<String>,
    pub redis_password: Option<String>,
    /// Seconds a pending approval stays retrievable. Default: 600.
    pub token_ttl_secs: u64,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let hmac_key = std::env::var("HMAC_KEY").ok().filter(|k| !k.is_empty());
    if hmac_key.is_none() {
        tracing::warn!("No HMAC_KEY configured. HMAC signature verification is DISABLED.");
    }

    Ok(Config {
        port: std::env::var("RELAY_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        teams_webhook_url: std::env::var("TEAMS_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.is_empty()),
        base_public_url: std::env::var("BASE_PUBLIC_URL").unwrap_or_default(),
        hmac_key,
        filter_speculative_plans_only: std::env::var("FILTER_SPECULATIVE_PLANS_ONLY")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false),
        redis_url: std::env::var("REDIS_URL").ok().filter(|u| !u.is_empty()),
        redis_password: std::env::var("REDIS_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty()),
        token_ttl_secs: std::env::var("TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(600),
    })
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn config_is_plain_data() {
        // Components receive the struct, never read the environment.
        let cfg = Config {
            port: 8080,
            teams_webhook_url: None,
            base_public_url: "https://relay.example.com".into(),
            hmac_key: Some("k".into()),
            filter_speculative_plans_only: true,
            redis_url: None,
            redis_password: None,
            token_ttl_secs: 600,
        };
        assert_eq!(cfg.token_ttl_secs, 600);
        assert!(cfg.filter_speculative_plans_only);
    }
}
