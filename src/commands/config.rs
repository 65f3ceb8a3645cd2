use anyhow::Result;
use pingone_provider::config::ProviderConfig;

use super::load_config;
use crate::Context;
use crate::ui;

pub fn show(ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;

    ui::header("Provider Configuration");
    let source = match &ctx.config {
        Some(path) => path.display().to_string(),
        None => ProviderConfig::default_path()?.display().to_string(),
    };
    ui::kv("Config file", &source);
    ui::kv("Region", &format!("{:?}", config.region));
    ui::kv("API URL", config.api_url());
    ui::kv(
        "Access token",
        if config.access_token.is_empty() { "(not set)" } else { "(set)" },
    );
    ui::kv("Request timeout", &format!("{}s", config.request_timeout_secs));
    ui::kv(
        "Retry",
        &format!(
            "{} attempt(s), {}ms base delay, x{} backoff, {}ms cap",
            config.retry.max_attempts,
            config.retry.base_delay_ms,
            config.retry.backoff_factor,
            config.retry.max_delay_ms
        ),
    );

    if let Err(e) = config.validate() {
        println!();
        ui::warn(&e.to_string());
    }
    Ok(())
}
