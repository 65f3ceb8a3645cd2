use anyhow::{Result, anyhow, bail};
use declarative::{ApplyContext, Diagnostics};
use pingone_provider::provider::Provider;
use std::time::Duration;

use super::load_config;
use crate::Context;
use crate::ui;

/// Import deadline; the host applies its own in normal operation
const IMPORT_TIMEOUT: Duration = Duration::from_secs(120);

pub fn run(ctx: &Context, type_name: &str, id: &str) -> Result<()> {
    let config = load_config(ctx)?;
    let registry = Provider::configure(&config)?.registry();
    let reconciler = registry
        .get(type_name)
        .ok_or_else(|| anyhow!("Unknown resource type \"{type_name}\"; see 'pingone-provider types'"))?;

    log::info!("Importing {type_name} {id}");
    let apply_ctx = ApplyContext::new().with_timeout(IMPORT_TIMEOUT);
    let mut diags = Diagnostics::new();
    let state = reconciler.import_state(&apply_ctx, id, &mut diags);
    ui::diagnostics(&diags);

    match state {
        Some(state) if !diags.has_error() => {
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(())
        }
        _ => bail!("Import of {type_name} \"{id}\" failed"),
    }
}
