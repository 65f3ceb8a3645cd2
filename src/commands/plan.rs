use anyhow::{Result, anyhow, bail};
use colored::Colorize;
use declarative::{ChangeAction, Diagnostics, DynReconciler, Registry, plan_change};
use std::path::Path;

use super::load_document;
use crate::cli::PlanArgs;
use crate::Context;
use crate::ui;

fn lookup<'a>(registry: &'a Registry, type_name: &str) -> Result<&'a dyn DynReconciler> {
    registry
        .get(type_name)
        .ok_or_else(|| anyhow!("Unknown resource type \"{type_name}\"; see 'pingone-provider types'"))
}

pub fn validate(ctx: &Context, registry: &Registry, type_name: &str, file: &Path) -> Result<()> {
    let reconciler = lookup(registry, type_name)?;
    let config = load_document(file)?;
    let mut diags = Diagnostics::new();
    reconciler.validate_config(&config, &mut diags);
    ui::diagnostics(&diags);
    if diags.has_error() {
        bail!("{} is not a valid {type_name} configuration", file.display());
    }
    if !ctx.quiet {
        ui::success(&format!("{} is a valid {type_name} configuration", file.display()));
    }
    Ok(())
}

pub fn plan(ctx: &Context, registry: &Registry, args: &PlanArgs) -> Result<()> {
    let reconciler = lookup(registry, &args.type_name)?;
    let config = args.config_file.as_deref().map(load_document).transpose()?;
    let prior = args.state.as_deref().map(load_document).transpose()?;
    let address = format!("{}.{}", args.type_name, args.name);

    let mut diags = Diagnostics::new();
    let change = plan_change(reconciler, &address, prior, config, &mut diags);
    ui::diagnostics(&diags);
    if diags.has_error() {
        bail!("Planning {address} failed");
    }

    let verb = match change.action {
        ChangeAction::Create => "will be created".green(),
        ChangeAction::Update => "will be updated in place".yellow(),
        ChangeAction::Replace => "must be replaced".red(),
        ChangeAction::Delete => "will be destroyed".red(),
        ChangeAction::NoOp => {
            if !ctx.quiet {
                ui::info(&format!("{address} is up to date"));
            }
            return Ok(());
        }
    };
    println!("{} {verb}", address.bold());

    if let Some(diff) = &change.diff {
        for attribute in &diff.changes {
            let before = if attribute.sensitive {
                "(sensitive value)".to_string()
            } else {
                attribute.before.to_string()
            };
            let marker = if attribute.forces_replacement {
                " # forces replacement".red().to_string()
            } else {
                String::new()
            };
            println!("  ~ {}: {before} -> {}{marker}", attribute.path, attribute.display_after());
        }
    } else if let Some(planned) = &change.planned {
        println!("{}", serde_json::to_string_pretty(planned)?);
    }
    Ok(())
}
