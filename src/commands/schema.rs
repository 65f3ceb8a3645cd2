use anyhow::{Result, anyhow};
use colored::Colorize;
use declarative::{Attribute, AttributeKind, Presence, Registry, Schema};

use crate::Context;
use crate::ui;

pub fn types(registry: &Registry) -> Result<()> {
    let mut names = registry.type_names();
    names.sort_unstable();
    for name in names {
        println!("{name}");
    }
    Ok(())
}

pub fn describe(ctx: &Context, registry: &Registry, type_name: &str) -> Result<()> {
    let reconciler = registry
        .get(type_name)
        .ok_or_else(|| anyhow!("Unknown resource type \"{type_name}\"; see 'pingone-provider types'"))?;
    let schema = reconciler.schema();
    ui::header(type_name);
    if !ctx.quiet && !schema.description.is_empty() {
        ui::dim(schema.description);
    }
    println!();
    print_attributes(&schema, 1);
    Ok(())
}

fn print_attributes(schema: &Schema, depth: usize) {
    let indent = "  ".repeat(depth);
    for attribute in &schema.attributes {
        println!("{indent}{} {}", attribute.name.bold(), flags(attribute).dimmed());
        if !attribute.description.is_empty() {
            println!("{indent}    {}", attribute.description);
        }
        for validator in &attribute.validators {
            println!("{indent}    {}", validator.description().dimmed());
        }
        if let AttributeKind::Block(nested) | AttributeKind::BlockList(nested) = &attribute.kind {
            print_attributes(nested, depth + 2);
        }
    }
}

fn flags(attribute: &Attribute) -> String {
    let presence = match attribute.presence {
        Presence::Required => "required",
        Presence::Optional => "optional",
        Presence::Computed => "computed",
        Presence::OptionalComputed => "optional, computed",
    };
    let mut parts = vec![attribute.kind.type_name(), presence];
    if attribute.sensitive {
        parts.push("sensitive");
    }
    if attribute.force_new {
        parts.push("forces replacement");
    }
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let secret = Attribute::string("secret").computed().sensitive();
        assert_eq!(flags(&secret), "(string, computed, sensitive)");

        let parent = Attribute::string("resource_id").required().force_new();
        assert_eq!(flags(&parent), "(string, required, forces replacement)");
    }
}
