//! CLI configuration management
//!
//! Provides `txgate config {show,get,set,reset}` commands
//! for viewing and modifying settings via config/local.toml.

use crate::settings::{load_config, DEFAULT_CONFIG};
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use std::path::Path;

const LOCAL_CONFIG_PATH: &str = "config/local.toml";

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Get a specific setting value
    Get {
        /// Setting key (dot notation: approval.popup_width)
        key: String,
    },
    /// Set a setting value in config/local.toml
    Set {
        /// Setting key (dot notation)
        key: String,
        /// New value
        value: String,
    },
    /// Reset a setting to default
    Reset {
        /// Setting key (or "all" for full reset)
        key: String,
    },
}

pub fn run(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => cmd_show(),
        ConfigCommands::Get { key } => cmd_get(&key),
        ConfigCommands::Set { key, value } => cmd_set(&key, &value),
        ConfigCommands::Reset { key } => cmd_reset(&key),
    }
}

// ── show ──

fn cmd_show() -> Result<()> {
    let config = load_config()?;
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to serialize config")?
    );
    Ok(())
}

// ── get ──

fn cmd_get(key: &str) -> Result<()> {
    let config = load_config()?;
    let json = serde_json::to_value(&config).context("Failed to serialize config")?;

    let mut current = &json;
    for part in key.split('.') {
        current = match current.get(part) {
            Some(v) => v,
            None => bail!("Key not found: {key}"),
        };
    }

    match current {
        serde_json::Value::String(s) => println!("{s}"),
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}

// ── set ──

fn cmd_set(key: &str, value: &str) -> Result<()> {
    let local_path = Path::new(LOCAL_CONFIG_PATH);
    let previous = if local_path.exists() {
        Some(std::fs::read_to_string(local_path)?)
    } else {
        None
    };

    let mut doc: toml_edit::DocumentMut = previous
        .as_deref()
        .unwrap_or_default()
        .parse()
        .context("Failed to parse config/local.toml")?;
    set_toml_value(&mut doc, key, value);

    if let Some(parent) = local_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(local_path, doc.to_string())?;

    // Keep the old file if the new value does not load
    if let Err(e) = load_config() {
        match previous {
            Some(content) => std::fs::write(local_path, content)?,
            None => std::fs::remove_file(local_path)?,
        }
        return Err(e.context(format!("Rejected {key} = {value}")));
    }

    println!("Set {key} = {value}");
    Ok(())
}

fn set_toml_value(doc: &mut toml_edit::DocumentMut, path: &str, value: &str) {
    let parts: Vec<&str> = path.split('.').collect();

    let mut current = doc.as_item_mut();
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            current[part] = parse_toml_value(value);
        } else {
            if !current.get(part).is_some_and(toml_edit::Item::is_table) {
                current[part] = toml_edit::Item::Table(toml_edit::Table::new());
            }
            current = &mut current[part];
        }
    }
}

fn parse_toml_value(value: &str) -> toml_edit::Item {
    if value == "true" {
        return toml_edit::value(true);
    }
    if value == "false" {
        return toml_edit::value(false);
    }
    if let Ok(n) = value.parse::<i64>() {
        return toml_edit::value(n);
    }
    toml_edit::value(value)
}

fn resolve_toml_path<'a>(doc: &'a toml_edit::DocumentMut, key: &str) -> Option<&'a toml_edit::Item> {
    let mut current = doc.as_item();
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

// ── reset ──

fn cmd_reset(key: &str) -> Result<()> {
    let local_path = Path::new(LOCAL_CONFIG_PATH);
    if !local_path.exists() {
        println!("No local overrides found (config/local.toml does not exist).");
        return Ok(());
    }

    if key == "all" {
        std::fs::remove_file(local_path)?;
        println!("All local overrides removed.");
        return Ok(());
    }

    let content = std::fs::read_to_string(local_path)?;
    let mut doc: toml_edit::DocumentMut = content
        .parse()
        .context("Failed to parse config/local.toml")?;

    match key.split_once('.') {
        Some((table, field)) => {
            if let Some(t) = doc.get_mut(table).and_then(|v| v.as_table_mut()) {
                t.remove(field);
                if t.is_empty() {
                    doc.remove(table);
                }
            }
        }
        None => {
            doc.remove(key);
        }
    }
    std::fs::write(local_path, doc.to_string())?;

    let default_doc: toml_edit::DocumentMut = DEFAULT_CONFIG.parse()?;
    match resolve_toml_path(&default_doc, key) {
        Some(val) => println!("Reset {key} (default: {})", val.to_string().trim()),
        None => println!("Reset {key} (removed from local config)"),
    }
    Ok(())
}
