//! irrigation-relay setup wizard.
//!
//! Prompts for the bot token, the authorized user IDs and the endpoints in
//! the terminal, then writes `config.toml` into the project root
//! (`IRRIGATION_RELAY_ROOT`, default: current directory).

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

// ── Config formatting ──────────────────────────────────────────────────────────

struct ConfigParams<'a> {
    tg_token: &'a str,
    user_ids: &'a str,
    group_id: &'a str,
    port: u16,
    status_url: &'a str,
}

/// Split "111, 222 333" into the IDs, rejecting anything non-numeric.
fn parse_user_ids(raw: &str) -> Result<Vec<u64>> {
    raw.split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .with_context(|| format!("Invalid user ID: {s}"))
        })
        .collect()
}

/// Produces a valid config.toml string. Extracted so it can be unit-tested.
fn format_config(p: &ConfigParams<'_>) -> Result<String> {
    let ids = parse_user_ids(p.user_ids)?
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let group_line = if p.group_id.is_empty() {
        "# notification_group_id = -1001234567890".to_owned()
    } else {
        let id: i64 = p
            .group_id
            .parse()
            .with_context(|| format!("Invalid group ID: {}", p.group_id))?;
        format!("notification_group_id = {id}")
    };

    let tg_token = p.tg_token;
    let port = p.port;
    let status_url = p.status_url;

    Ok(format!(
        r#"[telegram]
bot_token = "{tg_token}"
allowed_user_ids = [{ids}]
{group_line}

[gateway]
bind = "127.0.0.1"
port = {port}

[irrigation]
status_url = "{status_url}"

[broadcast]
delay_ms = 50
"#
    ))
}

// ── CLI ────────────────────────────────────────────────────────────────────────

fn run_cli(project_root: &Path) -> Result<()> {
    println!("=== irrigation-relay setup ===\n");

    let read_line = |prompt: &str| -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        Ok(buf.trim().to_owned())
    };

    let or_default = |s: String, default: &str| {
        if s.is_empty() {
            default.to_owned()
        } else {
            s
        }
    };

    let tg_token = read_line("Telegram bot token: ")?;
    let user_ids = read_line("Allowed user IDs (comma-separated): ")?;
    let group_id = read_line("Notification group ID (optional): ")?;
    let port = or_default(read_line("Gateway port [5008]: ")?, "5008");
    let port: u16 = port
        .parse()
        .with_context(|| format!("Invalid port: {port}"))?;
    let status_url = or_default(
        read_line("Irrigation status URL [http://192.168.3.23:5000/api/status]: ")?,
        "http://192.168.3.23:5000/api/status",
    );

    let config = format_config(&ConfigParams {
        tg_token: &tg_token,
        user_ids: &user_ids,
        group_id: &group_id,
        port,
        status_url: &status_url,
    })?;

    let config_path = project_root.join("config.toml");
    std::fs::write(&config_path, &config)
        .with_context(|| format!("Could not write {}", config_path.display()))?;

    println!("\n✓  config.toml saved to {}", config_path.display());
    println!("   Run the relay with:  cargo run");
    Ok(())
}

fn main() -> Result<()> {
    let project_root = PathBuf::from(
        std::env::var("IRRIGATION_RELAY_ROOT").unwrap_or_else(|_| ".".to_string()),
    );
    run_cli(&project_root)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(user_ids: &str, group_id: &str) -> Result<String> {
        format_config(&ConfigParams {
            tg_token: "mytoken",
            user_ids,
            group_id,
            port: 5008,
            status_url: "http://192.168.3.23:5000/api/status",
        })
    }

    #[test]
    fn test_telegram_section_present() {
        let out = cfg("123456", "").unwrap();
        assert!(out.contains("[telegram]"));
        assert!(out.contains(r#"bot_token = "mytoken""#));
        assert!(out.contains("allowed_user_ids = [123456]"));
    }

    #[test]
    fn test_multiple_user_ids_comma_separated() {
        let out = cfg("111, 222 333", "").unwrap();
        assert!(out.contains("allowed_user_ids = [111, 222, 333]"));
    }

    #[test]
    fn test_invalid_user_id_is_rejected() {
        assert!(cfg("111, abc", "").is_err());
    }

    #[test]
    fn test_group_commented_when_empty() {
        let out = cfg("1", "").unwrap();
        assert!(out.contains("# notification_group_id ="));
        assert!(!out.contains("\nnotification_group_id = "));
    }

    #[test]
    fn test_group_included_when_set() {
        let out = cfg("1", "-100200300").unwrap();
        assert!(out.contains("notification_group_id = -100200300"));
    }

    #[test]
    fn test_gateway_and_irrigation_sections() {
        let out = cfg("1", "").unwrap();
        assert!(out.contains("[gateway]"));
        assert!(out.contains("port = 5008"));
        assert!(out.contains("[irrigation]"));
        assert!(out.contains(r#"status_url = "http://192.168.3.23:5000/api/status""#));
        assert!(out.contains("[broadcast]"));
    }

    #[test]
    fn test_output_is_valid_toml() {
        let out = cfg("111, 222", "-5").unwrap();
        let value: toml::Value = toml::from_str(&out).unwrap();
        assert_eq!(value["telegram"]["allowed_user_ids"].as_array().unwrap().len(), 2);
        assert_eq!(value["telegram"]["notification_group_id"].as_integer(), Some(-5));
    }
}
