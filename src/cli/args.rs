use std::path::PathBuf;

use clap::{Parser, Subcommand};
use webgl_loader::MessageValue;

/// Default page location when none is given
pub const DEFAULT_PAGE_URL: &str = "http://localhost/index.html";

/// WebGL player loader - resolve configs and simulate player lifecycles
#[derive(Parser)]
#[command(name = "webgl-loader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the resolved loader configuration as JSON
    Resolve {
        /// Loader configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// URL of the hosting page, used to resolve relative asset URLs
        #[arg(long, env = "WEBGL_LOADER_PAGE_URL", default_value = DEFAULT_PAGE_URL)]
        page_url: String,
    },
    /// Run a full player lifecycle against a simulated runtime
    Simulate {
        /// Loader configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// URL of the hosting page, used to resolve relative asset URLs
        #[arg(long, env = "WEBGL_LOADER_PAGE_URL", default_value = DEFAULT_PAGE_URL)]
        page_url: String,

        /// Graphics API level reported by the host (0 = none, 1 = WebGL 1, 2 = WebGL 2)
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=2))]
        graphics: u8,

        /// Report that WebAssembly is unavailable
        #[arg(long)]
        no_byte_code: bool,

        /// Raise this runtime fault while loading
        #[arg(long)]
        fail: Option<String>,

        /// Message to send once loaded, as Object.Method[=value] (repeatable)
        #[arg(long, value_parser = parse_message)]
        send: Vec<SendSpec>,

        /// Toggle fullscreen on and off once loaded
        #[arg(long)]
        fullscreen: bool,

        /// Quit the player at the end
        #[arg(long)]
        quit: bool,
    },
}

/// A message to deliver to a player object
#[derive(Debug, Clone, PartialEq)]
pub struct SendSpec {
    pub object: String,
    pub method: String,
    pub value: Option<MessageValue>,
}

/// Parse `Object.Method` or `Object.Method=value`; numeric values are sent as numbers.
pub fn parse_message(spec: &str) -> Result<SendSpec, String> {
    let (target, value) = match spec.split_once('=') {
        Some((target, value)) => (target, Some(value)),
        None => (spec, None),
    };

    let (object, method) = target
        .rsplit_once('.')
        .filter(|(object, method)| !object.is_empty() && !method.is_empty())
        .ok_or_else(|| format!("expected Object.Method[=value], got \"{}\"", spec))?;

    let value = value.map(|v| match v.parse::<f64>() {
        Ok(n) => MessageValue::Number(n),
        Err(_) => MessageValue::Text(v.to_string()),
    });

    Ok(SendSpec {
        object: object.to_string(),
        method: method.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message() {
        let spec = parse_message("GameManager.StartLevel=3").unwrap();
        assert_eq!(spec.object, "GameManager");
        assert_eq!(spec.method, "StartLevel");
        assert_eq!(spec.value, Some(MessageValue::Number(3.0)));

        let spec = parse_message("Hud.Show=pause menu").unwrap();
        assert_eq!(spec.value, Some(MessageValue::Text("pause menu".to_string())));

        let spec = parse_message("Canvas/Hud.Hide").unwrap();
        assert_eq!(spec.object, "Canvas/Hud");
        assert_eq!(spec.value, None);

        assert!(parse_message("NoMethod").is_err());
        assert!(parse_message(".Method").is_err());
    }

    #[test]
    fn test_cli_parses_simulate() {
        let cli = Cli::try_parse_from([
            "webgl-loader",
            "simulate",
            "--graphics",
            "1",
            "--send",
            "Player.Jump",
            "--quit",
        ])
        .unwrap();

        match cli.command {
            Commands::Simulate {
                graphics,
                send,
                quit,
                no_byte_code,
                ..
            } => {
                assert_eq!(graphics, 1);
                assert_eq!(send.len(), 1);
                assert!(quit);
                assert!(!no_byte_code);
            }
            _ => panic!("expected simulate"),
        }

        assert!(Cli::try_parse_from(["webgl-loader", "simulate", "--graphics", "3"]).is_err());
    }
}
