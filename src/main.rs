use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use regex::Regex;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use webgl_loader::simulate::ScriptedPipeline;
use webgl_loader::{
    config, create_instance, Environment, InlineSize, InstanceOptions, LoaderConfig,
    MemorySurface, PageFailureSource, RenderSurface, SystemInfo,
};

mod cli;

use cli::{Cli, Commands, SendSpec};

/// Stack frames produced by the player's compiled code
const PLAYER_FAULT_PATTERN: &str = r"(wasm-function\[|RuntimeError|abort\()";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Resolve { config, page_url } => run_resolve(config, &page_url),
        Commands::Simulate {
            config,
            page_url,
            graphics,
            no_byte_code,
            fail,
            send,
            fullscreen,
            quit,
        } => {
            let system_info = SystemInfo {
                has_graphics_api: graphics.into(),
                has_byte_code_exec: !no_byte_code,
            };
            run_simulate(
                config,
                &page_url,
                system_info,
                fail,
                send,
                fullscreen,
                quit,
            )
            .await
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<LoaderConfig> {
    match path {
        Some(path) => LoaderConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(LoaderConfig::default()),
    }
}

fn parse_page_url(page_url: &str) -> Result<Url> {
    Url::parse(page_url).with_context(|| format!("Invalid page URL: {}", page_url))
}

fn run_resolve(config_path: Option<PathBuf>, page_url: &str) -> Result<()> {
    let loader_config = load_config(config_path)?;
    let page_url = parse_page_url(page_url)?;

    let resolved = config::resolve(&loader_config, &page_url)?;
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

async fn run_simulate(
    config_path: Option<PathBuf>,
    page_url: &str,
    system_info: SystemInfo,
    fail: Option<String>,
    send: Vec<SendSpec>,
    fullscreen: bool,
    quit: bool,
) -> Result<()> {
    let loader_config = load_config(config_path)?;
    let page_url = parse_page_url(page_url)?;

    let source = Arc::new(PageFailureSource::new());
    let surface = Arc::new(MemorySurface::new(InlineSize::new("960px", "600px")));
    let pipeline =
        ScriptedPipeline::new(source.clone(), surface.clone()).with_failure(fail);

    let env = Environment::new(page_url, system_info, source, Arc::new(pipeline))
        .with_fault_pattern(Regex::new(PLAYER_FAULT_PATTERN)?);
    let options = InstanceOptions::default()
        .on_progress(|progress| eprintln!("⏳ Loading... {:>3.0}%", progress * 100.0));

    println!("🚀 Starting player...");
    let render_surface: Arc<dyn RenderSurface> = surface.clone();
    let player = match create_instance(render_surface, &loader_config, env, options).await {
        Ok(player) => player,
        Err(e) => {
            println!("❌ Startup failed: {}", e);
            std::process::exit(1);
        }
    };
    println!("✅ Player loaded (instance {})", player.module().id());

    for message in send {
        player.send_message(&message.object, &message.method, message.value);
    }

    if fullscreen {
        player.set_fullscreen(true);
        let size = surface.inline_size();
        println!("   Fullscreen size: {} x {}", size.width, size.height);
        player.set_fullscreen(false);
        let size = surface.inline_size();
        println!("   Restored size: {} x {}", size.width, size.height);
    }

    if quit {
        println!("Quitting player...");
        player.quit().await;
        println!("✅ Player quit and all resources released.");
    }

    Ok(())
}
