use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;

use branchchat::app::App;
use branchchat::backend::{self, ClaudeClient, OllamaClient, OpenAIClient};
use branchchat::config::Config;
use branchchat::conversation::{ConversationController, ConversationStore};
use branchchat::handler;
use branchchat::logging;
use branchchat::provider::Provider;
use branchchat::tui::{self, EventHandler, Tui};
use branchchat::ui;

#[derive(Parser)]
#[command(name = "branchchat", version)]
#[command(about = "Terminal chat that branches side conversations from selected reply text")]
struct Cli {
    /// Assistant backend: relay, ollama, claude or openai
    #[arg(short, long)]
    provider: Option<String>,
    /// Model name passed to the backend
    #[arg(short, long)]
    model: Option<String>,
    /// Base URL of the relay service
    #[arg(long)]
    api_url: Option<String>,
    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write the effective settings back to the config file
    #[arg(long)]
    save: bool,
    /// List models for the selected provider and exit
    #[arg(long)]
    list_models: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(name) = &self.provider {
            let provider = Provider::parse(name).ok_or_else(|| {
                let known: Vec<&str> = Provider::all().iter().map(|p| p.as_str()).collect();
                anyhow!("unknown provider '{name}' (expected one of: {})", known.join(", "))
            })?;
            config.provider = Some(provider.as_str().to_string());
        }
        if let Some(model) = &self.model {
            config.default_model = Some(model.clone());
        }
        if let Some(url) = &self.api_url {
            config.api_url = Some(url.clone());
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let mut config = Config::load_from(&config_path)?;
    cli.apply(&mut config)?;

    if cli.save {
        config.save_to(&config_path)?;
        println!("Saved settings to {}", config_path.display());
    }

    if cli.list_models {
        return list_models(&config).await;
    }

    let log_path = logging::log_path()?;
    logging::init(&log_path, config.log_filter.as_deref())?;
    info!(
        provider = config.provider().as_str(),
        model = %config.model(),
        log = %log_path.display(),
        "starting"
    );

    let controller = ConversationController::new(
        backend::connect(&config),
        ConversationStore::new(config.branch_template()),
        config.close_grace(),
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(controller, config.model(), events.sender());

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    info!("exiting");
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(app, event),
                None => break,
            },
            Some(event) = app.controller.next_event() => {
                let update = app.controller.handle(event);
                app.apply(update);
            }
        }
    }
    Ok(())
}

async fn list_models(config: &Config) -> Result<()> {
    let provider = config.provider();
    println!("{} models:", provider.display_name());

    let models = match provider {
        Provider::Relay => {
            println!("  The relay at {} chooses its own model.", config.api_url());
            return Ok(());
        }
        Provider::Ollama => {
            let client = OllamaClient::new(&config.ollama_url(), &config.model());
            match client.list_models().await {
                Ok(models) => models,
                Err(e) => {
                    println!("Error connecting to Ollama: {e}");
                    println!("Make sure Ollama is running: ollama serve");
                    return Ok(());
                }
            }
        }
        Provider::Claude => ClaudeClient::list_models(),
        Provider::OpenAI => OpenAIClient::list_models(),
    };

    if models.is_empty() {
        println!("  No models found. Pull a model with: ollama pull llama3.2");
    }
    for model in models {
        println!("  • {model}");
    }
    Ok(())
}
