use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use foodscout::config::Config;
use foodscout::secret::{SecretPrompt, TerminalPrompt};
use foodscout::session::Session;
use foodscout::store::{FileStore, KeyValueStore};
use foodscout::suggest::llm::{GeminiClient, GenerationBackend, SuggestionPipeline};
use foodscout::suggest::Outcome;
use foodscout::vault::Vault;
use foodscout::{clipboard, onboarding, render};
use std::io::{self, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "foodscout",
    about = "Ask a language model where to eat a dish in a city",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Model name (overrides config and FOODSCOUT_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Endpoint base URL (overrides config and FOODSCOUT_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store your API key, encrypted under a passphrase
    Setup,
    /// Suggest two restaurants for a dish
    Search {
        /// City, e.g. "Hyderabad, Telangana, India"
        city: String,
        /// Dish, e.g. "Qubani ka Meetha"
        food: String,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
        /// Copy the result to the clipboard
        #[arg(long)]
        copy: bool,
    },
    /// Delete the stored API key
    Clear,
    /// Show whether a key is stored and which endpoint is used
    Status,
    /// Persist --model / --endpoint to the config file
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawAction {
    Retry,
    Copy,
    Quit,
}

enum Input {
    Text(String),
    ClearSession,
    Quit,
}

struct Flow<'a, B, S> {
    pipeline: &'a SuggestionPipeline<B>,
    vault: &'a Vault<S>,
    prompt: &'a dyn SecretPrompt,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("foodscout=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "foodscout=warn".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(err) = run(args).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let store = FileStore::default_location()?;
    let vault = Vault::new(store);
    let prompt = TerminalPrompt;

    let mut config = Config::load().with_env_overrides();
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint_base = endpoint.clone();
    }

    let pipeline = SuggestionPipeline::new(GeminiClient::from_config(&config));
    let ctx = Flow {
        pipeline: &pipeline,
        vault: &vault,
        prompt: &prompt,
    };

    match args.command {
        Some(Command::Setup) => {
            onboarding::run_setup(&vault, &prompt).await?;
        }
        Some(Command::Search {
            city,
            food,
            json,
            copy,
        }) => {
            let mut session = Session::new();
            run_search(&ctx, &mut session, &city, &food, json, copy).await?;
        }
        Some(Command::Clear) => {
            vault.clear()?;
            println!("  ✓ Stored API key deleted.");
        }
        Some(Command::Status) => print_status(&vault, &config),
        Some(Command::Config) => save_config(args.model, args.endpoint)?,
        None => run_interactive(&ctx).await?,
    }
    Ok(())
}

async fn run_search<B: GenerationBackend, S: KeyValueStore>(
    ctx: &Flow<'_, B, S>,
    session: &mut Session,
    city: &str,
    food: &str,
    json: bool,
    copy: bool,
) -> Result<()> {
    if city.trim().is_empty() || food.trim().is_empty() {
        return Err(anyhow!("both a city and a food are required"));
    }

    loop {
        let outcome = ctx
            .pipeline
            .search(session, ctx.vault, ctx.prompt, city, food)
            .await?;

        if json {
            let out = serde_json::to_string_pretty(&outcome).context("failed to encode outcome")?;
            println!("{}", out);
            return Ok(());
        }

        let rendered = render::outcome(&outcome);
        print!("{}", rendered);

        let raw = match outcome {
            Outcome::Structured(_) => {
                if copy {
                    copy_and_report(rendered.trim());
                }
                return Ok(());
            }
            Outcome::Raw(raw) => raw,
        };

        if copy {
            copy_and_report(&raw.raw_text);
            return Ok(());
        }

        match ask_raw_action().await? {
            RawAction::Retry => {
                println!("  Retrying...");
                continue;
            }
            RawAction::Copy => {
                copy_and_report(&raw.raw_text);
                return Ok(());
            }
            RawAction::Quit => return Ok(()),
        }
    }
}

fn copy_and_report(text: &str) {
    match clipboard::copy_text(text) {
        Ok(()) => println!("  ✓ Copied to clipboard"),
        Err(e) => eprintln!("  Warning: {}", e),
    }
}

async fn ask_raw_action() -> Result<RawAction> {
    loop {
        let Some(choice) = read_line("Choice [r/c/q]").await? else {
            return Ok(RawAction::Quit);
        };
        match choice.to_lowercase().as_str() {
            "r" | "retry" => return Ok(RawAction::Retry),
            "c" | "copy" => return Ok(RawAction::Copy),
            "q" | "quit" | "" => return Ok(RawAction::Quit),
            _ => println!("  Please enter r, c, or q."),
        }
    }
}

/// Read one trimmed line from stdin. `None` on end of input.
async fn read_line(label: &str) -> Result<Option<String>> {
    print!("  {}: ", label);
    io::stdout().flush().context("failed to flush stdout")?;

    tokio::task::spawn_blocking(|| {
        let mut input = String::new();
        let n = io::stdin().read_line(&mut input)?;
        Ok::<_, io::Error>((n > 0).then(|| input.trim().to_string()))
    })
    .await
    .context("input task failed")?
    .context("failed to read from stdin")
}

async fn read_input(label: &str) -> Result<Input> {
    let Some(line) = read_line(label).await? else {
        return Ok(Input::Quit);
    };
    Ok(match line.as_str() {
        ":quit" | ":q" => Input::Quit,
        ":clear" => Input::ClearSession,
        _ => Input::Text(line),
    })
}

async fn run_interactive<B: GenerationBackend, S: KeyValueStore>(ctx: &Flow<'_, B, S>) -> Result<()> {
    if onboarding::is_first_run(ctx.vault) {
        println!();
        println!("  No API key stored yet. Let's set one up first.");
        match onboarding::run_setup(ctx.vault, ctx.prompt).await {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(err) => {
                eprintln!("  Error: {}", err);
                println!("  Nothing was saved. Run 'foodscout setup' to try again.");
                return Ok(());
            }
        }
    }

    println!();
    println!("  foodscout: the best places for a dish, anywhere.");
    println!("  Type :clear to forget the unlocked key, :quit to exit.");

    let mut session = Session::new();
    loop {
        println!();
        let city = match read_input("City").await? {
            Input::Quit => break,
            Input::ClearSession => {
                session.clear();
                println!("  ✓ Unlocked key forgotten for this session.");
                continue;
            }
            Input::Text(city) if city.is_empty() => continue,
            Input::Text(city) => city,
        };
        let food = match read_input("Food").await? {
            Input::Quit => break,
            Input::ClearSession => {
                session.clear();
                println!("  ✓ Unlocked key forgotten for this session.");
                continue;
            }
            Input::Text(food) if food.is_empty() => continue,
            Input::Text(food) => food,
        };

        if let Err(err) = run_search(ctx, &mut session, &city, &food, false, false).await {
            eprintln!("  Error: {:#}", err);
        }
    }

    println!();
    Ok(())
}

fn print_status<S: KeyValueStore>(vault: &Vault<S>, config: &Config) {
    println!();
    match vault.load_record() {
        Ok(Some(stored)) => match stored.saved_at {
            Some(saved_at) => println!(
                "  ✓ API key stored (encrypted, saved {})",
                saved_at.format("%Y-%m-%d %H:%M UTC")
            ),
            None => println!("  ✓ API key stored (encrypted)"),
        },
        Ok(None) => println!("  ✗ No API key stored. Run 'foodscout setup'."),
        Err(e) => println!("  ✗ Stored API key is unreadable: {}", e),
    }
    println!("  Model:    {}", config.model);
    println!("  Endpoint: {}", config.endpoint_base);
    println!("  Config:   {}", Config::config_location());
    println!();
}

fn save_config(model: Option<String>, endpoint: Option<String>) -> Result<()> {
    let mut config = Config::load();
    if model.is_none() && endpoint.is_none() {
        println!("  Model:    {}", config.model);
        println!("  Endpoint: {}", config.endpoint_base);
        println!("  Pass --model and/or --endpoint to change them.");
        return Ok(());
    }

    if let Some(model) = model {
        config.model = model.trim().to_string();
    }
    if let Some(endpoint) = endpoint {
        config.endpoint_base = endpoint.trim().to_string();
    }
    config.save().map_err(|e| anyhow!(e))?;

    println!("  ✓ Config saved to {}", Config::config_location());
    Ok(())
}
