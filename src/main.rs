use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use payonrain::app_state::{AppState, WeatherReport};
use payonrain::config::AppConfig;
use payonrain::devnet;
use payonrain::payout::PayoutOutcome;
use payonrain::policy::PolicyRequest;

/// ========= CLI =========

#[derive(Parser, Debug)]
#[command(name = "payonrain", version, about = "PayOnRain demo node")]
struct Cli {
    /// Path to the TOML config (missing file means defaults)
    #[arg(long, default_value = "payonrain.toml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the demo API (default)
    Serve {
        /// Override the listen port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Walk through policy, weather check and payout in the terminal
    Run {
        #[arg(long)]
        city: String,

        /// Rain threshold in mm
        #[arg(long, allow_negative_numbers = true)]
        threshold: f64,

        /// Payout in DEMO RALO tokens
        #[arg(long, allow_negative_numbers = true)]
        payout: i64,

        /// Force the demo payout after the weather check
        #[arg(long)]
        simulate: bool,
    },
}

fn init_tracing() {
    // init tracing from env PAYONRAIN_LOG or RUST_LOG
    let filter = std::env::var("PAYONRAIN_LOG")
        .unwrap_or_else(|_| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = AppConfig::load_from(&cli.config)?
        .resolved()
        .context("resolving config")?;
    info!(
        weather_url = %cfg.weather_url,
        start_block = cfg.start_block,
        "PayOnRain demo node starting up"
    );

    match cli.cmd.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            let mut cfg = cfg;
            if let Some(p) = port {
                cfg.port = p;
            }
            serve(cfg).await
        }
        Commands::Run {
            city,
            threshold,
            payout,
            simulate,
        } => run(cfg, PolicyRequest::new(city, threshold, payout), simulate).await,
    }
}

async fn serve(cfg: payonrain::config::ResolvedConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", cfg.bind, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.bind, cfg.port))?;

    let state = Arc::new(AppState::new(cfg).context("building weather client")?);
    devnet::start_block_ticker(state.blocks.clone(), state.config.block_tick);

    let app = payonrain::api::router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run(cfg: payonrain::config::ResolvedConfig, req: PolicyRequest, force_simulate: bool) -> Result<()> {
    let state = AppState::new(cfg).context("building weather client")?;
    let ticker = devnet::start_block_ticker(state.blocks.clone(), state.config.block_tick);

    let session = state.snapshot();
    println!("Wallet  {}", devnet::wallet_badge(&session.wallet));
    println!("Block   #{}", devnet::format_thousands(state.blocks.current()));
    println!();

    println!("[1/3] Deploying contract…");
    let receipt = state.setup_policy(req).await?;
    for line in receipt.summary_lines() {
        println!("      {line}");
    }
    println!();

    println!("[2/3] Contract calling weather API…");
    let report = state.check_weather().await?;
    let needs_override = match &report {
        WeatherReport::Live {
            city,
            observation,
            threshold,
            threshold_met,
            outcome,
        } => {
            println!("      City      : {city}");
            println!(
                "      Rainfall  : {} ({})",
                observation.rainfall_label(),
                if *threshold_met { "met" } else { "below" }
            );
            println!("      Threshold : {threshold} mm");
            println!("      Condition : {}", observation.condition);
            println!("      Temp      : {}", observation.temperature_label());
            println!();
            println!("[3/3] Payout");
            print_outcome(outcome);
            false
        }
        WeatherReport::Demo { status, .. } => {
            println!("      Weather Checked (Demo Mode)");
            println!();
            println!("[3/3] Payout");
            println!("      {status}");
            true
        }
    };

    if needs_override || force_simulate {
        println!("      Simulating threshold breach...");
        let outcome = state.simulate_payout().await?;
        print_outcome(&outcome);
    }

    ticker.abort();
    Ok(())
}

fn print_outcome(outcome: &PayoutOutcome) {
    println!("      {}", outcome.message());
    println!("      {}", outcome.detail());
    if let Some(tx) = outcome.tx() {
        println!("      Tx hash : {}", tx.hash);
        println!("      Farmer  : {}", tx.from_wallet);
        println!("      Amount  : {}", tx.amount_label());
        println!("      Block   : {}", tx.block_label());
        println!("      Fee     : {}", tx.fee_label());
    }
}
