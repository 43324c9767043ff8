use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;

mod config;
mod dashboard;
mod epv;
mod error;
mod features;
mod model;
mod store;

use config::{Command, Config};
use dashboard::AppState;
use epv::cache::EpvCache;
use store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let store = Store::new(&config.data_dir, &config.models_dir);
    let params = config.fit_params();

    match &config.command {
        Command::Features { game_id } => {
            let baseline = features::build_baseline(&store, game_id)?;
            let sequence = features::sequence::add_sequence_features(&store, game_id)?;
            info!(
                "Feature tables ready: {} / {}",
                baseline.display(),
                sequence.display()
            );
        }
        Command::Train { game_id } => {
            let report = model::train::train_game(&store, game_id, &params)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Epv { game_id, tag } => {
            let rows = epv::epv_table(&store, game_id, tag, &params)?;
            println!("poss_id  epv");
            for row in &rows {
                println!("{:>7}  {:.3}", row.poss_id, row.epv);
            }
        }
        Command::Swing { game_id, top_n } => {
            let rows = epv::swing_table(&store, game_id, *top_n, &params)?;
            println!("poss_id  baseline  sequence  swing");
            for row in &rows {
                println!(
                    "{:>7}  {:>8.3}  {:>8.3}  {:>+6.3}",
                    row.poss_id, row.epv_baseline, row.epv_sequence, row.swing
                );
            }
        }
        Command::Serve => {
            let state = AppState {
                store,
                cache: EpvCache::new(),
                fit_params: params,
            };
            let app = dashboard::router(state);
            let addr: SocketAddr = config.dashboard_addr.parse()?;
            info!("Dashboard listening on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
