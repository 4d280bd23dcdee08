use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};

use orm_vs_sql as api;
use orm_vs_sql::services::{
    order_aggregation::OrderAggregationService,
    seeder::{self, SeedConfig, SeedOutcome},
};
use orm_vs_sql::QueryMode;

#[derive(Parser)]
#[command(
    name = "orm-vs-sql",
    about = "Top-10 orders through an entity graph and through raw SQL",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate, seed, and serve HTTP (default)
    Serve,
    /// Apply pending schema migrations
    Migrate,
    /// Seed demo data unless users already exist
    Seed {
        #[arg(long, help = "Fixed RNG seed for reproducible data")]
        rng_seed: Option<u64>,
    },
    /// Print the top-10 response as JSON
    Top10 {
        #[arg(long, default_value = "ef", help = "ef or dapper")]
        mode: String,
    },
    /// Run both strategies repeatedly and compare results and timings
    Compare {
        #[arg(long, default_value_t = 10)]
        iterations: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cfg, db_pool).await,
        Commands::Migrate => {
            api::db::run_migrations(&db_pool).await?;
            api::db::close_pool(db_pool).await?;
            Ok(())
        }
        Commands::Seed { rng_seed } => {
            if cfg.auto_migrate {
                api::db::run_migrations(&db_pool).await?;
            }
            let config = SeedConfig::default().with_rng_seed(rng_seed.or(cfg.seed_rng_seed));
            match seeder::seed(&db_pool, &config).await? {
                SeedOutcome::AlreadySeeded => println!("already seeded"),
                SeedOutcome::Seeded(summary) => {
                    println!("{}", serde_json::to_string_pretty(&summary)?)
                }
            }
            api::db::close_pool(db_pool).await?;
            Ok(())
        }
        Commands::Top10 { mode } => {
            let service = OrderAggregationService::new(Arc::new(db_pool));
            let response = service
                .top_orders(QueryMode::from_param(Some(&mode)))
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Commands::Compare { iterations } => compare(db_pool, iterations.max(1)).await,
    }
}

async fn serve(cfg: api::config::AppConfig, db_pool: api::db::DbPool) -> anyhow::Result<()> {
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    if cfg.seed_on_startup {
        let config = SeedConfig::default().with_rng_seed(cfg.seed_rng_seed);
        seeder::seed(&db_pool, &config).await.map_err(|e| {
            error!("Failed seeding demo data: {}", e);
            e
        })?;
    }

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    let app_state = api::AppState::new(Arc::new(db_pool), cfg);
    let app = api::app_router(app_state);

    info!("orm-vs-sql listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

#[derive(Default)]
struct Timings {
    samples: Vec<u64>,
}

impl Timings {
    fn summary(&self) -> String {
        let min = self.samples.iter().min().copied().unwrap_or(0);
        let max = self.samples.iter().max().copied().unwrap_or(0);
        let avg = if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().sum::<u64>() as f64 / self.samples.len() as f64
        };
        format!("avg {avg:.2} ms, min {min} ms, max {max} ms")
    }
}

async fn compare(db_pool: api::db::DbPool, iterations: u32) -> anyhow::Result<()> {
    let service = OrderAggregationService::new(Arc::new(db_pool));
    let mut orm = Timings::default();
    let mut raw = Timings::default();
    let mut mismatches = 0u32;

    for _ in 0..iterations {
        let a = service.top_orders(QueryMode::Orm).await?;
        let b = service.top_orders(QueryMode::RawSql).await?;
        orm.samples.push(a.elapsed_ms);
        raw.samples.push(b.elapsed_ms);
        if a.orders != b.orders {
            mismatches += 1;
        }
    }

    println!("ef:     {}", orm.summary());
    println!("dapper: {}", raw.summary());
    if mismatches > 0 {
        warn!(mismatches, "strategies disagreed");
        anyhow::bail!("strategies returned different orders in {mismatches} of {iterations} runs");
    }
    println!("results identical across {iterations} runs");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
