use std::time::Duration;

use actix_web::{middleware, web::Data, App, HttpServer};
use clap::Parser;
use kube::Client;

use ns_cloner::poll::PollSettings;
use ns_cloner::store::KubeStore;
use ns_cloner::telemetry;
use ns_cloner::web::{self, AppState};

#[derive(Debug, Parser)]
struct Arguments {
    /// Address for the HTTP server to listen on
    #[arg(long = "bind-address", env = "BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    bind_address: String,

    /// Seconds between readiness polls during a clone
    #[arg(long = "poll-interval-seconds", env = "POLL_INTERVAL_SECONDS", default_value_t = 5)]
    poll_interval_seconds: u64,

    /// Seconds before a readiness wait gives up; 0 waits forever
    #[arg(
        long = "readiness-timeout-seconds",
        env = "READINESS_TIMEOUT_SECONDS",
        default_value_t = 600
    )]
    readiness_timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    let args = Arguments::parse();

    let poll = PollSettings {
        interval: Duration::from_secs(args.poll_interval_seconds),
        timeout: (args.readiness_timeout_seconds > 0)
            .then(|| Duration::from_secs(args.readiness_timeout_seconds)),
    };

    let client = Client::try_default().await?;
    let state = AppState::new(KubeStore::new(client), poll);

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .configure(web::configure)
    })
    .bind(&args.bind_address)?
    .shutdown_timeout(5)
    .run()
    .await?;

    Ok(())
}
