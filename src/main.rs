use clap::Parser;
use edgegate::cli::{Args, build_config, init_logging, load_token_secret, validate_upstream};
use edgegate::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(token_secret) = load_token_secret(args.token_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(upstream) = validate_upstream(&args.upstream) else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let config = build_config(args, upstream, token_secret);

    match listener.local_addr() {
        Ok(local_addr) => info!(
            address = %local_addr,
            upstream = %config.upstream,
            refresh_path = %config.settings.refresh_path,
            "Listening"
        ),
        Err(e) => error!(error = %e, "Failed to read local address"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
