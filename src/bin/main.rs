use clap::{Parser, ValueEnum};
use doh_proxy::{handle_request, DnsClient, ProxyBackend, ProxyConfig, RequestLogger, Transport};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, ValueEnum)]
enum CliTransport {
    Udp,
    Tcp,
}

impl From<CliTransport> for Transport {
    fn from(t: CliTransport) -> Self {
        match t {
            CliTransport::Udp => Transport::Udp,
            CliTransport::Tcp => Transport::Tcp,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "doh-proxy")]
#[command(about = "Serve DNS-over-HTTPS (RFC 8484) requests by forwarding them to a recursive resolver")]
#[command(version)]
struct Args {
    /// Address to accept HTTP requests on (terminate TLS in front of it)
    #[arg(short, long, default_value = "127.0.0.1:8053")]
    listen: SocketAddr,

    /// Upstream resolver; repeatable, only the first one is queried
    #[arg(short, long = "server")]
    servers: Vec<String>,

    /// Upstream resolver port [default: 53]
    #[arg(short, long)]
    port: Option<String>,

    /// Resolver configuration read when no --server is given [default: /etc/resolv.conf]
    #[arg(long, value_name = "FILE")]
    resolv_conf: Option<PathBuf>,

    /// Upstream transport
    #[arg(short = 'T', long, value_enum, default_value = "udp")]
    transport: CliTransport,

    /// Upstream exchange timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Do not log a line per request
    #[arg(short, long)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("unable to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let client = DnsClient::new()
        .with_transport(args.transport.into())
        .with_timeout(Duration::from_millis(args.timeout_ms));

    let backend = ProxyBackend::with_exchanger(
        ProxyConfig {
            servers: args.servers,
            port: args.port,
            resolv_conf: args.resolv_conf,
        },
        client,
    )?;

    info!(
        "Starting doh-proxy v{} on {}, forwarding to {} over {}",
        env!("CARGO_PKG_VERSION"),
        args.listen,
        backend.upstream(),
        backend.exchanger().transport()
    );

    let logger = (!args.quiet).then_some(RequestLogger);
    let app = handle_request(backend, logger);

    let listener = TcpListener::bind(args.listen).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
