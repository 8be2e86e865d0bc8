//! Terraform Provider for Juju
//!
//! This binary implements the Terraform Plugin Protocol v6 for managing
//! Juju models, applications, machines and their relations.

use tracing_subscriber::EnvFilter;

const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
const MAGIC_COOKIE_VALUE: &str = "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

fn init_logging() {
    let filter = std::env::var("TF_LOG_PROVIDER_JUJU")
        .ok()
        .and_then(|level| EnvFilter::try_new(level.to_lowercase()).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    // stdout carries the plugin handshake
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var(MAGIC_COOKIE_KEY).as_deref() != Ok(MAGIC_COOKIE_VALUE) {
        eprintln!(
            "This binary is a plugin. These are not meant to be executed directly.\n\
             Please execute the program that consumes these plugins, which will\n\
             load any plugins automatically"
        );
        std::process::exit(1);
    }

    init_logging();
    serve().await
}

#[cfg(tfplugin_grpc)]
async fn serve() -> anyhow::Result<()> {
    use std::io::Write;

    use juju_provider::server::ProviderService;
    use juju_provider::tfplugin6::provider_server::ProviderServer;
    use juju_provider::JujuProvider;
    use tokio::net::TcpListener;
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::transport::Server;
    use tracing::info;

    info!("Starting Juju Terraform Provider {}", juju_common::VERSION);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    info!("Provider listening on {}", addr);

    let service = ProviderService::new(JujuProvider::default());

    // <core version>|<app version>|<network>|<address>|<protocol>|
    let mut stdout = std::io::stdout();
    writeln!(stdout, "1|6|tcp|{}|grpc|", addr)?;
    stdout.flush()?;

    info!("Handshake sent, starting gRPC server");

    Server::builder()
        .add_service(ProviderServer::new(service))
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await?;

    Ok(())
}

#[cfg(not(tfplugin_grpc))]
async fn serve() -> anyhow::Result<()> {
    anyhow::bail!("terraform-provider-juju was built without protoc; the plugin server is unavailable")
}
