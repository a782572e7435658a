use fretscope_server::config::ServerConfig;
use fretscope_server::logging::init_tracing;
use fretscope_server::server::run_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = ServerConfig::load()?;
    tracing::info!(
        listen_addr = %cfg.listen_addr,
        temp_dir = %cfg.temp_dir().display(),
        upload_limit_bytes = cfg.upload_limit_bytes,
        "fretscope boot"
    );

    run_server(cfg).await
}
