use fhirgate_server::{init_tracing, AppConfig, ServerBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env().map_err(anyhow::Error::msg)?;
    init_tracing(config.log_format);

    let server = ServerBuilder::new(config)
        .build()
        .map_err(anyhow::Error::msg)?;

    server.run().await
}
