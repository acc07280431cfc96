mod app;
mod cli;
mod lsp;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Cli::from_args().into_config();
    app::run(config).await
}
