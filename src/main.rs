use clap::Parser;
use order_tracker::{Env, cli, setup_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv_override().ok();

    let env = Env::try_parse()?;
    setup_tracing(&env);

    cli::run(env).await
}
