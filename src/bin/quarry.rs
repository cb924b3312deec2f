//! quarry: migration scaffolding and runner.
//!
//! The stock binary carries no compiled migrations, so `run:migrations`
//! has nothing to apply; applications call [`quarry::cli::main`] with their
//! own list instead.
//!
//! ```bash
//! quarry create:migration create_users
//! ```

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quarry=info")),
        )
        .with_target(false)
        .init();

    quarry::cli::main(Vec::new()).await;
}
