use anyhow::Result;
use obsync::soak::{self, SoakConfig};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // obsync [peers] [operations] [batch_size] [seed]
    let config = SoakConfig::from_args(std::env::args().skip(1));

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║            REPLICATION SOAK RUN                            ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let stats = soak::run(&config).await?;
    stats.print();

    println!("\n✓ All mirrors converged with the authority");
    Ok(())
}
