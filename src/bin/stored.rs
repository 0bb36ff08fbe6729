use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use shelf_store::catalog::EmbeddedCatalog;
use shelf_store::config::Config;
use shelf_store::server::Router;
use shelf_store::CatalogReader;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long)]
    max_connections: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(max) = args.max_connections {
        config.max_connections = max;
    }

    let catalog = Arc::new(EmbeddedCatalog::open(&config.data_dir, &config.catalog_root)?);
    let router = Router::with_max_connections(catalog.clone(), config.max_connections);

    println!("Starting Shelf Store Daemon...");
    println!("Catalog opened. Loaded {} books.", catalog.list_all().await?.len());
    println!("Shelf Store listening on :{} (TCP)", config.port);

    tokio::select! {
        res = router.listen(config.port) => {
            if let Err(e) = res {
                eprintln!("TCP Server failed: {}", e);
            }
        }
        _ = signal::ctrl_c() => {
            println!("\nShutdown signal received. Exiting.");
        }
    }

    Ok(())
}
