use clap::{Parser, Subcommand};
use shelf_store::model::Book;
use shelf_store::{sdk, CatalogReader, CatalogSearcher, CatalogWriter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "data")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    Get { isbn: String },
    /// Store one book or a JSON array of books
    Put { json: String },
    Del { isbn: String },
    List,
    Search { text: Vec<String> },
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let catalog = sdk::new(&cli.data_dir).await?;

    match cli.command {
        Commands::Get { isbn } => match catalog.fetch_by_key(&isbn).await? {
            Some(book) => println!("{}", serde_json::to_string_pretty(&book)?),
            None => println!("No book found with ISBN: {}", isbn),
        },
        Commands::Put { json } => {
            let books: Vec<Book> = if json.trim_start().starts_with('[') {
                serde_json::from_str(&json)?
            } else {
                vec![serde_json::from_str(&json)?]
            };
            let count = catalog.upsert_all(books).await?;
            println!("OK {}", count);
        }
        Commands::Del { isbn } => {
            if catalog.remove_by_key(&isbn).await? {
                println!("Book removed with isbn: {}", isbn);
            } else {
                println!("No book found with ISBN: {}", isbn);
            }
        }
        Commands::List => {
            let books = catalog.list_all().await?;
            println!("{}", serde_json::to_string_pretty(&books)?);
        }
        Commands::Search { text } => {
            let books = catalog.search(&text.join(" ")).await?;
            println!("{}", serde_json::to_string_pretty(&books)?);
        }
        Commands::Seed => {
            let count = catalog.seed().await?;
            println!("{} books created", count);
        }
    }

    Ok(())
}
