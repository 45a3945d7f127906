use clap::{Parser, Subcommand};

use pricegrid_pipeline::{DefaultPipeline, SearchRequest};

#[derive(Debug, Parser)]
#[command(name = "pricegrid")]
#[command(about = "Product price aggregation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search channels for a product and print the aggregated listings.
    Search {
        keyword: String,
        #[arg(long, default_value = "US")]
        locale: String,
        #[arg(long)]
        max_results: Option<usize>,
        /// Exclude out-of-stock listings from the output.
        #[arg(long)]
        in_stock_only: bool,
        /// Fetch product pages through the headless browser.
        #[arg(long)]
        render: bool,
        /// Print raw JSON instead of a listing per line.
        #[arg(long)]
        json: bool,
    },
    /// List the channel table for a locale.
    Channels {
        #[arg(long, default_value = "US")]
        locale: String,
    },
    /// Remove expired durable cache entries once.
    Sweep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = pricegrid_core::load_app_config()?;
    let (pipeline, cache) = DefaultPipeline::from_config(&config).await?;

    match cli.command {
        Commands::Search {
            keyword,
            locale,
            max_results,
            in_stock_only,
            render,
            json,
        } => {
            let mut request = SearchRequest::new(keyword, locale);
            request.max_results = max_results;
            request.include_out_of_stock = !in_stock_only;
            request.render = render;

            let outcome = pipeline.run(&request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.records)?);
            } else {
                println!(
                    "{} result(s) for \"{}\" in {}ms (channels: {})",
                    outcome.records.len(),
                    outcome.query,
                    outcome.search_time_ms,
                    outcome.channels_used.join(", ")
                );
                for record in &outcome.records {
                    let price = record
                        .price
                        .map_or_else(|| "-".to_owned(), |p| format!("{p} {}", record.currency));
                    println!(
                        "{:<12} {:<10} {:<50} {}",
                        record.retailer, price, record.title, record.url
                    );
                }
            }
            pipeline.shutdown().await;
        }
        Commands::Channels { locale } => {
            for channel in pipeline.channel_source().for_locale(&locale) {
                println!(
                    "{:<28} {:<22} {:.2}",
                    channel.domain, channel.label, channel.confidence
                );
            }
        }
        Commands::Sweep => {
            let removed = cache.durable().sweep_expired().await?;
            println!("removed {removed} expired cache entries");
        }
    }

    Ok(())
}
