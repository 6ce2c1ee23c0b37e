use anyhow::{Context, Result};
use clap::Parser;
use shared::config::recency_from_hours;
use shared::search::SortMode;
use shared::{
    get_default_data_dir, save_dataset, Config, DatasetExport, Label, NewsApiClient, Retriever,
};
use std::io::{self as stdio, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn prompt_keywords() -> Result<String> {
    println!("Enter comma-separated keywords (e.g. kids, screen time, parenting)");
    print!("\nKeywords: ");
    stdio::stdout().flush()?;

    let mut input = String::new();
    stdio::stdin().read_line(&mut input)?;

    let keywords = input.trim().to_string();
    if keywords.is_empty() {
        anyhow::bail!("No keywords entered.");
    }
    Ok(keywords)
}

#[derive(Parser)]
#[command(name = "collect-news")]
#[command(about = "Collect a labeled training dataset from NewsAPI for the relevance classifier")]
struct Args {
    /// Comma-separated search terms
    #[arg(short, long)]
    keywords: Option<String>,

    /// Result pages to request per term
    #[arg(short, long)]
    pages: Option<u32>,

    /// Only include articles published within this many hours
    #[arg(long)]
    hours: Option<u64>,

    /// Sort order (relevancy, popularity, publishedAt)
    #[arg(long)]
    sort: Option<SortMode>,

    /// Label given to every collected article (1 = relevant, 0 = irrelevant)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=1))]
    label: Option<u8>,

    /// Directory to write the dataset into (defaults to the local data directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,shared=info")),
        )
        .with_writer(stdio::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let settings = &config.settings;

    let keywords = match args.keywords {
        Some(keywords) => keywords,
        None => prompt_keywords()?,
    };

    let mut profile = settings.training_feed.clone();
    if let Some(pages) = args.pages {
        profile.page_limit = pages.max(1);
    }
    if let Some(hours) = args.hours {
        profile.recency = recency_from_hours(hours).context("Invalid --hours")?;
    }
    if let Some(sort) = args.sort {
        profile.sort = sort;
    }
    if let Some(label) = args.label {
        profile.default_label = Label::try_from(label).map_err(anyhow::Error::msg)?;
    }

    let client = NewsApiClient::new(
        config.news_api_key()?,
        config.news_api_base_url.as_str(),
        settings.http_timeout,
    )?
    .with_page_size(settings.page_size)
    .with_language(settings.language.as_str());
    let retriever = Retriever::new(Arc::new(client), settings.search_concurrency);

    println!(
        "\n📰 Searching NewsAPI for \"{}\" ({} pages per term, sorted by {})...",
        keywords, profile.page_limit, profile.sort
    );
    let articles = retriever
        .retrieve(&keywords, &profile)
        .await
        .context("Failed to retrieve articles")?;

    if articles.is_empty() {
        println!("No articles found for \"{}\".", keywords);
        return Ok(());
    }

    println!("✓ Found {} unique articles", articles.len());
    if articles.len() < settings.volume_threshold {
        println!(
            "\n⚠ {} articles is below the {} needed to train the classifier. Try more keywords or pages.",
            articles.len(),
            settings.volume_threshold
        );
    }

    let output_dir = match args.output {
        Some(dir) => dir,
        None => get_default_data_dir()?,
    };

    let dataset = DatasetExport::new(Some(keywords), articles);
    let filepath = save_dataset(&output_dir, &dataset).context("Failed to save dataset")?;

    println!(
        "\n✅ Dataset with {} articles ({} labeled relevant) saved to: {}",
        dataset.articles.len(),
        dataset.relevant_count(),
        filepath.display()
    );

    Ok(())
}
