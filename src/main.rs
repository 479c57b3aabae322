use anyhow::{Context, Result};
use camp_scout::models::{Accommodation, AccommodationType, Source};
use camp_scout::sources::{GeminiClient, GenerativeSource, NominatimClient};
use camp_scout::{Config, Pipeline, SearchEvent};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Find group accommodation for youth camps
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search hostels, campsites and youth-movement premises around a place
    Search {
        /// Place name, e.g. "Torhout, België"
        location: String,

        /// Search radius in kilometres
        #[arg(short, long, default_value_t = 25.0)]
        radius: f64,

        /// Only search one category (hostel, camping, youth_movement)
        #[arg(short = 't', long = "type")]
        kind: Option<AccommodationType>,

        /// Where to write the JSON response
        #[arg(short, long, default_value = "accommodations.json")]
        output: PathBuf,
    },
    /// Ask the generative model for details about one venue
    Enrich {
        /// Venue name
        name: String,

        #[arg(long)]
        city: String,

        #[arg(long)]
        country: Option<String>,

        #[arg(short = 't', long = "type", default_value = "youth_movement")]
        kind: AccommodationType,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Search {
            location,
            radius,
            kind,
            output,
        } => search(&config, location, radius, kind, output).await,
        Command::Enrich {
            name,
            city,
            country,
            kind,
        } => enrich(&config, name, city, country, kind).await,
    }
}

async fn search(
    config: &Config,
    location: String,
    radius: f64,
    kind: Option<AccommodationType>,
    output: PathBuf,
) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    info!("🏕️ Camp Scout - searching \"{}\" within {} km", location, radius);

    let (tx, mut events) = tokio::sync::mpsc::channel(camp_scout::pipeline::EVENT_BUFFER);
    let task = {
        let pipeline = pipeline.clone();
        let location = location.clone();
        tokio::spawn(async move {
            match kind {
                Some(kind) => pipeline.search_category(&location, radius, kind, Some(tx)).await,
                None => pipeline.search(&location, radius, Some(tx)).await,
            }
        })
    };

    while let Some(event) = events.recv().await {
        match event {
            SearchEvent::Stage { stage } => info!("▶ {}", stage),
            SearchEvent::Progress { results, .. } => info!("{} accommodations so far", results.len()),
            SearchEvent::GenerativeQuery {
                prompt_summary,
                response_excerpt,
            } => info!("🤖 {} → {}", prompt_summary, response_excerpt.replace('\n', " ")),
        }
    }

    let response = task.await.context("Search task panicked")??;

    println!();
    for kind in AccommodationType::ALL {
        let group = response.of_type(kind);
        if group.is_empty() {
            continue;
        }
        println!("== {} ({}) ==", kind, group.len());
        for (i, accommodation) in group.iter().enumerate() {
            print_accommodation(i + 1, accommodation);
        }
    }

    let json = serde_json::to_string_pretty(&response)?;
    tokio::fs::write(&output, json)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("💾 Saved {} accommodations to {}", response.results.len(), output.display());

    Ok(())
}

async fn enrich(
    config: &Config,
    name: String,
    city: String,
    country: Option<String>,
    kind: AccommodationType,
) -> Result<()> {
    let geocoder = Arc::new(NominatimClient::new(config)?);
    let model = Arc::new(GeminiClient::new(config)?);
    let source = GenerativeSource::new(model, geocoder);

    let mut accommodation = Accommodation::new("cli-1", name, kind, Source::Generative);
    accommodation.city = Some(city);
    accommodation.country = country;

    let enriched = source.enrich(&accommodation).await;
    println!("{}", serde_json::to_string_pretty(&enriched)?);
    Ok(())
}

fn print_accommodation(index: usize, accommodation: &Accommodation) {
    let distance = accommodation
        .distance
        .map(|d| format!("{d:.1} km"))
        .unwrap_or_else(|| "? km".to_string());
    println!("{}. {} ({})", index, accommodation.name, distance);
    if let Some(address) = &accommodation.address {
        println!("   {}", address);
    }
    if let Some(website) = &accommodation.website {
        let note = if accommodation.source == Source::Generative {
            " (unverified)"
        } else {
            ""
        };
        println!("   {}{}", website, note);
    }
    if let Some(phone) = &accommodation.phone {
        println!("   ☎ {}", phone);
    }
    if accommodation.approximate_location {
        println!("   location not confirmed");
    }
    println!("   ID: {}", accommodation.id);
}
