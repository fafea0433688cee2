//! CLI interface for breed search

use anyhow::{Context, Result};
use breedsearch::config::ModelBackendKind;
use breedsearch::model::{Categories, ModelBackend};
use breedsearch::{
    AppConfig, BreedLabelMap, BreedSearcher, Corpus, Indexer, Predictor, SimilarImageFinder,
    Vector,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "breedsearch")]
#[command(about = "Dog breed prediction and similar-image search", long_about = None)]
struct Cli {
    /// JSON configuration file. Missing fields use the defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of corpus images
    #[arg(long, global = true)]
    images_dir: Option<PathBuf>,

    /// Index file; the item catalog sits next to it
    #[arg(long, global = true)]
    index_path: Option<PathBuf>,

    /// Breed label map (JSON)
    #[arg(long, global = true)]
    label_map: Option<PathBuf>,

    /// Model backend
    #[arg(long, value_enum, global = true)]
    backend: Option<ModelBackendKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed the corpus and build the index
    Index {
        /// Number of trees in the forest
        #[arg(short, long)]
        trees: Option<usize>,
    },
    /// Predict a breed for every corpus image and write the label map
    Label,
    /// Predict the breed of one image
    Predict {
        /// Image file
        image: PathBuf,
    },
    /// Find corpus images predicted as a breed
    Search {
        /// Breed name or part of one (e.g. "terrier")
        breed: String,
    },
    /// Find images similar to a corpus image or an image file
    Similar {
        /// Corpus filename or path to an image
        image: String,
        /// Number of neighbours
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Query the index with a raw embedding
    Query {
        /// Embedding as comma-separated values (e.g., "0.1,0.2,...")
        vector: String,
        /// Number of results to return
        #[arg(short, long, default_value = "5")]
        k: usize,
    },
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long)]
        addr: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = &cli.images_dir {
        config.images_dir = dir.clone();
    }
    if let Some(path) = &cli.index_path {
        config.index_path = path.clone();
    }
    if let Some(path) = &cli.label_map {
        config.label_map_path = path.clone();
    }
    if let Some(backend) = cli.backend {
        config.model.backend = backend;
    }
    match &cli.command {
        Commands::Index { trees: Some(trees) } => config.n_trees = *trees,
        Commands::Serve { addr: Some(addr) } => config.addr = addr.clone(),
        _ => {}
    }
    config.validate()?;
    Ok(config)
}

fn load_predictor(config: &AppConfig, backend: &ModelBackend) -> Result<Predictor> {
    let classifier = backend.require_classifier()?;
    let categories = Categories::load(&config.model.categories_path).with_context(|| {
        format!(
            "loading categories from {}",
            config.model.categories_path.display()
        )
    })?;
    Ok(Predictor::new(classifier, categories)?)
}

fn run(config: AppConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Index { .. } => {
            let backend = ModelBackend::from_config(&config.model)?;
            let corpus = Corpus::open(&config.images_dir)?;
            let indexer = Indexer::from_config(&config, backend.embedder)?;
            let build = indexer.build_and_save(&corpus, &config.index_path)?;
            println!(
                "Indexed {} images ({} skipped) into {}",
                build.report.processed_count(),
                build.report.skipped_count(),
                config.index_path.display()
            );
        }
        Commands::Label => {
            let backend = ModelBackend::from_config(&config.model)?;
            let predictor = load_predictor(&config, &backend)?;
            let corpus = Corpus::open(&config.images_dir)?;
            let (map, report) = BreedLabelMap::generate(&corpus, &predictor)?;
            map.save(&config.label_map_path)?;
            println!(
                "Labelled {} images ({} skipped) into {}",
                map.len(),
                report.skipped_count(),
                config.label_map_path.display()
            );
        }
        Commands::Predict { image } => {
            let backend = ModelBackend::from_config(&config.model)?;
            let predictor = load_predictor(&config, &backend)?;
            let breed = predictor
                .predict_path(&image)
                .with_context(|| format!("Error processing image {}", image.display()))?;
            println!("{}", breed);
        }
        Commands::Search { breed } => {
            let searcher = BreedSearcher::from_config(&config)?;
            let found = searcher.search(&breed)?;
            if found.matches.is_empty() {
                println!("No similar images found for breed: {}", breed);
                if let Some(s) = found.suggestion {
                    println!("Did you mean: {}?", s.breed);
                }
            } else {
                for name in &found.matches {
                    println!("{}", name);
                }
                if let Some(path) = found.grid_path {
                    println!("Grid saved to {}", path.display());
                }
            }
        }
        Commands::Similar { image, k } => {
            let backend = ModelBackend::from_config(&config.model)?;
            let finder = SimilarImageFinder::from_config(&config, backend.embedder)?;
            let result = finder.render(&image, k.unwrap_or(config.search.similar_k))?;
            println!("Top {} results for {}:", result.neighbours.len(), result.query);
            for (i, n) in result.neighbours.iter().enumerate() {
                println!("{}. {} (distance: {:.4})", i + 1, n.name, n.distance);
            }
            println!("Grid saved to {}", result.grid_path.display());
        }
        Commands::Query { vector, k } => {
            let backend = ModelBackend::from_config(&config.model)?;
            let finder = SimilarImageFinder::from_config(&config, backend.embedder)?;
            let q = Vector::from_str(&vector)?;
            let results = finder.nearest(&q, k)?;
            if results.is_empty() {
                println!("No results found (index is empty)");
            } else {
                println!("Top {} results:", results.len());
                for (i, r) in results.iter().enumerate() {
                    println!("{}. {} [{}] (distance: {:.4})", i + 1, r.name, r.id, r.distance);
                }
            }
        }
        Commands::Serve { .. } => {
            unreachable!("Serve handled separately");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    breedsearch::init_logging();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Handle serve command specially; it needs the async runtime
    if let Commands::Serve { .. } = cli.command {
        return breedsearch::server::start(config).await;
    }

    let command = cli.command;
    tokio::task::spawn_blocking(move || run(config, command)).await?
}
