use clap::Parser;
use dotenvy::dotenv;
use recipe_backend::config::AppConfig;
use recipe_backend::infrastructure::seed::{
    IngredientFixture, TagFixture, read_fixture, seed_images, seed_ingredients, seed_tags,
};
use recipe_backend::infrastructure::{database, storage};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Loads ingredient and tag fixtures into the database and copies fixture
/// images into the configured storage.
#[derive(Parser, Debug)]
#[command(name = "load_fixtures")]
struct Args {
    /// JSON array of `{name, measurement_unit}`
    #[arg(long)]
    ingredients: Option<PathBuf>,

    /// JSON array of `{name, color, slug}`
    #[arg(long)]
    tags: Option<PathBuf>,

    /// Directory whose files are uploaded under their relative paths
    #[arg(long)]
    images: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "load_fixtures=info,recipe_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if args.ingredients.is_none() && args.tags.is_none() && args.images.is_none() {
        error!("❌ Nothing to load: pass --ingredients, --tags and/or --images");
        info!("Usage: cargo run --bin load_fixtures -- --ingredients data/ingredients.json");
        std::process::exit(1);
    }

    if let Some(dir) = &args.images {
        let config = AppConfig::from_env();
        let storage = storage::setup_storage(&config).await?;
        seed_images(storage.as_ref(), dir).await?;
    }

    if args.ingredients.is_none() && args.tags.is_none() {
        info!("✅ Fixtures loaded");
        return Ok(());
    }

    info!("🔌 Connecting to database...");
    let db = database::setup_database().await?;

    if let Some(path) = args.ingredients {
        info!("📄 Reading {}", path.display());
        let items: Vec<IngredientFixture> = read_fixture(&path).await?;
        seed_ingredients(&db, items).await?;
    }

    if let Some(path) = args.tags {
        info!("📄 Reading {}", path.display());
        let items: Vec<TagFixture> = read_fixture(&path).await?;
        seed_tags(&db, items).await?;
    }

    info!("✅ Fixtures loaded");
    Ok(())
}
