use crate::entities::{ingredients, prelude::*, tags};
use crate::services::storage::{StorageService, validate_key};
use crate::utils::validation::{validate_hex_color, validate_slug};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct IngredientFixture {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Deserialize)]
pub struct TagFixture {
    pub name: String,
    pub color: String,
    pub slug: String,
}

pub async fn read_fixture<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<Vec<T>> {
    let raw = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Inserts ingredients whose (name, unit) pair is not present yet.
/// Returns the number of inserted rows.
pub async fn seed_ingredients(
    db: &DatabaseConnection,
    items: Vec<IngredientFixture>,
) -> anyhow::Result<usize> {
    info!("🌱 Seeding {} ingredients...", items.len());

    let mut inserted = 0;
    for item in items {
        let name = item.name.trim().to_string();
        let unit = item.measurement_unit.trim().to_string();
        if name.is_empty() {
            warn!("   - Skipping ingredient with empty name");
            continue;
        }

        let exists = Ingredients::find()
            .filter(ingredients::Column::Name.eq(&name))
            .filter(ingredients::Column::MeasurementUnit.eq(&unit))
            .one(db)
            .await?;

        if exists.is_none() {
            ingredients::ActiveModel {
                name: Set(name),
                measurement_unit: Set(unit),
                ..Default::default()
            }
            .insert(db)
            .await?;
            inserted += 1;
        }
    }

    info!("✅ Inserted {} new ingredients", inserted);
    Ok(inserted)
}

/// Inserts tags by slug, skipping existing slugs and invalid rows.
pub async fn seed_tags(db: &DatabaseConnection, items: Vec<TagFixture>) -> anyhow::Result<usize> {
    info!("🌱 Seeding {} tags...", items.len());

    let mut inserted = 0;
    for item in items {
        if validate_slug(&item.slug).is_err() || validate_hex_color(&item.color).is_err() {
            warn!("   - Skipping invalid tag fixture: {}", item.slug);
            continue;
        }

        let exists = Tags::find()
            .filter(tags::Column::Slug.eq(&item.slug))
            .one(db)
            .await?;

        if exists.is_none() {
            tags::ActiveModel {
                name: Set(item.name),
                color: Set(item.color),
                slug: Set(item.slug),
                ..Default::default()
            }
            .insert(db)
            .await?;
            inserted += 1;
        }
    }

    info!("✅ Inserted {} new tags", inserted);
    Ok(inserted)
}

/// Uploads every file under `dir` keyed by its path relative to `dir`, so
/// fixture recipes can reference images like `recipes/images/pie.jpg`.
/// Keys already present are left alone.
pub async fn seed_images(storage: &dyn StorageService, dir: &Path) -> anyhow::Result<usize> {
    info!("🌱 Copying fixture images from {}...", dir.display());

    let mut inserted = 0;
    let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
                continue;
            }

            let key = path
                .strip_prefix(dir)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if validate_key(&key).is_err() {
                warn!("   - Skipping unusable file name: {}", path.display());
                continue;
            }
            if storage.file_exists(&key).await? {
                continue;
            }

            storage.upload_file(&key, tokio::fs::read(&path).await?).await?;
            inserted += 1;
        }
    }

    info!("✅ Copied {} new images", inserted);
    Ok(inserted)
}
