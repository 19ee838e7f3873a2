//! Database initialization
//!
//! Creates the database on first run, applies the schema idempotently and
//! seeds the fixed section catalog plus the starting keyword table. Safe to
//! call on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default French store sections, in aisle order. The slug set is fixed;
/// labels and positions may be edited afterwards.
const SECTION_SEED: &[(i64, &str, &str)] = &[
    (0, "fruits_legumes", "Fruits & Légumes"),
    (1, "viande_volaille", "Viande & Volaille"),
    (2, "poisson_fruits_de_mer", "Poisson & Fruits de mer"),
    (3, "charcuterie", "Charcuterie"),
    (4, "produits_laitiers_oeufs", "Produits laitiers & Œufs"),
    (5, "epicerie", "Épicerie (sucré / salé)"),
    (6, "boulangerie", "Boulangerie"),
    (7, "boissons", "Boissons"),
    (8, "surgeles", "Surgelés"),
    (9, "hygiene_maison", "Hygiène & Maison"),
    (10, "autre", "Autre"),
];

/// Starting keyword table (keyword -> section slug). Grows at runtime as the
/// classifier teaches new mappings.
const KEYWORD_SEED: &[(&str, &str)] = &[
    ("pomme", "fruits_legumes"),
    ("poire", "fruits_legumes"),
    ("banane", "fruits_legumes"),
    ("orange", "fruits_legumes"),
    ("citron", "fruits_legumes"),
    ("tomate", "fruits_legumes"),
    ("salade", "fruits_legumes"),
    ("carotte", "fruits_legumes"),
    ("oignon", "fruits_legumes"),
    ("ail", "fruits_legumes"),
    ("pomme de terre", "fruits_legumes"),
    ("patate", "fruits_legumes"),
    ("courgette", "fruits_legumes"),
    ("aubergine", "fruits_legumes"),
    ("poivron", "fruits_legumes"),
    ("concombre", "fruits_legumes"),
    ("haricot", "fruits_legumes"),
    ("petit pois", "fruits_legumes"),
    ("épinard", "fruits_legumes"),
    ("brocoli", "fruits_legumes"),
    ("chou", "fruits_legumes"),
    ("fruits", "fruits_legumes"),
    ("légumes", "fruits_legumes"),
    ("legumes", "fruits_legumes"),
    ("viande", "viande_volaille"),
    ("poulet", "viande_volaille"),
    ("boeuf", "viande_volaille"),
    ("bœuf", "viande_volaille"),
    ("steak", "viande_volaille"),
    ("porc", "viande_volaille"),
    ("agneau", "viande_volaille"),
    ("volaille", "viande_volaille"),
    ("dinde", "viande_volaille"),
    ("poisson", "poisson_fruits_de_mer"),
    ("saumon", "poisson_fruits_de_mer"),
    ("truite", "poisson_fruits_de_mer"),
    ("cabillaud", "poisson_fruits_de_mer"),
    ("crevette", "poisson_fruits_de_mer"),
    ("moule", "poisson_fruits_de_mer"),
    ("thon", "poisson_fruits_de_mer"),
    ("fruits de mer", "poisson_fruits_de_mer"),
    ("charcuterie", "charcuterie"),
    ("jambon", "charcuterie"),
    ("saucisson", "charcuterie"),
    ("bacon", "charcuterie"),
    ("pâté", "charcuterie"),
    ("pate", "charcuterie"),
    ("lait", "produits_laitiers_oeufs"),
    ("yaourt", "produits_laitiers_oeufs"),
    ("yogourt", "produits_laitiers_oeufs"),
    ("fromage", "produits_laitiers_oeufs"),
    ("crème", "produits_laitiers_oeufs"),
    ("creme", "produits_laitiers_oeufs"),
    ("beurre", "produits_laitiers_oeufs"),
    ("œuf", "produits_laitiers_oeufs"),
    ("oeuf", "produits_laitiers_oeufs"),
    ("oeufs", "produits_laitiers_oeufs"),
    ("œufs", "produits_laitiers_oeufs"),
    ("riz", "epicerie"),
    ("pâtes", "epicerie"),
    ("pates", "epicerie"),
    ("huile", "epicerie"),
    ("vinaigre", "epicerie"),
    ("sucre", "epicerie"),
    ("farine", "epicerie"),
    ("sel", "epicerie"),
    ("épice", "epicerie"),
    ("epice", "epicerie"),
    ("sauce", "epicerie"),
    ("conserve", "epicerie"),
    ("céréale", "epicerie"),
    ("cereale", "epicerie"),
    ("biscuit", "epicerie"),
    ("chocolat", "epicerie"),
    ("confiture", "epicerie"),
    ("miel", "epicerie"),
    ("café", "epicerie"),
    ("cafe", "epicerie"),
    ("thé", "epicerie"),
    ("the", "epicerie"),
    ("pain", "boulangerie"),
    ("baguette", "boulangerie"),
    ("croissant", "boulangerie"),
    ("brioche", "boulangerie"),
    ("boulangerie", "boulangerie"),
    ("eau", "boissons"),
    ("jus", "boissons"),
    ("soda", "boissons"),
    ("vin", "boissons"),
    ("bière", "boissons"),
    ("biere", "boissons"),
    ("boisson", "boissons"),
    ("coca", "boissons"),
    ("surgelé", "surgeles"),
    ("surgelés", "surgeles"),
    ("surgeles", "surgeles"),
    ("glace", "surgeles"),
    ("frites", "surgeles"),
    ("savon", "hygiene_maison"),
    ("shampoing", "hygiene_maison"),
    ("dentifrice", "hygiene_maison"),
    ("papier toilette", "hygiene_maison"),
    ("lessive", "hygiene_maison"),
    ("éponge", "hygiene_maison"),
    ("eponge", "hygiene_maison"),
];

/// Initialize database connection, create tables and seed reference data
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Connection options apply to every pooled connection: foreign keys
    // (the RESTRICT on items.section_id is load-bearing), WAL for concurrent
    // readers with one writer, and a busy timeout for writer contention.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Schema creation and seeding are idempotent; safe on every startup
    create_sections_table(&pool).await?;
    create_section_keywords_table(&pool).await?;
    create_lists_table(&pool).await?;
    create_items_table(&pool).await?;
    create_access_tokens_table(&pool).await?;

    seed_sections(&pool).await?;
    seed_keywords(&pool).await?;

    Ok(pool)
}

async fn create_sections_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name_slug TEXT NOT NULL UNIQUE,
            label_fr TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_section_keywords_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS section_keywords (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            keyword TEXT NOT NULL UNIQUE,
            section_id INTEGER NOT NULL
                REFERENCES sections(id) ON DELETE CASCADE
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_lists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS lists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0,
            position INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            list_id TEXT NOT NULL
                REFERENCES lists(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            section_id INTEGER NOT NULL
                REFERENCES sections(id) ON DELETE RESTRICT,
            quantity TEXT NOT NULL DEFAULT '',
            notes TEXT NOT NULL DEFAULT '',
            checked INTEGER NOT NULL DEFAULT 0,
            position INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_items_list_section
         ON items(list_id, section_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_access_tokens_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS access_tokens (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            token TEXT NOT NULL UNIQUE,
            label TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            revoked INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn seed_sections(pool: &SqlitePool) -> Result<()> {
    for &(position, slug, label) in SECTION_SEED {
        sqlx::query(
            "INSERT OR IGNORE INTO sections (name_slug, label_fr, position)
             VALUES (?, ?, ?)",
        )
        .bind(slug)
        .bind(label)
        .bind(position)
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn seed_keywords(pool: &SqlitePool) -> Result<()> {
    for &(keyword, slug) in KEYWORD_SEED {
        sqlx::query(
            "INSERT OR IGNORE INTO section_keywords (keyword, section_id)
             SELECT ?, id FROM sections WHERE name_slug = ?",
        )
        .bind(keyword)
        .bind(slug)
        .execute(pool)
        .await?;
    }
    Ok(())
}
