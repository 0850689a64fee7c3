//! kc-project: canonical plant configuration format and validation.

pub mod migrate;
pub mod schema;
pub mod template;
pub mod validate;

pub use migrate::{LATEST_VERSION, migrate_to_latest};
pub use schema::*;
pub use template::plant_template;
pub use validate::{ValidationError, validate_plant};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse, migrate and validate a plant from YAML text.
pub fn parse_yaml(content: &str) -> ProjectResult<Plant> {
    let mut plant: Plant = serde_yaml::from_str(content)?;
    plant = migrate_to_latest(plant)?;
    validate_plant(&plant)?;
    Ok(plant)
}

pub fn load_yaml(path: &std::path::Path) -> ProjectResult<Plant> {
    let content = std::fs::read_to_string(path)?;
    parse_yaml(&content)
}

pub fn save_yaml(path: &std::path::Path, plant: &Plant) -> ProjectResult<()> {
    validate_plant(plant)?;
    let content = serde_yaml::to_string(plant)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> ProjectResult<Plant> {
    let content = std::fs::read_to_string(path)?;
    let mut plant: Plant = serde_json::from_str(&content)?;
    plant = migrate_to_latest(plant)?;
    validate_plant(&plant)?;
    Ok(plant)
}

pub fn save_json(path: &std::path::Path, plant: &Plant) -> ProjectResult<()> {
    validate_plant(plant)?;
    let content = serde_json::to_string_pretty(plant)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a plant file, choosing the format from its extension.
pub fn load_plant(path: &std::path::Path) -> ProjectResult<Plant> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => load_json(path),
        _ => load_yaml(path),
    }
}
