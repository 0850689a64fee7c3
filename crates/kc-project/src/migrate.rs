//! Schema migration framework.

use crate::ProjectError;
use crate::schema::Plant;

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut plant: Plant) -> Result<Plant, ProjectError> {
    while plant.version < LATEST_VERSION {
        plant = migrate_one_version(plant)?;
    }
    Ok(plant)
}

fn migrate_one_version(plant: Plant) -> Result<Plant, ProjectError> {
    match plant.version {
        0 => migrate_v0_to_v1(plant),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

/// v0 files share the v1 shape; only the version moves.
fn migrate_v0_to_v1(mut plant: Plant) -> Result<Plant, ProjectError> {
    plant.version = 1;
    Ok(plant)
}
