//! Named profile persistence.

use std::collections::BTreeSet;

use presso_config::{ProfileDir, ProfileRow};

use crate::error::StoreError;
use crate::profile::{Profile, ProfilePoint};

/// Load/save/list of named profiles.
pub trait ProfileStore {
    fn load(&self, name: &str) -> Result<Profile, StoreError>;
    fn save(&mut self, name: &str, profile: &Profile) -> Result<(), StoreError>;
    fn list(&self) -> Result<BTreeSet<String>, StoreError>;
}

/// Profiles as `<name>.csv` files (`time,pressure`) in one directory.
#[derive(Debug, Clone)]
pub struct CsvProfileStore {
    dir: ProfileDir,
}

impl CsvProfileStore {
    pub fn new(dir: ProfileDir) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &ProfileDir {
        &self.dir
    }
}

fn check_name(name: &str) -> Result<(), StoreError> {
    if ProfileDir::is_valid_name(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

impl ProfileStore for CsvProfileStore {
    fn load(&self, name: &str) -> Result<Profile, StoreError> {
        check_name(name)?;
        if !self.dir.exists(name) {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let rows = self
            .dir
            .load(name)
            .map_err(|e| StoreError::Backend(format!("{e:#}")))?;
        let points = rows.into_iter().map(ProfilePoint::from).collect();
        let profile = Profile::from_points(points).map_err(|source| StoreError::Profile {
            name: name.to_string(),
            source,
        })?;
        tracing::debug!(profile = name, points = profile.len(), "profile loaded");
        Ok(profile)
    }

    fn save(&mut self, name: &str, profile: &Profile) -> Result<(), StoreError> {
        check_name(name)?;
        let rows: Vec<ProfileRow> = profile.points().iter().map(ProfileRow::from).collect();
        self.dir
            .save(name, &rows)
            .map_err(|e| StoreError::Backend(format!("{e:#}")))
    }

    fn list(&self) -> Result<BTreeSet<String>, StoreError> {
        self.dir
            .list()
            .map_err(|e| StoreError::Backend(format!("{e:#}")))
    }
}
