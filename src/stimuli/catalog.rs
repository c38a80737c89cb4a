use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;

/// Catalog subset ids carried in `StimulusObject::target`.
pub const SUBSET_ATYPICAL: u8 = 1;
pub const SUBSET_PARENT_CLASS_1: u8 = 2;
pub const SUBSET_PARENT_CLASS_2: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distr {
    Atypical,
    #[serde(rename = "parent_class_1")]
    ParentClass1,
    #[serde(rename = "parent_class_2")]
    ParentClass2,
}

/// One tangram definition. Never mutated once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusObject {
    pub name: String,
    pub class_1: String,
    pub class_2: String,
    pub distr: Distr,
    pub is_parent: bool,
    #[serde(default)]
    pub parent_class_of: Vec<String>,
    pub width: f64,
    pub height: f64,
    pub color: String,
    pub target: u8,
}

impl StimulusObject {
    /// True if both objects are listed as parents of at least one common item.
    pub fn shares_parent_with(&self, other: &StimulusObject) -> bool {
        self.parent_class_of
            .iter()
            .any(|child| other.parent_class_of.contains(child))
    }
}

/// The full, read-only set of stimuli available to every session.
#[derive(Debug, Clone)]
pub struct StimulusCatalog {
    objects: Vec<StimulusObject>,
}

impl StimulusCatalog {
    /// Validate and wrap a list of stimuli. Names must be unique.
    pub fn from_objects(objects: Vec<StimulusObject>) -> Result<Self, CatalogError> {
        if objects.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut names = HashSet::new();
        for object in &objects {
            if !names.insert(object.name.as_str()) {
                return Err(CatalogError::DuplicateName(object.name.clone()));
            }
        }
        Ok(Self { objects })
    }

    pub fn from_json(contents: &str) -> Result<Self, CatalogError> {
        let objects: Vec<StimulusObject> = serde_json::from_str(contents)?;
        Self::from_objects(objects)
    }

    /// Load the catalog from a JSON array on disk.
    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&contents)?;
        info!(
            "Loaded stimulus catalog with {} objects from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn all(&self) -> &[StimulusObject] {
        &self.objects
    }

    /// Every object whose `target` subset id equals `subset`.
    pub fn subset(&self, subset: u8) -> Vec<&StimulusObject> {
        self.objects.iter().filter(|o| o.target == subset).collect()
    }

    pub fn get(&self, name: &str) -> Option<&StimulusObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
