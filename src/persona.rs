//! Persona directives - free-text system prompts keyed by persona id.
//!
//! Read-only from the pipeline's perspective; operators drop `<id>.txt`
//! files into the persona directory out of band.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::Result;
use crate::history::sanitize_id;

/// Loads persona directive text from `<persona_dir>/<sanitized_id>.txt`.
pub struct PersonaStore {
    dir: PathBuf,
}

impl PersonaStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load the directive for a persona. Missing or empty files mean no
    /// persona; unreadable files degrade the same way.
    pub fn load(&self, persona_id: &str) -> Result<Option<String>> {
        let stem = sanitize_id(persona_id)?;
        let path = self.dir.join(format!("{}.txt", stem));
        if !path.exists() {
            return Ok(None);
        }

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to read persona file {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        let text = text.trim();
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text.to_string()))
        }
    }
}
