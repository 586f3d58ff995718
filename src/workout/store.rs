use super::timer::WorkoutTimer;
use crate::error::SetupError;
use crate::ids::WorkoutId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Extension of workout data files.
pub const WORKOUT_EXT: &str = "csv";

/// Directory of workout files, one `<id>.csv` per recorded workout.
#[derive(Debug, Clone)]
pub struct WorkoutStore {
    data_dir: PathBuf,
}

impl WorkoutStore {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, id: &WorkoutId) -> PathBuf {
        self.data_dir.join(format!("{}.{}", id, WORKOUT_EXT))
    }

    /// Load a workout for editing; its file becomes the timer's backing file.
    pub fn load(&self, id: &WorkoutId) -> Result<WorkoutTimer, SetupError> {
        let path = self.path_for(id);
        WorkoutTimer::load(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SetupError::WorkoutNotFound {
                id: id.to_string(),
            },
            _ => SetupError::Io(e),
        })
    }

    /// Every workout in the directory, newest first.
    ///
    /// Date-named identifiers sort chronologically, so the listing is ordered
    /// by identifier, descending. Files whose stem is not a valid identifier
    /// are skipped. A missing directory lists as empty.
    pub fn list(&self) -> io::Result<Vec<WorkoutId>> {
        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(WORKOUT_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<WorkoutId>() {
                Ok(id) => ids.push(id),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping workout file"),
            }
        }
        ids.sort_unstable_by(|a, b| b.cmp(a));
        Ok(ids)
    }
}
