use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::shared::emotion::EmotionVector;
use crate::stream::domain::persistence::EmotionRecordGateway;

#[derive(Serialize)]
struct EmotionRecord<'a> {
    user_id: &'a str,
    /// Unix seconds.
    timestamp: f64,
    emotions: &'a EmotionVector,
}

/// Appends one JSON object per stored record to a file.
pub struct JsonlRecordStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlRecordStore {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::info!("Storing emotion records in {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EmotionRecordGateway for JsonlRecordStore {
    fn save_emotion_record(
        &self,
        user_id: &str,
        emotions: &EmotionVector,
        timestamp: SystemTime,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let timestamp = timestamp.duration_since(UNIX_EPOCH)?.as_secs_f64();
        let mut line = serde_json::to_vec(&EmotionRecord {
            user_id,
            timestamp,
            emotions,
        })?;
        line.push(b'\n');

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}
