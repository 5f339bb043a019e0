//! JSON-file store: one pretty-printed file per task or event.
//!
//! Layout under the root directory:
//!
//! ```text
//! events/<key>.json
//! tasks/<key>.json
//! ```
//!
//! Keys are the hex SHA-256 digests of the full identifiers. Each record
//! carries its identifier, which is checked again on read.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{require_uri, EventStore, TaskStore};
use crate::core::{Event, Task};
use crate::error::{Error, Result};
use crate::llog_trace;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `root`, creating its directories.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join("events"))?;
        fs::create_dir_all(root.join("tasks"))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, kind: &str, id: &str) -> PathBuf {
        let key = hex::encode(Sha256::digest(id.as_bytes()));
        self.root.join(kind).join(format!("{}.json", key))
    }

    fn write<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        llog_trace!("JsonFileStore write {}", path.display());
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&fs::read_to_string(path)?)?))
    }
}

impl EventStore for JsonFileStore {
    fn save(&self, event: Event) -> Result<Event> {
        self.write(&self.path_for("events", &event.id), &event)?;
        Ok(event)
    }

    fn find(&self, id: &str) -> Result<Option<Event>> {
        let found: Option<Event> = self.read(&self.path_for("events", id))?;
        match found {
            Some(event) if event.id != id => Err(Error::Store(format!(
                "event file for {} holds {}",
                id, event.id
            ))),
            found => Ok(found),
        }
    }
}

impl TaskStore for JsonFileStore {
    fn persist(&self, task: &Task) -> Result<()> {
        let uri = require_uri(task)?;
        self.write(&self.path_for("tasks", uri), task)
    }

    fn save(&self, task: &Task) -> Result<Task> {
        self.persist(task)?;
        Ok(task.clone())
    }

    fn delete(&self, task: &Task) -> Result<()> {
        let path = self.path_for("tasks", require_uri(task)?);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn find(&self, uri: &str) -> Result<Option<Task>> {
        let found: Option<Task> = self.read(&self.path_for("tasks", uri))?;
        match found {
            Some(task) if task.uri.as_deref() != Some(uri) => Err(Error::Store(format!(
                "task file for {} holds {:?}",
                uri, task.uri
            ))),
            found => Ok(found),
        }
    }
}
