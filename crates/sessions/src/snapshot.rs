//! Session snapshot file.
//!
//! JSON object keyed by `"<token>::<key>"`:
//! `{"<token>::<key>": {"subjectId": "1", "lastActionAt": 1700000000}}`.
//! Written to a sibling temp file, synced, then renamed over the old file.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gatehouse_core::UserId;

use crate::error::SessionResult;
use crate::session::Session;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    subject_id: UserId,
    last_action_at: i64,
}

/// Load a snapshot; a missing file is an empty table.
pub(crate) fn load(path: &Path) -> SessionResult<HashMap<String, Session>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };
    let records: BTreeMap<String, Record> = serde_json::from_reader(BufReader::new(file))?;
    Ok(records
        .into_iter()
        .map(|(id, r)| (id, Session::new(r.subject_id, r.last_action_at)))
        .collect())
}

pub(crate) fn write(path: &Path, sessions: &HashMap<String, Session>) -> SessionResult<()> {
    let records: BTreeMap<&str, Record> = sessions
        .iter()
        .map(|(id, s)| {
            (
                id.as_str(),
                Record {
                    subject_id: s.subject_id().clone(),
                    last_action_at: s.last_action_at(),
                },
            )
        })
        .collect();

    let tmp = temp_path(path);
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, &records)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sessions".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_format_is_keyed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let mut sessions = HashMap::new();
        sessions.insert("tok::key".to_string(), Session::new(UserId::new("7"), 1_700_000_000));

        write(&path, &sessions).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({"tok::key": {"subjectId": "7", "lastActionAt": 1_700_000_000}})
        );
        assert!(!temp_path(&path).exists());

        let loaded = load(&path).unwrap();
        assert_eq!(loaded["tok::key"].subject_id().as_str(), "7");
        assert_eq!(loaded["tok::key"].last_action_at(), 1_700_000_000);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("sessions.db")).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(load(&path), Err(crate::SessionError::Snapshot(_))));
    }
}
