//! Per-session memory entry files
//!
//! Each entry is one JSON file under `.kb/memory/<session_id>/`, named
//! `mem-<ts>-<rand>.json` so concurrent writers in one session never
//! collide.

use std::fs;
use std::path::Path;

use rand::Rng;
use tracing::warn;

use crate::memory::MemoryEntry;

/// Persist one memory entry for a session; returns the file name
pub fn save_session_entry(
    base: impl AsRef<Path>,
    session_id: &str,
    entry: &MemoryEntry,
) -> eyre::Result<String> {
    let dir = base.as_ref().join(session_id);
    fs::create_dir_all(&dir)?;

    let rand_suffix: u16 = rand::rng().random();
    let name = format!("mem-{}-{:04x}.json", crate::now_ms(), rand_suffix);
    fs::write(dir.join(&name), serde_json::to_string_pretty(entry)?)?;
    Ok(name)
}

/// Load all memory entries of a session, oldest file first
///
/// Unparsable files are skipped with a warning; a missing session is empty.
pub fn list_session_entries(base: impl AsRef<Path>, session_id: &str) -> Vec<MemoryEntry> {
    let dir = base.as_ref().join(session_id);
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .flatten()
        .filter_map(|e| e.file_name().to_str().map(|s| s.to_string()))
        .filter(|n| n.starts_with("mem-") && n.ends_with(".json"))
        .collect();
    names.sort();

    names
        .iter()
        .filter_map(|name| {
            let content = fs::read_to_string(dir.join(name)).ok()?;
            match serde_json::from_str(&content) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(%name, error = %e, "list_session_entries: skipping unparsable entry");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCategory;
    use tempfile::tempdir;

    fn entry(id: u64, content: &str) -> MemoryEntry {
        MemoryEntry {
            id,
            category: MemoryCategory::Finding,
            content: content.to_string(),
            confidence: 0.9,
            source: "test".to_string(),
            iteration: 1,
            supersedes: None,
            updated_at: crate::now_ms(),
            confirmations: 0,
        }
    }

    #[test]
    fn test_save_and_list_round_trip() {
        let temp = tempdir().unwrap();
        let name = save_session_entry(temp.path(), "s-1", &entry(1, "first")).unwrap();
        assert!(name.starts_with("mem-"));
        std::thread::sleep(std::time::Duration::from_millis(5));
        save_session_entry(temp.path(), "s-1", &entry(2, "second")).unwrap();

        let entries = list_session_entries(temp.path(), "s-1");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "first");
        assert_eq!(entries[1].content, "second");
    }

    #[test]
    fn test_missing_session_is_empty() {
        let temp = tempdir().unwrap();
        assert!(list_session_entries(temp.path(), "nope").is_empty());
    }

    #[test]
    fn test_corrupt_entry_skipped() {
        let temp = tempdir().unwrap();
        save_session_entry(temp.path(), "s-2", &entry(1, "good")).unwrap();
        fs::write(temp.path().join("s-2/mem-zzz.json"), "{bad").unwrap();

        let entries = list_session_entries(temp.path(), "s-2");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "good");
    }
}
