//! Item record persistence.

use std::fs;

use super::{write_atomic, DataDir, StoreError, StoreResult};
use crate::item::ItemRecord;

pub fn save(dir: &DataDir, item: &ItemRecord) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(item)?;
    write_atomic(&dir.item_path(&item.id), &bytes)
}

pub fn load(dir: &DataDir, id: &str) -> StoreResult<ItemRecord> {
    let bytes = match fs::read(dir.item_path(id)) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(id.to_string()))
        }
        Err(err) => return Err(err.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn exists(dir: &DataDir, id: &str) -> bool {
    dir.item_path(id).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemSeed, ItemStatus, RawFacts};

    fn make_item(id: &str) -> ItemRecord {
        ItemRecord::new(ItemSeed {
            id: Some(id.to_string()),
            facts: RawFacts {
                address: "12 Ridge Rd".into(),
                valuation_cents: 30_000_000,
                judgment_cents: 12_000_000,
                repair_cents: 0,
                plaintiff_name: "First National Bank".into(),
                liens: Vec::new(),
            },
        })
        .unwrap()
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::open(tmp.path()).unwrap();
        let mut item = make_item("case-1");
        item.status = ItemStatus::Running { stage: 3 };
        save(&dir, &item).unwrap();

        let loaded = load(&dir, "case-1").unwrap();
        assert_eq!(loaded.id, "case-1");
        assert_eq!(loaded.status, ItemStatus::Running { stage: 3 });
        assert_eq!(loaded.raw, item.raw);
        assert!(exists(&dir, "case-1"));
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::open(tmp.path()).unwrap();
        let err = load(&dir, "ghost").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "ghost"));
        assert!(!exists(&dir, "ghost"));
    }

    #[test]
    fn test_save_overwrites_previous_state() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::open(tmp.path()).unwrap();
        let mut item = make_item("case-2");
        save(&dir, &item).unwrap();
        item.stage_index = 5;
        item.status = ItemStatus::Done;
        save(&dir, &item).unwrap();

        let loaded = load(&dir, "case-2").unwrap();
        assert_eq!(loaded.stage_index, 5);
        assert_eq!(loaded.status, ItemStatus::Done);
    }
}
