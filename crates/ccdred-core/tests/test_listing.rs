use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use ccdred_core::error::ReductionError;
use ccdred_core::io::listing::{read_list_file, WorkingList};

#[test]
fn test_materialize_writes_one_path_per_line() {
    let tmp = TempDir::new().unwrap();
    let list = WorkingList::materialize(tmp.path(), "tmp_inp", ["a.fits", "b.fits"]).unwrap();

    assert_eq!(list.len(), 2);
    assert_eq!(fs::read_to_string(list.path()).unwrap(), "a.fits\nb.fits\n");
    assert_eq!(
        read_list_file(list.path()).unwrap(),
        vec![PathBuf::from("a.fits"), PathBuf::from("b.fits")]
    );
}

#[test]
fn test_release_deletes_file() {
    let tmp = TempDir::new().unwrap();
    let list = WorkingList::materialize(tmp.path(), "tmp_inp", ["a.fits"]).unwrap();
    let path = list.path().to_path_buf();
    list.release().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_drop_deletes_file() {
    let tmp = TempDir::new().unwrap();
    let path = {
        let list = WorkingList::materialize(tmp.path(), "tmp_inp", ["a.fits"]).unwrap();
        list.path().to_path_buf()
    };
    assert!(!path.exists());
}

#[test]
fn test_drop_on_error_path_deletes_file() {
    fn failing_stage(dir: &std::path::Path) -> ccdred_core::error::Result<()> {
        let _list = WorkingList::materialize(dir, "tmp_inp", ["a.fits"])?;
        Err(ReductionError::engine("combine", "boom"))
    }
    let tmp = TempDir::new().unwrap();
    assert!(failing_stage(tmp.path()).is_err());
    assert!(!tmp.path().join("tmp_inp").exists());
}

#[test]
fn test_retained_list_survives_release() {
    let tmp = TempDir::new().unwrap();
    let list = WorkingList::materialize(tmp.path(), "tmp_inp", ["a.fits"])
        .unwrap()
        .retain(true);
    let path = list.path().to_path_buf();
    list.release().unwrap();
    assert!(path.exists());
}

#[test]
fn test_release_reports_missing_file() {
    let tmp = TempDir::new().unwrap();
    let list = WorkingList::materialize(tmp.path(), "tmp_inp", ["a.fits"]).unwrap();
    fs::remove_file(list.path()).unwrap();
    assert!(matches!(
        list.release(),
        Err(ReductionError::Filesystem { op: "remove", .. })
    ));
}

#[test]
fn test_empty_list_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let entries: Vec<PathBuf> = Vec::new();
    assert!(matches!(
        WorkingList::materialize(tmp.path(), "tmp_inp", entries),
        Err(ReductionError::EmptySequence)
    ));
    assert!(!tmp.path().join("tmp_inp").exists());
}
