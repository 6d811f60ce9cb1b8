#[allow(dead_code)]
mod common;

use std::fs;

use tempfile::TempDir;

use ccdred_core::catalog::{discover_raw_frames, extract_catalog, parse_record};
use ccdred_core::consts::EXTRACT_LIST_NAME;
use ccdred_core::engine::NativeEngine;
use ccdred_core::error::ReductionError;
use ccdred_core::frame::{ExposureTime, FrameType};

use common::{write_all, RawFrame, RecordingEngine};

// ---------------------------------------------------------------------------
// parse_record
// ---------------------------------------------------------------------------

#[test]
fn test_parse_object_row() {
    let r = parse_record("/night/m31_001.fits\tM31\tobject\tV\t60.0\t1.234").unwrap();
    assert_eq!(r.name, "m31_001");
    assert_eq!(r.object, "M31");
    assert_eq!(r.frame_type, FrameType::Object);
    assert_eq!(r.filter.unwrap().as_str(), "V");
    assert_eq!(r.exposure_time, ExposureTime::new(60.0).unwrap());
    assert_eq!(r.airmass, Some(1.234));
}

#[test]
fn test_parse_bias_without_filter() {
    let r = parse_record("/night/b1.fits\tbias\tzero\tINDEF\t0\tINDEF").unwrap();
    assert_eq!(r.frame_type, FrameType::Bias);
    assert!(r.filter.is_none());
    assert!(r.airmass.is_none());
}

#[test]
fn test_parse_dark_ignores_filter_column() {
    let r = parse_record("d1.fits\tdark\tDark Frame\tV\t120\t1.0").unwrap();
    assert_eq!(r.frame_type, FrameType::Dark);
    assert!(r.filter.is_none());
}

#[test]
fn test_parse_flat_requires_filter() {
    let err = parse_record("f1.fits\tflat\tflat\tINDEF\t5\t1.0").unwrap_err();
    assert!(matches!(err, ReductionError::Metadata { ref frame, .. } if frame == "f1"));
}

#[test]
fn test_parse_rejects_missing_exposure() {
    let err = parse_record("o1.fits\tM31\tobject\tV\tINDEF\t1.0").unwrap_err();
    assert!(matches!(err, ReductionError::Metadata { .. }));
}

#[test]
fn test_parse_rejects_non_numeric_exposure() {
    let err = parse_record("o1.fits\tM31\tobject\tV\tlong\t1.0").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("EXPTIME"), "{msg}");
}

#[test]
fn test_parse_rejects_unknown_type() {
    assert!(parse_record("o1.fits\tM31\tarc\tV\t10\t1.0").is_err());
}

#[test]
fn test_parse_rejects_wrong_column_count() {
    assert!(parse_record("o1.fits\tM31\tobject\tV\t10").is_err());
}

// ---------------------------------------------------------------------------
// discover_raw_frames
// ---------------------------------------------------------------------------

#[test]
fn test_discover_filters_extensions_and_sorts() {
    let tmp = TempDir::new().unwrap();
    for name in ["b.fits", "a.FIT", "c.fts", "notes.txt", "org.log"] {
        fs::write(tmp.path().join(name), b"").unwrap();
    }
    fs::create_dir(tmp.path().join("bias.fits")).unwrap();

    let frames = discover_raw_frames(tmp.path()).unwrap();
    let names: Vec<String> = frames
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.FIT", "b.fits", "c.fts"]);
}

// ---------------------------------------------------------------------------
// extract_catalog
// ---------------------------------------------------------------------------

#[test]
fn test_extract_catalog_from_fits_headers() {
    let tmp = TempDir::new().unwrap();
    let frames = write_all(
        tmp.path(),
        &[
            RawFrame::bias("bias1", 100.0),
            RawFrame::dark("dark1", 60.0, 110.0),
            RawFrame::flat("flatV", "V", 5000.0),
            RawFrame::object("m31", "V", 600.0, 1200.0),
        ],
    );

    let catalog = extract_catalog(&NativeEngine::new(), tmp.path(), &frames, false).unwrap();
    assert_eq!(catalog.len(), 4);
    let m31 = catalog.get("m31").unwrap();
    assert_eq!(m31.frame_type, FrameType::Object);
    assert_eq!(m31.exposure_time, ExposureTime::new(600.0).unwrap());
    assert_eq!(m31.filter.as_ref().unwrap().as_str(), "V");
    assert_eq!(m31.airmass, Some(1.25));
    assert!(catalog.get("bias1").unwrap().filter.is_none());
}

#[test]
fn test_extract_removes_working_list() {
    let tmp = TempDir::new().unwrap();
    let frames = write_all(tmp.path(), &[RawFrame::bias("bias1", 100.0)]);
    let engine = RecordingEngine::new();

    extract_catalog(&engine, tmp.path(), &frames, false).unwrap();
    assert!(!tmp.path().join(EXTRACT_LIST_NAME).exists());
    assert_eq!(engine.calls().len(), 1);
}

#[test]
fn test_extract_retains_working_list_in_debug() {
    let tmp = TempDir::new().unwrap();
    let frames = write_all(tmp.path(), &[RawFrame::bias("bias1", 100.0)]);

    extract_catalog(&NativeEngine::new(), tmp.path(), &frames, true).unwrap();
    let list = fs::read_to_string(tmp.path().join(EXTRACT_LIST_NAME)).unwrap();
    assert!(list.contains("bias1.fits"));
}

#[test]
fn test_extract_removes_list_when_engine_fails() {
    let tmp = TempDir::new().unwrap();
    let frames = write_all(tmp.path(), &[RawFrame::bias("bias1", 100.0)]);
    let engine = RecordingEngine::failing("header_fields");

    assert!(extract_catalog(&engine, tmp.path(), &frames, false).is_err());
    assert!(!tmp.path().join(EXTRACT_LIST_NAME).exists());
}

#[test]
fn test_extract_fails_on_missing_keyword() {
    let tmp = TempDir::new().unwrap();
    let mut frame = RawFrame::object("m31", "V", 60.0, 1.0);
    frame.filter = None;
    let frames = write_all(tmp.path(), &[frame]);

    let err = extract_catalog(&NativeEngine::new(), tmp.path(), &frames, false).unwrap_err();
    assert!(matches!(err, ReductionError::Metadata { .. }));
    assert!(err.to_string().contains("FILTER"));
}

#[test]
fn test_extract_rejects_duplicate_names() {
    let tmp = TempDir::new().unwrap();
    let frame = RawFrame::bias("bias1", 100.0);
    let first = frame.write(tmp.path());
    let second = tmp.path().join("bias1.fit");
    fs::copy(&first, &second).unwrap();

    let err = extract_catalog(&NativeEngine::new(), tmp.path(), &[first, second], false)
        .unwrap_err();
    assert!(err.to_string().contains("share"));
}

#[test]
fn test_extract_without_frames_is_metadata_error() {
    let tmp = TempDir::new().unwrap();
    let err = extract_catalog(&NativeEngine::new(), tmp.path(), &[], false).unwrap_err();
    assert!(matches!(err, ReductionError::Metadata { .. }));
}

#[test]
fn test_extract_unreadable_frame_is_metadata_error() {
    let tmp = TempDir::new().unwrap();
    let mut frames = write_all(tmp.path(), &[RawFrame::bias("bias1", 100.0)]);
    let broken = tmp.path().join("broken.fits");
    fs::write(&broken, b"not a fits file").unwrap();
    frames.push(broken.clone());

    let err = extract_catalog(&NativeEngine::new(), tmp.path(), &frames, false).unwrap_err();
    match err {
        ReductionError::Metadata { frame, .. } => assert_eq!(frame, broken.display().to_string()),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!tmp.path().join(EXTRACT_LIST_NAME).exists());
}

#[test]
fn test_extract_rejects_raw_frames_named_like_masters() {
    let cases = [
        vec![RawFrame::bias("mbias", 100.0), RawFrame::bias("b2", 100.0)],
        vec![
            RawFrame::dark("dark60", 60.0, 110.0),
            RawFrame::dark("d2", 60.0, 110.0),
        ],
        // Clashes with the master of the other exposure group.
        vec![
            RawFrame::dark("dark60", 120.0, 110.0),
            RawFrame::dark("d2", 60.0, 110.0),
        ],
        vec![RawFrame::flat("mflatV", "V", 5000.0)],
    ];
    for frames in cases {
        let tmp = TempDir::new().unwrap();
        let paths = write_all(tmp.path(), &frames);
        let err = extract_catalog(&NativeEngine::new(), tmp.path(), &paths, false).unwrap_err();
        assert!(
            matches!(err, ReductionError::Metadata { ref reason, .. } if reason.contains("reserved")),
            "{err}"
        );
    }
}

#[test]
fn test_extract_accepts_names_of_other_directories_masters() {
    let tmp = TempDir::new().unwrap();
    let frames = write_all(
        tmp.path(),
        &[
            RawFrame::dark("darkA", 60.0, 110.0),
            RawFrame::dark("dark120", 60.0, 110.0),
            RawFrame::flat("mflatR", "V", 5000.0),
            RawFrame::object("mbias", "V", 60.0, 1000.0),
        ],
    );
    let catalog = extract_catalog(&NativeEngine::new(), tmp.path(), &frames, false).unwrap();
    assert_eq!(catalog.len(), 4);
}
