#[allow(dead_code)]
mod common;

use ccdred_core::catalog::{group_by_exposure, names, select, ObservationCatalog, Selection};
use ccdred_core::frame::{ExposureTime, FilterId, FrameType};

use common::record;

fn sample_catalog() -> ObservationCatalog {
    ObservationCatalog::new(vec![
        record("b1", FrameType::Bias, None, 0.0),
        record("o1", FrameType::Object, Some("V"), 60.0),
        record("d1", FrameType::Dark, None, 60.0),
        record("f1", FrameType::Flat, Some("R"), 5.0),
        record("b2", FrameType::Bias, None, 0.0),
        record("d2", FrameType::Dark, None, 120.0),
        record("o2", FrameType::Object, Some("R"), 600.0),
        record("d3", FrameType::Dark, None, 60.0),
        record("f2", FrameType::Flat, Some("V"), 5.0),
    ])
}

#[test]
fn test_select_by_type_preserves_catalog_order() {
    let catalog = sample_catalog();
    let darks = catalog.select(&Selection::Type(FrameType::Dark));
    assert_eq!(names(&darks), vec!["d1", "d2", "d3"]);
}

#[test]
fn test_select_by_filter() {
    let catalog = sample_catalog();
    let v = select(
        catalog.records(),
        &Selection::Filter(FilterId::new("V").unwrap()),
    );
    assert_eq!(names(&v), vec!["o1", "f2"]);
}

#[test]
fn test_select_by_exposure_time() {
    let catalog = sample_catalog();
    let sixty = catalog.select(&Selection::ExposureTime(ExposureTime::new(60.0).unwrap()));
    assert_eq!(names(&sixty), vec!["o1", "d1", "d3"]);
}

#[test]
fn test_select_without_matches_is_empty() {
    let catalog = sample_catalog();
    let none = catalog.select(&Selection::Filter(FilterId::new("Halpha").unwrap()));
    assert!(none.is_empty());
}

#[test]
fn test_of_type_and_filter() {
    let catalog = sample_catalog();
    let r = FilterId::new("R").unwrap();
    assert_eq!(names(&catalog.of_type_and_filter(FrameType::Flat, &r)), vec!["f1"]);
    assert_eq!(names(&catalog.of_type_and_filter(FrameType::Object, &r)), vec!["o2"]);
}

#[test]
fn test_filters_come_from_flats_and_objects_only() {
    let mut records = sample_catalog().records().to_vec();
    // A bias with a FILTER keyword must not create a filter directory.
    let mut stray = record("b3", FrameType::Bias, None, 0.0);
    stray.filter = Some(FilterId::new("Clear").unwrap());
    records.push(stray);
    let catalog = ObservationCatalog::new(records);

    let filters: Vec<String> = catalog.filters().iter().map(|f| f.to_string()).collect();
    assert_eq!(filters, vec!["V", "R"]);
}

#[test]
fn test_group_by_exposure_is_a_partition() {
    let catalog = sample_catalog();
    let darks = catalog.of_type(FrameType::Dark);
    let groups = group_by_exposure(darks.iter().copied());

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].exposure_time, ExposureTime::new(60.0).unwrap());
    assert_eq!(groups[0].names, vec!["d1", "d3"]);
    assert_eq!(groups[1].exposure_time, ExposureTime::new(120.0).unwrap());
    assert_eq!(groups[1].names, vec!["d2"]);

    let total: usize = groups.iter().map(|g| g.names.len()).sum();
    assert_eq!(total, darks.len());
}

#[test]
fn test_exposure_groups_of_empty_type() {
    let catalog = ObservationCatalog::new(vec![record("b1", FrameType::Bias, None, 0.0)]);
    assert!(catalog.exposure_groups(FrameType::Dark).is_empty());
}

#[test]
fn test_get_by_name() {
    let catalog = sample_catalog();
    assert_eq!(catalog.get("f2").unwrap().frame_type, FrameType::Flat);
    assert!(catalog.get("missing").is_none());
    assert_eq!(catalog.len(), 9);
}
