//! Observation catalog and the selection/grouping rules applied to it.

pub mod extract;

use serde::Serialize;

use crate::frame::{ExposureTime, FilterId, FrameType, ObservationRecord};

pub use extract::{discover_raw_frames, extract_catalog, parse_record, HEADER_FIELDS};

/// A predicate on one field of an observation record.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    Type(FrameType),
    Filter(FilterId),
    ExposureTime(ExposureTime),
}

impl Selection {
    pub fn matches(&self, record: &ObservationRecord) -> bool {
        match self {
            Self::Type(t) => record.frame_type == *t,
            Self::Filter(f) => record.filter.as_ref() == Some(f),
            Self::ExposureTime(t) => record.exposure_time == *t,
        }
    }
}

/// Records matching `selection`, in input order.
pub fn select<'a, I>(records: I, selection: &Selection) -> Vec<&'a ObservationRecord>
where
    I: IntoIterator<Item = &'a ObservationRecord>,
{
    records
        .into_iter()
        .filter(|record| selection.matches(record))
        .collect()
}

pub fn names(records: &[&ObservationRecord]) -> Vec<String> {
    records.iter().map(|r| r.name.clone()).collect()
}

/// Frames sharing one exposure duration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExposureGroup {
    pub exposure_time: ExposureTime,
    pub names: Vec<String>,
}

/// Partition `records` by exact exposure time. Groups appear in order of
/// first occurrence and members keep input order.
pub fn group_by_exposure<'a, I>(records: I) -> Vec<ExposureGroup>
where
    I: IntoIterator<Item = &'a ObservationRecord>,
{
    let mut groups: Vec<ExposureGroup> = Vec::new();
    for record in records {
        match groups
            .iter_mut()
            .find(|g| g.exposure_time == record.exposure_time)
        {
            Some(group) => group.names.push(record.name.clone()),
            None => groups.push(ExposureGroup {
                exposure_time: record.exposure_time,
                names: vec![record.name.clone()],
            }),
        }
    }
    groups
}

/// All observation records of one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ObservationCatalog {
    records: Vec<ObservationRecord>,
}

impl ObservationCatalog {
    pub fn new(records: Vec<ObservationRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ObservationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ObservationRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn select(&self, selection: &Selection) -> Vec<&ObservationRecord> {
        select(&self.records, selection)
    }

    pub fn of_type(&self, frame_type: FrameType) -> Vec<&ObservationRecord> {
        self.select(&Selection::Type(frame_type))
    }

    /// Frames of `frame_type` taken through `filter`.
    pub fn of_type_and_filter(
        &self,
        frame_type: FrameType,
        filter: &FilterId,
    ) -> Vec<&ObservationRecord> {
        select(self.of_type(frame_type), &Selection::Filter(filter.clone()))
    }

    /// Distinct filters among flat and object frames, in order of first
    /// occurrence. Bias and dark frames never contribute.
    pub fn filters(&self) -> Vec<FilterId> {
        let mut filters: Vec<FilterId> = Vec::new();
        for record in &self.records {
            if !record.frame_type.uses_filter() {
                continue;
            }
            if let Some(ref filter) = record.filter {
                if !filters.contains(filter) {
                    filters.push(filter.clone());
                }
            }
        }
        filters
    }

    pub fn exposure_groups(&self, frame_type: FrameType) -> Vec<ExposureGroup> {
        group_by_exposure(self.of_type(frame_type))
    }
}
