use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::calibrate::{build_master_bias, build_master_darks, build_master_flat, Calibrator};
use crate::catalog::{discover_raw_frames, extract_catalog};
use crate::engine::ImageEngine;
use crate::error::{ReductionError, Result};
use crate::frame::FrameType;
use crate::store::{organize, MarkerState, RunMarker};

use super::config::ReductionConfig;
use super::objects::calibrate_objects;
use super::types::{
    Confirmation, DarkProduct, EmptyGroupWarning, FlatProduct, NoOpReporter, ProgressReporter,
    ReductionReport, ReductionStage,
};

/// Sequential stage machine of one run.
struct ReductionRun {
    stage: ReductionStage,
    reporter: Arc<dyn ProgressReporter>,
}

impl ReductionRun {
    fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            stage: ReductionStage::Init,
            reporter,
        }
    }

    /// Move forward to `next`. Backward transitions never happen.
    fn enter(&mut self, next: ReductionStage, total_items: Option<usize>) {
        debug_assert!(next > self.stage, "{} cannot follow {}", next, self.stage);
        debug!(from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
        self.reporter.begin_stage(next, total_items);
    }

    /// Settle in a terminal stage.
    fn conclude(&mut self, terminal: ReductionStage) {
        debug_assert!(terminal.is_terminal());
        debug!(from = %self.stage, to = %terminal, "Stage transition");
        self.stage = terminal;
    }

    fn execute(
        &mut self,
        config: &ReductionConfig,
        engine: &dyn ImageEngine,
        confirmation: &dyn Confirmation,
    ) -> Result<ReductionReport> {
        let working_dir = config.working_dir.as_path();

        // Nothing is read or written in an organized directory.
        let marker = RunMarker::in_dir(working_dir);
        if marker.state() == MarkerState::Present {
            return Err(ReductionError::AlreadyOrganized(working_dir.to_path_buf()));
        }

        self.reporter.begin_stage(ReductionStage::Init, None);
        let frames = discover_raw_frames(working_dir)?;
        let catalog = extract_catalog(engine, working_dir, &frames, config.debug)?;
        self.reporter.finish_stage();

        self.enter(ReductionStage::Organize, Some(catalog.len()));
        let organized = organize(&catalog, working_dir)?;
        self.reporter.finish_stage();

        if !confirmation.confirm(&organized)? {
            info!("Reduction declined at confirmation");
            return Err(ReductionError::Declined);
        }

        let layout = &organized.layout;
        let cal = Calibrator::new(engine, config.calibration_settings())
            .with_display(config.display)
            .with_retained_lists(config.debug);
        let mut report = ReductionReport {
            filters: layout.filters().to_vec(),
            ..ReductionReport::default()
        };

        self.enter(ReductionStage::MasterBias, Some(1));
        let master_bias = build_master_bias(&cal, layout, &catalog)?;
        report.master_bias = Some(master_bias.path());
        self.reporter.advance(1);
        self.reporter.finish_stage();

        self.enter(
            ReductionStage::MasterDark,
            Some(catalog.exposure_groups(FrameType::Dark).len()),
        );
        let darks = build_master_darks(&cal, layout, &catalog, &master_bias)?;
        report.master_darks = darks
            .iter()
            .map(|dark| DarkProduct {
                exposure_time: dark.exposure_time,
                path: dark.file.path(),
                frames: dark.frames,
            })
            .collect();
        self.reporter.advance(darks.len());
        self.reporter.finish_stage();

        let filters = layout.filters();
        self.enter(ReductionStage::MasterFlat, Some(filters.len()));
        let mut master_flats = Vec::with_capacity(filters.len());
        for (i, filter) in filters.iter().enumerate() {
            let master_flat = build_master_flat(&cal, layout, &catalog, filter, &master_bias)?;
            match &master_flat {
                Some(flat) => report.master_flats.push(FlatProduct {
                    filter: filter.clone(),
                    path: flat.path(),
                }),
                None => report.warnings.push(EmptyGroupWarning::NoFlats {
                    filter: filter.clone(),
                }),
            }
            master_flats.push(master_flat);
            self.reporter.advance(i + 1);
        }
        self.reporter.finish_stage();

        self.enter(ReductionStage::CalibrateObjects, Some(filters.len()));
        for (i, (filter, master_flat)) in filters.iter().zip(&master_flats).enumerate() {
            let Some(master_flat) = master_flat else {
                warn!(filter = %filter, "No master flat, objects left uncalibrated");
                self.reporter.advance(i + 1);
                continue;
            };
            let batch = calibrate_objects(
                &cal,
                layout,
                &catalog,
                filter,
                &master_bias,
                &darks,
                master_flat,
            )?;
            report.calibrated.extend(batch.calibrated);
            report.warnings.extend(batch.warnings);
            self.reporter.advance(i + 1);
        }
        self.reporter.finish_stage();

        Ok(report)
    }
}

/// Run the whole night reduction with a thread-safe progress reporter.
///
/// Stages run strictly in order: read headers, organize, master bias,
/// master darks, master flats, object calibration. The run pauses once after
/// organizing to ask `confirmation` whether to go on.
pub fn run_reduction_reported(
    config: &ReductionConfig,
    engine: &dyn ImageEngine,
    confirmation: &dyn Confirmation,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<ReductionReport> {
    config.validate()?;
    info!(
        working_dir = %config.working_dir.display(),
        engine = engine.name(),
        "Starting reduction"
    );

    let mut run = ReductionRun::new(reporter);
    match run.execute(config, engine, confirmation) {
        Ok(report) => {
            run.conclude(ReductionStage::Done);
            info!(
                masters = 1 + report.master_darks.len() + report.master_flats.len(),
                calibrated = report.calibrated.len(),
                warnings = report.warnings.len(),
                "Reduction complete"
            );
            Ok(report)
        }
        Err(e) => {
            warn!(stage = %run.stage, error = %e, "Reduction aborted");
            run.conclude(ReductionStage::Aborted);
            Err(e)
        }
    }
}

/// Run the whole night reduction.
pub fn run_reduction(
    config: &ReductionConfig,
    engine: &dyn ImageEngine,
    confirmation: &dyn Confirmation,
) -> Result<ReductionReport> {
    run_reduction_reported(config, engine, confirmation, Arc::new(NoOpReporter))
}
