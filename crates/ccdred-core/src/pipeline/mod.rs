pub mod config;
mod controller;
mod objects;
mod types;

pub use config::ReductionConfig;
pub use controller::{run_reduction, run_reduction_reported};
pub use types::{
    AutoProceed, CalibratedFrame, Confirmation, DarkProduct, EmptyGroupWarning, FlatProduct,
    ProgressReporter, ReductionReport, ReductionStage,
};
