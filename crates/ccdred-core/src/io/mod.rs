pub mod fits;
pub mod fs;
pub mod listing;
pub mod preview;
