/// Sentinel file marking a working directory as already organized.
pub const RUN_MARKER_FILE: &str = "org.log";

/// Advisory content written into the run marker.
pub const RUN_MARKER_TEXT: &str = "The software has already been launched on this dataset";

/// File extension of every frame file, raw or derived.
pub const FITS_EXTENSION: &str = "fits";

/// Extensions accepted when discovering raw frames (case-insensitive).
pub const RAW_FRAME_EXTENSIONS: [&str; 3] = ["fits", "fit", "fts"];

pub const BIAS_DIR: &str = "bias";
pub const DARK_DIR: &str = "dark";
pub const FLATS_DIR: &str = "flats";
pub const OBJECTS_DIR: &str = "objects";
pub const FINAL_DIR: &str = "final";
pub const PREVIEW_DIR: &str = "previews";

/// Master bias file stem, stored in the bias directory.
pub const MASTER_BIAS_STEM: &str = "mbias";

/// Prefix of master dark stems (`dark<exptime>`), stored in the dark directory.
pub const MASTER_DARK_PREFIX: &str = "dark";

/// Prefix of master flat stems (`mflat<filter>`), stored in each flats directory.
pub const MASTER_FLAT_PREFIX: &str = "mflat";

/// Working list used during metadata extraction.
pub const EXTRACT_LIST_NAME: &str = "list_tmp";

/// Prefix of the working list of a combine, followed by the output stem.
pub const COMBINE_LIST_NAME: &str = "tmp_inp";

/// Header value reported for a missing keyword.
pub const INDEF: &str = "INDEF";

/// Default trim section for the Schmidt CCD (1-based, inclusive).
pub const DEFAULT_TRIM_SECTION: &str = "[100:3996,100:3996]";

/// Linearity coefficients of the new Schmidt CCD.
pub const SCHMIDT_LINEARITY: [f64; 3] = [1.0, -0.10140076, 0.034650755];

/// Linearity coefficients of the SBIG camera.
pub const SBIG_LINEARITY: [f64; 3] = [1.0, 0.0, 0.0133];

/// Pixel value normalization used by the irlincor polynomial.
pub const LINEARITY_NORM: f32 = 32767.0;

/// Display slot used for master frame previews.
pub const DISPLAY_SLOT: u32 = 1;

/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Size of one FITS block in bytes.
pub const FITS_BLOCK_SIZE: usize = 2880;

/// Size of one FITS header card in bytes.
pub const FITS_CARD_SIZE: usize = 80;
