//! Build configuration types.

use std::path::PathBuf;

/// Target version used when neither the manifest nor the command line
/// names one.
pub const DEFAULT_ZVERSION: i32 = 3;

/// Build configuration for one story file
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Z-machine version, 1-8
    pub zversion: i32,
    /// Emit `.DEBUG-*` records
    pub debug_info: bool,
    pub output_dir: PathBuf,
    /// Base name of the `.zap` files (`<name>.zap`, `<name>_data.zap`, ...)
    pub output_name: String,
    /// Write the frequent-words stub even if the file already exists
    pub force_frequent_words: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            zversion: DEFAULT_ZVERSION,
            debug_info: false,
            output_dir: PathBuf::from("."),
            output_name: "story".to_string(),
            force_frequent_words: false,
        }
    }
}
