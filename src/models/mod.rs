mod output;

pub use output::{
    ExtraData, FileLicense, FileResult, Header, LICENSEMONK_OUTPUT_FORMAT_VERSION, Output,
    SystemEnvironment, collect_file_results,
};
