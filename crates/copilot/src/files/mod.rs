mod atomic_io;
mod formatter;
mod writer;

pub(crate) use atomic_io::write_text_atomic;
pub use formatter::{format_best_effort, FormatError, SourceFormatter, WhitespaceFormatter};
pub use writer::{
    ensure_prelude, resolve_project_path, write_files, FileWriteError, SourceRule, SourceRules,
};
