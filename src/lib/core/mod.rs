pub mod error;
pub mod errors;
pub mod fs;
pub mod intern;
pub mod io;

pub mod prelude {
    pub use super::error::{GroupError, Result};
    pub use super::errors::is_broken_pipe;
    pub use super::fs::{is_gzipped, make_parent_dirs};
    pub use super::intern::{NameId, NameInterner};
    pub use super::io::{get_writer, open_text_reader};
}
