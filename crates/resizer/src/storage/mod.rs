pub mod filesystem;

pub use filesystem::{
    ensure_directory, read_source, remove_file, stage_copy, to_forward_slashes, VariantStorage,
};
