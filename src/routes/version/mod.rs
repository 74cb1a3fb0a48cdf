mod handler;

pub use handler::{get_sbom, get_version};
