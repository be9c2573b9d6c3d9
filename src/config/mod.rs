pub mod applicator;
pub mod loader;
pub mod schema;

pub use applicator::{apply_plan, check_plan, resolve_file, ApplicationError, PatchResult};
pub use loader::{discover_plan_files, load_from_path, load_from_str, ConfigError};
pub use schema::{
    AnchorSpec, Boundary, HashAlgorithm, Metadata, PatchConfig, PatchDefinition, Policy,
    ValidationError, ValidationIssue, Verify,
};
