pub mod dates;
pub mod naming;
pub mod serialization;

pub use naming::{concept_local_id, sanitize_filename};
pub use serialization::{xml_escape, ReportFormat, ReportSerializer};
