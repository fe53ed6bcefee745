pub mod config;
pub mod error;
pub mod form;
pub mod lookup;
pub mod models;
pub mod search;

pub use config::{AppConfig, SearchMode};
pub use error::{CadastroError, LookupError, Result};
pub use form::{Field, FieldErrors, FormSchema, FormState, FormStore, Submission, log_submission};
pub use lookup::{DiagnosticSink, PersonLookup, StaticLookup, TracingDiagnostics};
pub use models::Candidate;
pub use search::{SearchController, SearchPhase, SearchPolicy, SearchSnapshot};
