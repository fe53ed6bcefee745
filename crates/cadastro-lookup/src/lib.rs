//! Cadastro lookup — the `/pessoas` HTTP service behind the person search.

pub mod error;
pub mod http;
pub mod pessoas;

pub use error::{Result, SourceError};
pub use http::JsonClient;
pub use pessoas::{DEFAULT_BASE_URL, PessoasSource, QueryFilter};
