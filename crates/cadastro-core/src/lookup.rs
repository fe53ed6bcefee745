use async_trait::async_trait;

use crate::error::LookupError;
use crate::models::Candidate;

/// Remote capability that turns a query into candidates.
///
/// Implementations give no ordering guarantee between calls; the search
/// controller reconciles out-of-order completions.
#[async_trait]
pub trait PersonLookup: Send + Sync {
    async fn search(&self, query: &str) -> std::result::Result<Vec<Candidate>, LookupError>;
}

/// Where the controller reports lookup failures.
pub trait DiagnosticSink: Send + Sync {
    fn lookup_failed(&self, query: &str, error: &LookupError);
}

/// Reports failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn lookup_failed(&self, query: &str, error: &LookupError) {
        tracing::error!(query, %error, "Erro ao buscar pessoas");
    }
}

/// In-memory lookup over a fixed list of people.
///
/// Filters by case-insensitive substring, mirroring what `nome_like` does
/// server-side. An empty query returns everything.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    people: Vec<Candidate>,
}

impl StaticLookup {
    pub fn new(people: Vec<Candidate>) -> Self {
        Self { people }
    }
}

#[async_trait]
impl PersonLookup for StaticLookup {
    async fn search(&self, query: &str) -> std::result::Result<Vec<Candidate>, LookupError> {
        let needle = query.to_lowercase();
        Ok(self
            .people
            .iter()
            .filter(|p| needle.is_empty() || p.label.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}
