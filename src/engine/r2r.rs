use crate::error::{IotStreamsError, Result};
use crate::quad_container::QuadContainer;
use oxigraph::model::Term;
use oxigraph::sparql::{QueryResults, SparqlEvaluator};
use tracing::trace;

/// Result rows of one evaluation: one `Option<Term>` per projected variable,
/// or subject, predicate and object for CONSTRUCT queries.
pub type Rows = Vec<Vec<Option<Term>>>;

/// R2R (Relation-to-Relation) Operator
/// Evaluates the SPARQL part of a continuous query over one window
#[derive(Debug, Clone)]
pub struct R2ROperator {
    query: String,
}

impl R2ROperator {
    /// Fails if `query` is not valid SPARQL.
    pub fn new(query: impl Into<String>) -> Result<Self> {
        let query = query.into();
        SparqlEvaluator::new()
            .parse_query(&query)
            .map_err(|e| IotStreamsError::configuration("continuous query", e))?;
        Ok(Self { query })
    }

    /// Get a reference to the query string
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Loads the window into a scratch store and evaluates the query on it.
    pub fn execute(&self, container: &QuadContainer) -> Result<Rows> {
        let store = container.to_store()?;
        trace!(quads = container.len(), "Evaluating window query");

        let results = SparqlEvaluator::new()
            .parse_query(&self.query)
            .map_err(|e| IotStreamsError::configuration("continuous query", e))?
            .on_store(&store)
            .execute()
            .map_err(|e| IotStreamsError::configuration("continuous query", e))?;

        let mut rows = Vec::new();
        match results {
            QueryResults::Solutions(solutions) => {
                for solution in solutions {
                    let solution = solution
                        .map_err(|e| IotStreamsError::configuration("continuous query", e))?;
                    rows.push(solution.values().to_vec());
                }
            }
            QueryResults::Graph(triples) => {
                for triple in triples {
                    let triple = triple
                        .map_err(|e| IotStreamsError::configuration("continuous query", e))?;
                    rows.push(vec![
                        Some(triple.subject.into()),
                        Some(triple.predicate.into()),
                        Some(triple.object),
                    ]);
                }
            }
            QueryResults::Boolean(_) => {
                return Err(IotStreamsError::configuration(
                    "continuous query",
                    "ASK queries produce no rows to stream",
                ));
            }
        }
        Ok(rows)
    }
}
