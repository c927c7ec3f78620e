use crate::error::Result;
use oxigraph::model::Quad;
use oxigraph::store::Store;
use std::collections::HashSet;

/// Quads one window has collected so far. Duplicates collapse.
#[derive(Debug, Clone, Default)]
pub struct QuadContainer {
    elements: HashSet<Quad>,
    last_arrival: Option<i64>,
}

impl QuadContainer {
    pub fn from_quads(quads: impl IntoIterator<Item = Quad>, timestamp: i64) -> Self {
        Self {
            elements: quads.into_iter().collect(),
            last_arrival: Some(timestamp),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn add(&mut self, quad: Quad, timestamp: i64) {
        self.elements.insert(quad);
        self.last_arrival = Some(timestamp);
    }

    pub fn contains(&self, quad: &Quad) -> bool {
        self.elements.contains(quad)
    }

    /// Stream time of the latest quad added, if any.
    pub fn last_arrival(&self) -> Option<i64> {
        self.last_arrival
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quad> {
        self.elements.iter()
    }

    /// Loads the content into a fresh in-memory store for querying.
    pub fn to_store(&self) -> Result<Store> {
        let store = Store::new()?;
        for quad in &self.elements {
            store.insert(quad)?;
        }
        Ok(store)
    }
}
