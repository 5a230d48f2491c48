//! In-process cache of product listings.
//!
//! Keyed by the normalised [`ProductFilter`], so `?size=M,L` and
//! `?sizes=L,M` share an entry. Every product or category write clears the
//! whole cache; listings are cheap to rebuild and writes are rare.
//!
//! Entries are also keyed by a generation that each clear bumps. A listing
//! read from the database before a clear is stored under the old generation,
//! where no lookup will find it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;

use crate::models::{Product, ProductFilter};

/// Upper bound on distinct cached listings.
const MAX_ENTRIES: u64 = 1_000;

/// Cache generation observed before loading a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Product listing cache.
#[derive(Clone)]
pub struct ProductCache {
    listings: Cache<(u64, ProductFilter), Arc<Vec<Product>>>,
    generation: Arc<AtomicU64>,
}

impl ProductCache {
    /// Create a cache whose entries expire `ttl` after insertion.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            listings: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The current generation. Take it before querying the database and
    /// hand it back to [`Self::insert`].
    #[must_use]
    pub fn generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::Acquire))
    }

    /// Cached listing for a filter, if fresh.
    pub async fn get(&self, filter: &ProductFilter) -> Option<Arc<Vec<Product>>> {
        let Generation(current) = self.generation();
        self.listings.get(&(current, filter.clone())).await
    }

    /// Store a listing loaded at `generation`.
    pub async fn insert(
        &self,
        generation: Generation,
        filter: ProductFilter,
        products: Arc<Vec<Product>>,
    ) {
        self.listings.insert((generation.0, filter), products).await;
    }

    /// Drop every cached listing.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.listings.invalidate_all();
        tracing::debug!("Product cache invalidated");
    }
}
