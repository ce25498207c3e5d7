//! Deferred, offset/limit-driven page retrieval over a translated query
//!
//! A paginator is handed out by [`Persister::fetch_page`] and holds the
//! translated query plus a persister clone. Nothing touches the backend
//! until a page is materialized, and materialized entities go through the
//! persister's shared loading path, so identity-map deduplication applies
//! across pages.

use crate::errors::PersistError;
use crate::identity::Managed;
use crate::mapping::EntityMapping;
use crate::persister::Persister;
use crate::query::{Page, SelectQuery};
use std::marker::PhantomData;

pub struct Paginator<T: EntityMapping> {
    persister: Persister,
    query: SelectQuery,
    page: Option<Page>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: EntityMapping> Paginator<T> {
    pub(crate) fn new(persister: Persister, query: SelectQuery, page: Option<Page>) -> Self {
        Self {
            persister,
            query,
            page,
            _entity: PhantomData,
        }
    }

    /// Page number translated from a `limit(start,count)` expression, if any
    pub fn page_number(&self) -> Option<u64> {
        self.page.map(|page| page.number)
    }

    /// Page size translated from a `limit(start,count)` expression, if any
    pub fn page_size(&self) -> Option<u64> {
        self.page.map(|page| page.size)
    }

    /// Materialize at most `count` entities starting at the zero-based
    /// `offset`
    pub async fn items(&self, offset: u64, count: u64) -> Result<Vec<Managed<T>>, PersistError> {
        if count == 0 {
            return Err(PersistError::InvalidArgument(
                "paginator item count must be strictly positive".to_string(),
            ));
        }

        let gateway = self.persister.gateway::<T>()?;
        let statement = self.query.clone().limit(count).offset(offset).build();
        let rows = self
            .persister
            .backend()
            .fetch(statement)
            .await
            .map_err(PersistError::Backend)?;

        rows.into_iter()
            .map(|row| self.persister.load_entity(&gateway, row))
            .collect()
    }

    /// Materialize a one-based page using the translated page size
    pub async fn page(&self, number: u64) -> Result<Vec<Managed<T>>, PersistError> {
        let size = self.page_size().ok_or_else(|| {
            PersistError::InvalidArgument(
                "no page size was translated; call items(offset, count) instead".to_string(),
            )
        })?;
        if number == 0 {
            return Err(PersistError::InvalidArgument(
                "page numbers are one-based".to_string(),
            ));
        }
        self.items((number - 1) * size, size).await
    }

    /// Entity pages are identity-sensitive and cannot be cached
    /// transparently; enabling caching is a hard error.
    pub fn enable_caching(&mut self, _enabled: bool) -> Result<(), PersistError> {
        Err(PersistError::InvalidArgument(
            "entity pages cannot be cached: cached rows would bypass the identity map".to_string(),
        ))
    }

    /// Result filtering on top of the page fetch is likewise disallowed.
    pub fn set_filter(&mut self, _filter: &str) -> Result<(), PersistError> {
        Err(PersistError::InvalidArgument(
            "entity pages cannot be filtered after translation".to_string(),
        ))
    }
}

impl<T: EntityMapping> std::fmt::Debug for Paginator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("entity", &T::entity_name())
            .field("page", &self.page)
            .finish()
    }
}
