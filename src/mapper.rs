//! The typed facade over the whole pipeline: build, execute, hydrate,
//! persist, all against one [`SqlExecutor`].

use tracing::debug;

use crate::entity::Schema;
use crate::error::{Error, Result};
use crate::executor::SqlExecutor;
use crate::filter::{Criteria, CriteriaGroup, Operator, Sort, WherePart};
use crate::hydrate::hydrate;
use crate::persist;
use crate::schema::descriptor_of;
use crate::sql::builder::{QueryBuilder, UNLIMITED_DEPTH};
use crate::value::{Row, Value};

/// Fetch tuning: filter, sort, and how deep the relation joins descend.
pub struct FetchOptions<'a> {
    filter: Option<&'a CriteriaGroup>,
    sort: Option<&'a Sort>,
    fetch_depth: i32,
}

impl Default for FetchOptions<'_> {
    fn default() -> Self {
        Self {
            filter: None,
            sort: None,
            fetch_depth: UNLIMITED_DEPTH,
        }
    }
}

impl<'a> FetchOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: &'a CriteriaGroup) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: &'a Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// `-1` joins without limit, `0` fetches the root entity only.
    #[must_use]
    pub fn fetch_depth(mut self, fetch_depth: i32) -> Self {
        self.fetch_depth = fetch_depth;
        self
    }
}

/// One page of raw records plus the unpaged total.
#[derive(Debug, Clone)]
pub struct Page {
    pub rows: Vec<Row>,
    pub total: i64,
}

/// Typed entry point of the engine.
pub struct DataMapper<X: SqlExecutor> {
    executor: X,
}

impl<X: SqlExecutor> DataMapper<X> {
    pub fn new(executor: X) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    /// Fetch every `T`, relations included, default order (root key
    /// descending).
    pub fn fetch_all<T: Schema>(&self) -> Result<Vec<T>> {
        self.fetch_with(&FetchOptions::default())
    }

    /// Fetch every `T` matching `filter` on the root table.
    pub fn fetch<T: Schema>(&self, filter: &CriteriaGroup) -> Result<Vec<T>> {
        self.fetch_with(&FetchOptions::new().filter(filter))
    }

    /// Fetch with explicit filter/sort/depth options.
    pub fn fetch_with<T: Schema>(&self, options: &FetchOptions) -> Result<Vec<T>> {
        let desc = descriptor_of::<T>()?;
        let mut builder = QueryBuilder::new(desc).fetch_depth(options.fetch_depth);
        if let Some(filter) = options.filter {
            builder = builder.filter(filter);
        }
        if let Some(sort) = options.sort {
            builder = builder.sort(sort);
        }
        let query = builder.build()?;
        let rows = self.executor.query_rows(&query.sql, &query.params)?;
        debug!(entity = %desc.entity_name, rows = rows.len(), "fetched");

        hydrate(desc, &rows)?
            .into_iter()
            .map(|entity| {
                entity.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
                    Error::Config(format!(
                        "hydration produced an unexpected type for entity '{}'",
                        desc.entity_name
                    ))
                })
            })
            .collect()
    }

    /// Fetch the single `T` with the given primary key, relations included.
    pub fn fetch_by_key<T: Schema>(&self, key: impl Into<Value>) -> Result<Option<T>> {
        let desc = descriptor_of::<T>()?;
        let filter = CriteriaGroup::of(Criteria::new(
            desc.primary_key_column(),
            Operator::Equals,
            key.into(),
        ));
        Ok(self.fetch(&filter)?.into_iter().next())
    }

    /// Count the distinct roots matching `filter`, joins excluded.
    pub fn count<T: Schema>(&self, filter: Option<&CriteriaGroup>) -> Result<i64> {
        let desc = descriptor_of::<T>()?;
        let mut builder = QueryBuilder::new(desc);
        if let Some(filter) = filter {
            builder = builder.filter(filter);
        }
        let query = builder.build_count()?;
        let value = self.executor.query_scalar(&query.sql, &query.params)?;
        Ok(value.as_integer()?.unwrap_or(0))
    }

    /// Raw paged records of one table. Paging needs a stable order, so a
    /// non-empty sort is mandatory.
    pub fn records(
        &self,
        table: &str,
        filter: Option<&CriteriaGroup>,
        sort: &Sort,
        page_size: u64,
        page: u64,
    ) -> Result<Page> {
        if sort.is_empty() {
            return Err(Error::SortRequired);
        }
        let empty = CriteriaGroup::default();
        let part = WherePart::compile(Some(table), filter.unwrap_or(&empty))?;
        let stmt = format!("SELECT * FROM {table} WHERE {}{}", part.sql, sort.to_sql()?);

        let count_sql = format!("SELECT COUNT(*) FROM ({stmt})");
        let total = self
            .executor
            .query_scalar(&count_sql, &part.params)?
            .as_integer()?
            .unwrap_or(0);

        let paged = self.executor.dialect().paginate(&stmt, page_size, page);
        let rows = self.executor.query_rows(&paged, &part.params)?;
        Ok(Page { rows, total })
    }

    /// Insert with cascade; the generated key lands on `entity`.
    pub fn insert<T: Schema>(&self, entity: &mut T) -> Result<()> {
        let desc = descriptor_of::<T>()?;
        persist::insert(&self.executor, desc, entity)
    }

    /// Update by primary key with child reconciliation.
    pub fn update<T: Schema>(&self, entity: &mut T) -> Result<()> {
        let desc = descriptor_of::<T>()?;
        persist::update(&self.executor, desc, entity)
    }

    /// Update each entity in turn, with the same per-entity cascade as
    /// [`update`](Self::update).
    pub fn update_all<T: Schema>(&self, entities: &mut [T]) -> Result<()> {
        let desc = descriptor_of::<T>()?;
        for entity in entities.iter_mut() {
            persist::update(&self.executor, desc, entity)?;
        }
        Ok(())
    }

    /// Cascading delete of every `T` matching `filter`.
    pub fn delete_where<T: Schema>(&self, filter: &CriteriaGroup) -> Result<()> {
        let desc = descriptor_of::<T>()?;
        persist::delete_where(&self.executor, desc, filter)
    }

    /// Cascading delete of the single `T` with the given primary key.
    pub fn delete_by_key<T: Schema>(&self, key: impl Into<Value>) -> Result<()> {
        let desc = descriptor_of::<T>()?;
        let filter = CriteriaGroup::of(Criteria::new(
            desc.primary_key_column(),
            Operator::Equals,
            key.into(),
        ));
        persist::delete_where(&self.executor, desc, &filter)
    }
}
