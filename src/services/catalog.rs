//! Public catalog queries: listings, search and category pages.
//!
//! Draft movies and series never leave this module; an episode is visible only
//! while its series is published.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::pagination::{Page, PageWindow, PAGE_SIZE};
use crate::errors::AppError;
use crate::models::{CatalogItem, Category, ContentKind};

/// Optional narrowing of a listing.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub category_id: Option<i64>,
    pub search: Option<String>,
}

impl CatalogFilter {
    pub fn new(category_id: Option<i64>, search: Option<String>) -> Self {
        Self {
            category_id,
            search: search.filter(|s| !s.trim().is_empty()),
        }
    }

    fn like_pattern(&self) -> Option<String> {
        self.search.as_deref().map(|raw| {
            let mut escaped = String::with_capacity(raw.len() + 2);
            escaped.push('%');
            for ch in raw.trim().to_lowercase().chars() {
                if matches!(ch, '%' | '_' | '\\') {
                    escaped.push('\\');
                }
                escaped.push(ch);
            }
            escaped.push('%');
            escaped
        })
    }
}

/// The SQL pieces that differ between the three listable kinds.
struct ListingSource {
    columns: &'static str,
    from: &'static str,
    search: &'static str,
    category: &'static str,
    id: &'static str,
    order_by: &'static str,
}

impl ListingSource {
    fn for_kind(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Movie => ListingSource {
                columns: "'movie' AS kind, m.id, m.title, m.slug, m.description, m.release_date, \
                          m.poster, c.name AS category_name, NULL AS series_slug, NULL AS episode_number",
                from: "FROM movies m JOIN categories c ON c.id = m.category_id WHERE m.status = 'published'",
                search: "m.search_text",
                category: "m.category_id",
                id: "m.id",
                order_by: "m.created_at DESC, m.id DESC",
            },
            ContentKind::Series => ListingSource {
                columns: "'series' AS kind, s.id, s.title, s.slug, s.description, s.release_date, \
                          s.poster, c.name AS category_name, NULL AS series_slug, NULL AS episode_number",
                from: "FROM series s JOIN categories c ON c.id = s.category_id WHERE s.status = 'published'",
                search: "s.search_text",
                category: "s.category_id",
                id: "s.id",
                order_by: "s.created_at DESC, s.id DESC",
            },
            ContentKind::Episode => ListingSource {
                columns: "'episode' AS kind, e.id, e.title, e.slug, e.description, e.release_date, \
                          s.poster, c.name AS category_name, s.slug AS series_slug, e.episode_number",
                from: "FROM episodes e JOIN series s ON s.id = e.series_id \
                       JOIN categories c ON c.id = s.category_id WHERE s.status = 'published'",
                search: "e.search_text",
                category: "s.category_id",
                id: "e.id",
                order_by: "e.created_at DESC, e.id DESC",
            },
        }
    }

    fn push_filters<'a>(&self, builder: &mut QueryBuilder<'a, Sqlite>, filter: &CatalogFilter) {
        if let Some(category_id) = filter.category_id {
            builder.push(" AND ").push(self.category).push(" = ").push_bind(category_id);
        }
        if let Some(pattern) = filter.like_pattern() {
            builder
                .push(" AND ")
                .push(self.search)
                .push(" LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\'");
        }
    }
}

/// One page of published items of `kind`, newest first.
#[tracing::instrument(name = "List published catalog items", skip(db))]
pub async fn list_published(
    db: &SqlitePool,
    kind: ContentKind,
    filter: &CatalogFilter,
    page: Option<&str>,
) -> Result<Page<CatalogItem>, AppError> {
    let source = ListingSource::for_kind(kind);

    let mut count_q = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) ");
    count_q.push(source.from);
    source.push_filters(&mut count_q, filter);
    let total: i64 = count_q.build_query_scalar().fetch_one(db).await?;

    let window = PageWindow::resolve(page, total, PAGE_SIZE);

    let mut data_q = QueryBuilder::<Sqlite>::new("SELECT ");
    data_q.push(source.columns).push(" ").push(source.from);
    source.push_filters(&mut data_q, filter);
    data_q
        .push(" ORDER BY ")
        .push(source.order_by)
        .push(" LIMIT ")
        .push_bind(window.limit())
        .push(" OFFSET ")
        .push_bind(window.offset());

    let items = data_q.build_query_as::<CatalogItem>().fetch_all(db).await?;

    tracing::debug!(
        kind = %kind,
        total,
        page = window.number,
        returned = items.len(),
        "Catalog page resolved"
    );

    Ok(Page::new(items, window, total))
}

/// The newest `limit` published items of `kind`.
#[tracing::instrument(name = "Latest published catalog items", skip(db))]
pub async fn latest_published(db: &SqlitePool, kind: ContentKind, limit: i64) -> Result<Vec<CatalogItem>, AppError> {
    let source = ListingSource::for_kind(kind);

    let mut q = QueryBuilder::<Sqlite>::new("SELECT ");
    q.push(source.columns)
        .push(" ")
        .push(source.from)
        .push(" ORDER BY ")
        .push(source.order_by)
        .push(" LIMIT ")
        .push_bind(limit);

    Ok(q.build_query_as::<CatalogItem>().fetch_all(db).await?)
}

/// Up to `limit` other published items sharing `category_id`.
#[tracing::instrument(name = "Related published catalog items", skip(db))]
pub async fn related_published(
    db: &SqlitePool,
    kind: ContentKind,
    category_id: i64,
    exclude_id: i64,
    limit: i64,
) -> Result<Vec<CatalogItem>, AppError> {
    let source = ListingSource::for_kind(kind);

    let mut q = QueryBuilder::<Sqlite>::new("SELECT ");
    q.push(source.columns).push(" ").push(source.from);
    q.push(" AND ").push(source.category).push(" = ").push_bind(category_id);
    q.push(" AND ").push(source.id).push(" <> ").push_bind(exclude_id);
    q.push(" ORDER BY ")
        .push(source.order_by)
        .push(" LIMIT ")
        .push_bind(limit);

    Ok(q.build_query_as::<CatalogItem>().fetch_all(db).await?)
}

#[tracing::instrument(name = "List categories", skip(db))]
pub async fn list_categories(db: &SqlitePool, limit: Option<i64>) -> Result<Vec<Category>, AppError> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, description, created_at FROM categories ORDER BY name LIMIT ?",
    )
    .bind(limit.unwrap_or(-1))
    .fetch_all(db)
    .await?;
    Ok(categories)
}

#[tracing::instrument(name = "Get category by slug", skip(db))]
pub async fn category_by_slug(db: &SqlitePool, slug: &str) -> Result<Category, AppError> {
    sqlx::query_as::<_, Category>(
        "SELECT id, name, slug, description, created_at FROM categories WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Category '{}'", slug)))
}

#[derive(Debug)]
pub struct CategoryListing {
    pub category: Category,
    pub movies: Page<CatalogItem>,
    pub series: Page<CatalogItem>,
}

/// A category with its published movies and series, each paginated on its own.
#[tracing::instrument(name = "Category listing", skip(db))]
pub async fn category_listing(
    db: &SqlitePool,
    slug: &str,
    movies_page: Option<&str>,
    series_page: Option<&str>,
) -> Result<CategoryListing, AppError> {
    let category = category_by_slug(db, slug).await?;
    let filter = CatalogFilter::new(Some(category.id), None);

    let movies = list_published(db, ContentKind::Movie, &filter, movies_page).await?;
    let series = list_published(db, ContentKind::Series, &filter, series_page).await?;

    Ok(CategoryListing {
        category,
        movies,
        series,
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SearchPages<'a> {
    pub movies: Option<&'a str>,
    pub series: Option<&'a str>,
    pub episodes: Option<&'a str>,
}

#[derive(Debug)]
pub struct SearchResults {
    pub query: String,
    pub movies: Page<CatalogItem>,
    pub series: Page<CatalogItem>,
    pub episodes: Page<CatalogItem>,
}

impl SearchResults {
    pub fn total(&self) -> i64 {
        self.movies.total + self.series.total + self.episodes.total
    }
}

/// Free-text search across published movies, series and episodes. A blank
/// query finds nothing.
#[tracing::instrument(name = "Search catalog", skip(db))]
pub async fn search(db: &SqlitePool, query: Option<&str>, pages: SearchPages<'_>) -> Result<SearchResults, AppError> {
    let query = query.map(str::trim).unwrap_or_default().to_string();

    if query.is_empty() {
        return Ok(SearchResults {
            query,
            movies: Page::empty(),
            series: Page::empty(),
            episodes: Page::empty(),
        });
    }

    let filter = CatalogFilter::new(None, Some(query.clone()));
    let movies = list_published(db, ContentKind::Movie, &filter, pages.movies).await?;
    let series = list_published(db, ContentKind::Series, &filter, pages.series).await?;
    let episodes = list_published(db, ContentKind::Episode, &filter, pages.episodes).await?;

    tracing::info!("Search '{}' matched {} items", query, movies.total + series.total + episodes.total);

    Ok(SearchResults {
        query,
        movies,
        series,
        episodes,
    })
}
