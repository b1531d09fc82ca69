//! User tagging of search results.

use std::path::Path;
use tokio::runtime::Runtime;

use crate::error::Result;
use crate::model::{Artist, Release, Tag, Track};
use crate::query::{self, Field, Predicate};
use crate::store::sqlite::{SqliteStore, db_url};
use crate::store::{self, CatalogStore, Link, TagTarget};

const USER_ORIGIN: &str = "user";

/// Which entity kind a `tag` command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagScope {
    Track,
    Release,
    Artist,
}

/// Tag every entity of `scope` matching `filter`, creating the tag on first
/// use. Returns the number of entities tagged.
pub async fn apply_tag<S>(
    store: &mut S,
    name: &str,
    scope: TagScope,
    weight: f64,
    filter: &Predicate,
) -> Result<usize>
where
    S: CatalogStore + ?Sized,
{
    let tag_id = match store::first::<Tag, S>(store, &Predicate::equals(Field::TagName, name)).await? {
        Some(Tag { id: Some(id), .. }) => id,
        _ => {
            let mut tag = Tag {
                name: name.to_string(),
                ..Default::default()
            };
            store::insert(store, &mut tag).await?
        }
    };

    let targets: Vec<TagTarget> = match scope {
        TagScope::Track => store::find::<Track, S>(store, filter)
            .await?
            .iter()
            .filter_map(|t| t.id.map(TagTarget::Track))
            .collect(),
        TagScope::Release => store::find::<Release, S>(store, filter)
            .await?
            .iter()
            .filter_map(|r| r.id.map(TagTarget::Release))
            .collect(),
        TagScope::Artist => store::find::<Artist, S>(store, filter)
            .await?
            .iter()
            .filter_map(|a| a.id.map(TagTarget::Artist))
            .collect(),
    };

    for target in &targets {
        store
            .link(&Link::Tag {
                target: *target,
                tag_id,
                weight,
                origin: USER_ORIGIN.to_string(),
            })
            .await?;
    }
    tracing::info!(tag = name, count = targets.len(), ?scope, "Applied tag");
    Ok(targets.len())
}

/// Tag search results from the command line
pub fn cmd_tag(
    rt: &Runtime,
    db: &Path,
    name: &str,
    scope: TagScope,
    weight: f64,
    terms: &[String],
) -> anyhow::Result<()> {
    let filter = query::compile(terms);
    if filter.is_all() {
        anyhow::bail!("Refusing to tag the whole catalog; give at least one search term");
    }

    rt.block_on(async {
        let mut store = SqliteStore::open(&db_url(Some(db))).await?;
        let count = apply_tag(&mut store, name, scope, weight, &filter).await?;
        store.commit().await?;
        println!("Tagged {count} entries with '{name}'");
        Ok::<(), anyhow::Error>(())
    })
}
