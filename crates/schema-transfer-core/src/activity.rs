//! Paginated activity (audit-log) aggregation.
//!
//! Pages are fetched strictly one after another: whether another page is needed
//! depends on the length of the previous one.

use chrono::{DateTime, FixedOffset};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::client::Instance;
use crate::error::Result;
use crate::model::{normalize_records, Activity, ActivityAction, Collection};

/// Activities per page in the reference deployment
pub const ACTIVITIES_PER_REQUEST: usize = 2000;

/// Query for one page of activities.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityQuery {
    pub limit: usize,
    pub page: usize,
    pub filter: Option<Value>,
    pub sort: Vec<String>,
}

impl ActivityQuery {
    pub fn page(limit: usize, page: usize) -> Self {
        Self {
            limit,
            page,
            filter: None,
            sort: Vec::new(),
        }
    }

    /// Create/update/delete activity, optionally restricted to one collection.
    pub fn changed_items(collection: Option<&str>, limit: usize, page: usize) -> Self {
        let actions: Vec<&str> = ActivityAction::CHANGES.iter().map(|a| a.as_str()).collect();
        let mut clauses = vec![json!({ "action": { "_in": actions } })];
        if let Some(collection) = collection {
            clauses.push(json!({ "collection": { "_eq": collection } }));
        }

        Self {
            limit,
            page,
            filter: Some(json!({ "_and": clauses })),
            sort: vec!["timestamp".to_string()],
        }
    }

    /// Query-string pairs in the backend's REST syntax
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("limit".to_string(), self.limit.to_string()),
            ("page".to_string(), self.page.to_string()),
        ];
        if let Some(filter) = &self.filter {
            pairs.push(("filter".to_string(), filter.to_string()));
        }
        if !self.sort.is_empty() {
            pairs.push(("sort".to_string(), self.sort.join(",")));
        }
        pairs
    }
}

/// One page as returned by the activity endpoint.
///
/// `received` counts the records the backend sent, including any that were
/// dropped as malformed. The page loop stops on it, never on `activities.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityPage {
    pub received: usize,
    pub activities: Vec<Activity>,
}

impl ActivityPage {
    /// Measure the raw page, then decode it
    pub fn from_raw(values: Vec<Value>) -> Self {
        let received = values.len();
        Self {
            received,
            activities: normalize_records(values),
        }
    }

    pub fn skipped(&self) -> usize {
        self.received - self.activities.len()
    }
}

/// collection -> item -> timestamp -> activity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityIndex {
    entries: HashMap<String, HashMap<String, BTreeMap<String, Activity>>>,
}

impl ActivityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a page into the index. A record with an already known
    /// (collection, item, timestamp) replaces the earlier one.
    pub fn merge(mut self, page: Vec<Activity>) -> Self {
        for activity in page {
            self.entries
                .entry(activity.collection.clone())
                .or_default()
                .entry(activity.item.clone())
                .or_default()
                .insert(activity.timestamp.clone(), activity);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of distinct (collection, item, timestamp) records
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(HashMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn items(&self, collection: &str) -> Option<&HashMap<String, BTreeMap<String, Activity>>> {
        self.entries.get(collection)
    }

    /// Activities of one item ordered by timestamp
    pub fn history(&self, collection: &str, item: &str) -> Option<&BTreeMap<String, Activity>> {
        self.entries.get(collection).and_then(|items| items.get(item))
    }

    pub fn get(&self, collection: &str, item: &str, timestamp: &str) -> Option<&Activity> {
        self.history(collection, item)
            .and_then(|history| history.get(timestamp))
    }

    /// Number of changed items per collection, sorted by collection name
    pub fn item_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = self
            .entries
            .iter()
            .map(|(collection, items)| (collection.as_str(), items.len()))
            .collect();
        counts.sort_by(|a, b| a.0.cmp(b.0));
        counts
    }

    /// Most recent activity timestamp recorded for a collection
    pub fn latest_timestamp(&self, collection: &str) -> Option<&str> {
        self.entries
            .get(collection)?
            .values()
            .filter_map(|history| history.keys().max_by(|a, b| compare_timestamps(a, b)))
            .max_by(|a, b| compare_timestamps(a, b))
            .map(String::as_str)
    }

    /// Names of collections with activity newer than their last sync.
    ///
    /// A collection that was never synced counts as changed as soon as it has
    /// any activity.
    pub fn changed_collections<'a>(&self, collections: &'a [Collection]) -> Vec<&'a str> {
        collections
            .iter()
            .filter(|collection| {
                match (
                    self.latest_timestamp(&collection.collection),
                    collection.synced_at(),
                ) {
                    (Some(latest), Some(synced)) => {
                        compare_timestamps(latest, synced) == Ordering::Greater
                    }
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            })
            .map(|collection| collection.collection.as_str())
            .collect()
    }
}

/// Compare two timestamps chronologically when both parse as RFC 3339,
/// lexically otherwise.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

/// Sequential page loop over an instance's activity endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ActivityAggregator {
    page_size: usize,
}

impl Default for ActivityAggregator {
    fn default() -> Self {
        Self::new(ACTIVITIES_PER_REQUEST)
    }
}

impl ActivityAggregator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch pages 1, 2, 3, ... until the backend sends a page shorter than the
    /// page size, merging each into `index`.
    ///
    /// A failed fetch drops the accumulated index and returns the error.
    pub async fn collect<F>(
        &self,
        instance: &dyn Instance,
        build_query: F,
        mut index: ActivityIndex,
    ) -> Result<ActivityIndex>
    where
        F: Fn(usize) -> ActivityQuery + Send + Sync,
    {
        let mut page = 1;
        loop {
            let query = build_query(page);
            let fetched = instance.read_activities(&query).await?;
            let received = fetched.received;
            debug!(
                "Fetched activity page {} from {} ({} record(s))",
                page,
                instance.name(),
                received
            );
            if fetched.skipped() > 0 {
                warn!(
                    "Activity page {} from {}: dropped {} malformed record(s)",
                    page,
                    instance.name(),
                    fetched.skipped()
                );
            }

            index = index.merge(fetched.activities);

            if received < self.page_size {
                break;
            }
            page += 1;
        }

        info!(
            "Aggregated {} activity record(s) over {} page(s) from {}",
            index.len(),
            page,
            instance.name()
        );
        Ok(index)
    }

    /// Changed-items activity for one collection, or for all of them.
    pub async fn changed_items(
        &self,
        instance: &dyn Instance,
        collection: Option<&str>,
    ) -> Result<ActivityIndex> {
        let page_size = self.page_size;
        self.collect(
            instance,
            |page| ActivityQuery::changed_items(collection, page_size, page),
            ActivityIndex::new(),
        )
        .await
    }
}
