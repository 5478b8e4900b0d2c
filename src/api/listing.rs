//! Paginated listing: plain and version-aware pages, merged or incremental,
//! and a partitioned listing that fans prefixes out over worker threads.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc,
};

use http::{HeaderMap, Method, StatusCode};

use crate::{
    cancel::CancellationToken,
    client::Client,
    error::{Error, ErrorKind, Result},
    request::{OutboundRequest, QueryParams},
    types::{ListCursor, ListPage, ListingResult, Object, VersionEntry},
    util,
};

/// Attempts per page after a transport failure, beyond the first.
pub(crate) const PAGE_IO_RETRIES: u32 = 5;
pub(crate) const DEFAULT_PARTITION_WORKERS: usize = 10;
pub(crate) const DEFAULT_DELIMITER: &str = "/";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ListingKind {
    Plain,
    Versions,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ListParams {
    pub(crate) bucket: String,
    pub(crate) prefix: Option<String>,
    pub(crate) delimiter: Option<String>,
    pub(crate) page_size: Option<u32>,
    pub(crate) cancel: Option<CancellationToken>,
}

impl ListParams {
    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }
}

type PageParser<T> = fn(&str) -> Result<ListPage<T>>;

/// Fetches listing pages of one kind.
#[derive(Clone)]
pub(crate) struct Lister<T> {
    client: Client,
    params: ListParams,
    kind: ListingKind,
    parse: PageParser<T>,
}

impl Lister<Object> {
    pub(crate) fn plain(client: Client, params: ListParams) -> Self {
        Self {
            client,
            params,
            kind: ListingKind::Plain,
            parse: util::xml::parse_list_bucket,
        }
    }
}

impl Lister<VersionEntry> {
    pub(crate) fn versions(client: Client, params: ListParams) -> Self {
        Self {
            client,
            params,
            kind: ListingKind::Versions,
            parse: util::xml::parse_list_versions,
        }
    }
}

impl<T> Lister<T> {
    fn query(&self, cursor: Option<&ListCursor>) -> QueryParams {
        let mut query = QueryParams::new();
        if self.kind == ListingKind::Versions {
            query.flag("versions");
        }
        query
            .push_opt("prefix", self.params.prefix.clone())
            .push_opt("delimiter", self.params.delimiter.clone())
            .push_opt("max-keys", self.params.page_size.map(|n| n.to_string()));

        if let Some(cursor) = cursor {
            match self.kind {
                ListingKind::Plain => {
                    query.push("marker", cursor.marker.clone());
                }
                ListingKind::Versions => {
                    query
                        .push("key-marker", cursor.marker.clone())
                        .push_opt("version-id-marker", cursor.version_id_marker.clone());
                }
            }
        }
        query
    }

    fn fetch_once(&self, cursor: Option<&ListCursor>) -> Result<ListPage<T>> {
        let request = OutboundRequest::build(
            self.client.config(),
            Method::GET,
            &self.params.bucket,
            None,
            &self.query(cursor),
            HeaderMap::new(),
            &[],
        )?
        .with_cancel(self.params.cancel.clone());

        let mut resp = self.client.execute(request, &[StatusCode::OK])?;
        let xml = resp.read_string()?;
        (self.parse)(&xml)
    }

    /// One page, retrying transport failures on the same cursor.
    pub(crate) fn fetch_page(&self, cursor: Option<&ListCursor>) -> Result<ListPage<T>> {
        let mut failures = 0u32;
        loop {
            self.params.check_cancelled()?;
            match self.fetch_once(cursor) {
                Ok(page) => return Ok(page),
                Err(err) if err.kind() == ErrorKind::Transport && failures < PAGE_IO_RETRIES => {
                    failures += 1;
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %err, failures, "retrying listing page after I/O failure");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Fetches everything from `cursor` on, or a single page when `merge_all` is false.
    pub(crate) fn collect(
        &self,
        cursor: Option<ListCursor>,
        merge_all: bool,
    ) -> Result<ListingResult<T>> {
        if !merge_all {
            return self.fetch_page(cursor.as_ref()).map(ListingResult::from_page);
        }

        let mut entries = Vec::new();
        let mut common_prefixes = Vec::new();
        let mut cursor = cursor;
        loop {
            let page = self.fetch_page(cursor.as_ref())?;
            entries.extend(page.entries);
            common_prefixes.extend(page.common_prefixes);
            if !page.truncated {
                break;
            }
            cursor = Some(advance(cursor.as_ref(), page.next_cursor)?);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            bucket = %self.params.bucket,
            entries = entries.len(),
            prefixes = common_prefixes.len(),
            "merged listing"
        );

        Ok(ListingResult {
            entries,
            common_prefixes,
            cursor: None,
        })
    }

    pub(crate) fn pages(self, cursor: Option<ListCursor>) -> ListPager<T> {
        ListPager {
            lister: self,
            cursor,
            done: false,
        }
    }
}

/// Next cursor of a truncated page; it must differ from the one just used.
fn advance(previous: Option<&ListCursor>, next: Option<ListCursor>) -> Result<ListCursor> {
    let next =
        next.ok_or_else(|| Error::decode("truncated listing page carries no cursor", None))?;
    if previous == Some(&next) {
        return Err(Error::decode(
            format!("listing cursor did not advance past {:?}", next.marker),
            None,
        ));
    }
    Ok(next)
}

/// Iterator over listing pages. Stops after the last page or the first error.
pub struct ListPager<T> {
    lister: Lister<T>,
    cursor: Option<ListCursor>,
    done: bool,
}

impl<T> ListPager<T> {
    /// Cursor the next call to `next` will resume from.
    pub fn cursor(&self) -> Option<&ListCursor> {
        self.cursor.as_ref()
    }
}

impl<T> Iterator for ListPager<T> {
    type Item = Result<ListPage<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let page = match self.lister.fetch_page(self.cursor.as_ref()) {
            Ok(page) => page,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        if page.truncated {
            match advance(self.cursor.as_ref(), page.next_cursor.clone()) {
                Ok(next) => self.cursor = Some(next),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        } else {
            self.cursor = None;
            self.done = true;
        }

        Some(Ok(page))
    }
}

impl<T> std::fmt::Debug for ListPager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListPager")
            .field("bucket", &self.lister.params.bucket)
            .field("kind", &self.lister.kind)
            .field("cursor", &self.cursor)
            .field("done", &self.done)
            .finish()
    }
}

/// Lists a bucket by walking common prefixes level by level down to `depth`,
/// listing each prefix on a pool of `workers` threads. The deepest level is
/// listed without a delimiter, so every object below the root prefix is
/// returned exactly once, sorted by key.
pub(crate) fn list_partitioned(
    client: &Client,
    params: ListParams,
    depth: u32,
    workers: usize,
) -> Result<ListingResult<Object>> {
    let delimiter = params
        .delimiter
        .clone()
        .unwrap_or_else(|| DEFAULT_DELIMITER.to_string());
    let parent = params.cancel.clone().unwrap_or_default();

    let mut objects = Vec::new();
    let mut level = vec![params.prefix.clone().unwrap_or_default()];

    for current in 0..=depth {
        if level.is_empty() {
            break;
        }
        let level_delimiter = (current < depth).then(|| delimiter.clone());
        let branch_cancel = parent.child_token();

        #[cfg(feature = "tracing")]
        tracing::debug!(depth = current, prefixes = level.len(), "listing partition level");

        let results = run_pool(&level, workers, &branch_cancel, |prefix, cancel| {
            let branch = ListParams {
                bucket: params.bucket.clone(),
                prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
                delimiter: level_delimiter.clone(),
                page_size: params.page_size,
                cancel: Some(cancel.clone()),
            };
            Lister::plain(client.clone(), branch).collect(None, true)
        })?;

        let mut next = Vec::new();
        for result in results {
            objects.extend(result.entries);
            next.extend(result.common_prefixes);
        }
        level = next;
    }

    objects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(ListingResult {
        entries: objects,
        common_prefixes: Vec::new(),
        cursor: None,
    })
}

/// Runs `task` for every item on at most `workers` threads. The first failure
/// cancels `cancel` so the remaining branches stop; a non-cancellation error
/// is reported in preference to the cancellations it caused.
fn run_pool<T, F>(
    items: &[String],
    workers: usize,
    cancel: &CancellationToken,
    task: F,
) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&str, &CancellationToken) -> Result<T> + Sync,
{
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, Result<T>)>();
    let threads = workers.max(1).min(items.len());

    std::thread::scope(|scope| {
        for _ in 0..threads {
            let tx = tx.clone();
            let next = &next;
            let task = &task;
            scope.spawn(move || {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let idx = next.fetch_add(1, Ordering::SeqCst);
                    let Some(item) = items.get(idx) else {
                        break;
                    };
                    let result = task(item, cancel);
                    if result.is_err() {
                        cancel.cancel();
                    }
                    if tx.send((idx, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx);

    let mut done: Vec<(usize, T)> = Vec::with_capacity(items.len());
    let mut failure: Option<Error> = None;
    for (idx, result) in rx {
        match result {
            Ok(value) => done.push((idx, value)),
            Err(err) => {
                let replace = match &failure {
                    None => true,
                    Some(existing) => {
                        existing.kind() == ErrorKind::Cancelled
                            && err.kind() != ErrorKind::Cancelled
                    }
                };
                if replace {
                    failure = Some(err);
                }
            }
        }
    }

    if let Some(err) = failure {
        return Err(err);
    }
    if done.len() < items.len() {
        return Err(Error::Cancelled);
    }
    done.sort_by_key(|(idx, _)| *idx);
    Ok(done.into_iter().map(|(_, value)| value).collect())
}
