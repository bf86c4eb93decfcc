use std::collections::VecDeque;
use tracing::debug;

use crate::error::{Result, WineportError};
use crate::models::{GitHubRelease, ReleaseRecord};

/// Source of release pages for a repository.
///
/// `page` is 1-based. Implementations apply their own timeout and retry
/// policy and report any failure as `CatalogUnavailable`.
pub trait CatalogTransport {
    fn fetch_page(&self, repo: &str, page: usize, per_page: usize) -> Result<Vec<ReleaseRecord>>;

    /// Largest page the source will return
    fn max_page_size(&self) -> usize {
        100
    }
}

/// Release catalog of one or more source repositories
pub struct ReleaseCatalog<T> {
    transport: T,
}

impl<T: CatalogTransport> ReleaseCatalog<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Lazily list releases of `repo`, most recent first, in catalog order.
    ///
    /// Nothing is fetched until the iterator is consumed, and pages are
    /// requested one at a time as the caller advances; stopping early costs
    /// nothing. Calling this again restarts from the first page. After an
    /// error the iterator is fused.
    pub fn list_releases<'a>(&'a self, repo: &'a str, page_size: usize) -> Releases<'a, T> {
        let per_page = page_size.clamp(1, self.transport.max_page_size().max(1));
        Releases {
            transport: &self.transport,
            repo,
            per_page,
            next_page: 1,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Find the release with exactly this tag
    pub fn find_release(
        &self,
        repo: &str,
        tag: &str,
        page_size: usize,
    ) -> Result<Option<ReleaseRecord>> {
        let tags = [tag.to_string()];
        match self.find_releases(repo, &tags, page_size).pop() {
            Some((_, result)) => result,
            None => Ok(None),
        }
    }

    /// Look up several tags in one pass over the listing.
    ///
    /// Results follow the order of `tags`. A tag found before a page fails
    /// keeps its release; every tag still missing at that point gets the
    /// failure, and a tag missing from a complete listing gets `Ok(None)`.
    pub fn find_releases(
        &self,
        repo: &str,
        tags: &[String],
        page_size: usize,
    ) -> Vec<(String, Result<Option<ReleaseRecord>>)> {
        let mut found: Vec<Option<ReleaseRecord>> = vec![None; tags.len()];
        let mut failure = None;

        for release in self.list_releases(repo, page_size) {
            let release = match release {
                Ok(release) => release,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            for (tag, slot) in tags.iter().zip(found.iter_mut()) {
                if slot.is_none() && *tag == release.tag {
                    *slot = Some(release.clone());
                }
            }
            if found.iter().all(Option::is_some) {
                break;
            }
        }

        tags.iter()
            .zip(found)
            .map(|(tag, release)| {
                let result = match (release, &failure) {
                    (Some(release), _) => Ok(Some(release)),
                    (None, Some(e)) => Err(lookup_failure(repo, e)),
                    (None, None) => Ok(None),
                };
                (tag.clone(), result)
            })
            .collect()
    }
}

/// Per-tag copy of the error that ended a listing
fn lookup_failure(repo: &str, error: &WineportError) -> WineportError {
    match error {
        WineportError::Cancelled => WineportError::Cancelled,
        WineportError::CatalogUnavailable { reason, .. } => WineportError::CatalogUnavailable {
            repo: repo.to_string(),
            reason: reason.clone(),
        },
        other => WineportError::CatalogUnavailable {
            repo: repo.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Lazy, paginated iterator over a repository's releases
pub struct Releases<'a, T> {
    transport: &'a T,
    repo: &'a str,
    per_page: usize,
    next_page: usize,
    buffer: VecDeque<ReleaseRecord>,
    exhausted: bool,
}

impl<T: CatalogTransport> Iterator for Releases<'_, T> {
    type Item = Result<ReleaseRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(release) = self.buffer.pop_front() {
            return Some(Ok(release));
        }
        if self.exhausted {
            return None;
        }

        debug!(
            "Fetching release page {} of {} ({} per page)",
            self.next_page, self.repo, self.per_page
        );
        match self
            .transport
            .fetch_page(self.repo, self.next_page, self.per_page)
        {
            Ok(page) => {
                // A short page is the last one
                if page.len() < self.per_page {
                    self.exhausted = true;
                }
                self.next_page += 1;
                self.buffer.extend(page);
                self.buffer.pop_front().map(Ok)
            }
            Err(e) => {
                self.exhausted = true;
                self.buffer.clear();
                Some(Err(e))
            }
        }
    }
}

/// Parse one page of a GitHub-compatible release listing.
///
/// An empty body, `null`, or anything that is not an array of releases is
/// rejected so that a broken page is never taken as the end of the catalog.
pub fn parse_release_page(repo: &str, body: &str) -> Result<Vec<ReleaseRecord>> {
    let unavailable = |reason: String| WineportError::CatalogUnavailable {
        repo: repo.to_string(),
        reason,
    };

    if body.trim().is_empty() {
        return Err(unavailable("empty response".to_string()));
    }

    let releases: Option<Vec<GitHubRelease>> = serde_json::from_str(body)
        .map_err(|e| unavailable(format!("malformed release JSON: {e}")))?;
    let releases = releases.ok_or_else(|| unavailable("null response".to_string()))?;

    Ok(releases.into_iter().map(ReleaseRecord::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Serves a fixed list of tags in pages, recording every request
    struct FakeTransport {
        tags: Vec<String>,
        max_page: usize,
        fail_on_page: Option<usize>,
        requests: RefCell<Vec<(usize, usize)>>,
    }

    impl FakeTransport {
        fn new(count: usize, max_page: usize) -> Self {
            Self {
                tags: (0..count).map(|i| format!("v{}", count - i)).collect(),
                max_page,
                fail_on_page: None,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl CatalogTransport for FakeTransport {
        fn fetch_page(&self, repo: &str, page: usize, per_page: usize) -> Result<Vec<ReleaseRecord>> {
            self.requests.borrow_mut().push((page, per_page));
            if self.fail_on_page == Some(page) {
                return Err(WineportError::CatalogUnavailable {
                    repo: repo.to_string(),
                    reason: "HTTP status 502".to_string(),
                });
            }
            Ok(self
                .tags
                .iter()
                .skip((page - 1) * per_page)
                .take(per_page)
                .map(|tag| ReleaseRecord {
                    tag: tag.clone(),
                    name: tag.clone(),
                    assets: Vec::new(),
                })
                .collect())
        }

        fn max_page_size(&self) -> usize {
            self.max_page
        }
    }

    fn tags(results: Vec<Result<ReleaseRecord>>) -> Vec<String> {
        results.into_iter().map(|r| r.unwrap().tag).collect()
    }

    #[test]
    fn test_nothing_fetched_until_consumed() {
        let catalog = ReleaseCatalog::new(FakeTransport::new(5, 100));
        let _releases = catalog.list_releases("owner/repo", 2);
        assert!(catalog.transport.requests.borrow().is_empty());
    }

    #[test]
    fn test_pages_preserve_order() {
        let catalog = ReleaseCatalog::new(FakeTransport::new(5, 100));
        let all = tags(catalog.list_releases("owner/repo", 2).collect());
        assert_eq!(all, vec!["v5", "v4", "v3", "v2", "v1"]);
        assert_eq!(
            *catalog.transport.requests.borrow(),
            vec![(1, 2), (2, 2), (3, 2)]
        );
    }

    #[test]
    fn test_source_page_limit_requests_more_pages() {
        let catalog = ReleaseCatalog::new(FakeTransport::new(10, 3));
        let first = tags(catalog.list_releases("owner/repo", 50).take(7).collect());
        assert_eq!(first, vec!["v10", "v9", "v8", "v7", "v6", "v5", "v4"]);
        assert_eq!(
            *catalog.transport.requests.borrow(),
            vec![(1, 3), (2, 3), (3, 3)]
        );
    }

    #[test]
    fn test_early_stop_fetches_only_needed_pages() {
        let catalog = ReleaseCatalog::new(FakeTransport::new(100, 100));
        let first = tags(catalog.list_releases("owner/repo", 10).take(3).collect());
        assert_eq!(first, vec!["v100", "v99", "v98"]);
        assert_eq!(catalog.transport.requests.borrow().len(), 1);
    }

    #[test]
    fn test_listing_restarts_from_first_page() {
        let catalog = ReleaseCatalog::new(FakeTransport::new(4, 100));
        let once = tags(catalog.list_releases("owner/repo", 3).take(1).collect());
        let again = tags(catalog.list_releases("owner/repo", 3).collect());
        assert_eq!(once, vec!["v4"]);
        assert_eq!(again, vec!["v4", "v3", "v2", "v1"]);
    }

    #[test]
    fn test_failed_page_ends_listing_with_error() {
        let mut transport = FakeTransport::new(6, 100);
        transport.fail_on_page = Some(2);
        let catalog = ReleaseCatalog::new(transport);
        let results: Vec<_> = catalog.list_releases("owner/repo", 2).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(
            results[2],
            Err(WineportError::CatalogUnavailable { .. })
        ));
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = ReleaseCatalog::new(FakeTransport::new(0, 100));
        assert_eq!(catalog.list_releases("owner/repo", 10).count(), 0);
    }

    #[test]
    fn test_find_release_by_tag() {
        let catalog = ReleaseCatalog::new(FakeTransport::new(9, 100));
        let found = catalog.find_release("owner/repo", "v3", 4).unwrap();
        assert_eq!(found.unwrap().tag, "v3");
        assert!(catalog.find_release("owner/repo", "v42", 4).unwrap().is_none());
    }

    #[test]
    fn test_find_releases_scans_listing_once() {
        let catalog = ReleaseCatalog::new(FakeTransport::new(9, 100));
        let wanted = vec!["v8".to_string(), "v42".to_string(), "v2".to_string()];
        let results = catalog.find_releases("owner/repo", &wanted, 3);

        let found: Vec<(&str, Option<&str>)> = results
            .iter()
            .map(|(tag, r)| {
                (tag.as_str(), r.as_ref().unwrap().as_ref().map(|r| r.tag.as_str()))
            })
            .collect();
        assert_eq!(found, vec![("v8", Some("v8")), ("v42", None), ("v2", Some("v2"))]);
        assert_eq!(
            *catalog.transport.requests.borrow(),
            vec![(1, 3), (2, 3), (3, 3), (4, 3)]
        );
    }

    #[test]
    fn test_find_releases_stops_once_all_found() {
        let catalog = ReleaseCatalog::new(FakeTransport::new(20, 100));
        let wanted = vec!["v19".to_string(), "v20".to_string()];
        let results = catalog.find_releases("owner/repo", &wanted, 5);
        assert!(results.iter().all(|(_, r)| matches!(r, Ok(Some(_)))));
        assert_eq!(catalog.transport.requests.borrow().len(), 1);
    }

    #[test]
    fn test_find_releases_keeps_tags_found_before_a_failed_page() {
        let mut transport = FakeTransport::new(6, 100);
        transport.fail_on_page = Some(2);
        let catalog = ReleaseCatalog::new(transport);
        let wanted = vec!["v5".to_string(), "v2".to_string()];
        let results = catalog.find_releases("owner/repo", &wanted, 2);

        assert_eq!(results[0].0, "v5");
        assert_eq!(results[0].1.as_ref().unwrap().as_ref().unwrap().tag, "v5");
        assert_eq!(results[1].0, "v2");
        assert!(matches!(
            results[1].1,
            Err(WineportError::CatalogUnavailable { ref repo, ref reason })
                if repo == "owner/repo" && reason == "HTTP status 502"
        ));
    }

    #[test]
    fn test_parse_rejects_empty_null_and_malformed() {
        for body in ["", "   ", "null", "{\"message\": \"Not Found\"}", "[{\"tag\": 1}]"] {
            let err = parse_release_page("owner/repo", body).unwrap_err();
            assert!(
                matches!(err, WineportError::CatalogUnavailable { ref repo, .. } if repo == "owner/repo"),
                "body {body:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_parse_valid_page() {
        let body = r#"[
            {"tag_name": "9.1", "name": "Wine 9.1", "assets": [
                {"name": "wine-9.1-amd64.tar.xz", "browser_download_url": "https://example.com/9.1", "size": 1}
            ]},
            {"tag_name": "9.0", "name": "Wine 9.0", "assets": []}
        ]"#;
        let page = parse_release_page("owner/repo", body).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].tag, "9.1");
        assert_eq!(page[0].assets[0].url, "https://example.com/9.1");
        assert_eq!(page[1].name, "Wine 9.0");
    }

    #[test]
    fn test_parse_empty_array_is_valid() {
        assert!(parse_release_page("owner/repo", "[]").unwrap().is_empty());
    }
}
