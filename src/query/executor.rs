//! Query executor: intersect posting lists with a galloping skip, detect
//! phrases over title/body position slices, score with TF-IDF plus title
//! and phrase boosts, and materialize highlighted results.
//!
//! One keyword is resolved independently (§4.10 steps 1-8); multiple
//! keywords are combined with an `AND` over surviving docIds, exclusions
//! are subtracted, and the `site:` filter drops docs whose URL host does
//! not end with the requested suffix.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::analysis::ngram;
use crate::cache::lru_ttl::LruTtlCache;
use crate::core::error::Result;
use crate::core::types::DocId;
use crate::index::posting::Posting;
use crate::query::highlight::{self, Interval};
use crate::query::parser::ParsedQuery;
use crate::scoring::scorer::{self, ScoreInput, TokenMatch};
use crate::store::document_store::DocumentStore;
use crate::store::postings_store::PostingsStore;

const MAX_RESULTS: usize = 50;
const ABSTRACT_PAD: u32 = 100;
const HIGHLIGHT_PREFIX: &str = "<em>";
const HIGHLIGHT_SUFFIX: &str = "</em>";

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub abstract_text: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub items: Vec<SearchHit>,
    pub duration: Duration,
}

/// One query token (one n-gram of one keyword) with its position within
/// that keyword, used to align `rel` offsets during phrase detection.
struct QueryToken {
    token: String,
    query_pos: u32,
    postings: Vec<Posting>,
    document_count: u64,
}

/// A single surviving docId for one keyword, carrying everything the
/// scorer and highlighter need.
struct CandidateMatch {
    doc_id: DocId,
    token_matches: Vec<TokenMatch>,
    has_title_match: bool,
    phrase_count: u64,
    title_positions: Vec<u32>,
    body_positions: Vec<u32>,
}

pub struct SearchExecutor<'a> {
    postings_store: &'a PostingsStore,
    document_store: &'a DocumentStore,
    postings_cache: &'a LruTtlCache<String, crate::index::posting::PostingsList>,
    doc_count_cache: &'a LruTtlCache<String, u64>,
    doc_url_cache: &'a LruTtlCache<DocId, String>,
    ngram_n: usize,
}

impl<'a> SearchExecutor<'a> {
    pub fn new(
        postings_store: &'a PostingsStore,
        document_store: &'a DocumentStore,
        postings_cache: &'a LruTtlCache<String, crate::index::posting::PostingsList>,
        doc_count_cache: &'a LruTtlCache<String, u64>,
        doc_url_cache: &'a LruTtlCache<DocId, String>,
        ngram_n: usize,
    ) -> Self {
        SearchExecutor { postings_store, document_store, postings_cache, doc_count_cache, doc_url_cache, ngram_n }
    }

    pub fn search(&self, parsed: &ParsedQuery) -> Result<SearchResult> {
        let start = Instant::now();
        if parsed.keywords.is_empty() {
            return Ok(SearchResult { items: Vec::new(), duration: start.elapsed() });
        }

        let mut per_keyword: Vec<HashMap<DocId, CandidateMatch>> = Vec::with_capacity(parsed.keywords.len());
        for keyword in &parsed.keywords {
            let matches = self.search_keyword(keyword, parsed.site.as_deref())?;
            if matches.is_empty() {
                return Ok(SearchResult { items: Vec::new(), duration: start.elapsed() });
            }
            per_keyword.push(matches.into_iter().map(|m| (m.doc_id, m)).collect());
        }

        let mut doc_ids: Vec<DocId> = per_keyword[0].keys().copied().collect();
        for other in &per_keyword[1..] {
            doc_ids.retain(|d| other.contains_key(d));
        }

        for exclusion in &parsed.exclusions {
            if doc_ids.is_empty() {
                break;
            }
            let excluded: HashSet<DocId> = self
                .search_keyword(exclusion, parsed.site.as_deref())?
                .into_iter()
                .map(|m| m.doc_id)
                .collect();
            doc_ids.retain(|d| !excluded.contains(d));
        }

        let total_docs = self.document_store.indexed_doc_count().max(1);
        let mut scored: Vec<(DocId, f64, Vec<u32>, Vec<u32>)> = Vec::with_capacity(doc_ids.len());
        for doc_id in doc_ids {
            let mut total_score = 0.0f64;
            let mut title_positions = Vec::new();
            let mut body_positions = Vec::new();
            for keyword_matches in &per_keyword {
                let candidate = &keyword_matches[&doc_id];
                total_score += scorer::score(&ScoreInput {
                    total_docs,
                    token_matches: &candidate.token_matches,
                    has_title_match: candidate.has_title_match,
                    phrase_count: candidate.phrase_count,
                });
                title_positions.extend_from_slice(&candidate.title_positions);
                body_positions.extend_from_slice(&candidate.body_positions);
            }
            scored.push((doc_id, total_score, title_positions, body_positions));
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(MAX_RESULTS);

        let mut items = Vec::with_capacity(scored.len());
        for (doc_id, score, title_positions, body_positions) in scored {
            let Some(document) = self.document_store.get(doc_id)? else { continue };
            items.push(materialize(&document.url, &document.title, &document.body, score, title_positions, body_positions));
        }

        Ok(SearchResult { items, duration: start.elapsed() })
    }

    /// Resolves one keyword to its surviving candidates: tokenize, fetch
    /// postings per token, intersect shortest-list-first, apply the `site`
    /// filter, then run phrase detection and accumulate per-token matches.
    fn search_keyword(&self, keyword: &str, site: Option<&str>) -> Result<Vec<CandidateMatch>> {
        let raw_tokens = ngram::split_ngrams(keyword, self.ngram_n);
        if raw_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_tokens = Vec::with_capacity(raw_tokens.len());
        for (token, pos) in &raw_tokens {
            let postings = self.fetch_postings(token)?;
            if postings.is_empty() {
                return Ok(Vec::new());
            }
            let document_count = self.fetch_doc_count(token)?;
            query_tokens.push(QueryToken {
                token: token.clone(),
                query_pos: *pos as u32,
                postings: postings.0,
                document_count,
            });
        }

        let mut sorted: Vec<&QueryToken> = query_tokens.iter().collect();
        sorted.sort_by_key(|t| t.document_count);
        let lists: Vec<&[Posting]> = sorted.iter().map(|t| t.postings.as_slice()).collect();
        let groups = galloping_intersect(&lists);

        let mut results = Vec::with_capacity(groups.len());
        for group in groups {
            let doc_id = group[0].doc_id;

            if let Some(site) = site {
                let url = self.doc_url_cache.get_or_load(&doc_id, || {
                    Ok(self.document_store.url(doc_id)?.unwrap_or_default())
                })?;
                if url.is_empty() || !host_matches_site(&url, site) {
                    continue;
                }
            }

            let token_matches: Vec<TokenMatch> = sorted
                .iter()
                .zip(group.iter())
                .map(|(t, posting)| TokenMatch {
                    positions_in_doc: posting.term_freq(),
                    document_count: t.document_count,
                })
                .collect();

            let has_title_match = group.iter().any(|p| !p.title_positions().is_empty());

            let title_rels: Vec<(&[u32], u32)> = sorted
                .iter()
                .zip(group.iter())
                .map(|(t, posting)| (posting.title_positions(), t.query_pos))
                .collect();
            let body_rels: Vec<(&[u32], u32)> = sorted
                .iter()
                .zip(group.iter())
                .map(|(t, posting)| (posting.body_positions(), t.query_pos))
                .collect();

            let title_phrase_count = phrase_match_count(&title_rels);
            let body_phrase_count = phrase_match_count(&body_rels);

            let title_positions: Vec<u32> = group.iter().flat_map(|p| p.title_positions().to_vec()).collect();
            let body_positions: Vec<u32> = group.iter().flat_map(|p| p.body_positions().to_vec()).collect();

            results.push(CandidateMatch {
                doc_id,
                token_matches,
                has_title_match,
                phrase_count: title_phrase_count + body_phrase_count,
                title_positions,
                body_positions,
            });
        }

        Ok(results)
    }

    fn fetch_postings(&self, token: &str) -> Result<crate::index::posting::PostingsList> {
        self.postings_cache.get_or_load(&token.to_string(), || {
            Ok(self.postings_store.postings(token)?.unwrap_or_default())
        })
    }

    fn fetch_doc_count(&self, token: &str) -> Result<u64> {
        self.doc_count_cache.get_or_load(&token.to_string(), || self.postings_store.doc_count(token))
    }
}

fn host_matches_site(url: &str, site: &str) -> bool {
    let host = url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_default();
    host.ends_with(site)
}

/// Multi-list intersection driven by the shortest (first) list: for each
/// candidate docId, advance trailing cursors past any doc ahead of the
/// base; if a cursor overshoots the base, resync cursor 0 to its docId and
/// retry. Terminates the moment any cursor is exhausted.
fn galloping_intersect(lists: &[&[Posting]]) -> Vec<Vec<Posting>> {
    let mut results = Vec::new();
    if lists.is_empty() {
        return results;
    }
    let mut idx = vec![0usize; lists.len()];

    loop {
        let Some(base) = lists[0].get(idx[0]) else { break };
        let base_doc = base.doc_id;
        let mut overshoot: Option<DocId> = None;

        for i in 1..lists.len() {
            loop {
                match lists[i].get(idx[i]) {
                    None => return results,
                    Some(p) if p.doc_id < base_doc => idx[i] += 1,
                    Some(p) => {
                        if p.doc_id > base_doc {
                            overshoot = Some(p.doc_id);
                        }
                        break;
                    }
                }
            }
            if overshoot.is_some() {
                break;
            }
        }

        match overshoot {
            None => {
                let group: Vec<Posting> = (0..lists.len()).map(|i| lists[i][idx[i]].clone()).collect();
                results.push(group);
                for i in 0..lists.len() {
                    idx[i] += 1;
                }
            }
            Some(target) => loop {
                match lists[0].get(idx[0]) {
                    None => return results,
                    Some(p) if p.doc_id < target => idx[0] += 1,
                    Some(_) => break,
                }
            },
        }
    }

    results
}

/// Counts phrase hits across per-token position lists, each normalized by
/// its in-query offset (`pos - rel`); a hit is a candidate offset `O` at
/// which every list's normalized value equals `O`. A single-token list
/// trivially counts every occurrence as a phrase hit of length one.
fn phrase_match_count(lists: &[(&[u32], u32)]) -> u64 {
    if lists.iter().any(|(positions, _)| positions.is_empty()) {
        return 0;
    }
    if lists.len() == 1 {
        return lists[0].0.len() as u64;
    }

    let mut idx = vec![0usize; lists.len()];
    let mut count = 0u64;

    loop {
        let Some(&base_pos) = lists[0].0.get(idx[0]) else { break };
        let o = base_pos as i64 - lists[0].1 as i64;
        let mut mismatch: Option<i64> = None;

        for i in 1..lists.len() {
            let (positions, rel) = lists[i];
            loop {
                match positions.get(idx[i]) {
                    None => return count,
                    Some(&p) => {
                        let normalized = p as i64 - rel as i64;
                        if normalized < o {
                            idx[i] += 1;
                        } else {
                            if normalized > o {
                                mismatch = Some(normalized);
                            }
                            break;
                        }
                    }
                }
            }
            if mismatch.is_some() {
                break;
            }
        }

        match mismatch {
            None => {
                count += 1;
                for i in 0..lists.len() {
                    idx[i] += 1;
                }
            }
            Some(new_o) => loop {
                match lists[0].0.get(idx[0]) {
                    None => return count,
                    Some(&p) => {
                        let normalized = p as i64 - lists[0].1 as i64;
                        if normalized < new_o {
                            idx[0] += 1;
                        } else {
                            break;
                        }
                    }
                }
            },
        }
    }

    count
}

/// Builds the rendered hit: title with inline highlight tags, and a body
/// abstract centered on the highlighted range, padded to 100 codepoints on
/// each side.
fn materialize(url: &str, title: &str, body: &str, score: f64, title_positions: Vec<u32>, body_positions: Vec<u32>) -> SearchHit {
    let title_chars: Vec<char> = title.chars().collect();
    let body_chars: Vec<char> = body.chars().collect();

    let title_intervals = highlight::build_highlight_intervals(title_positions);
    let rendered_title = render_highlighted(&title_chars, &title_intervals, 0, title_chars.len() as u32);

    let body_intervals = highlight::build_highlight_intervals(body_positions);
    let abstract_text = build_abstract(&body_chars, &body_intervals);

    SearchHit { url: url.to_string(), title: rendered_title, abstract_text, score }
}

fn build_abstract(chars: &[char], intervals: &[Interval]) -> String {
    let len = chars.len() as u32;
    if intervals.is_empty() {
        let end = (ABSTRACT_PAD * 2).min(len);
        return chars[..end as usize].iter().collect();
    }
    let start = intervals.first().unwrap().start.saturating_sub(ABSTRACT_PAD);
    let end = (intervals.last().unwrap().end + ABSTRACT_PAD).min(len);
    render_highlighted(chars, intervals, start, end)
}

fn render_highlighted(chars: &[char], intervals: &[Interval], from: u32, to: u32) -> String {
    let mut out = String::new();
    let mut iv_idx = 0usize;
    let mut in_highlight = false;

    for i in from..to {
        while iv_idx < intervals.len() && intervals[iv_idx].end <= i {
            iv_idx += 1;
        }
        let now_highlight = iv_idx < intervals.len() && intervals[iv_idx].start <= i && i < intervals[iv_idx].end;
        if now_highlight && !in_highlight {
            out.push_str(HIGHLIGHT_PREFIX);
        }
        if !now_highlight && in_highlight {
            out.push_str(HIGHLIGHT_SUFFIX);
        }
        in_highlight = now_highlight;
        out.push(chars[i as usize]);
    }
    if in_highlight {
        out.push_str(HIGHLIGHT_SUFFIX);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DocId as Id;

    fn p(doc_id: u64, title_end: usize, positions: Vec<u32>) -> Posting {
        Posting::new(Id(doc_id), title_end, positions)
    }

    #[test]
    fn galloping_intersect_finds_shared_doc_ids() {
        let a = vec![p(1, 0, vec![0]), p(2, 0, vec![0]), p(5, 0, vec![0])];
        let b = vec![p(2, 0, vec![1]), p(5, 0, vec![1]), p(9, 0, vec![1])];
        let groups = galloping_intersect(&[&a, &b]);
        let ids: Vec<u64> = groups.iter().map(|g| g[0].doc_id.value()).collect();
        assert_eq!(ids, vec![2, 5]);
    }

    #[test]
    fn galloping_intersect_empty_when_no_overlap() {
        let a = vec![p(1, 0, vec![0])];
        let b = vec![p(2, 0, vec![0])];
        assert!(galloping_intersect(&[&a, &b]).is_empty());
    }

    #[test]
    fn phrase_match_count_finds_adjacent_tokens() {
        // token "he" at query pos 0 occurs at doc positions [0, 10]
        // token "el" at query pos 1 occurs at doc positions [1, 20]
        // only offset 0 has both tokens adjacent (0,1); 10 has no partner at 11
        let he = vec![0u32, 10];
        let el = vec![1u32, 20];
        let count = phrase_match_count(&[(&he, 0), (&el, 1)]);
        assert_eq!(count, 1);
    }

    #[test]
    fn single_token_phrase_count_is_occurrence_count() {
        let positions = vec![0u32, 5, 9];
        assert_eq!(phrase_match_count(&[(&positions, 0)]), 3);
    }

    #[test]
    fn site_filter_matches_host_suffix() {
        assert!(host_matches_site("http://www.example.com/a", "example.com"));
        assert!(!host_matches_site("http://example.org/a", "example.com"));
    }

    #[test]
    fn render_highlighted_wraps_matched_span() {
        let chars: Vec<char> = "hello world".chars().collect();
        let intervals = vec![Interval { start: 0, end: 5 }];
        let rendered = render_highlighted(&chars, &intervals, 0, chars.len() as u32);
        assert_eq!(rendered, "<em>hello</em> world");
    }
}
