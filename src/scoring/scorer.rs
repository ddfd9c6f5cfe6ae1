//! TF-IDF scoring with title and phrase boosts.
//!
//! For one keyword's surviving candidate document: `TF = 1 + log(positionsInDoc)`
//! per token, `IDF = log(totalDocs / documentCount)`, base score is the sum
//! over the keyword's tokens of `TF * IDF`. A title match multiplies the
//! score by 3; phrase hits multiply by `3 + log(phraseCount)`.

/// Per-token contribution to one candidate document's score.
pub struct TokenMatch {
    /// Occurrences of this token in the document (title + body).
    pub positions_in_doc: usize,
    /// Documents containing this token, across the whole index.
    pub document_count: u64,
}

pub struct ScoreInput<'a> {
    pub total_docs: u64,
    pub token_matches: &'a [TokenMatch],
    pub has_title_match: bool,
    pub phrase_count: u64,
}

/// Computes the boosted score for one candidate document against one
/// keyword.
pub fn score(input: &ScoreInput) -> f64 {
    let mut base = 0.0f64;
    for token_match in input.token_matches {
        if token_match.positions_in_doc == 0 || token_match.document_count == 0 {
            continue;
        }
        let tf = 1.0 + (token_match.positions_in_doc as f64).ln();
        let idf = (input.total_docs as f64 / token_match.document_count as f64).ln();
        base += tf * idf;
    }

    if input.has_title_match {
        base *= 3.0;
    }

    if input.phrase_count > 0 {
        base *= 3.0 + (input.phrase_count as f64).ln();
    }

    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_match_scores_strictly_higher_than_no_title_match() {
        let matches = [TokenMatch { positions_in_doc: 2, document_count: 10 }];
        let without_title = score(&ScoreInput {
            total_docs: 100,
            token_matches: &matches,
            has_title_match: false,
            phrase_count: 0,
        });
        let with_title = score(&ScoreInput {
            total_docs: 100,
            token_matches: &matches,
            has_title_match: true,
            phrase_count: 0,
        });
        assert!(with_title > without_title);
    }

    #[test]
    fn phrase_hits_boost_score() {
        let matches = [TokenMatch { positions_in_doc: 2, document_count: 10 }];
        let no_phrase = score(&ScoreInput {
            total_docs: 100,
            token_matches: &matches,
            has_title_match: false,
            phrase_count: 0,
        });
        let with_phrase = score(&ScoreInput {
            total_docs: 100,
            token_matches: &matches,
            has_title_match: false,
            phrase_count: 3,
        });
        assert!(with_phrase > no_phrase);
    }
}
