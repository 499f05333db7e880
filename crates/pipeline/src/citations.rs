//! Citation aggregation across the draft and every evaluator.

use advisor_core::citation::Citation;
use advisor_core::verdict::EvaluatorVerdict;
use std::collections::HashSet;

/// Deduplicate on `(url, title)`, keeping the first occurrence in order.
/// Citations with neither field all share the empty key.
pub fn dedupe<I>(citations: I) -> Vec<Citation>
where
    I: IntoIterator<Item = Citation>,
{
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut out = Vec::new();
    for citation in citations {
        let (url, title) = citation.key();
        if seen.insert((url.to_string(), title.to_string())) {
            out.push(citation);
        }
    }
    out
}

/// Citations from every verdict, in panel order, deduplicated.
pub fn aggregate(verdicts: &[EvaluatorVerdict]) -> Vec<Citation> {
    aggregate_with_seed(&[], verdicts)
}

/// Like [`aggregate`], with `seed` (the draft's own citations) first.
pub fn aggregate_with_seed(seed: &[Citation], verdicts: &[EvaluatorVerdict]) -> Vec<Citation> {
    dedupe(
        seed.iter()
            .cloned()
            .chain(verdicts.iter().flat_map(|v| v.citations.iter().cloned())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::verdict::Verdict;

    fn cite(url: &str, title: &str) -> Citation {
        Citation {
            url: (!url.is_empty()).then(|| url.to_string()),
            title: (!title.is_empty()).then(|| title.to_string()),
            ..Citation::default()
        }
    }

    fn verdict(label: &str, citations: Vec<Citation>) -> EvaluatorVerdict {
        EvaluatorVerdict {
            agent_label: label.into(),
            verdict: Verdict::Rejected,
            improvement_notes: String::new(),
            citations,
        }
    }

    #[test]
    fn first_seen_order_across_evaluators() {
        let verdicts = vec![
            verdict("A1", vec![cite("https://b", "B")]),
            verdict("A4", vec![cite("https://a", "A"), cite("https://b", "B")]),
            verdict("A5", vec![cite("https://c", "")]),
        ];
        let urls: Vec<_> = aggregate(&verdicts).into_iter().filter_map(|c| c.url).collect();
        assert_eq!(urls, vec!["https://b", "https://a", "https://c"]);
    }

    #[test]
    fn same_url_different_title_are_distinct() {
        let out = dedupe(vec![cite("https://a", "A"), cite("https://a", "A bis")]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn other_fields_do_not_affect_identity() {
        let mut quoted = cite("https://a", "A");
        quoted.quote = Some("art. 6".into());
        let out = dedupe(vec![cite("https://a", "A"), quoted]);
        assert_eq!(out.len(), 1);
        assert!(out[0].quote.is_none());
    }

    #[test]
    fn keyless_citations_collapse_to_one() {
        let mut a = Citation::default();
        a.source = Some("BOE".into());
        let out = dedupe(vec![a.clone(), Citation::default()]);
        assert_eq!(out, vec![a]);
    }

    #[test]
    fn idempotent_and_stable_under_superset() {
        let verdicts = vec![
            verdict("A1", vec![cite("https://x", "X"), cite("https://y", "")]),
            verdict("A2", vec![cite("https://x", "X")]),
        ];
        let once = aggregate(&verdicts);
        assert_eq!(dedupe(once.clone()), once);

        let mut superset = once.clone();
        superset.push(cite("https://z", "Z"));
        superset.push(cite("https://y", ""));
        let again = dedupe(superset);
        assert_eq!(&again[..once.len()], once.as_slice());
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn seed_comes_first() {
        let seed = vec![cite("https://draft", "Draft source")];
        let verdicts = vec![verdict("A4", vec![cite("https://x", "X"), cite("https://draft", "Draft source")])];
        let out = aggregate_with_seed(&seed, &verdicts);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url.as_deref(), Some("https://draft"));
    }
}
