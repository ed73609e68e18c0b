use serde::{Deserialize, Serialize};

/// Which side of a refined query comes first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMergePolicy {
    /// API names, then the judge's missing-information hints.
    #[default]
    ApisFirst,
    HintsFirst,
}

/// Merges API names with judge hints, dropping blanks and repeats while keeping the
/// order in which each query first appears.
pub fn merge_queries(apis: &[String], hints: &[String], policy: QueryMergePolicy) -> Vec<String> {
    let (first, second) = match policy {
        QueryMergePolicy::ApisFirst => (apis, hints),
        QueryMergePolicy::HintsFirst => (hints, apis),
    };

    let mut merged: Vec<String> = Vec::with_capacity(first.len() + second.len());
    for query in first.iter().chain(second) {
        let query = query.trim();
        if !query.is_empty() && !merged.iter().any(|q| q == query) {
            merged.push(query.to_string());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_preserves_order_and_dedupes() {
        let apis = strings(&["iClamp", "iMeas", "iClamp"]);
        let hints = strings(&["iMeas", " iClamp units ", ""]);

        assert_eq!(
            merge_queries(&apis, &hints, QueryMergePolicy::ApisFirst),
            strings(&["iClamp", "iMeas", "iClamp units"])
        );
        assert_eq!(
            merge_queries(&apis, &hints, QueryMergePolicy::HintsFirst),
            strings(&["iMeas", "iClamp units", "iClamp"])
        );
    }

    #[test]
    fn test_merge_without_hints() {
        let apis = strings(&["vForce"]);
        assert_eq!(merge_queries(&apis, &[], QueryMergePolicy::default()), apis);
        assert!(merge_queries(&[], &[], QueryMergePolicy::default()).is_empty());
    }
}
