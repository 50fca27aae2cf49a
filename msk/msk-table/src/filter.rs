//! Substring-based masking of state columns.
//!
//! A [`FilterSpec`] holds case-insensitive substrings and an `invert` flag.
//! [`apply`] zeroes the columns the filter masks; [`select_for_view`] keeps
//! exactly the columns `apply` leaves alone. Both go through
//! [`FilterSpec::masks`], so they are complements by construction.
//!
//! | `invert` | column matches | `apply` | `select_for_view` |
//! |----------|----------------|---------|-------------------|
//! | false    | yes            | zeroed  | dropped           |
//! | false    | no             | kept    | kept              |
//! | true     | yes            | kept    | kept              |
//! | true     | no             | zeroed  | dropped           |
//!
//! The `time` column is never masked.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::table::{StateTable, TIME_COLUMN};

/// Column mask described by substrings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Lowercased substrings.
    substrings: Vec<String>,
    /// Mask the non-matching columns instead of the matching ones.
    #[serde(default)]
    invert: bool,
}

impl FilterSpec {
    /// Create a filter from substrings; matching is case-insensitive.
    #[must_use]
    pub fn new<I, S>(substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            substrings: substrings
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            invert: false,
        }
    }

    /// Set the invert flag.
    #[must_use]
    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// The lowercased substrings.
    #[must_use]
    pub fn substrings(&self) -> &[String] {
        &self.substrings
    }

    /// Whether the filter is inverted.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// A filter without substrings masks nothing, even when inverted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.substrings.is_empty()
    }

    /// Whether any substring occurs in `name`, ignoring case.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.substrings.iter().any(|s| lower.contains(s.as_str()))
    }

    /// Whether the column `name` is masked (zeroed by [`apply`]).
    #[must_use]
    pub fn masks(&self, name: &str) -> bool {
        if self.is_empty() || name.eq_ignore_ascii_case(TIME_COLUMN) {
            return false;
        }
        self.matches(name) != self.invert
    }
}

/// Zero every column the filter masks. Columns are never removed.
#[must_use]
pub fn apply(table: &StateTable, spec: &FilterSpec) -> StateTable {
    let mut out = table.clone();
    let mut zeroed = 0usize;
    for (index, name) in table.column_names().iter().enumerate() {
        if spec.masks(name) && out.zero_column(index) {
            zeroed += 1;
        }
    }
    debug!(
        substrings = ?spec.substrings(),
        invert = spec.is_inverted(),
        zeroed,
        "Applied state filter"
    );
    out
}

/// Keep `time` plus exactly the columns [`apply`] does not zero.
#[must_use]
pub fn select_for_view(table: &StateTable, spec: &FilterSpec) -> StateTable {
    table.retain_columns(|name| !spec.masks(name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table() -> StateTable {
        StateTable::from_columns(
            vec![
                "time".into(),
                "/jointset/knee/knee_flexion/value".into(),
                "/forceset/soleus/activation".into(),
            ],
            vec![vec![0.0, 1.0], vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap()
    }

    #[test]
    fn masks_matching_columns() {
        let out = apply(&table(), &FilterSpec::new(["jointset"]));
        assert_eq!(out.column_count(), 3);
        assert_eq!(out.time(), &[0.0, 1.0]);
        assert_eq!(out.column_at(1), Some(&[0.0, 0.0][..]));
        assert_eq!(out.column_at(2), Some(&[3.0, 4.0][..]));
    }

    #[test]
    fn inverted_masks_non_matching_columns() {
        let out = apply(&table(), &FilterSpec::new(["jointset"]).with_invert(true));
        assert_eq!(out.column_at(1), Some(&[1.0, 2.0][..]));
        assert_eq!(out.column_at(2), Some(&[0.0, 0.0][..]));
    }

    #[test]
    fn matching_ignores_case() {
        let spec = FilterSpec::new(["JointSet"]);
        assert!(spec.masks("/jointset/knee/knee_flexion/value"));
        assert!(!spec.masks("/forceset/soleus/activation"));
    }

    #[test]
    fn time_is_never_masked() {
        let spec = FilterSpec::new(["time", "e"]);
        assert!(!spec.masks("time"));
        assert!(!spec.masks("TIME"));
        let inverted = FilterSpec::new(["zzz"]).with_invert(true);
        assert!(!inverted.masks("time"));
    }

    #[test]
    fn empty_spec_masks_nothing() {
        let spec = FilterSpec::new(Vec::<String>::new()).with_invert(true);
        assert_eq!(apply(&table(), &spec), table());
        assert_eq!(select_for_view(&table(), &spec), table());
    }

    #[test]
    fn view_keeps_unmasked_columns() {
        let view = select_for_view(&table(), &FilterSpec::new(["jointset"]));
        assert_eq!(
            view.column_names(),
            &["time".to_string(), "/forceset/soleus/activation".to_string()]
        );
    }

    #[test]
    fn spec_deserializes_with_default_invert() {
        let spec: FilterSpec = serde_json::from_str(r#"{"substrings":["knee"]}"#).unwrap();
        assert!(!spec.is_inverted());
        assert!(spec.masks("/jointset/knee/knee_flexion/speed"));
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    fn column_name() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "/jointset/knee/knee_flexion/value",
            "/jointset/ankle/ankle_flexion/speed",
            "/forceset/soleus/activation",
            "/forceset/soleus",
            "/forceset/tib_ant/normalized_tendon_force",
            "/jointset/ground_pelvis/pelvis_tx/value",
        ])
        .prop_map(str::to_string)
    }

    fn needle() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["jointset", "FORCESET", "knee", "value", "x", "ground"])
            .prop_map(str::to_string)
    }

    proptest! {
        #[test]
        fn apply_and_view_are_complements(
            names in prop::collection::hash_set(column_name(), 1..6),
            needles in prop::collection::vec(needle(), 1..3),
            invert in any::<bool>(),
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let mut table = StateTable::new(vec![0.0, 1.0]);
            for name in &names {
                table.push_column(name.clone(), vec![1.0, 2.0]).unwrap();
            }

            let spec = FilterSpec::new(&needles).with_invert(invert);
            let applied = apply(&table, &spec);
            let view = select_for_view(&table, &spec);

            prop_assert_eq!(applied.time(), table.time());
            prop_assert_eq!(view.time(), table.time());
            for name in &names {
                let zeroed = applied.column(name).unwrap().iter().all(|v| *v == 0.0);
                let viewed = view.column(name).is_some();
                prop_assert!(zeroed != viewed, "column {} zeroed={} viewed={}", name, zeroed, viewed);
            }
        }
    }
}
