use std::collections::BTreeSet;

/// An unordered set of canonical statement lines.
///
/// This is the sole definition of "a resource state": two states are equal
/// iff their line sets are equal. The parser adapter produces these; storage
/// only ever joins, splits, diffs and patches them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatementSet(BTreeSet<String>);

impl StatementSet {
    pub fn insert(&mut self, line: impl Into<String>) {
        self.0.insert(line.into());
    }

    pub fn contains(&self, line: &str) -> bool {
        self.0.contains(line)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Splits a stored body back into its line set. Blank lines are dropped,
    /// so the empty body is the empty set.
    pub fn from_body(body: &str) -> Self {
        Self(
            body.lines()
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// The canonical serialization: lines joined with `\n`, no trailing
    /// newline. Deterministic for a given set.
    pub fn to_body(&self) -> String {
        let mut body = String::new();
        for line in &self.0 {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(line);
        }
        body
    }

    /// The forward patch turning `prev` into `next`: one `D <stmt>` line per
    /// removed statement followed by one `A <stmt>` line per added statement.
    pub fn diff(prev: &Self, next: &Self) -> String {
        let mut lines = Vec::new();
        for stmt in prev.0.difference(&next.0) {
            lines.push(format!("D {stmt}"));
        }
        for stmt in next.0.difference(&prev.0) {
            lines.push(format!("A {stmt}"));
        }
        lines.join("\n")
    }

    /// Applies a patch body produced by [`Self::diff`]: lines starting with
    /// `A` add the remainder (from column 3), everything else removes it.
    pub fn apply_patch(&mut self, patch: &str) {
        for line in patch.lines() {
            let Some(stmt) = line.get(2..) else { continue };
            if stmt.is_empty() {
                continue;
            }
            if line.starts_with('A') {
                self.0.insert(stmt.to_owned());
            } else {
                self.0.remove(stmt);
            }
        }
    }
}

impl FromIterator<String> for StatementSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
