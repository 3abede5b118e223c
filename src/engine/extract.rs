// SPDX-License-Identifier: Apache-2.0

//! Lexical detection of qualified database references in raw SQL
//!
//! A token shaped like an identifier and immediately followed by `.` is a
//! candidate logical-database reference. The heuristic over-approximates on
//! purpose: an alias reference like `c.name` yields `c` even though `c` is
//! no database, and callers intersect the candidates with catalog
//! membership. It must never miss a genuine cross-file reference; a missed
//! name would skip a required attach and fail the query with "no such
//! table".

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

fn qualified_ident() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\.").expect("valid pattern"))
}

/// Returns the distinct qualified-name prefixes in `sql`, in order of first
/// appearance, with the trailing dot stripped.
///
/// A query with zero qualified names targets only the primary database and
/// needs no attachments.
pub fn extract(sql: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for capture in qualified_ident().captures_iter(sql) {
        let name = capture[1].to_string();
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}
