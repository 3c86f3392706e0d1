//! Comma-delimited keyword lists, as used by subscription "do"/"don't" filters.
//!
//! Pure string transforms: trimming, appending, removing. Duplicates are never collapsed;
//! whether they matter is the remote service's business.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterList {
    items: Vec<String>,
}

impl FilterList {
    /// Split on commas and trim each token. Empty tokens are dropped.
    pub fn parse(encoded: &str) -> Self {
        Self {
            items: encoded
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, token: &str) {
        let token = token.trim();
        if !token.is_empty() {
            self.items.push(token.to_string());
        }
    }

    /// Drop every token equal (case-sensitive, after trimming) to one of `removals`.
    pub fn retain_none_of<S: AsRef<str>>(&mut self, removals: &[S]) {
        let removals: Vec<&str> = removals.iter().map(|r| r.as_ref().trim()).collect();
        self.items.retain(|item| !removals.contains(&item.as_str()));
    }

    pub fn encode(&self) -> String {
        self.items.join(",")
    }
}

impl fmt::Display for FilterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl<S: AsRef<str>> FromIterator<S> for FilterList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = FilterList::default();
        for token in iter {
            list.push(token.as_ref());
        }
        list
    }
}

/// `existing` plus every addition, trimmed and comma-joined. Additive only.
pub fn merge<S: AsRef<str>>(existing: &str, additions: &[S]) -> String {
    let mut list = FilterList::parse(existing);
    for token in additions {
        list.push(token.as_ref());
    }
    list.encode()
}

/// `existing` without any token matching one of `removals`.
pub fn remove<S: AsRef<str>>(existing: &str, removals: &[S]) -> String {
    let mut list = FilterList::parse(existing);
    list.retain_none_of(removals);
    list.encode()
}
