//! Pure derivation of the visible request list.

use reqctl_shared::requests::MembershipRequest;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::NewestFirst => f.write_str("newest"),
            SortOrder::OldestFirst => f.write_str("oldest"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newest" | "latest" => Ok(SortOrder::NewestFirst),
            "oldest" => Ok(SortOrder::OldestFirst),
            _ => Err(format!("Invalid sort order: {}. Choose from newest, oldest", s)),
        }
    }
}

/// Which message, if any, replaces the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    /// Items are shown.
    None,
    /// The operator administers no organization at all.
    NoOrganizations,
    /// The organization has no pending requests.
    NoRequests,
    /// Requests exist but the search matched none of them.
    NoResults,
}

impl EmptyState {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            EmptyState::None => None,
            EmptyState::NoOrganizations => {
                Some("Organizations not found, please create an organization through dashboard")
            }
            EmptyState::NoRequests => Some("No requests found"),
            EmptyState::NoResults => Some("No results found"),
        }
    }
}

pub fn matches(request: &MembershipRequest, needle_lower: &str) -> bool {
    needle_lower.is_empty() || request.full_name().to_lowercase().contains(needle_lower)
}

pub fn filter<'a>(requests: &'a [MembershipRequest], search: &str) -> Vec<&'a MembershipRequest> {
    let needle = search.to_lowercase();
    requests.iter().filter(|r| matches(r, &needle)).collect()
}

/// Stable, so equal timestamps keep fetch order in both directions.
pub fn sort(items: &mut [&MembershipRequest], order: SortOrder) {
    match order {
        SortOrder::NewestFirst => items.sort_by(|a, b| b.requested_at.cmp(&a.requested_at)),
        SortOrder::OldestFirst => items.sort_by(|a, b| a.requested_at.cmp(&b.requested_at)),
    }
}

pub fn derive(requests: &[MembershipRequest], search: &str, order: SortOrder) -> Vec<MembershipRequest> {
    let mut items = filter(requests, search);
    sort(&mut items, order);
    items.into_iter().cloned().collect()
}

/// An empty base list reports `NoRequests` whatever the search says.
pub fn empty_state(requests: &[MembershipRequest], view: &[MembershipRequest]) -> EmptyState {
    if requests.is_empty() {
        EmptyState::NoRequests
    } else if view.is_empty() {
        EmptyState::NoResults
    } else {
        EmptyState::None
    }
}
