//! Lead filters and the exact-match predicate used by the lead table.

use serde::{Deserialize, Serialize};

use crate::domain::Lead;

/// Status value the backend treats as "no status constraint".
pub const ALL_STATUSES: &str = "todos";

/// Names accepted by [`Filter::parse`]. Both the wire names and the
/// camel-case names used by the dashboard are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKey {
    Estado1,
    Estado2,
    Status,
    Priority,
    SelectedOnly,
    OrigenArchivo,
}

impl FilterKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "estado1" | "statusLevel1" | "status_level_1" => Some(FilterKey::Estado1),
            "estado2" | "statusLevel2" | "status_level_2" => Some(FilterKey::Estado2),
            "status" | "callStatus" | "call_status" => Some(FilterKey::Status),
            "priority" | "callPriority" => Some(FilterKey::Priority),
            "selected" | "selectedOnly" | "selected_only" => Some(FilterKey::SelectedOnly),
            "archivoOrigen" | "originFile" | "origen_archivo" => Some(FilterKey::OrigenArchivo),
            _ => None,
        }
    }
}

/// A single typed filter update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Estado1(String),
    Estado2(String),
    Status(String),
    Priority(String),
    SelectedOnly(bool),
    OrigenArchivo(Vec<String>),
}

impl Filter {
    /// Builds a filter from untyped input. Unknown keys yield `None`.
    ///
    /// List values are comma separated; flag values accept `true`/`1`/`on`.
    pub fn parse(key: &str, value: &str) -> Option<Self> {
        let value = value.trim();
        let filter = match FilterKey::parse(key)? {
            FilterKey::Estado1 => Filter::Estado1(value.to_string()),
            FilterKey::Estado2 => Filter::Estado2(value.to_string()),
            FilterKey::Status => Filter::Status(value.to_string()),
            FilterKey::Priority => Filter::Priority(value.to_string()),
            FilterKey::SelectedOnly => Filter::SelectedOnly(matches!(
                value.to_ascii_lowercase().as_str(),
                "true" | "1" | "on" | "yes"
            )),
            FilterKey::OrigenArchivo => Filter::OrigenArchivo(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|file| !file.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        };
        Some(filter)
    }

    pub fn key(&self) -> FilterKey {
        match self {
            Filter::Estado1(_) => FilterKey::Estado1,
            Filter::Estado2(_) => FilterKey::Estado2,
            Filter::Status(_) => FilterKey::Status,
            Filter::Priority(_) => FilterKey::Priority,
            Filter::SelectedOnly(_) => FilterKey::SelectedOnly,
            Filter::OrigenArchivo(_) => FilterKey::OrigenArchivo,
        }
    }
}

/// Active filter values. Empty strings, an empty list and `false` mean
/// "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSet {
    pub estado1: String,
    pub estado2: String,
    pub status: String,
    pub priority: String,
    pub selected_only: bool,
    pub origen_archivo: Vec<String>,
}

impl FilterSet {
    pub fn apply(&mut self, filter: Filter) {
        match filter {
            Filter::Estado1(v) => self.estado1 = v,
            Filter::Estado2(v) => self.estado2 = v,
            Filter::Status(v) => self.status = v,
            Filter::Priority(v) => self.priority = v,
            Filter::SelectedOnly(v) => self.selected_only = v,
            Filter::OrigenArchivo(v) => self.origen_archivo = v,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active_constraints() == 0
    }

    /// Number of filters that currently narrow the result.
    pub fn active_constraints(&self) -> usize {
        [
            !self.estado1.is_empty(),
            !self.estado2.is_empty(),
            status_constraint(&self.status).is_some(),
            !self.priority.is_empty(),
            self.selected_only,
            !self.origen_archivo.is_empty(),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    /// Exact-match predicate; every non-empty filter must hold.
    pub fn matches(&self, lead: &Lead) -> bool {
        if !self.estado1.is_empty() && lead.status_level_1.as_deref() != Some(self.estado1.as_str())
        {
            return false;
        }
        if !self.estado2.is_empty() && lead.status_level_2.as_deref() != Some(self.estado2.as_str())
        {
            return false;
        }
        if let Some(status) = status_constraint(&self.status) {
            if lead.call_status.as_str() != status {
                return false;
            }
        }
        if !self.priority.is_empty() && lead.call_priority.to_string() != self.priority {
            return false;
        }
        if self.selected_only && !lead.selected_for_calling {
            return false;
        }
        if !self.origen_archivo.is_empty() {
            let Some(origin) = lead.origin_file.as_deref() else {
                return false;
            };
            if !self.origen_archivo.iter().any(|file| file == origin) {
                return false;
            }
        }
        true
    }

    /// Query parameters for `GET /api/calls/leads`, in wire naming.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.estado1.is_empty() {
            pairs.push(("estado1", self.estado1.clone()));
        }
        if !self.estado2.is_empty() {
            pairs.push(("estado2", self.estado2.clone()));
        }
        if let Some(status) = status_constraint(&self.status) {
            pairs.push(("status", status.to_string()));
        }
        if !self.priority.is_empty() {
            pairs.push(("priority", self.priority.clone()));
        }
        if self.selected_only {
            pairs.push(("selected_only", "true".to_string()));
        }
        for file in &self.origen_archivo {
            pairs.push(("origen_archivo[]", file.clone()));
        }
        pairs
    }
}

fn status_constraint(status: &str) -> Option<&str> {
    match status {
        "" | ALL_STATUSES => None,
        other => Some(other),
    }
}

/// Leads satisfying every active filter, in their original order.
pub fn filter_leads<'a>(leads: &'a [Lead], filters: &FilterSet) -> Vec<&'a Lead> {
    leads.iter().filter(|lead| filters.matches(lead)).collect()
}

#[cfg(test)]
#[path = "tests/filter_tests.rs"]
mod tests;
