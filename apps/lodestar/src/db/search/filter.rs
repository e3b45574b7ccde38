//! Query filter specification
//!
//! A [`FilterSpec`] is the query surface handed down from the resource
//! layer: paging, sort, a projection, a search string and the optional
//! unwind and group-by fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::db::pipeline::{SortKey, SortOrder};
use crate::error::Error;
use crate::Result;

pub const DEFAULT_PER_PAGE: u32 = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSpec {
    /// 1-based page number; no paging when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    /// Comma-joined field list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_fields: Option<String>,
    pub sort_order: SortOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unwind_field_name: Option<String>,
    /// Comma-joined nested field list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unwind_project_field_names: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by_field_name: Option<String>,
}

/// Resolved skip/limit for a paged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u32,
    pub per_page: u32,
}

impl Paging {
    pub fn skip(&self) -> u64 {
        u64::from(self.per_page) * u64::from(self.page.saturating_sub(1))
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }

    pub fn sort(mut self, fields: impl Into<String>, order: SortOrder) -> Self {
        self.sort_fields = Some(fields.into());
        self.sort_order = order;
        self
    }

    pub fn include<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn unwind(mut self, field: impl Into<String>) -> Self {
        self.unwind_field_name = Some(field.into());
        self
    }

    pub fn unwind_project(mut self, fields: impl Into<String>) -> Self {
        self.unwind_project_field_names = Some(fields.into());
        self
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by_field_name = Some(field.into());
        self
    }

    /// Reject specs that cannot be compiled.
    pub fn validate(&self) -> Result<()> {
        if self.include.is_some() && self.exclude.is_some() {
            return Err(Error::InvalidFilter(
                "include and exclude cannot both be set".to_string(),
            ));
        }
        if self.page == Some(0) {
            return Err(Error::InvalidFilter("page must be 1 or greater".to_string()));
        }
        if self.per_page == Some(0) {
            return Err(Error::InvalidFilter("perPage must be 1 or greater".to_string()));
        }
        for (name, value) in [
            ("unwindFieldName", &self.unwind_field_name),
            ("groupByFieldName", &self.group_by_field_name),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(Error::InvalidFilter(format!("{} must not be blank", name)));
            }
        }
        Ok(())
    }

    pub fn sort_keys(&self) -> Vec<SortKey> {
        split_list(self.sort_fields.as_deref())
            .into_iter()
            .map(|field| SortKey {
                field,
                order: self.sort_order,
            })
            .collect()
    }

    pub fn unwind_project_fields(&self) -> Vec<String> {
        split_list(self.unwind_project_field_names.as_deref())
    }

    /// Paging, when a page was requested.
    pub fn paging(&self, default_per_page: u32) -> Option<Paging> {
        self.page.map(|page| Paging {
            page,
            per_page: self.per_page.unwrap_or(default_per_page),
        })
    }

    pub fn search_str(&self) -> &str {
        self.search.as_deref().unwrap_or("")
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
