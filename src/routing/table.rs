//! Route lookup by name.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::http::redirect::{build_path, UrlPart};

/// External name → path-pattern mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: HashMap<String, String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a route.
    pub fn insert(&mut self, name: impl Into<String>, pattern: impl Into<String>) -> &mut Self {
        self.routes.insert(name.into(), pattern.into());
        self
    }

    /// Path pattern registered under `name`.
    pub fn route(&self, name: &str) -> Result<&str> {
        self.routes
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::RouteNotFound(name.to_string()))
    }

    /// Build a URL from a route name plus trailing path segments and query
    /// parameters.
    pub fn url<I>(&self, name: &str, parts: I) -> Result<String>
    where
        I: IntoIterator<Item = UrlPart>,
    {
        Ok(build_path(self.route(name)?, parts))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RouteTable
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            routes: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::redirect::Param;

    #[test]
    fn test_route_lookup() {
        let table: RouteTable = [("route1", "/route/1")].into_iter().collect();
        assert_eq!(table.route("route1").unwrap(), "/route/1");
        assert!(matches!(table.route("missing"), Err(Error::RouteNotFound(_))));
    }

    #[test]
    fn test_url_with_parts() {
        let table: RouteTable = [("route1", "/route/1")].into_iter().collect();
        let url = table
            .url("route1", ["create".into(), Param::new("id", 3).into()])
            .unwrap();
        assert_eq!(url, "/route/1/create?id=3");
    }
}
