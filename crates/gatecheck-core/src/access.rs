//! Access paths: named URL templates that must all serve the same bytes.
//!
//! Templates use `{field}` placeholders filled from [`NetworkConfig`] and the
//! [`AssetDescriptor`]. URL generation is pure: same inputs, same URLs.

use serde::Serialize;
use std::fmt;
use url::Url;

use crate::asset::AssetDescriptor;
use crate::config::{AccessPathConfig, NetworkConfig};
use crate::error::ConfigurationError;

pub const DIRECT: &str = "direct";
pub const PROXY: &str = "proxy";
pub const PHONEBOOK: &str = "phonebook";

const DIRECT_TEMPLATE: &str =
    "http://{canister_id}.{replica_host}:{replica_port}/-/{collection_name}/-/{asset_id}";
const PROXY_TEMPLATE: &str =
    "http://{proxy_host}:{proxy_port}/-/{canister_id}/-/{collection_name}/-/{asset_id}";
const PHONEBOOK_TEMPLATE: &str =
    "http://{proxy_host}:{proxy_port}/-/{phonebook_id}/-/{collection_name}/-/{asset_id}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    CanisterId,
    ReplicaHost,
    ReplicaPort,
    ProxyHost,
    ProxyPort,
    CollectionName,
    AssetId,
    PhonebookId,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "canister_id" => Field::CanisterId,
            "replica_host" => Field::ReplicaHost,
            "replica_port" => Field::ReplicaPort,
            "proxy_host" => Field::ProxyHost,
            "proxy_port" => Field::ProxyPort,
            "collection_name" => Field::CollectionName,
            "asset_id" => Field::AssetId,
            "phonebook_id" => Field::PhonebookId,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Field::CanisterId => "canister_id",
            Field::ReplicaHost => "replica_host",
            Field::ReplicaPort => "replica_port",
            Field::ProxyHost => "proxy_host",
            Field::ProxyPort => "proxy_port",
            Field::CollectionName => "collection_name",
            Field::AssetId => "asset_id",
            Field::PhonebookId => "phonebook_id",
        }
    }

    fn value(self, asset: &AssetDescriptor, net: &NetworkConfig) -> String {
        match self {
            Field::CanisterId => net.canister_id.clone(),
            Field::ReplicaHost => net.replica_host.clone(),
            Field::ReplicaPort => net.replica_port.to_string(),
            Field::ProxyHost => net.proxy_host.clone(),
            Field::ProxyPort => net.proxy_port.to_string(),
            Field::CollectionName => asset.collection_name.clone(),
            Field::AssetId => asset.asset_id.clone(),
            Field::PhonebookId => asset.phonebook_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Field(Field),
}

/// Parsed `{field}` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
    pieces: Vec<Piece>,
}

impl UrlTemplate {
    /// Parse a template. Fails on unknown placeholders and unbalanced braces.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut pieces = Vec::new();
        let mut rest = raw;
        while let Some(open) = rest.find(|c: char| c == '{' || c == '}') {
            if rest.as_bytes()[open] == b'}' {
                return Err(format!("unmatched '}}' at byte {}", raw.len() - rest.len() + open));
            }
            if open > 0 {
                pieces.push(Piece::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| "unterminated placeholder".to_string())?;
            let name = &after[..close];
            let field =
                Field::parse(name).ok_or_else(|| format!("unknown placeholder {{{}}}", name))?;
            pieces.push(Piece::Field(field));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            pieces.push(Piece::Literal(rest.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            pieces,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Substitute every placeholder. An empty value is a missing parameter.
    pub fn render(
        &self,
        asset: &AssetDescriptor,
        net: &NetworkConfig,
    ) -> Result<String, ConfigurationError> {
        let mut out = String::with_capacity(self.raw.len() + 64);
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Field(field) => {
                    let value = field.value(asset, net);
                    if value.trim().is_empty() {
                        return Err(ConfigurationError::MissingParameter(
                            field.name().to_string(),
                        ));
                    }
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A named URL-construction strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPath {
    pub name: String,
    pub template: UrlTemplate,
}

impl AccessPath {
    pub fn new(name: &str, template: &str) -> Result<Self, ConfigurationError> {
        if name.trim().is_empty() {
            return Err(ConfigurationError::MissingParameter(
                "access_path.name".to_string(),
            ));
        }
        let template =
            UrlTemplate::parse(template).map_err(|reason| ConfigurationError::InvalidTemplate {
                path: name.to_string(),
                reason,
            })?;
        Ok(Self {
            name: name.to_string(),
            template,
        })
    }
}

/// Direct (replica subdomain), proxy and phonebook paths.
pub fn default_access_paths() -> Vec<AccessPath> {
    [
        (DIRECT, DIRECT_TEMPLATE),
        (PROXY, PROXY_TEMPLATE),
        (PHONEBOOK, PHONEBOOK_TEMPLATE),
    ]
    .into_iter()
    .map(|(name, template)| AccessPath {
        name: name.to_string(),
        template: UrlTemplate::parse(template).unwrap_or_else(|e| {
            unreachable!("built-in template {} is invalid: {}", name, e)
        }),
    })
    .collect()
}

/// Built-in paths with config entries applied: same name replaces, new name appends.
pub fn access_paths_from_config(
    entries: &[AccessPathConfig],
) -> Result<Vec<AccessPath>, ConfigurationError> {
    let mut paths = default_access_paths();
    for entry in entries {
        let path = AccessPath::new(&entry.name, &entry.template)?;
        match paths.iter_mut().find(|p| p.name == path.name) {
            Some(existing) => *existing = path,
            None => paths.push(path),
        }
    }
    Ok(paths)
}

/// One generated fetch URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessUrl {
    pub name: String,
    pub url: Url,
}

/// Path name to URL, in access-path order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct AccessUrls(Vec<AccessUrl>);

impl AccessUrls {
    pub fn get(&self, name: &str) -> Option<&Url> {
        self.0.iter().find(|u| u.name == name).map(|u| &u.url)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AccessUrl> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for AccessUrls {
    type Item = AccessUrl;
    type IntoIter = std::vec::IntoIter<AccessUrl>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AccessUrls {
    type Item = &'a AccessUrl;
    type IntoIter = std::slice::Iter<'a, AccessUrl>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build one URL per access path by substituting into each template.
pub fn generate_access_urls(
    asset: &AssetDescriptor,
    net: &NetworkConfig,
    paths: &[AccessPath],
) -> Result<AccessUrls, ConfigurationError> {
    asset.validate()?;
    net.validate()?;
    if paths.is_empty() {
        return Err(ConfigurationError::MissingParameter("access_path".to_string()));
    }
    let mut urls = Vec::with_capacity(paths.len());
    for path in paths {
        if urls.iter().any(|u: &AccessUrl| u.name == path.name) {
            return Err(ConfigurationError::InvalidTemplate {
                path: path.name.clone(),
                reason: "duplicate access path name".to_string(),
            });
        }
        let rendered = path.template.render(asset, net)?;
        let url = Url::parse(&rendered).map_err(|e| ConfigurationError::InvalidTemplate {
            path: path.name.clone(),
            reason: format!("{:?} is not a valid URL: {}", rendered, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigurationError::InvalidTemplate {
                path: path.name.clone(),
                reason: format!("{:?} is not an http(s) URL", rendered),
            });
        }
        urls.push(AccessUrl {
            name: path.name.clone(),
            url,
        });
    }
    Ok(AccessUrls(urls))
}
