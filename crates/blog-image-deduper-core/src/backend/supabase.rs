use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{public_object_url, AssetCatalog, BlogStore, ObjectStore, StoredObject};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{parse_timestamp, BlogPost, ImageAsset};

const BLOG_POST_COLUMNS: &str = "id,title,slug,featured_image,content";
const ASSET_COLUMNS: &str = "id,filename,file_path,cdn_url,hash_md5,file_size,created_at";

/// Supabase Storage and PostgREST client authenticated with the service role key
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    service_role_key: String,
    bucket: String,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    // Folders come back without an id
    id: Option<String>,
    created_at: Option<String>,
    metadata: Option<ObjectMetadata>,
}

#[derive(Debug, Deserialize)]
struct ObjectMetadata {
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RemovedObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AssetRow {
    id: serde_json::Value,
    filename: Option<String>,
    file_path: Option<String>,
    cdn_url: Option<String>,
    hash_md5: Option<String>,
    file_size: Option<u64>,
    created_at: Option<String>,
}

impl SupabaseClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("blog-image-deduper/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_role_key: config.service_role_key.clone(),
            bucket: config.bucket.clone(),
            page_size: config.list_page_size,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    fn object_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            encoded.join("/")
        )
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }
}

/// Quote a value for a PostgREST filter
fn quote_filter_value(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// PostgREST `or` filter matching posts that mention any of `terms`.
/// `%` and `_` inside a term act as wildcards, which only widens the match.
fn mention_filter(terms: &[String]) -> String {
    let conditions: Vec<String> = terms
        .iter()
        .flat_map(|term| {
            let pattern = quote_filter_value(&format!("*{}*", term));
            [
                format!("featured_image.like.{}", pattern),
                format!("content.like.{}", pattern),
            ]
        })
        .collect();
    format!("({})", conditions.join(","))
}

async fn storage_error(response: Response) -> Error {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|e| format!("unreadable response body: {}", e));
    Error::Storage { status, message }
}

async fn blog_error(response: Response) -> Error {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    Error::BlogStore(format!("{}: {}", status, message))
}

#[async_trait]
impl BlogStore for SupabaseClient {
    async fn find_mentioning(&self, terms: &[String]) -> Result<Vec<BlogPost>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let filter = mention_filter(terms);
        debug!("Blog lookup filter: {}", filter);

        let response = self
            .authorized(self.http.get(self.rest_url("blog_posts")))
            .query(&[("select", BLOG_POST_COLUMNS), ("or", filter.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(blog_error(response).await);
        }

        Ok(response.json::<Vec<BlogPost>>().await?)
    }
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn public_url(&self, path: &str) -> String {
        public_object_url(&self.base_url, &self.bucket, path)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let prefix = prefix.trim_matches('/');
        let url = format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket);
        let mut objects = Vec::new();
        let mut offset = 0;

        loop {
            let body = json!({
                "prefix": prefix,
                "limit": self.page_size,
                "offset": offset,
                "sortBy": { "column": "created_at", "order": "asc" },
            });
            let response = self
                .authorized(self.http.post(&url))
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(storage_error(response).await);
            }

            let page: Vec<ListedObject> = response.json().await?;
            let page_len = page.len();
            debug!("Listed {} entries under '{}' at offset {}", page_len, prefix, offset);

            objects.extend(page.into_iter().filter(|o| o.id.is_some()).map(|o| {
                let path = if prefix.is_empty() {
                    o.name.clone()
                } else {
                    format!("{}/{}", prefix, o.name)
                };
                StoredObject {
                    path,
                    name: o.name,
                    size: o.metadata.and_then(|m| m.size),
                    created_at: o.created_at.as_deref().and_then(parse_timestamp),
                }
            }));

            if page_len < self.page_size {
                break;
            }
            offset += page_len;
        }

        Ok(objects)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .authorized(self.http.get(self.object_url(path)))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(Error::ObjectNotFound(path.to_string())),
            _ => Err(storage_error(response).await),
        }
    }

    async fn remove(&self, paths: &[String]) -> Result<Vec<String>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let response = self
            .authorized(self.http.delete(&url))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(storage_error(response).await);
        }

        // Storage only echoes the objects it actually deleted
        let removed: Vec<RemovedObject> = response.json().await?;
        Ok(removed.into_iter().map(|o| o.name).collect())
    }
}

#[async_trait]
impl AssetCatalog for SupabaseClient {
    async fn assets(&self, prefix: &str) -> Result<Vec<ImageAsset>> {
        let prefix = prefix.trim_matches('/');
        let mut query = vec![("select", ASSET_COLUMNS.to_string())];
        if !prefix.is_empty() {
            query.push(("file_path", format!("like.{}/*", prefix)));
        }
        query.push(("order", "created_at.asc".to_string()));

        let response = self
            .authorized(self.http.get(self.rest_url("image_assets")))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(blog_error(response).await);
        }

        let rows: Vec<AssetRow> = response.json().await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let path = row.file_path?;
                let url = row.cdn_url.unwrap_or_else(|| self.public_url(&path));
                let mut asset = ImageAsset::new(path, url);
                asset.id = match row.id {
                    serde_json::Value::String(s) => Some(s),
                    serde_json::Value::Null => None,
                    other => Some(other.to_string()),
                };
                if let Some(name) = row.filename {
                    asset.name = name;
                }
                asset.hash = row.hash_md5;
                asset.size = row.file_size;
                asset.created_at = row.created_at.as_deref().and_then(parse_timestamp);
                Some(asset)
            })
            .collect())
    }

    async fn forget(&self, paths: &[String]) -> Result<usize> {
        if paths.is_empty() {
            return Ok(0);
        }

        let list: Vec<String> = paths.iter().map(|p| quote_filter_value(p)).collect();
        let response = self
            .authorized(self.http.delete(self.rest_url("image_assets")))
            .query(&[("file_path", format!("in.({})", list.join(",")))])
            .header("Prefer", "return=representation")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(blog_error(response).await);
        }

        let rows: Vec<serde_json::Value> = response.json().await?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SupabaseClient {
        let config = Config {
            supabase_url: "https://proj.supabase.co/".into(),
            service_role_key: "key".into(),
            ..Default::default()
        };
        SupabaseClient::new(&config).unwrap()
    }

    #[test]
    fn test_quote_filter_value_escapes() {
        assert_eq!(quote_filter_value("a,b"), "\"a,b\"");
        assert_eq!(quote_filter_value("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote_filter_value("c:\\x"), "\"c:\\\\x\"");
    }

    #[test]
    fn test_mention_filter() {
        let terms = vec!["https://x/a.jpg".to_string(), "a.jpg".to_string()];
        assert_eq!(
            mention_filter(&terms),
            "(featured_image.like.\"*https://x/a.jpg*\",content.like.\"*https://x/a.jpg*\",\
             featured_image.like.\"*a.jpg*\",content.like.\"*a.jpg*\")"
        );
    }

    #[test]
    fn test_object_urls() {
        let client = client();
        assert_eq!(
            client.object_url("originals/2025 05/a.jpg"),
            "https://proj.supabase.co/storage/v1/object/blog-images/originals/2025%2005/a.jpg"
        );
        assert_eq!(
            client.public_url("a.jpg"),
            "https://proj.supabase.co/storage/v1/object/public/blog-images/a.jpg"
        );
        assert_eq!(
            client.rest_url("blog_posts"),
            "https://proj.supabase.co/rest/v1/blog_posts"
        );
    }
}
