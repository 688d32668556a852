//! Image references inside blog content.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::processing::strip_uuid_prefix;

static SRC_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<(?:img|source|video)\b[^>]*?\ssrc\s*=\s*["']([^"']+)["']"#)
        .expect("valid src attribute regex")
});

static BACKGROUND_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)background(?:-image)?\s*:[^;"]*?url\(\s*["']?([^"')]+)["']?\s*\)"#)
        .expect("valid background-image regex")
});

static MARKDOWN_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[[^\]]*\]\(\s*([^)\s]+)(?:\s+[^)]*)?\)").expect("valid markdown image regex")
});

static STORAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/storage/v1/object/(?:public|sign|authenticated)/([^/]+)/([^?#]+)")
        .expect("valid storage url regex")
});

/// Every image URL referenced by HTML `src` attributes, CSS background
/// images and Markdown images, in order of appearance
pub fn extract_image_references(content: &str) -> Vec<String> {
    let mut references: Vec<(usize, String)> = Vec::new();
    for regex in [&*SRC_ATTRIBUTE, &*BACKGROUND_IMAGE, &*MARKDOWN_IMAGE] {
        for caps in regex.captures_iter(content) {
            if let Some(m) = caps.get(1) {
                let value = m.as_str().trim();
                if !value.is_empty() {
                    references.push((m.start(), value.to_string()));
                }
            }
        }
    }
    references.sort_by_key(|(position, _)| *position);
    references.into_iter().map(|(_, url)| url).collect()
}

/// Bucket and decoded object path of a Supabase Storage URL
pub fn storage_path_from_url(url: &str) -> Option<(String, String)> {
    let caps = STORAGE_URL.captures(url)?;
    let bucket = caps.get(1)?.as_str().to_string();
    let raw_path = caps.get(2)?.as_str();
    let path = urlencoding::decode(raw_path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| raw_path.to_string());
    Some((bucket, path))
}

/// Comparable form of a reference: the decoded object path for storage URLs,
/// otherwise the decoded URL without query, fragment and leading slash
pub fn normalize_reference(url: &str) -> String {
    let url = url.trim();
    if let Some((_, path)) = storage_path_from_url(url) {
        return path;
    }

    let without_suffix = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = urlencoding::decode(without_suffix)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| without_suffix.to_string());
    decoded.trim_start_matches('/').to_string()
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A stored image as blog content may refer to it
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTarget {
    url: String,
    normalized_url: String,
    path: String,
    file_name: String,
}

impl ImageTarget {
    /// `path` is the object path inside the bucket; when absent it is taken
    /// from the URL
    pub fn new(url: &str, path: Option<&str>) -> Self {
        let path = match path {
            Some(path) => path.trim_start_matches('/').to_string(),
            None => normalize_reference(url),
        };
        let file_name = strip_uuid_prefix(last_segment(&path)).to_string();
        Self {
            url: url.trim().to_string(),
            normalized_url: normalize_reference(url),
            path,
            file_name,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Terms a post must contain to possibly reference this image. Any
    /// reference accepted by [`ImageTarget::is_referenced_by`] contains the
    /// URL or the UUID-free file name, decoded or percent-encoded.
    pub fn search_terms(&self) -> Vec<String> {
        let mut terms = vec![self.url.clone()];
        if !self.file_name.is_empty() {
            terms.push(self.file_name.clone());
            terms.push(urlencoding::encode(&self.file_name).into_owned());
        }
        terms.retain(|term| !term.is_empty());
        terms.dedup();
        terms
    }

    /// Whether `reference` points at this image: the same URL, the same
    /// bucket path written as a storage URL or a relative path, or the same
    /// file name once upload UUID prefixes are stripped
    pub fn is_referenced_by(&self, reference: &str) -> bool {
        let reference = normalize_reference(reference);
        if reference.is_empty() {
            return false;
        }
        if reference == self.normalized_url || reference == self.path {
            return true;
        }
        !self.file_name.is_empty() && strip_uuid_prefix(last_segment(&reference)) == self.file_name
    }
}

/// Whether two URLs point at the same object
pub fn references_match(reference: &str, url: &str) -> bool {
    ImageTarget::new(url, None).is_referenced_by(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://p.supabase.co/storage/v1/object/public/blog-images";

    #[test]
    fn test_extract_references_from_html_css_and_markdown() {
        let content = format!(
            r#"<p>intro</p><img class="hero" src="{base}/a.jpg" alt="a">
            <div style="background-image: url('{base}/b.png')"></div>
            ![driver]({base}/c.webp "Driver")
            <a href="{base}/d.jpg">not an image reference</a>"#,
            base = BASE
        );

        let references = extract_image_references(&content);
        assert_eq!(
            references,
            vec![
                format!("{}/a.jpg", BASE),
                format!("{}/b.png", BASE),
                format!("{}/c.webp", BASE),
            ]
        );
    }

    #[test]
    fn test_storage_path_is_decoded() {
        let (bucket, path) =
            storage_path_from_url(&format!("{}/originals/%EA%B3%A8%ED%94%84.jpg?v=2", BASE))
                .unwrap();
        assert_eq!(bucket, "blog-images");
        assert_eq!(path, "originals/골프.jpg");

        assert!(storage_path_from_url("https://cdn.example.com/a.jpg").is_none());
    }

    #[test]
    fn test_prefix_of_longer_url_does_not_match() {
        let short = format!("{}/originals/a.jpg", BASE);
        let long = format!("{}/originals/a.jpg.backup.jpg", BASE);

        assert!(long.contains(&short));
        assert!(!references_match(&long, &short));
        assert!(references_match(&format!("{}?width=800", short), &short));
    }

    #[test]
    fn test_relative_references() {
        assert!(references_match("/campaigns/2025-05/a.jpg", "campaigns/2025-05/a.jpg"));
        assert!(!references_match("", ""));
    }

    #[test]
    fn test_relative_reference_matches_storage_url() {
        let url = format!("{}/originals/2024/hero.jpg", BASE);

        assert!(references_match("/originals/2024/hero.jpg", &url));
        assert!(references_match("originals/2024/hero.jpg?v=3", &url));
        assert!(!references_match("/originals/2024/hero-copy.jpg", &url));
    }

    #[test]
    fn test_file_name_references() {
        let target = ImageTarget::new(
            &format!("{}/originals/3f2504e0-4f89-11d3-9a0c-0305e82c3301-hero.jpg", BASE),
            None,
        );

        assert!(target.is_referenced_by("https://cdn.example.com/images/hero.jpg"));
        assert!(target.is_referenced_by("hero.jpg"));
        assert!(!target.is_referenced_by("https://cdn.example.com/images/hero.jpg.old.jpg"));
        assert!(!target.is_referenced_by("/originals/hero-copy.jpg"));
    }

    #[test]
    fn test_explicit_path_and_url_both_match() {
        let target = ImageTarget::new("https://cdn.example.com/c/abc123", Some("/blog/2024/a.jpg"));

        assert!(target.is_referenced_by("/blog/2024/a.jpg"));
        assert!(target.is_referenced_by("https://cdn.example.com/c/abc123?w=640"));
        assert!(!target.is_referenced_by("https://cdn.example.com/c/abc1234"));
    }

    #[test]
    fn test_search_terms_cover_relative_and_encoded_names() {
        let url = format!("{}/originals/%EA%B3%A8%ED%94%84%20shot.jpg", BASE);
        let terms = ImageTarget::new(&url, None).search_terms();

        assert_eq!(
            terms,
            vec![
                url.clone(),
                "골프 shot.jpg".to_string(),
                "%EA%B3%A8%ED%94%84%20shot.jpg".to_string(),
            ]
        );
        for reference in ["/originals/골프 shot.jpg", url.as_str()] {
            assert!(terms.iter().any(|term| reference.contains(term.as_str())));
        }
    }
}
