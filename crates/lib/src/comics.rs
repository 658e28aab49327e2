//! xkcd content API client (https://xkcd.com by default).

use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://xkcd.com";

/// Comics at or above this number have a high-resolution image variant.
const HIGH_RES_MIN_NUM: u32 = 1084;

/// Client for the comic metadata API.
#[derive(Clone)]
pub struct ComicClient {
    base_url: String,
    client: reqwest::Client,
}

/// Retrieval failure: transport error or non-2xx status. Shared by comic
/// and user-profile fetches.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("fetch error: {0}")]
    Api(String),
}

/// One comic record, fetched fresh per request and immutable once built.
#[derive(Debug, Clone, Deserialize)]
pub struct Comic {
    pub num: u32,
    pub title: String,
    pub safe_title: String,
    pub img: String,
}

impl Comic {
    /// Image URL to send: the high-resolution variant when one exists.
    pub fn image_url(&self) -> String {
        high_res_url(&self.img, self.num)
    }
}

impl ComicClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// GET /info.0.json — the latest comic.
    pub async fn fetch_latest(&self) -> Result<Comic, FetchError> {
        self.fetch(format!("{}/info.0.json", self.base_url)).await
    }

    /// GET /{num}/info.0.json — a specific comic.
    pub async fn fetch_by_num(&self, num: u32) -> Result<Comic, FetchError> {
        self.fetch(format!("{}/{}/info.0.json", self.base_url, num))
            .await
    }

    async fn fetch(&self, url: String) -> Result<Comic, FetchError> {
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Api(format!("{} {}", status, body)));
        }
        let comic: Comic = res.json().await?;
        Ok(comic)
    }
}

/// The API only returns the low-resolution image URL, but the site hosts a
/// `_2x` variant for comics from #1084 onward. Rewrites the `.png` suffix;
/// older comics and non-png URLs pass through unchanged.
pub fn high_res_url(url: &str, num: u32) -> String {
    if num >= HIGH_RES_MIN_NUM {
        if let Some(stem) = url.strip_suffix(".png") {
            return format!("{stem}_2x.png");
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_res_rewrites_recent_comics() {
        assert_eq!(high_res_url("http://x/a.png", 1084), "http://x/a_2x.png");
        assert_eq!(
            high_res_url("https://imgs.xkcd.com/comics/sandwich.png", 1800),
            "https://imgs.xkcd.com/comics/sandwich_2x.png"
        );
    }

    #[test]
    fn high_res_leaves_old_comics_alone() {
        assert_eq!(high_res_url("http://x/a.png", 1083), "http://x/a.png");
        assert_eq!(high_res_url("http://x/a.png", 1), "http://x/a.png");
    }

    #[test]
    fn high_res_leaves_non_png_alone() {
        assert_eq!(high_res_url("http://x/a.gif", 2000), "http://x/a.gif");
    }

    #[test]
    fn comic_record_decodes() {
        let comic: Comic = serde_json::from_str(
            r#"{"num":1800,"title":"Chess Notation","safe_title":"Chess Notation","img":"https://imgs.xkcd.com/comics/chess_notation.png","alt":"...","year":"2017"}"#,
        )
        .expect("valid comic json");
        assert_eq!(comic.num, 1800);
        assert_eq!(comic.image_url(), "https://imgs.xkcd.com/comics/chess_notation_2x.png");
    }
}
