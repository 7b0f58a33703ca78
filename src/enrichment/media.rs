/// Watched movie/TV enrichment via TMDB
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    enrichment::snapshot::{ApiSnapshot, ProviderInfo},
    error::{CoffeyError, CoffeyResult},
};

const PROVIDER: &str = "tmdb";

const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";

/// Media kind for watched enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    fn path_segment(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

/// Normalized movie/TV summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub media_type: MediaType,
    pub tmdb_id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_count: Option<u64>,
    pub tmdb_url: String,
    // Movie-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    // TV-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_seasons: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_episodes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creators: Option<Vec<String>>,
    // Common
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cast: Option<Vec<String>>,
}

/// Page URL for a movie or TV show
pub fn build_tmdb_url(id: u64, media_type: MediaType) -> String {
    format!("https://www.themoviedb.org/{}/{}", media_type.path_segment(), id)
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Title search returning the first (most relevant) result's id
    async fn search(&self, media_type: MediaType, title: &str) -> CoffeyResult<u64>;

    /// Full details including credits
    async fn details(
        &self,
        media_type: MediaType,
        tmdb_id: u64,
    ) -> CoffeyResult<ApiSnapshot<MediaSummary>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    id: u64,
    // Movies use `title`/`release_date`; TV uses `name`/`first_air_date`
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    genres: Vec<Genre>,
    vote_average: Option<f64>,
    vote_count: Option<u64>,
    runtime: Option<u32>,
    number_of_seasons: Option<u32>,
    number_of_episodes: Option<u32>,
    #[serde(default)]
    created_by: Vec<Person>,
    credits: Option<Credits>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Person {
    name: String,
    job: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Credits {
    #[serde(default)]
    crew: Vec<Person>,
    #[serde(default)]
    cast: Vec<Person>,
}

/// TMDB adapter
pub struct TmdbClient {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl TmdbClient {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    fn api_key(&self) -> CoffeyResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            CoffeyError::Configuration("TMDB_API_KEY not configured".to_string())
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> CoffeyResult<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoffeyError::provider_status(PROVIDER, status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| CoffeyError::provider_transport(PROVIDER, e))
    }
}

#[async_trait]
impl MediaSource for TmdbClient {
    async fn search(&self, media_type: MediaType, title: &str) -> CoffeyResult<u64> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/search/{}?query={}&api_key={}",
            TMDB_API_BASE,
            media_type.path_segment(),
            urlencoding::encode(title),
            api_key
        );

        let data: SearchResponse = self.get_json(&url).await?;
        data.results.first().map(|r| r.id).ok_or_else(|| {
            CoffeyError::provider_status(
                PROVIDER,
                404,
                format!("No {} found for title: {}", media_type.path_segment(), title),
            )
        })
    }

    async fn details(
        &self,
        media_type: MediaType,
        tmdb_id: u64,
    ) -> CoffeyResult<ApiSnapshot<MediaSummary>> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/{}/{}?api_key={}&append_to_response=credits",
            TMDB_API_BASE,
            media_type.path_segment(),
            tmdb_id,
            api_key
        );

        let data: DetailsResponse = self.get_json(&url).await?;

        let director = data.credits.as_ref().and_then(|c| {
            c.crew
                .iter()
                .find(|p| p.job.as_deref() == Some("Director"))
                .map(|p| p.name.clone())
        });

        let cast: Vec<String> = data
            .credits
            .as_ref()
            .map(|c| c.cast.iter().take(5).map(|p| p.name.clone()).collect())
            .unwrap_or_default();

        let genres: Vec<String> = data.genres.into_iter().map(|g| g.name).collect();
        let creators: Vec<String> = data.created_by.into_iter().map(|p| p.name).collect();

        let summary = MediaSummary {
            media_type,
            tmdb_id: data.id,
            title: data
                .title
                .or(data.name)
                .unwrap_or_else(|| "Unknown".to_string()),
            release_date: data.release_date.or(data.first_air_date),
            overview: data.overview,
            poster_url: data
                .poster_path
                .map(|p| format!("{}{}", TMDB_IMAGE_BASE, p)),
            backdrop_url: data
                .backdrop_path
                .map(|p| format!("{}{}", TMDB_IMAGE_BASE, p)),
            genres: if genres.is_empty() { None } else { Some(genres) },
            tmdb_rating: data.vote_average,
            vote_count: data.vote_count,
            tmdb_url: build_tmdb_url(data.id, media_type),
            runtime: data.runtime,
            director,
            number_of_seasons: data.number_of_seasons,
            number_of_episodes: data.number_of_episodes,
            creators: if creators.is_empty() {
                None
            } else {
                Some(creators)
            },
            cast: if cast.is_empty() { None } else { Some(cast) },
        };

        Ok(ApiSnapshot::now(
            ProviderInfo::new("themoviedb", "api", "3"),
            summary,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmdb_url() {
        assert_eq!(
            build_tmdb_url(603, MediaType::Movie),
            "https://www.themoviedb.org/movie/603"
        );
        assert_eq!(
            build_tmdb_url(1396, MediaType::Tv),
            "https://www.themoviedb.org/tv/1396"
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let client = TmdbClient::new(reqwest::Client::new(), None);
        let err = client.search(MediaType::Movie, "Heat").await.unwrap_err();
        assert!(matches!(err, CoffeyError::Configuration(_)));
    }
}
