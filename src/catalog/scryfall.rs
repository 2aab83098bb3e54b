use crate::domain::model::{CardRow, RawCard};
use crate::utils::error::{BlingError, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

pub const SCRYFALL_API_URL: &str = "https://api.scryfall.com";
pub const USER_AGENT: &str = "BlingMyDeck/1.0 (Rust/reqwest)";
/// Scryfall asks clients to keep 50-100ms between requests.
pub const SCRYFALL_REQUEST_DELAY: Duration = Duration::from_millis(100);

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const METADATA_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
struct BulkDataList {
    data: Vec<BulkDataObject>,
}

#[derive(Debug, Deserialize)]
struct BulkDataObject {
    #[serde(rename = "type")]
    kind: String,
    download_uri: String,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    data: Vec<RawCard>,
}

pub fn build_http_client() -> Result<Client> {
    Ok(Client::builder().user_agent(USER_AGENT).build()?)
}

/// Looks up the download URI of the bulk file of type `kind`.
pub async fn fetch_bulk_download_uri(client: &Client, bulk_data_url: &str, kind: &str) -> Result<String> {
    tracing::info!("Fetching bulk data metadata from {}", bulk_data_url);

    let list: BulkDataList = client
        .get(bulk_data_url)
        .timeout(METADATA_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let uri = list
        .data
        .into_iter()
        .find(|object| object.kind == kind)
        .map(|object| object.download_uri)
        .ok_or_else(|| BlingError::BulkDataNotFound {
            kind: kind.to_string(),
        })?;

    tracing::info!("Found '{}' download URL", kind);
    Ok(uri)
}

/// Streams `url` to `dest` chunk by chunk; returns the number of bytes written.
pub async fn download_to_file(client: &Client, url: &str, dest: &Path) -> Result<u64> {
    tracing::info!("⬇️ Downloading bulk data from {}", url);

    let mut response = client
        .get(url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    tracing::info!("Saved {} bytes to {}", written, dest.display());
    Ok(written)
}

/// Live search used when a card is missing from the local database.
#[derive(Debug, Clone)]
pub struct ScryfallClient {
    client: Client,
    base_url: String,
    request_delay: Duration,
}

impl ScryfallClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_delay: SCRYFALL_REQUEST_DELAY,
        })
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Every printing of `card_name`, cheapest USD first.
    ///
    /// Failures are logged and reported as "no printings": a missing card
    /// must never abort a whole decklist.
    pub async fn search_printings(&self, card_name: &str) -> Vec<CardRow> {
        tokio::time::sleep(self.request_delay).await;

        match self.try_search(card_name).await {
            Ok(rows) => {
                tracing::info!(
                    "Found {} printings for '{}' via Scryfall API",
                    rows.len(),
                    card_name
                );
                rows
            }
            Err(BlingError::ApiError(e)) if e.status() == Some(StatusCode::NOT_FOUND) => {
                tracing::warn!("Card '{}' not found on Scryfall (404)", card_name);
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Scryfall query for '{}' failed: {}", card_name, e);
                Vec::new()
            }
        }
    }

    async fn try_search(&self, card_name: &str) -> Result<Vec<CardRow>> {
        let query = format!("!\"{}\" unique:prints", card_name);
        let page: SearchPage = self
            .client
            .get(format!("{}/cards/search", self.base_url))
            .query(&[("q", query.as_str()), ("order", "usd")])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(page.data.iter().filter_map(search_result_row).collect())
    }
}

// Search results only count when they carry their own front image.
fn search_result_row(card: &RawCard) -> Option<CardRow> {
    let image = card.image_uris.as_ref()?.normal.clone()?;
    let name = card.name.clone()?;

    Some(CardRow {
        id: card.id.clone(),
        real_name: name.clone(),
        name,
        set_code: card.set.clone(),
        collector_number: card.collector_number.clone(),
        image_uri_normal: Some(image),
        scryfall_uri: card.scryfall_uri.clone(),
        price_usd: card.price_usd(),
        price_foil: card.price_foil(),
    })
}
