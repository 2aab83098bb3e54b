use crate::catalog::scryfall;
use crate::catalog::store::write_card_database;
use crate::core::{CardRow, ConfigProvider, Pipeline, RawCard, Storage, TransformResult};
use crate::utils::error::{BlingError, Result};
use reqwest::Client;
use std::io::BufReader;
use std::time::Instant;
use unicode_normalization::UnicodeNormalization;

/// Scratch file for the downloaded bulk JSON, relative to the data dir.
pub const JSON_TMP_FILE: &str = "default_cards.json";

/// Builds the card lookup database from a Scryfall bulk-data file.
pub struct CardDbPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
    pub(crate) client: Client,
}

impl<S: Storage, C: ConfigProvider> CardDbPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        Ok(Self {
            storage,
            config,
            client: scryfall::build_http_client()?,
        })
    }
}

/// Maps one bulk-data card to a database row, or `None` when it lacks a name
/// or a front image.
///
/// When the card carries an alternate printed name (or, failing that, a
/// flavor name) that differs from its canonical name, the row is stored
/// under the alternate name and grouped by the canonical one.
pub fn normalize_card(card: &RawCard) -> Option<CardRow> {
    let image_uri = card.normal_image_uri()?.to_string();
    let card_name: String = card
        .name
        .as_deref()
        .filter(|n| !n.is_empty())?
        .nfc()
        .collect();

    let alternate: Option<String> = card
        .printed_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .or_else(|| card.flavor_name.as_deref().filter(|n| !n.is_empty()))
        .map(|n| n.nfc().collect());

    let name = match alternate {
        Some(alt) if alt.to_lowercase() != card_name.to_lowercase() => alt,
        _ => card_name.clone(),
    };

    Some(CardRow {
        id: card.id.clone(),
        name,
        real_name: card_name,
        set_code: card.set.clone(),
        collector_number: card.collector_number.clone(),
        image_uri_normal: Some(image_uri),
        scryfall_uri: card.scryfall_uri.clone(),
        price_usd: card.price_usd(),
        price_foil: card.price_foil(),
    })
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for CardDbPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<RawCard>> {
        let download_uri = scryfall::fetch_bulk_download_uri(
            &self.client,
            self.config.bulk_data_url(),
            self.config.bulk_data_type(),
        )
        .await?;

        let json_path = self.storage.resolve(JSON_TMP_FILE);
        scryfall::download_to_file(&self.client, &download_uri, &json_path).await?;

        tracing::info!("Processing JSON file: {}", json_path.display());
        // 整份 bulk 檔案一次載入記憶體，放到 blocking 執行緒解析
        let cards = tokio::task::spawn_blocking(move || -> Result<Vec<RawCard>> {
            let file = std::fs::File::open(&json_path)?;
            Ok(serde_json::from_reader(BufReader::new(file))?)
        })
        .await
        .map_err(|e| BlingError::ProcessingError {
            message: format!("JSON parsing task failed: {}", e),
        })??;

        tracing::info!("📊 Extracted {} cards", cards.len());
        Ok(cards)
    }

    async fn transform(&self, data: Vec<RawCard>) -> Result<TransformResult> {
        let total = data.len();
        let rows: Vec<CardRow> = data.iter().filter_map(normalize_card).collect();
        let skipped = total - rows.len();

        if skipped > 0 {
            tracing::debug!("Skipped {} cards without a name or image", skipped);
        }
        Ok(TransformResult { rows, skipped })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let db_path = self.storage.resolve(self.config.database_filename());
        let batch_size = self.config.batch_size();
        let output = db_path.display().to_string();

        tracing::info!("💾 Writing {} card records to {}", result.rows.len(), output);
        let start = Instant::now();

        let inserted = tokio::task::spawn_blocking(move || {
            write_card_database(&db_path, &result.rows, batch_size)
        })
        .await
        .map_err(|e| BlingError::ProcessingError {
            message: format!("Database write task failed: {}", e),
        })??;

        tracing::info!(
            "Inserted {} card records in {:.2} seconds.",
            inserted,
            start.elapsed().as_secs_f64()
        );
        Ok(output)
    }

    async fn cleanup(&self) -> Result<()> {
        if self.storage.exists(JSON_TMP_FILE) {
            tracing::info!("🧹 Cleaning up temporary file: {}", JSON_TMP_FILE);
            self.storage.remove_file(JSON_TMP_FILE).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::LocalStorage;
    use crate::config::CliConfig;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn raw(value: serde_json::Value) -> RawCard {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_standard_card() {
        let card = raw(serde_json::json!({
            "id": "sol-ring-c21", "name": "Sol Ring", "set": "c21", "collector_number": "263",
            "scryfall_uri": "https://scryfall.com/card/c21/263",
            "image_uris": {"normal": "https://img/sr.jpg"},
            "prices": {"usd": "1.99", "usd_foil": "4.50"}
        }));

        let row = normalize_card(&card).unwrap();
        assert_eq!(row.name, "Sol Ring");
        assert_eq!(row.real_name, "Sol Ring");
        assert_eq!(row.price_usd, Some(1.99));
        assert_eq!(row.price_foil, Some(4.5));
    }

    #[test]
    fn test_normalize_alternate_printed_name() {
        let card = raw(serde_json::json!({
            "id": "ss-sld", "name": "Shadowspear", "printed_name": "Totec's Spear",
            "set": "sld", "collector_number": "1505", "scryfall_uri": "u",
            "image_uris": {"normal": "https://img/ss.jpg"}
        }));

        let row = normalize_card(&card).unwrap();
        assert_eq!(row.name, "Totec's Spear");
        assert_eq!(row.real_name, "Shadowspear");
    }

    #[test]
    fn test_flavor_name_is_used_when_printed_name_missing() {
        let card = raw(serde_json::json!({
            "id": "g", "name": "Gisa's Favorite Shovel", "printed_name": "",
            "flavor_name": "Zombie Shovel", "set": "x", "collector_number": "1",
            "scryfall_uri": "u", "image_uris": {"normal": "https://img/g.jpg"}
        }));

        let row = normalize_card(&card).unwrap();
        assert_eq!(row.name, "Zombie Shovel");
        assert_eq!(row.real_name, "Gisa's Favorite Shovel");
    }

    #[test]
    fn test_printed_name_differing_only_in_case_is_not_alternate() {
        let card = raw(serde_json::json!({
            "id": "s", "name": "Swamp", "printed_name": "SWAMP", "set": "neo",
            "collector_number": "298", "scryfall_uri": "u",
            "image_uris": {"normal": "https://img/s.jpg"}
        }));

        let row = normalize_card(&card).unwrap();
        assert_eq!(row.name, "Swamp");
        assert_eq!(row.real_name, "Swamp");
    }

    #[test]
    fn test_cards_without_image_or_name_are_skipped() {
        let no_image = raw(serde_json::json!({"id": "a", "name": "Art Series", "set": "x"}));
        let no_name = raw(serde_json::json!({
            "id": "b", "set": "x", "image_uris": {"normal": "https://img/b.jpg"}
        }));

        assert!(normalize_card(&no_image).is_none());
        assert!(normalize_card(&no_name).is_none());
    }

    #[tokio::test]
    async fn test_pipeline_builds_database_and_removes_download() {
        let server = MockServer::start();
        let download_uri = server.url("/default-cards.json");
        let bulk_mock = server.mock(|when, then| {
            when.method(GET).path("/bulk-data");
            then.status(200).json_body(serde_json::json!({
                "data": [{"type": "default_cards", "download_uri": download_uri}]
            }));
        });
        let file_mock = server.mock(|when, then| {
            when.method(GET).path("/default-cards.json");
            then.status(200).json_body(serde_json::json!([
                {
                    "id": "1", "name": "Sol Ring", "set": "c21", "collector_number": "263",
                    "scryfall_uri": "u1", "image_uris": {"normal": "https://img/1.jpg"}
                },
                {"id": "2", "name": "Art Card", "set": "aaa", "collector_number": "1", "scryfall_uri": "u2"}
            ]));
        });

        let dir = TempDir::new().unwrap();
        let config = CliConfig {
            bulk_data_url: server.url("/bulk-data"),
            data_dir: dir.path().display().to_string(),
            ..CliConfig::default()
        };
        let storage = LocalStorage::new(dir.path());
        let pipeline = CardDbPipeline::new(storage.clone(), config).unwrap();

        let cards = pipeline.extract().await.unwrap();
        assert_eq!(cards.len(), 2);
        assert!(storage.exists(JSON_TMP_FILE));

        let transformed = pipeline.transform(cards).await.unwrap();
        assert_eq!(transformed.rows.len(), 1);
        assert_eq!(transformed.skipped, 1);

        let output = pipeline.load(transformed).await.unwrap();
        assert!(output.ends_with("cards.db"));
        assert!(storage.exists("cards.db"));

        pipeline.cleanup().await.unwrap();
        assert!(!storage.exists(JSON_TMP_FILE));

        bulk_mock.assert();
        file_mock.assert();
    }
}
