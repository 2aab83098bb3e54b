use crate::catalog::scryfall::ScryfallClient;
use crate::catalog::store::CardStore;
use crate::domain::model::CardRow;
use crate::utils::error::Result;

/// Local database first, live Scryfall search second.
pub struct CardService {
    store: CardStore,
    fallback: Option<ScryfallClient>,
}

impl CardService {
    pub fn new(store: CardStore, fallback: Option<ScryfallClient>) -> Self {
        Self { store, fallback }
    }

    /// All printings of the card called `card_name`.
    ///
    /// `card_name` may be an alternate printed name ("Totec's Spear"); it is
    /// resolved to its canonical name ("Shadowspear") first so every printing
    /// of the underlying card comes back.
    pub async fn find_card_printings_by_name(&self, card_name: &str) -> Result<Vec<CardRow>> {
        let canonical_name = match self.store.resolve_canonical_name(card_name)? {
            Some(real_name) => {
                if real_name != card_name {
                    tracing::info!("Resolved '{}' to its canonical name: '{}'", card_name, real_name);
                }
                real_name
            }
            None => {
                tracing::debug!(
                    "Could not resolve a canonical name for '{}'; proceeding with the given name",
                    card_name
                );
                card_name.to_string()
            }
        };

        let printings = self.store.printings_of(&canonical_name)?;
        if !printings.is_empty() {
            tracing::debug!(
                "Found {} printings for '{}' in local DB",
                printings.len(),
                canonical_name
            );
            return Ok(printings);
        }

        match &self.fallback {
            Some(client) => {
                tracing::warn!(
                    "Card '{}' not in local DB. Falling back to Scryfall API.",
                    canonical_name
                );
                Ok(client.search_printings(&canonical_name).await)
            }
            None => Ok(Vec::new()),
        }
    }
}
