pub mod card_db_pipeline;

pub use card_db_pipeline::CardDbPipeline;
