use crate::domain::model::{RawCard, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub trait Storage: Send + Sync {
    /// Absolute location of `path` inside this storage.
    fn resolve(&self, path: &str) -> PathBuf;
    fn exists(&self, path: &str) -> bool;
    /// Removing a file that does not exist is not an error.
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn bulk_data_url(&self) -> &str;
    fn bulk_data_type(&self) -> &str;
    fn database_filename(&self) -> &str;
    fn batch_size(&self) -> usize;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<RawCard>>;
    async fn transform(&self, data: Vec<RawCard>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;

    /// Runs after every attempt, successful or not.
    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}
