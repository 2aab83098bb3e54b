//! 兩階段映像建置：建置階段產生資料檔，執行階段只收應用程式與該檔案。

pub mod builder;
pub mod recipe;

pub use builder::{BuiltImage, DockerBackend, ImageBuilder, ImageManifest, MANIFEST_FILE};
pub use recipe::{container_command, render_dockerfile};
