use crate::config::toml_config::ImageConfig;
use crate::image::recipe::render_dockerfile;
use crate::utils::error::{BlingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use zip::write::{FileOptions, ZipWriter};

pub const MANIFEST_FILE: &str = "image.json";

/// Never copied into the build directory.
const CONTEXT_EXCLUDES: &[&str] = &[".git", "target"];

/// Runtime metadata stored next to the image contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageManifest {
    pub name: String,
    pub tag: String,
    pub entrypoint: Vec<String>,
    pub exposed_port: u16,
    pub env: BTreeMap<String, String>,
    pub artifact: String,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BuiltImage {
    pub directory: PathBuf,
    pub archive: PathBuf,
    pub manifest: ImageManifest,
}

/// Local two-phase image build: run the data steps in a scratch copy of the
/// context, then assemble a clean runtime tree from the context and the
/// single artifact.
pub struct ImageBuilder {
    config: ImageConfig,
    context: PathBuf,
    output: PathBuf,
}

impl ImageBuilder {
    pub fn new(config: ImageConfig, context: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            config,
            context: context.into(),
            output: output.into(),
        }
    }

    pub fn image_dir(&self) -> PathBuf {
        self.output.join(self.config.bundle_name())
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output.join(format!("{}.zip", self.config.bundle_name()))
    }

    pub fn build(&self) -> Result<BuiltImage> {
        tracing::info!("🏗️ Building image {}", self.config.reference());
        let build_dir = self.build_phase()?;
        let image = self.finalize(build_dir.path())?;
        tracing::info!(
            "✅ Image {} ready at {}",
            self.config.reference(),
            image.directory.display()
        );
        Ok(image)
    }

    /// Copies the context into a scratch directory and runs every build step.
    /// The returned directory holds the artifact.
    pub fn build_phase(&self) -> Result<TempDir> {
        let (context, excluded) = self.context_and_excludes()?;

        let build_dir = TempDir::new()?;
        let copied = copy_tree(&context, build_dir.path(), &excluded)?;
        tracing::debug!(
            "Copied {} files into build directory {}",
            copied,
            build_dir.path().display()
        );

        for (index, step) in self.config.build.steps.iter().enumerate() {
            tracing::info!(
                "🔧 Step {}/{}: {}",
                index + 1,
                self.config.build.steps.len(),
                step
            );
            let status = Command::new("sh")
                .arg("-c")
                .arg(step)
                .current_dir(build_dir.path())
                .status()
                .map_err(|e| BlingError::LaunchFailed {
                    program: "sh".to_string(),
                    source: e,
                })?;

            if !status.success() {
                tracing::error!("❌ Step failed: {}", step);
                return Err(BlingError::BuildStepFailed {
                    step: step.clone(),
                    status: status.to_string(),
                });
            }
        }

        let artifact = build_dir.path().join(&self.config.build.artifact);
        if !artifact.is_file() {
            return Err(BlingError::ArtifactMissing {
                path: self.config.build.artifact.clone(),
            });
        }

        Ok(build_dir)
    }

    /// The canonical context and the paths inside it that are never copied
    /// out, the output directory (and so every staging area) included.
    fn context_and_excludes(&self) -> Result<(PathBuf, Vec<PathBuf>)> {
        let context = self.context.canonicalize()?;
        fs::create_dir_all(&self.output)?;
        let output = self.output.canonicalize()?;

        let mut excluded: Vec<PathBuf> = CONTEXT_EXCLUDES.iter().map(|e| context.join(e)).collect();
        excluded.push(output);
        Ok((context, excluded))
    }

    /// Assembles the runtime tree in a staging directory and moves it into
    /// place only once it is complete.
    pub fn finalize(&self, build_dir: &Path) -> Result<BuiltImage> {
        let bundle = self.config.bundle_name();
        let staging = self.output.join(format!("{}.staging", bundle));
        let archive_tmp = self.output.join(format!("{}.zip.tmp", bundle));

        let result = self.assemble(build_dir, &staging, &archive_tmp);
        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
            let _ = fs::remove_file(&archive_tmp);
        }
        result
    }

    fn assemble(&self, build_dir: &Path, staging: &Path, archive_tmp: &Path) -> Result<BuiltImage> {
        let (context, excluded) = self.context_and_excludes()?;
        if staging.exists() {
            fs::remove_dir_all(staging)?;
        }
        fs::create_dir_all(staging)?;

        let mut runtime_paths: Vec<&str> = self.config.runtime.copy.iter().map(String::as_str).collect();
        if let Some(req) = &self.config.runtime.requirements {
            runtime_paths.push(req);
        }
        for rel in runtime_paths {
            let source = context.join(rel);
            if !source.exists() {
                return Err(BlingError::InvalidConfigValueError {
                    field: "runtime.copy".to_string(),
                    value: rel.to_string(),
                    reason: "Path not found in the build context".to_string(),
                });
            }
            copy_path(&source, &staging.join(rel), &excluded)?;
        }

        let artifact = &self.config.build.artifact;
        copy_path(&build_dir.join(artifact), &staging.join(artifact), &[])?;

        let manifest = self.manifest();
        fs::write(
            staging.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        let entries = write_zip(staging, archive_tmp)?;
        tracing::debug!("Packed {} files into {}", entries, archive_tmp.display());

        let image_dir = self.image_dir();
        let archive = self.archive_path();
        if image_dir.exists() {
            fs::remove_dir_all(&image_dir)?;
        }
        fs::rename(staging, &image_dir)?;
        fs::rename(archive_tmp, &archive)?;

        Ok(BuiltImage {
            directory: image_dir,
            archive,
            manifest,
        })
    }

    pub fn manifest(&self) -> ImageManifest {
        let runtime = &self.config.runtime;
        let port = runtime.default_port.to_string();
        ImageManifest {
            name: self.config.image.name.clone(),
            tag: self.config.tag().to_string(),
            entrypoint: self.config.entrypoint_for(&port),
            exposed_port: runtime.default_port,
            env: BTreeMap::from([(runtime.port_env.clone(), port)]),
            artifact: self.config.build.artifact.clone(),
            built_at: Utc::now(),
        }
    }
}

/// Builds the image with `docker build` from a rendered Dockerfile.
pub struct DockerBackend {
    dockerfile: PathBuf,
}

impl DockerBackend {
    pub fn new(dockerfile: impl Into<PathBuf>) -> Self {
        Self {
            dockerfile: dockerfile.into(),
        }
    }

    pub fn write_dockerfile(&self, config: &ImageConfig) -> Result<()> {
        if let Some(parent) = self.dockerfile.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.dockerfile, render_dockerfile(config)?)?;
        tracing::info!("📝 Wrote {}", self.dockerfile.display());
        Ok(())
    }

    pub fn build(&self, config: &ImageConfig, context: &Path) -> Result<()> {
        self.write_dockerfile(config)?;

        let reference = config.reference();
        tracing::info!("🐳 docker build -t {}", reference);
        let status = Command::new("docker")
            .arg("build")
            .arg("-f")
            .arg(&self.dockerfile)
            .arg("-t")
            .arg(&reference)
            .arg(context)
            .status()
            .map_err(|e| BlingError::LaunchFailed {
                program: "docker".to_string(),
                source: e,
            })?;

        if !status.success() {
            return Err(BlingError::BuildStepFailed {
                step: format!("docker build -t {}", reference),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Recursively copies `src` into `dst`, skipping anything in `excluded`.
/// Returns the number of files copied.
fn copy_tree(src: &Path, dst: &Path, excluded: &[PathBuf]) -> Result<usize> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        if excluded.iter().any(|e| e == &path) {
            continue;
        }
        let target = dst.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            copied += copy_tree(&path, &target, excluded)?;
        } else if file_type.is_file() {
            fs::copy(&path, &target)?;
            copied += 1;
        } else if file_type.is_symlink() {
            copy_symlink(&path, &target)?;
        }
    }
    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    std::os::unix::fs::symlink(fs::read_link(src)?, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dst: &Path) -> Result<()> {
    tracing::warn!("Skipping symlink {}", src.display());
    Ok(())
}

fn copy_path(src: &Path, dst: &Path, excluded: &[PathBuf]) -> Result<()> {
    if src.is_dir() {
        copy_tree(src, dst, excluded)?;
    } else {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst)?;
    }
    Ok(())
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<(String, PathBuf)>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else {
            let rel = path.strip_prefix(root).map_err(|e| BlingError::ProcessingError {
                message: format!("Unexpected path {}: {}", path.display(), e),
            })?;
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((name, path));
        }
    }
    Ok(())
}

fn write_zip(dir: &Path, archive: &Path) -> Result<usize> {
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    files.sort();

    let mut zip = ZipWriter::new(File::create(archive)?);
    for (name, path) in &files {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(&fs::read(path)?)?;
    }
    zip.finish()?;
    Ok(files.len())
}
