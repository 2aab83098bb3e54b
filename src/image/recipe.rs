use crate::config::toml_config::{ImageConfig, PORT_PLACEHOLDER};
use crate::utils::error::Result;
use std::fmt::Write;
use std::path::Path;

fn is_shell_safe(arg: &str) -> bool {
    !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@%+{}".contains(c))
}

/// Quotes one entrypoint argument for `sh -c`, expanding the port
/// placeholder to `${<port_env>:-<default>}`.
fn shell_word(arg: &str, port_expr: &str) -> String {
    if is_shell_safe(arg) {
        return arg.replace(PORT_PLACEHOLDER, port_expr);
    }
    if arg.contains(PORT_PLACEHOLDER) {
        // double quotes keep the expansion live
        let escaped: String = arg
            .chars()
            .flat_map(|c| match c {
                '"' | '\\' | '$' | '`' => vec!['\\', c],
                _ => vec![c],
            })
            .collect();
        return format!("\"{}\"", escaped.replace(PORT_PLACEHOLDER, port_expr));
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Shell command line run by the container, honouring a port override.
pub fn container_command(config: &ImageConfig) -> String {
    let port_expr = format!(
        "${{{}:-{}}}",
        config.runtime.port_env, config.runtime.default_port
    );
    let words: Vec<String> = config
        .runtime
        .entrypoint
        .iter()
        .map(|arg| shell_word(arg, &port_expr))
        .collect();
    format!("exec {}", words.join(" "))
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// Two-stage Dockerfile: the builder stage runs the data steps, the runtime
/// stage receives the application paths and exactly one file from the builder.
pub fn render_dockerfile(config: &ImageConfig) -> Result<String> {
    let workdir = config.build_workdir().trim_end_matches('/');
    let artifact = config.build.artifact.trim_start_matches("./");
    let mut out = String::new();

    writeln!(out, "# {} (generated by image-build)", config.reference())?;
    writeln!(out, "FROM {} AS builder", config.build.base)?;
    writeln!(out, "WORKDIR {}", workdir)?;
    if let Some(req) = &config.build.requirements {
        writeln!(out, "COPY {} ./{}", req, file_name(req))?;
    }
    for cmd in &config.build.install {
        writeln!(out, "RUN {}", cmd)?;
    }
    writeln!(out, "COPY . .")?;
    for step in &config.build.steps {
        writeln!(out, "RUN {}", step)?;
    }

    writeln!(out)?;
    writeln!(out, "FROM {}", config.runtime.base)?;
    writeln!(out, "WORKDIR {}", workdir)?;
    writeln!(
        out,
        "ENV {}={}",
        config.runtime.port_env, config.runtime.default_port
    )?;
    if let Some(req) = &config.runtime.requirements {
        writeln!(out, "COPY {} ./{}", req, file_name(req))?;
    }
    for cmd in &config.runtime.install {
        writeln!(out, "RUN {}", cmd)?;
    }
    for path in &config.runtime.copy {
        let path = path.trim_end_matches('/');
        writeln!(out, "COPY {} ./{}", path, path)?;
    }
    writeln!(
        out,
        "COPY --from=builder {}/{} ./{}",
        workdir, artifact, artifact
    )?;
    writeln!(out, "EXPOSE {}", config.runtime.default_port)?;

    let cmd = serde_json::to_string(&container_command(config))?;
    writeln!(out, "CMD [\"sh\", \"-c\", {}]", cmd)?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe() -> ImageConfig {
        ImageConfig::from_toml_str(
            r#"
[image]
name = "bling-my-deck"
tag = "v1"

[build]
base = "python:3.11-slim"
requirements = "requirements.txt"
install = ["pip install --no-cache-dir -r requirements.txt"]
steps = ["python scripts/build_db.py"]
artifact = "app/data/cards.db"

[runtime]
base = "python:3.11-slim"
requirements = "requirements.txt"
install = ["pip install --no-cache-dir -r requirements.txt"]
copy = ["app"]
entrypoint = ["uvicorn", "app.main:app", "--host", "0.0.0.0", "--port", "{port}"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_container_command_expands_port_env() {
        assert_eq!(
            container_command(&recipe()),
            "exec uvicorn app.main:app --host 0.0.0.0 --port ${PORT:-8080}"
        );
    }

    #[test]
    fn test_quoting_of_unsafe_arguments() {
        assert_eq!(shell_word("hello world", "${PORT:-1}"), "'hello world'");
        assert_eq!(shell_word("it's", "${PORT:-1}"), r"'it'\''s'");
        assert_eq!(
            shell_word("--bind=0.0.0.0 {port}", "${PORT:-1}"),
            "\"--bind=0.0.0.0 ${PORT:-1}\""
        );
    }

    #[test]
    fn test_dockerfile_has_two_stages() {
        let dockerfile = render_dockerfile(&recipe()).unwrap();

        assert!(dockerfile.contains("FROM python:3.11-slim AS builder\n"));
        assert!(dockerfile.contains("RUN python scripts/build_db.py\n"));
        assert_eq!(dockerfile.matches("\nFROM ").count(), 2);
    }

    #[test]
    fn test_runtime_stage_receives_only_the_artifact_from_builder() {
        let dockerfile = render_dockerfile(&recipe()).unwrap();
        let runtime = dockerfile.split("\n\n").nth(1).unwrap();

        assert_eq!(runtime.matches("--from=builder").count(), 1);
        assert!(runtime.contains("COPY --from=builder /app/app/data/cards.db ./app/data/cards.db"));
        assert!(runtime.contains("COPY app ./app"));
        assert!(!runtime.contains("scripts"));
        assert!(!runtime.contains("COPY . ."));
    }

    #[test]
    fn test_runtime_stage_port_and_cmd() {
        let dockerfile = render_dockerfile(&recipe()).unwrap();

        assert!(dockerfile.contains("ENV PORT=8080\n"));
        assert!(dockerfile.contains("EXPOSE 8080\n"));
        assert!(dockerfile.trim_end().ends_with(
            r#"CMD ["sh", "-c", "exec uvicorn app.main:app --host 0.0.0.0 --port ${PORT:-8080}"]"#
        ));
    }
}
