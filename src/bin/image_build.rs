use bling_deck::image::{render_dockerfile, DockerBackend, ImageBuilder};
use bling_deck::utils::{logger, validation::Validate};
use bling_deck::{BlingError, ImageConfig};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "image-build")]
#[command(about = "Build the deployable runtime image from an image.toml recipe")]
struct Args {
    /// Image recipe
    #[arg(short, long, default_value = "image.toml")]
    config: PathBuf,

    /// Build context directory
    #[arg(long, default_value = ".")]
    context: PathBuf,

    /// Where local images are written
    #[arg(short, long, default_value = "dist")]
    output: PathBuf,

    /// Build with `docker build` instead of the local builder
    #[arg(long)]
    docker: bool,

    /// Write the rendered Dockerfile to this path
    #[arg(long)]
    emit_dockerfile: Option<PathBuf>,

    /// Show the plan without running anything
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,
}

fn print_plan(config: &ImageConfig, args: &Args) {
    println!("🔍 Dry run: {}", config.reference());
    println!("📁 Context: {}", args.context.display());
    println!("🔧 Build stage ({}):", config.build.base);
    for (i, step) in config.build.steps.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
    println!("📦 Artifact: {}", config.build.artifact);
    println!("🚀 Runtime stage ({}):", config.runtime.base);
    for path in &config.runtime.copy {
        println!("  - {}", path);
    }
    println!(
        "  entrypoint: {}",
        config
            .entrypoint_for(&config.runtime.default_port.to_string())
            .join(" ")
    );
    println!(
        "  {}={} (exposed {})",
        config.runtime.port_env, config.runtime.default_port, config.runtime.default_port
    );
    if args.docker {
        println!("🐳 Backend: docker build -t {}", config.reference());
    } else {
        println!(
            "🎯 Output: {}/{}/ and {}.zip",
            args.output.display(),
            config.bundle_name(),
            config.bundle_name()
        );
    }
}

fn run(args: &Args) -> Result<(), BlingError> {
    let config = ImageConfig::from_file(&args.config)?;
    config.validate()?;
    tracing::debug!("Image recipe: {:?}", config);

    if args.dry_run {
        print_plan(&config, args);
        if args.verbose {
            println!("\n{}", render_dockerfile(&config)?);
        }
        return Ok(());
    }

    if args.docker {
        let dockerfile = args
            .emit_dockerfile
            .clone()
            .unwrap_or_else(|| args.output.join("Dockerfile"));
        DockerBackend::new(dockerfile).build(&config, &args.context)?;
        println!("✅ Docker image built: {}", config.reference());
        return Ok(());
    }

    if let Some(path) = &args.emit_dockerfile {
        DockerBackend::new(path).write_dockerfile(&config)?;
    }

    let builder = ImageBuilder::new(config, &args.context, &args.output);
    let image = builder.build()?;
    println!("✅ Image built: {}", image.directory.display());
    println!("📦 Archive: {}", image.archive.display());
    Ok(())
}

fn main() {
    let args = Args::parse();
    logger::init_from_env(args.verbose);

    if let Err(e) = run(&args) {
        tracing::error!(
            "❌ Image build failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code().max(1));
    }
}
