use bling_deck::supervisor::{LaunchOutcome, RestartMode, Supervisor, SERVER_LOG_FILE};
use bling_deck::utils::logger;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "restart")]
#[command(about = "Restart the API service listening on port 8000")]
struct Args {
    /// Stop the service without starting it again
    #[arg(short = 'k', long)]
    kill_only: bool,

    /// Run the relaunched service attached to this terminal
    #[arg(short = 'f', long)]
    foreground: bool,
}

fn main() {
    let args = Args::parse();
    logger::init_from_env(false);

    let mode = RestartMode::from_flags(args.kill_only, args.foreground);
    let supervisor = Supervisor::system();

    match supervisor.run(mode) {
        Ok(outcome) => {
            if outcome.terminated.is_empty() {
                println!("No process was listening on port {}", outcome.port);
            }
            for pid in &outcome.terminated {
                println!("🛑 Stopped process {} on port {}", pid, outcome.port);
            }
            match outcome.launched {
                Some(LaunchOutcome::Spawned { pid }) => {
                    println!("✅ Service started in background (PID {})", pid);
                    println!("📄 Output: {}", SERVER_LOG_FILE);
                }
                Some(LaunchOutcome::Exited { code }) => {
                    tracing::info!("Service exited with code {:?}", code);
                }
                None => println!("✅ Kill-only: service not restarted"),
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Restart failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    }
}
