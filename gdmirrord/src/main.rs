use gdmirrord::daemon::{DaemonConfig, DaemonRuntime};
use gdmirrord::store::{Difference, DifferenceHook};
use gdmirrord::sync::SyncHook;

const COLOUR_RESET: &str = "\u{1b}[0m";
const COLOUR_RED: &str = "\u{1b}[31;1m";
const COLOUR_GREEN: &str = "\u{1b}[32;1m";
const COLOUR_YELLOW: &str = "\u{1b}[33;1m";
const COLOUR_MAGENTA: &str = "\u{1b}[35;1m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Full,
    Diff,
    Watch,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);

    let Some(mode) = args.next() else {
        return Ok(CliMode::Help);
    };

    let mode = match mode.as_str() {
        "full" => CliMode::Full,
        "diff" => CliMode::Diff,
        "watch" => CliMode::Watch,
        "--help" | "-h" | "help" => CliMode::Help,
        other => anyhow::bail!("unknown mode: {other}"),
    };

    if let Some(extra) = args.next() {
        anyhow::bail!("unexpected argument: {extra}");
    }

    Ok(mode)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        println!("Usage: gdmirrord <full|diff|watch>");
        println!("  full    run one full sync of the drive catalog");
        println!("  diff    apply pending changes and print the difference");
        println!("  watch   full sync if needed, then keep polling for changes");
        return Ok(());
    }

    let config = DaemonConfig::from_env()?;
    let runtime = DaemonRuntime::bootstrap(config).await?;

    match mode {
        CliMode::Full => run_full(&runtime).await,
        CliMode::Diff => run_diff(&runtime).await,
        CliMode::Watch => runtime.run().await,
        CliMode::Help => unreachable!(),
    }
}

async fn run_full(runtime: &DaemonRuntime) -> anyhow::Result<()> {
    println!("{COLOUR_MAGENTA}log{COLOUR_RESET} - starting full sync, this can take a while");

    match runtime.engine().full_sync().await {
        Ok(()) => {
            println!("{COLOUR_MAGENTA}log{COLOUR_RESET} - full sync complete");
            Ok(())
        }
        Err(err) if err.is_data_anomaly() => {
            println!(
                "{COLOUR_YELLOW}warning{COLOUR_RESET} - upstream returned an incomplete snapshot, please re-run the full sync"
            );
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

async fn run_diff(runtime: &DaemonRuntime) -> anyhow::Result<()> {
    println!("{COLOUR_MAGENTA}log{COLOUR_RESET} - syncing changes");

    let mut hook = DifferenceHook::new(runtime.engine().store().clone());
    {
        let mut hooks: [&mut dyn SyncHook; 1] = [&mut hook];
        match runtime.engine().partial_sync(&mut hooks).await {
            Ok(()) => {}
            Err(err) if err.is_data_anomaly() => {
                println!(
                    "{COLOUR_YELLOW}warning{COLOUR_RESET} - a data anomaly occurred, please try again in 30 seconds"
                );
                std::process::exit(1);
            }
            Err(err) if err.requires_full_sync() => {
                println!(
                    "{COLOUR_YELLOW}warning{COLOUR_RESET} - no local state yet, run `gdmirrord full` first"
                );
                std::process::exit(1);
            }
            Err(err) => return Err(err.into()),
        }
    }

    print_difference(&hook.into_difference());
    Ok(())
}

fn print_difference(difference: &Difference) {
    if !difference.added_folders.is_empty() {
        println!("\nAdded folders:");
        for folder in &difference.added_folders {
            println!("{COLOUR_GREEN}created{COLOUR_RESET} - {} - {}", folder.id, folder.name);
        }
    }

    if !difference.added_files.is_empty() {
        println!("\nAdded files:");
        for file in &difference.added_files {
            println!("{COLOUR_GREEN}created{COLOUR_RESET} - {} - {}", file.id, file.name);
        }
    }

    if !difference.changed_folders.is_empty() {
        println!("\nChanged folders:");
        for folder in &difference.changed_folders {
            println!("{COLOUR_YELLOW}changed{COLOUR_RESET} - {} - {}", folder.id, folder.name);
        }
    }

    if !difference.changed_files.is_empty() {
        println!("\nChanged files:");
        for file in &difference.changed_files {
            println!("{COLOUR_YELLOW}changed{COLOUR_RESET} - {} - {}", file.id, file.name);
        }
    }

    if !difference.removed_folders.is_empty() {
        println!("\nRemoved folders:");
        for folder in &difference.removed_folders {
            println!("{COLOUR_RED}removed{COLOUR_RESET} - {} - {}", folder.id, folder.name);
        }
    }

    if !difference.removed_files.is_empty() {
        println!("\nRemoved files:");
        for file in &difference.removed_files {
            println!("{COLOUR_RED}removed{COLOUR_RESET} - {} - {}", file.id, file.name);
        }
    }
}
