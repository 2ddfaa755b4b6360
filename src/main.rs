// src/main.rs

use clap::{Parser, Subcommand, ValueEnum};
use resource_explorer::core::{
    ClientError, CoreStateStore, DockerCliClient, HubRegistry, HubRegistryConfig, ImagesKind,
    InspectDocument, ItemDescriptor, ListOptions, OutdatedChecker, OutdatedCheckerConfig,
    RenderedNode, ResourceKind, RootTreeController, RuntimeClientOperations, SettingChange,
    SnapshotClient, SortDirection, StateStoreOperations, TreeError, inspect_item,
};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const APP_NAME: &str = "ResourceExplorer";

#[derive(Parser, Debug)]
#[command(name = "resource-explorer")]
#[command(about = "Browse container images as a grouped, sorted tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read images from a JSON snapshot instead of the docker CLI
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Persisted state file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Skip the registry lookups that flag outdated images
    #[arg(long, global = true)]
    no_outdated_check: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the images tree
    #[command(alias = "ls")]
    List {
        /// Print the rendered nodes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the full runtime description of one image
    Inspect {
        /// Image id as listed by the runtime
        id: String,
    },

    /// Include or exclude dangling images
    Dangling {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Change how the tree is labelled, grouped and sorted
    Configure {
        #[arg(long)]
        label: Option<String>,

        /// Description properties, in display order
        #[arg(long, value_delimiter = ',')]
        description: Option<Vec<String>>,

        /// Grouping property, or `None` for a flat list
        #[arg(long)]
        group_by: Option<String>,

        /// Sort property, or `Label` to sort by the label property
        #[arg(long)]
        sort_by: Option<String>,

        #[arg(long, value_enum)]
        direction: Option<Direction>,
    },

    /// Restore the default tree settings
    Reset,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Direction {
    Asc,
    Desc,
}

impl From<Direction> for SortDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => SortDirection::Ascending,
            Direction::Desc => SortDirection::Descending,
        }
    }
}

// The runtime client chosen on the command line.
enum HostClient {
    Docker(DockerCliClient),
    Snapshot(SnapshotClient),
}

impl RuntimeClientOperations for HostClient {
    async fn list(&self, options: &ListOptions) -> Result<Vec<ItemDescriptor>, ClientError> {
        match self {
            HostClient::Docker(client) => client.list(options).await,
            HostClient::Snapshot(client) => client.list(options).await,
        }
    }

    async fn inspect(&self, ids: &[String]) -> Result<Vec<InspectDocument>, ClientError> {
        match self {
            HostClient::Docker(client) => client.inspect(ids).await,
            HostClient::Snapshot(client) => client.inspect(ids).await,
        }
    }
}

type ImagesTree = RootTreeController<ImagesKind<HostClient, HubRegistry>>;

fn open_state_store(cli: &Cli) -> Result<Arc<dyn StateStoreOperations>, TreeError> {
    let store = match &cli.state_file {
        Some(path) => CoreStateStore::at_path(path.clone()),
        None => CoreStateStore::for_app(APP_NAME)?,
    };
    log::debug!("main: Using state file {:?}.", store.file_path());
    Ok(Arc::new(store))
}

fn build_tree(cli: &Cli) -> Result<ImagesTree, TreeError> {
    let client = match &cli.snapshot {
        Some(path) => HostClient::Snapshot(SnapshotClient::open(path)?),
        None => HostClient::Docker(DockerCliClient::default()),
    };
    let checker_config = OutdatedCheckerConfig {
        enabled: !cli.no_outdated_check,
        ..OutdatedCheckerConfig::default()
    };
    let checker = OutdatedChecker::new(HubRegistry::new(HubRegistryConfig::default()), checker_config);
    Ok(RootTreeController::new(
        ImagesKind::new(client, checker),
        open_state_store(cli)?,
    ))
}

fn print_nodes(nodes: &[RenderedNode], depth: usize) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        let marker = if node.outdated && !node.is_group() { " [outdated]" } else { "" };
        if node.description.is_empty() {
            println!("{indent}{}{marker}", node.label);
        } else {
            println!("{indent}{}  ({}){marker}", node.label, node.description);
        }
        print_nodes(&node.children, depth + 1);
    }
}

fn setting_changes(command: &Commands) -> Vec<SettingChange> {
    let Commands::Configure {
        label,
        description,
        group_by,
        sort_by,
        direction,
    } = command
    else {
        return Vec::new();
    };

    let mut changes = Vec::new();
    if let Some(label) = label {
        changes.push(SettingChange::Label(label.clone()));
    }
    if let Some(description) = description {
        changes.push(SettingChange::Description(description.clone()));
    }
    if let Some(group_by) = group_by {
        changes.push(SettingChange::GroupBy(Some(group_by.clone())));
    }
    if let Some(sort_by) = sort_by {
        changes.push(SettingChange::SortBy(sort_by.clone()));
    }
    if let Some(direction) = direction {
        changes.push(SettingChange::SortDirection((*direction).into()));
    }
    changes
}

async fn run(cli: Cli) -> Result<(), TreeError> {
    let tree = build_tree(&cli)?;

    match &cli.command {
        Commands::List { json } => {
            let children = tree.get_children().await?;
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(children.as_slice()).map_err(ClientError::from)?
                );
            } else {
                println!("{} ({} {}s)", tree.label(), children.len(), tree.child_label());
                print_nodes(&children, 1);
            }
        }
        Commands::Inspect { id } => {
            println!("{}", inspect_item(tree.kind().client(), id).await?);
        }
        Commands::Dangling { state } => {
            tree.set_dangling_included(matches!(state, Toggle::On))?;
            println!(
                "Dangling images are now {}.",
                if matches!(state, Toggle::On) { "included" } else { "excluded" }
            );
        }
        command @ Commands::Configure { .. } => {
            let changes = setting_changes(command);
            if changes.is_empty() {
                let catalog = tree.kind().catalog();
                println!("Current settings: {:?}", tree.settings());
                println!("Properties:");
                for property in catalog.iter() {
                    let roles: Vec<String> = property.roles.iter().map(|r| r.to_string()).collect();
                    println!("  {} ({})", property.name, roles.join(", "));
                }
            }
            for change in changes {
                let settings = tree.configure(change)?;
                log::debug!("main: Settings are now {settings:?}");
            }
        }
        Commands::Reset => {
            tree.reset_settings()?;
            println!("Tree settings restored to defaults.");
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if let Err(e) = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto) {
        eprintln!("Failed to initialize logger: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("main: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
