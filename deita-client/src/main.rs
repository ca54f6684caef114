mod display;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use deita::backend::HttpBackend;
use deita::config::{CliConfig, ClientConfig};
use deita::explorer::{Explorer, Notification};
use deita::join_builder::{AddTableOutcome, JoinDialog, JoinPhase, JoinType};
use rustyline::{error::ReadlineError, DefaultEditor};

/// Deita - browse, join and export workspace tables one page at a time
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Deita API base URL, including the version prefix
    #[arg(short, long, env = "DEITA_API_URL")]
    url: Option<String>,

    /// Workspace to open
    #[arg(short, long, env = "DEITA_WORKSPACE_ID")]
    workspace: Option<String>,

    /// Bearer token for the API
    #[arg(long, env = "DEITA_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Directory CSV exports are written to
    #[arg(long, env = "DEITA_EXPORT_DIR")]
    export_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, env = "DEITA_REQUEST_TIMEOUT_SECS")]
    timeout: Option<u64>,

    /// YAML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl From<&Args> for CliConfig {
    fn from(args: &Args) -> Self {
        CliConfig {
            api_url: args.url.clone(),
            workspace_id: args.workspace.clone(),
            api_token: args.token.clone(),
            export_dir: args.export_dir.clone(),
            request_timeout_secs: args.timeout,
        }
    }
}

fn print_usage() {
    println!("Deita Client Commands:");
    println!("  <query>                    - Run a SELECT query (default)");
    println!("  :tables                    - List workspace tables");
    println!("  :reload                    - Reload the table list");
    println!("  :use <table>               - Query a single table");
    println!("  :join <table>              - Start a join from <table>");
    println!("  :add <table>               - Add a table to the join");
    println!("  :anchor <table>            - Pick the joined table the new one attaches to");
    println!("  :on <left> <right> [type]  - Confirm join fields (type: INNER, LEFT, RIGHT, FULL)");
    println!("  :cancel                    - Abandon the join in progress");
    println!("  :reset                     - Clear all joins");
    println!("  :next / :prev              - Next / previous page");
    println!("  :first / :last             - First / last page");
    println!("  :count                     - Count rows of the current query");
    println!("  :export                    - Export the full result to CSV");
    println!("  :save <name>               - Save the current query");
    println!("  :queries                   - List saved queries");
    println!("  :open <n|name>             - Run a saved query");
    println!("  :delete <n|name>           - Delete a saved query");
    println!("  :show                      - Show the current query and page");
    println!("  :help                      - Show this help");
    println!("  :quit                      - Exit");
    println!();
    println!("Examples:");
    println!("  :join orders");
    println!("  :add customers");
    println!("  :on customer_id id LEFT");
    println!("  SELECT * FROM \"orders\" WHERE total > 100");
}

fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let cli = CliConfig::from(args);
    let config = match &args.config {
        Some(path) => {
            let mut config = ClientConfig::from_yaml_file(path)?;
            config.merge(cli)?;
            config
        }
        None => ClientConfig::from_cli(cli)?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to INFO, overridable with RUST_LOG
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = load_config(&args)?;

    let backend = HttpBackend::new(&config)?;
    let mut explorer = Explorer::new(Arc::new(backend), config.export_dir.clone());

    match explorer.load_catalog().await {
        Ok(n) => println!("\nConnected to {} ({} tables).", config.api_base(), n),
        Err(e) => eprintln!("Could not load tables: {}", e),
    }
    println!("Type :help for commands.\n");

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("deita :) ");
        match readline {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                rl.add_history_entry(input)?;

                if input.starts_with(':') {
                    let parts: Vec<&str> = input.splitn(2, ' ').collect();
                    let cmd = parts[0];
                    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

                    if matches!(cmd, ":quit" | ":q") {
                        break;
                    }
                    if let Err(e) = run_command(&mut explorer, cmd, arg).await {
                        eprintln!("Error: {}", e);
                    }
                } else if let Err(e) = explorer.run_query(input) {
                    eprintln!("Error: {}", e);
                }

                explorer.settle().await;
                report(&mut explorer);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("\nBye.");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

async fn run_command(explorer: &mut Explorer, cmd: &str, arg: &str) -> anyhow::Result<()> {
    match cmd {
        ":help" | ":h" => print_usage(),
        ":tables" | ":t" => println!("\n{}\n", display::render_catalog(explorer.catalog())),
        ":reload" => {
            let n = explorer.load_catalog().await?;
            println!("Loaded {} tables.", n);
        }
        ":use" => explorer.select_table(required(arg, ":use <table>")?)?,
        ":join" => {
            let table = required(arg, ":join <table>")?;
            explorer.enter_join_mode();
            explorer.start_join(table)?;
            println!("Join started. Add a table with :add <table>.");
        }
        ":add" => match explorer.add_table_to_join(required(arg, ":add <table>")?)? {
            AddTableOutcome::DialogOpened(dialog) => print_dialog(explorer, &dialog),
            AddTableOutcome::AnchorRequired { candidates } => {
                let names: Vec<String> = candidates
                    .iter()
                    .map(|id| table_name(explorer, id.as_str()))
                    .collect();
                println!("Attach to which table? :anchor <{}>", names.join("|"));
            }
        },
        ":anchor" => {
            let existing = required(arg, ":anchor <table>")?;
            let JoinPhase::AwaitingAnchorSelection { pending } = explorer.builder().phase() else {
                anyhow::bail!("No table is waiting for an anchor");
            };
            let pending = pending.clone();
            let dialog = explorer.select_join_anchor(existing, pending.as_str())?;
            print_dialog(explorer, &dialog);
        }
        ":on" => {
            let fields: Vec<&str> = arg.split_whitespace().collect();
            let (left_field, right_field, join_type) = match fields.as_slice() {
                [l, r] => (*l, *r, JoinType::default()),
                [l, r, t] => (*l, *r, t.parse::<JoinType>()?),
                _ => anyhow::bail!("Usage: :on <left_field> <right_field> [type]"),
            };
            let JoinPhase::AwaitingJoinCondition(dialog) = explorer.builder().phase() else {
                anyhow::bail!("No join condition is awaiting confirmation");
            };
            let dialog = dialog.clone();
            explorer.confirm_join_edge(
                dialog.left.as_str(),
                dialog.right.as_str(),
                left_field,
                right_field,
                join_type,
            )?;
        }
        ":cancel" => {
            explorer.cancel_join();
            println!("Join cancelled.");
        }
        ":reset" => {
            explorer.reset_join();
            println!("Joins cleared.");
        }
        ":next" | ":n" => no_op_hint(explorer.next_page()?, "Already on the last page."),
        ":prev" | ":p" => no_op_hint(explorer.previous_page()?, "Already on the first page."),
        ":first" => no_op_hint(explorer.first_page()?, "Already on the first page."),
        ":last" => no_op_hint(explorer.last_page()?, "Already on the last page."),
        ":count" => explorer.fetch_count()?,
        ":export" => explorer.export_csv()?,
        ":save" => explorer.save_query(arg)?,
        ":queries" => {
            let queries = explorer.refresh_saved_queries().await?;
            println!("\n{}\n", display::render_saved_queries(queries));
        }
        ":open" => explorer.open_saved_query(required(arg, ":open <n|name>")?)?,
        ":delete" => {
            let deleted = explorer.delete_saved_query(required(arg, ":delete <n|name>")?).await?;
            println!("Deleted '{}'.", deleted.name);
        }
        ":show" => print_page(explorer),
        _ => println!(
            "Unknown command: {}. Type :help for available commands.",
            cmd
        ),
    }
    Ok(())
}

fn required<'a>(arg: &'a str, usage: &str) -> anyhow::Result<&'a str> {
    if arg.is_empty() {
        anyhow::bail!("Usage: {}", usage);
    }
    Ok(arg)
}

fn no_op_hint(issued: bool, hint: &str) {
    if !issued {
        println!("{}", hint);
    }
}

fn table_name(explorer: &Explorer, id: &str) -> String {
    explorer
        .catalog()
        .resolve(id)
        .map(|t| t.display_name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn print_dialog(explorer: &Explorer, dialog: &JoinDialog) {
    let left = table_name(explorer, dialog.left.as_str());
    let right = table_name(explorer, dialog.right.as_str());
    println!(
        "Joining {} to {}. Confirm with :on <{} field> <{} field> [type]",
        right, left, left, right
    );
}

fn report(explorer: &mut Explorer) {
    let notifications = explorer.take_notifications();
    let show_page = notifications.iter().any(|n| {
        matches!(
            n,
            Notification::PageLoaded { .. } | Notification::Counted(_)
        )
    });

    for notification in &notifications {
        match notification {
            Notification::Failed { .. } => eprintln!("{}", notification),
            Notification::PageLoaded { .. } => {}
            _ => println!("{}", notification),
        }
    }
    if show_page {
        print_page(explorer);
    }
}

fn print_page(explorer: &Explorer) {
    let session = explorer.session();
    let Some(query) = session.query() else {
        println!("No query yet. Type a query or :use <table>.");
        return;
    };
    println!("\n{}\n", query);
    if session.columns().is_empty() && session.rows().is_empty() {
        return;
    }
    println!("{}", display::render_table(session.columns(), session.rows()));
    if let Some(message) = session.pagination_message() {
        match session.elapsed() {
            Some(secs) => println!("\n{} ({:.3}s)\n", message, secs),
            None => println!("\n{}\n", message),
        }
    }
}
