//! nbfiddle CLI entry point.
//!
//! Opens, renders, imports and exports notebooks kept in the local store,
//! and saves them to GitHub Gists.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use nbfiddle::config::{config_dir, load_default_config, Config, RuntimePaths};
use nbfiddle::credentials::{
    load_default_credentials, resolve_github_token, store_credential, GithubToken,
    GITHUB_TOKEN_KEY,
};
use nbfiddle::format::Format;
use nbfiddle::locator::{NotebookParams, StorageKey};
use nbfiddle::logging::{init_cli, init_production};
use nbfiddle::notebook::{Cell, CellKind};
use nbfiddle::remote::{GithubClient, RemoteHost};
use nbfiddle::render::{render_page, withheld_count};
use nbfiddle::session::{import_file, import_pasted, NotebookSession};
use nbfiddle::storage::{Autosave, NotebookStore};

/// Notebooks with GitHub/Gist sync and a trust gate for HTML output.
#[derive(Parser)]
#[command(name = "nbfiddle", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Notebook address shared by subcommands.
#[derive(Args, Debug, Clone, Default)]
struct Target {
    /// GitHub blob URL or Gist URL (`#` may be written as `%23`).
    #[arg(long)]
    url: Option<String>,
    /// Local notebook name. Omit both options for the default notebook.
    #[arg(long)]
    localname: Option<String>,
    /// Raw app query string, e.g. `url=...&localname=...`.
    #[arg(long, conflicts_with_all = ["url", "localname"])]
    query: Option<String>,
}

impl Target {
    fn params(&self) -> anyhow::Result<NotebookParams> {
        if let Some(query) = &self.query {
            return Ok(NotebookParams::parse_query(query)?);
        }
        let mut params = match &self.url {
            Some(url) => NotebookParams::remote(url)?,
            None => NotebookParams::default(),
        };
        params.localname = NotebookParams::local(self.localname.as_deref()).localname;
        Ok(params)
    }
}

/// Export format names.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// nbformat JSON.
    Ipynb,
    /// Jupytext percent text.
    Py,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Ipynb => Format::Ipynb,
            FormatArg::Py => Format::Jupytext,
        }
    }
}

/// Cell kinds accepted by `add-cell`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    /// Code cell.
    Code,
    /// Markdown cell.
    Markdown,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Open a notebook and print a summary.
    Open(Target),
    /// Render a notebook to a standalone HTML page.
    Render {
        /// Notebook to render.
        #[command(flatten)]
        target: Target,
        /// Output file (stdout when omitted).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Append a cell to a notebook and save it through the autosave writer.
    AddCell {
        /// Notebook to edit.
        #[command(flatten)]
        target: Target,
        /// Cell kind.
        #[arg(long, value_enum, default_value = "code")]
        kind: KindArg,
        /// Cell source.
        source: String,
    },
    /// Import an `.ipynb` or `.py` file (or `-` for stdin) as an untrusted local notebook.
    Import {
        /// File to import, or `-` to read pasted content from stdin.
        file: PathBuf,
        /// Local name (defaults to the file stem).
        #[arg(long)]
        name: Option<String>,
    },
    /// Export a notebook as ipynb or jupytext.
    Export {
        /// Notebook to export.
        #[command(flatten)]
        target: Target,
        /// Output format.
        #[arg(long, value_enum, default_value = "ipynb")]
        format: FormatArg,
        /// Output file or directory (stdout when omitted).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List stored notebooks.
    List,
    /// Delete a stored notebook by storage key.
    Delete {
        /// Storage key as shown by `list`.
        key: String,
    },
    /// Trust a notebook so its HTML outputs render.
    Trust(Target),
    /// Save a notebook as a new secret gist.
    SaveGist {
        /// Notebook to save.
        #[command(flatten)]
        target: Target,
        /// File name inside the gist (must end in `.ipynb`).
        #[arg(long)]
        file_name: String,
    },
    /// Write local edits back to the gist the notebook was opened from.
    UpdateGist(Target),
    /// Read a GitHub token from stdin and store it in the runtime `.env`.
    SetToken,
}

/// Shared state of one CLI invocation.
struct App {
    config: Config,
    paths: RuntimePaths,
    store: NotebookStore,
    host: Arc<dyn RemoteHost>,
}

impl App {
    async fn open_session(&self, target: &Target) -> anyhow::Result<NotebookSession> {
        let params = target.params()?;
        NotebookSession::open(
            self.store.clone(),
            Arc::clone(&self.host),
            params,
            self.config.app.base_url.clone(),
        )
        .await
        .context("failed to open notebook")
    }

    fn github_token(&self) -> anyhow::Result<GithubToken> {
        let credentials = load_default_credentials()
            .with_context(|| format!("failed to load {}", self.paths.env_file.display()))?;
        resolve_github_token(&credentials, |key| std::env::var(key).ok()).ok_or_else(|| {
            anyhow::anyhow!(
                "no GitHub token: set {GITHUB_TOKEN_KEY} or run `nbfiddle set-token`"
            )
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_default_config().context("failed to load configuration")?;
    let paths = RuntimePaths::new(&config_dir()?, config.storage.data_dir.as_deref());

    let _logging_guard = if config.logging.file {
        Some(init_production(&paths.logs_dir, &config.logging.level)?)
    } else {
        init_cli(&config.logging.level);
        None
    };

    let store = NotebookStore::open(&paths.notebooks_db)
        .await
        .with_context(|| format!("failed to open {}", paths.notebooks_db.display()))?;
    let host: Arc<dyn RemoteHost> = Arc::new(
        GithubClient::new(config.github.endpoints(), config.github.timeout())
            .context("failed to build GitHub client")?,
    );
    debug!(root = %paths.root.display(), "runtime paths resolved");

    let app = App {
        config,
        paths,
        store,
        host,
    };

    match cli.command {
        Command::Open(target) => handle_open(&app, &target).await,
        Command::Render { target, out } => handle_render(&app, &target, out.as_deref()).await,
        Command::AddCell {
            target,
            kind,
            source,
        } => handle_add_cell(&app, &target, kind, source).await,
        Command::Import { file, name } => handle_import(&app, &file, name.as_deref()).await,
        Command::Export {
            target,
            format,
            out,
        } => handle_export(&app, &target, format.into(), out.as_deref()).await,
        Command::List => handle_list(&app).await,
        Command::Delete { key } => handle_delete(&app, &key).await,
        Command::Trust(target) => handle_trust(&app, &target).await,
        Command::SaveGist { target, file_name } => {
            handle_save_gist(&app, &target, &file_name).await
        }
        Command::UpdateGist(target) => handle_update_gist(&app, &target).await,
        Command::SetToken => handle_set_token(&app),
    }
}

async fn handle_open(app: &App, target: &Target) -> anyhow::Result<()> {
    let session = app.open_session(target).await?;
    let rendered = session.render();
    let notebook = session.notebook();

    println!("key:           {}", session.key());
    println!("cells:         {}", notebook.len());
    println!("trusted:       {}", notebook.is_trusted());
    if let Some(path) = session.remote_file_path() {
        println!("remote file:   {path}");
        println!("local changes: {}", session.has_local_changes());
    }
    let withheld = withheld_count(&rendered);
    if withheld > 0 {
        println!(
            "withheld:      {withheld} HTML output(s); run `nbfiddle trust` to display them"
        );
    }
    Ok(())
}

async fn handle_render(app: &App, target: &Target, out: Option<&Path>) -> anyhow::Result<()> {
    let session = app.open_session(target).await?;
    let title = session
        .remote_file_path()
        .map_or_else(|| session.key().display_name().to_owned(), str::to_owned);
    let page = render_page(&title, &session.render());
    write_output(out, None, &page)
}

async fn handle_add_cell(
    app: &App,
    target: &Target,
    kind: KindArg,
    source: String,
) -> anyhow::Result<()> {
    let mut session = app.open_session(target).await?;
    let cell = match kind {
        KindArg::Code => Cell::new(CellKind::Code, source),
        KindArg::Markdown => Cell::new(CellKind::Markdown, source),
    };
    let id = session.edit(|notebook| Ok(notebook.push(cell)))?;

    let autosave = Autosave::spawn(app.store.clone(), app.config.autosave_debounce());
    session.schedule_save(&autosave).await?;
    autosave.shutdown().await;

    info!(key = %session.key(), cell = %id, "cell added");
    println!("{id}");
    Ok(())
}

async fn handle_import(app: &App, file: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let key = if file == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("failed to read stdin")?;
        import_pasted(&app.store, name.unwrap_or("pasted"), &content).await?
    } else {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("invalid file name: {}", file.display()))?;
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        import_file(&app.store, name.unwrap_or(stem), file_name, &content).await?
    };
    println!("imported as {key} (untrusted)");
    Ok(())
}

async fn handle_export(
    app: &App,
    target: &Target,
    format: Format,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let session = app.open_session(target).await?;
    let exported = session.export(format)?;
    write_output(out, Some(&exported.file_name), &exported.content)
}

async fn handle_list(app: &App) -> anyhow::Result<()> {
    for entry in app.store.list().await? {
        println!(
            "{:<7} {:<40} {:>5} cells {:>9} bytes  {}  {}",
            entry.kind.label(),
            entry.key,
            entry.num_cells,
            entry.size_bytes,
            if entry.is_trusted { "trusted  " } else { "untrusted" },
            entry.updated_at,
        );
    }
    Ok(())
}

async fn handle_delete(app: &App, key: &str) -> anyhow::Result<()> {
    let key = StorageKey::new(key);
    if !app.store.delete(&key).await? {
        anyhow::bail!("no stored notebook with key {key}");
    }
    println!("deleted {key}");
    Ok(())
}

async fn handle_trust(app: &App, target: &Target) -> anyhow::Result<()> {
    let mut session = app.open_session(target).await?;
    if session.grant_trust().await? {
        println!("{} is now trusted", session.key());
    } else {
        println!("{} was already trusted", session.key());
    }
    Ok(())
}

async fn handle_save_gist(app: &App, target: &Target, file_name: &str) -> anyhow::Result<()> {
    let token = app.github_token()?;
    let mut session = app.open_session(target).await?;
    let saved = session.save_as_gist(token.expose(), file_name).await?;
    println!("gist:  {}", saved.file_uri);
    println!("share: {}", saved.share_link);
    Ok(())
}

async fn handle_update_gist(app: &App, target: &Target) -> anyhow::Result<()> {
    let token = app.github_token()?;
    let mut session = app.open_session(target).await?;
    session.update_gist(token.expose()).await?;
    println!("updated {}", session.key());
    Ok(())
}

fn handle_set_token(app: &App) -> anyhow::Result<()> {
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read token from stdin")?;
    let token = GithubToken::new(&line).ok_or_else(|| anyhow::anyhow!("empty token"))?;
    store_credential(&app.paths.env_file, GITHUB_TOKEN_KEY, token.expose())?;
    println!("token stored in {}", app.paths.env_file.display());
    Ok(())
}

/// Write to `out` (a file, or a directory joined with `default_name`) or stdout.
fn write_output(out: Option<&Path>, default_name: Option<&str>, content: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            let path = match default_name {
                Some(name) if path.is_dir() => path.join(name),
                _ => path.to_path_buf(),
            };
            std::fs::write(&path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .context("failed to write stdout")?;
        }
    }
    Ok(())
}
