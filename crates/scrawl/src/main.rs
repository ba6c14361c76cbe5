use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scrawl_notebook::cell::CellContent;
use scrawl_notebook::notebook::Notebook;
use scrawl_notebook::{ipynb, transport, NotebookStore, Severity};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "scrawl", about = "Run and manage Rhai notebooks", version)]
struct Cli {
    /// Fetch a notebook from this URL on startup
    #[arg(long)]
    url: Option<String>,

    /// Load a notebook from the local store by title on startup
    #[arg(long = "ls", value_name = "TITLE")]
    stored: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every cell of a notebook file, in order
    Run {
        path: PathBuf,
        /// Write the executed notebook back to the file
        #[arg(long)]
        save: bool,
    },
    /// Fetch a notebook from a URL
    Fetch {
        url: String,
        /// Keep the fetched notebook in the local store
        #[arg(long)]
        store: bool,
    },
    /// Post a notebook file to a URL
    Push { url: String, path: PathBuf },
    /// Copy a notebook file into the local store
    Store { path: PathBuf },
    /// Load a notebook from the local store (defaults to the last opened)
    Load {
        title: Option<String>,
        /// Run the notebook after loading
        #[arg(long)]
        run: bool,
    },
    /// List notebooks in the local store
    Ls,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { path, save }) => run_file(&path, save).await,
        Some(Commands::Fetch { url, store }) => fetch(&url, store).await,
        Some(Commands::Push { url, path }) => push(&url, &path).await,
        Some(Commands::Store { path }) => store_file(&path),
        Some(Commands::Load { title, run }) => load_stored(title, run).await,
        Some(Commands::Ls) => list_stored(),
        None => bootstrap(cli.url, cli.stored).await,
    }
}

/// Startup without a subcommand: a URL wins, then a stored title, then a
/// fresh notebook with one empty code cell.
async fn bootstrap(url: Option<String>, stored: Option<String>) -> Result<()> {
    if let Some(url) = url {
        let (title, document) = transport::fetch(&url)
            .await
            .with_context(|| format!("failed to fetch notebook from {url}"))?;
        let mut notebook = Notebook::from_document(title, document)
            .context("failed to open fetched notebook")?;
        notebook.run_all().await?;
        print_notebook(&notebook);
        return Ok(());
    }

    if let Some(title) = stored {
        return load_stored(Some(title), true).await;
    }

    let notebook = Notebook::new_empty();
    print_notebook(&notebook);
    Ok(())
}

async fn run_file(path: &Path, save: bool) -> Result<()> {
    let (title, document) =
        ipynb::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut notebook = Notebook::from_document(title, document)
        .with_context(|| format!("failed to open {}", path.display()))?;
    notebook.run_all().await?;
    print_notebook(&notebook);

    if save {
        notebook
            .to_document()
            .write_to(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("saved {}", path.display());
    }
    Ok(())
}

async fn fetch(url: &str, store: bool) -> Result<()> {
    let (title, document) = transport::fetch(url)
        .await
        .with_context(|| format!("failed to fetch notebook from {url}"))?;
    println!("fetched \"{title}\" ({} cells)", document.cells.len());

    if store {
        NotebookStore::open_default()
            .store(&title, &document)
            .with_context(|| format!("failed to store \"{title}\""))?;
        println!("stored \"{title}\"");
    }
    Ok(())
}

async fn push(url: &str, path: &Path) -> Result<()> {
    let (title, document) =
        ipynb::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    transport::push(url, &document)
        .await
        .with_context(|| format!("failed to post \"{title}\" to {url}"))?;
    println!("posted \"{title}\" to {url}");
    Ok(())
}

fn store_file(path: &Path) -> Result<()> {
    let (title, document) =
        ipynb::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    NotebookStore::open_default()
        .store(&title, &document)
        .with_context(|| format!("failed to store \"{title}\""))?;
    println!("stored \"{title}\"");
    Ok(())
}

async fn load_stored(title: Option<String>, run: bool) -> Result<()> {
    let store = NotebookStore::open_default();
    let Some(title) = title.or_else(|| store.last_opened()) else {
        bail!("no stored notebooks; pass a title or store one first");
    };
    let title = ipynb::title_for(&title).to_string();

    let document = store
        .load(&title)
        .with_context(|| format!("failed to load \"{title}\" from the local store"))?;
    let mut notebook = Notebook::from_document(title.as_str(), document)
        .context("failed to open stored notebook")?;
    if run {
        notebook.run_all().await?;
    }
    print_notebook(&notebook);
    Ok(())
}

fn list_stored() -> Result<()> {
    let store = NotebookStore::open_default();
    let titles = store.list().context("failed to read the local store")?;
    if titles.is_empty() {
        println!("no stored notebooks");
        return Ok(());
    }
    for title in titles {
        println!("{title}");
    }
    Ok(())
}

fn print_notebook(notebook: &Notebook) {
    println!("# {}", notebook.title());
    for (index, cell) in notebook.cells().iter().enumerate() {
        match &cell.content {
            CellContent::Code {
                execution_count,
                messages,
                output,
            } => {
                println!("\n[{index}] code (run {execution_count} times)");
                for line in cell.source.lines() {
                    println!("    {line}");
                }
                for message in messages {
                    let tag = match message.severity {
                        Severity::Log => "log",
                        Severity::Error => "error",
                        Severity::Debug => "debug",
                    };
                    println!("  {tag}: {}", message.text);
                }
                if let Some(output) = output {
                    println!("  => {output}");
                }
            }
            CellContent::Markdown { rendered, .. } => {
                let view = if *rendered { "preview" } else { "edit" };
                println!("\n[{index}] markdown ({view})");
                for line in cell.source.lines() {
                    println!("    {line}");
                }
            }
        }
    }
}
