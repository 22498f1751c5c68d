use anyhow::Context;
use clap::{Parser, Subcommand};
use drive_core::config::{
    base_url_from_env_value, millis_from_env_value, optional_secs_from_env_value,
    surface_command_from_env_value,
};
use drive_core::constants::{
    DEFAULT_LAUNCHER_COMMAND, DEFAULT_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use drive_core::model::format_bytes;
use drive_core::{
    ClientConfig, CommandSurface, EditBackend, EditPhase, EditSyncCoordinator, ExternalSurface,
    FileHandle, HttpDriveClient, LauncherSurface, Notice, Notifier, PreviewStrategy,
    SessionContext, UploadRequest, Visibility,
};
use drive_types::{NonEmptyText, ResourceId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "drive")]
#[command(about = "Cloud drive client with external plain-text editing")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the signed-in user and storage usage
    Whoami,
    /// End the session on the backend
    Logout,
    /// List the root of the drive
    List,
    /// List the contents of a folder
    Folder {
        /// Folder ID
        id: ResourceId,
    },
    /// List files in the trash
    TrashList,
    /// Show file metadata
    Show {
        /// File ID
        id: ResourceId,
    },
    /// Print a text file or the preview URL of an image
    Preview {
        /// File ID
        id: ResourceId,
    },
    /// Edit a plain-text file externally and wait for the edits to sync back
    Edit {
        /// File ID
        id: ResourceId,
    },
    /// Move a file to the trash
    Trash {
        /// File ID
        id: ResourceId,
    },
    /// Restore a file from the trash
    Restore {
        /// File ID
        id: ResourceId,
    },
    /// Delete a trashed file permanently
    Delete {
        /// File ID
        id: ResourceId,
    },
    /// Download a file
    Download {
        /// File ID
        id: ResourceId,
        /// Destination path
        dest: PathBuf,
    },
    /// Create a folder at the drive root
    Mkdir {
        /// Folder name
        name: String,
    },
    /// Upload one or more files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Make the uploaded files public
        #[arg(long)]
        public: bool,
        /// Target folder ID (defaults to the drive root)
        #[arg(long)]
        parent: Option<ResourceId>,
    },
}

/// Prints notices to stderr so stdout stays clean for command output.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Loading(message) | Notice::Success(message) => eprintln!("{}", message),
            Notice::Error(message) => eprintln!("error: {}", message),
            Notice::Dismiss => {}
        }
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn load_config() -> anyhow::Result<ClientConfig> {
    let cfg = ClientConfig::new(
        base_url_from_env_value(env("DRIVE_BASE_URL"))?,
        millis_from_env_value(env("DRIVE_POLL_INTERVAL_MS"), DEFAULT_POLL_INTERVAL_MS)?,
        optional_secs_from_env_value(env("DRIVE_EDIT_TIMEOUT_SECS"))?,
        optional_secs_from_env_value(env("DRIVE_REQUEST_TIMEOUT_SECS"))?
            .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
    )?;
    Ok(cfg)
}

fn load_session() -> anyhow::Result<SessionContext> {
    match env("DRIVE_SESSION_COOKIE") {
        Some(cookie) if !cookie.trim().is_empty() => Ok(SessionContext::with_cookie(cookie)?),
        _ => Ok(SessionContext::anonymous()),
    }
}

fn print_files(files: &[FileHandle]) {
    if files.is_empty() {
        println!("No files found.");
        return;
    }
    for file in files {
        let created = file
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{}\t{}\t{}\t{}\t{}",
            file.id,
            kind_label(file),
            file.name,
            format_bytes(file.size),
            created
        );
    }
}

fn kind_label(file: &FileHandle) -> &'static str {
    if file.is_file() {
        "file"
    } else {
        "folder"
    }
}

async fn edit(cfg: &ClientConfig, client: HttpDriveClient, id: &ResourceId) -> anyhow::Result<()> {
    let client = client
        .authenticate()
        .await
        .context("edit requires a signed-in session (set DRIVE_SESSION_COOKIE)")?;
    let file = client.get_file(id).await?;
    if !file.is_editable_text() {
        anyhow::bail!("{} is not a plain-text file", file.name);
    }

    // A foreground command signals the end of editing by exiting. The desktop launcher exits
    // immediately, so with it the user confirms in the terminal instead.
    let (surface, launcher): (Arc<dyn ExternalSurface>, Option<Arc<LauncherSurface>>) =
        match surface_command_from_env_value(env("DRIVE_SURFACE_COMMAND")) {
            Some((program, args)) => (Arc::new(CommandSurface::new(program, args)), None),
            None => {
                let launcher = Arc::new(LauncherSurface::new(CommandSurface::new(
                    DEFAULT_LAUNCHER_COMMAND,
                    vec![],
                )));
                (launcher.clone(), Some(launcher))
            }
        };
    let coordinator = EditSyncCoordinator::for_session(
        cfg,
        client.session().clone(),
        surface,
        Arc::new(StderrNotifier),
    )?;

    coordinator.select_file(file).await;
    coordinator.request_external_edit().await;
    if coordinator.phase() == EditPhase::Editing {
        match launcher {
            Some(launcher) => {
                eprintln!("Press Enter once you have finished editing...");
                tokio::task::spawn_blocking(move || {
                    let mut line = String::new();
                    match std::io::stdin().read_line(&mut line) {
                        Ok(n) if n > 0 => launcher.finish_all(),
                        // Without a terminal there is no end-of-editing signal; the session
                        // ends only through DRIVE_EDIT_TIMEOUT_SECS.
                        Ok(_) => tracing::warn!(
                            "stdin closed, set DRIVE_SURFACE_COMMAND to a foreground editor command"
                        ),
                        Err(e) => tracing::warn!("failed to read confirmation: {}", e),
                    }
                });
            }
            None => eprintln!("Waiting for the editor to close..."),
        }
    }

    match coordinator.wait_until_settled().await {
        EditPhase::Synced => {
            let content = coordinator
                .active_file()
                .and_then(|f| f.content)
                .unwrap_or_default();
            println!("{}", content);
            Ok(())
        }
        phase => {
            let reason = coordinator
                .edit_session()
                .and_then(|s| s.failure)
                .map(|f| format!("{:?}", f))
                .unwrap_or_else(|| phase.to_string());
            anyhow::bail!("edit session for {} ended: {}", id, reason)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("drive=info".parse()?)
                .add_directive("drive_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = load_config()?;
    let client = HttpDriveClient::new(&cfg, load_session()?)?;
    tracing::debug!("using backend {}", cfg.base_url());

    match cli.command {
        Some(Commands::Whoami) => {
            let user = client.check_session().await?;
            println!("Name: {}", user.display_name);
            println!("Email: {}", user.email);
            println!(
                "Storage: {} of {} ({:.1}%)",
                format_bytes(user.total_storage_used),
                format_bytes(user.storage_limit),
                user.storage_percent_used()
            );
        }
        Some(Commands::Logout) => {
            client.logout().await?;
            println!("Logged out.");
        }
        Some(Commands::List) => print_files(&client.list_files().await?),
        Some(Commands::Folder { id }) => print_files(&client.list_folder(&id).await?),
        Some(Commands::TrashList) => print_files(&client.list_trash().await?),
        Some(Commands::Show { id }) => {
            let file = client.get_file(&id).await?;
            println!("ID: {}", file.id);
            println!("Name: {}", file.name);
            println!("Kind: {}", kind_label(&file));
            println!("Type: {}", file.media_type);
            println!("Size: {}", format_bytes(file.size));
            println!(
                "Visibility: {}",
                if file.visibility.is_public() {
                    "public"
                } else {
                    "private"
                }
            );
            if let Some(parent) = &file.parent {
                println!("Parent: {}", parent);
            }
            if let Some(created) = file.created_at {
                println!("Created: {}", created.to_rfc3339());
            }
            if let Some(deleted) = file.deleted_at {
                println!("Trashed: {}", deleted.to_rfc3339());
            }
        }
        Some(Commands::Preview { id }) => {
            let file = client.get_file(&id).await?;
            match file.preview_strategy() {
                PreviewStrategy::InlineText => {
                    println!("{}", client.fetch_content(&id).await?);
                }
                PreviewStrategy::SignedImage => {
                    println!("{}", client.resolve_signed_url(&id).await?);
                }
                PreviewStrategy::None => {
                    println!(
                        "No preview available for {}. Use 'drive download' instead.",
                        file.media_type
                    );
                }
            }
        }
        Some(Commands::Edit { id }) => edit(&cfg, client, &id).await?,
        Some(Commands::Trash { id }) => {
            client.move_to_trash(&id).await?;
            println!("Moved {} to trash", id);
        }
        Some(Commands::Restore { id }) => {
            client.restore(&id).await?;
            println!("Restored {}", id);
        }
        Some(Commands::Delete { id }) => {
            client.delete_permanently(&id).await?;
            println!("Deleted {} permanently", id);
        }
        Some(Commands::Download { id, dest }) => {
            let written = client.download_to(&id, &dest).await?;
            println!("Saved {} to {}", format_bytes(written), dest.display());
        }
        Some(Commands::Mkdir { name }) => {
            let folder = client.create_folder(&NonEmptyText::new(&name)?).await?;
            println!("Created folder {} ({})", folder.name, folder.id);
        }
        Some(Commands::Upload {
            paths,
            public,
            parent,
        }) => {
            let count = paths.len();
            client
                .upload(&UploadRequest {
                    paths,
                    visibility: Visibility::from(public),
                    parent,
                })
                .await?;
            println!("Uploaded {} file(s)", count);
        }
        None => {
            println!("Use 'drive --help' for commands");
        }
    }

    Ok(())
}
