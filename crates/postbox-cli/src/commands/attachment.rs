use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use colored::Colorize;

use super::context::{AppContext, ConnectionArgs};

#[derive(Args)]
pub struct AttachmentCommand {
    #[command(subcommand)]
    pub action: AttachmentAction,
}

#[derive(Subcommand)]
pub enum AttachmentAction {
    /// Store a file and print its fingerprint
    Add {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// File to upload
        path: PathBuf,
        /// Name sent to recipients, defaults to the file name
        #[arg(long)]
        name: Option<String>,
    },
    /// List stored attachments
    List {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
    /// Delete every attachment stored under a fingerprint
    Delete {
        #[command(flatten)]
        connection: ConnectionArgs,
        hash: String,
    },
}

fn display_name(path: &Path, name: Option<String>) -> anyhow::Result<String> {
    match name {
        Some(name) => Ok(name),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("{} has no file name, pass --name", path.display())),
    }
}

impl AttachmentCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        match self.action {
            AttachmentAction::Add {
                connection,
                path,
                name,
            } => {
                let file_name = display_name(&path, name)?;
                let content = tokio::fs::read(&path)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;

                let ctx = AppContext::connect(connection.to_config()).await?;
                let hash = ctx.service.attachments().add_file(&file_name, &content).await?;
                println!(
                    "{} {} {}",
                    file_name.bright_white().bold(),
                    "->".dimmed(),
                    hash.bright_cyan()
                );
            }
            AttachmentAction::List { connection } => {
                let ctx = AppContext::connect(connection.to_config()).await?;
                let files = ctx.service.attachments().list_files().await?;
                if files.is_empty() {
                    println!("{}", "No attachments stored".bright_yellow());
                }
                for file in files {
                    let mime = mime_guess::from_path(&file.file_name).first_or_octet_stream();
                    println!(
                        "{}  {}  {}",
                        file.original_hash.bright_cyan(),
                        file.file_name.bright_white(),
                        mime.essence_str().dimmed()
                    );
                }
            }
            AttachmentAction::Delete { connection, hash } => {
                let ctx = AppContext::connect(connection.to_config()).await?;
                let removed = ctx.service.attachments().delete_file(&hash).await?;
                if removed == 0 {
                    println!("{} {}", "No attachment stored under".bright_yellow(), hash);
                } else {
                    println!("{} {} attachment(s)", "Deleted".bright_green(), removed);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_defaults_to_file_name() {
        let path = Path::new("/tmp/reports/invoice-42.pdf");
        assert_eq!(display_name(path, None).unwrap(), "invoice-42.pdf");
        assert_eq!(
            display_name(path, Some("Invoice.pdf".to_string())).unwrap(),
            "Invoice.pdf"
        );
        assert!(display_name(Path::new("/"), None).is_err());
    }
}
