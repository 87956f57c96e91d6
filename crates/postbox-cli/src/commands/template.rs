use std::path::PathBuf;

use clap::{Args, Subcommand};
use colored::Colorize;
use postbox_core::PaginationParams;
use postbox_email::TemplateInput;
use uuid::Uuid;

use super::context::{AppContext, ConnectionArgs};

#[derive(Args)]
pub struct TemplateCommand {
    #[command(subcommand)]
    pub action: TemplateAction,
}

#[derive(Subcommand)]
pub enum TemplateAction {
    /// Create a template
    Add(TemplateWriteArgs),
    /// List templates ordered by name
    List(TemplateListArgs),
    /// Replace a template's name, subject and body
    Update(TemplateUpdateArgs),
    /// Delete a template and every email queued against it
    Delete(TemplateDeleteArgs),
}

/// Body source: inline `--content` or a file
#[derive(Args)]
pub struct TemplateWriteArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(long)]
    pub name: String,

    /// Subject line, may contain ${placeholders}
    #[arg(long)]
    pub subject: String,

    /// HTML body, may contain ${placeholders}
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub content: Option<String>,

    /// Read the HTML body from a file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl TemplateWriteArgs {
    fn input(&self) -> anyhow::Result<TemplateInput> {
        let content = match (&self.content, &self.file) {
            (Some(content), _) => content.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?,
            (None, None) => anyhow::bail!("either --content or --file is required"),
        };

        Ok(TemplateInput {
            name: self.name.clone(),
            subject: self.subject.clone(),
            content,
        })
    }
}

#[derive(Args)]
pub struct TemplateListArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(long, default_value_t = 1)]
    pub page: u64,

    #[arg(long, default_value_t = 20)]
    pub page_size: u64,
}

#[derive(Args)]
pub struct TemplateUpdateArgs {
    pub id: Uuid,

    #[command(flatten)]
    pub template: TemplateWriteArgs,
}

#[derive(Args)]
pub struct TemplateDeleteArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    pub id: Uuid,
}

impl TemplateCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        match self.action {
            TemplateAction::Add(args) => {
                let input = args.input()?;
                let ctx = AppContext::connect(args.connection.to_config()).await?;
                let template = ctx.service.templates().add(input).await?;
                println!(
                    "{} {} ({})",
                    "Created template".bright_green(),
                    template.name.bright_white().bold(),
                    template.id
                );
            }
            TemplateAction::List(args) => {
                let ctx = AppContext::connect(args.connection.to_config()).await?;
                let (templates, total) = ctx
                    .service
                    .templates()
                    .list(PaginationParams {
                        page: Some(args.page),
                        page_size: Some(args.page_size),
                    })
                    .await?;

                if templates.is_empty() {
                    println!("{}", "No templates found".bright_yellow());
                }
                for template in &templates {
                    println!(
                        "{}  {}  {}",
                        template.id.to_string().dimmed(),
                        template.name.bright_white().bold(),
                        template.subject
                    );
                }
                println!("{} template(s) in total", total);
            }
            TemplateAction::Update(args) => {
                let input = args.template.input()?;
                let ctx = AppContext::connect(args.template.connection.to_config()).await?;
                let template = ctx.service.templates().update(args.id, input).await?;
                println!(
                    "{} {}",
                    "Updated template".bright_green(),
                    template.name.bright_white().bold()
                );
            }
            TemplateAction::Delete(args) => {
                let ctx = AppContext::connect(args.connection.to_config()).await?;
                ctx.service.templates().delete(args.id).await?;
                println!("{} {}", "Deleted template".bright_green(), args.id);
            }
        }
        Ok(())
    }
}
