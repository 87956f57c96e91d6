use clap::Args;
use colored::Colorize;
use postbox_email::{EnqueueEmailRequest, EnqueueOutcome};

use super::context::{AppContext, ConnectionArgs};

#[derive(Args)]
pub struct EnqueueCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Recipient address
    #[arg(long)]
    pub to: String,

    /// Template name
    #[arg(long)]
    pub template: String,

    /// Carbon-copy recipient, repeatable
    #[arg(long)]
    pub cc: Vec<String>,

    /// Attachment fingerprint from `attachment add`, repeatable
    #[arg(long = "attachment")]
    pub attachments: Vec<String>,

    /// Template parameter as name=value, repeatable
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,
}

/// Split `name=value` on the first `=`; the value may be empty
fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("parameter name is empty in '{}'", raw));
    }
    Ok((name.to_string(), value.to_string()))
}

impl EnqueueCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    fn request(&self) -> EnqueueEmailRequest {
        EnqueueEmailRequest {
            receiver: self.to.clone(),
            cc_receivers: self.cc.clone(),
            template_name: self.template.clone(),
            attachment_fingerprints: self.attachments.clone(),
            parameters: self.params.iter().cloned().collect(),
        }
    }

    async fn run(self) -> anyhow::Result<()> {
        let ctx = AppContext::connect(self.connection.to_config()).await?;

        match ctx.service.enqueue(self.request()).await? {
            EnqueueOutcome::Queued(id) => {
                println!("{} {}", "Queued email".bright_green(), id);
                Ok(())
            }
            EnqueueOutcome::MissingAttachments { requested, found } => anyhow::bail!(
                "only {} of {} attachment(s) exist, nothing was queued",
                found,
                requested
            ),
        }
    }
}
