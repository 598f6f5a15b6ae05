// export.rs — Write the JSON backup and Markdown projections.
//
// The backup is what `nha check` restores from, so it is only written from a
// trust source that passed full validation.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use nha_policy::GateConfig;

#[derive(Args)]
pub struct ExportArgs {
    /// Backup projection path (defaults to the configured backup path).
    #[arg(long)]
    json: Option<PathBuf>,
    /// Markdown overview path (defaults to .nha/REGISTRY.md).
    #[arg(long)]
    markdown: Option<PathBuf>,
    /// Skip the Markdown overview.
    #[arg(long)]
    no_markdown: bool,
}

pub fn execute(args: &ExportArgs, config: &GateConfig) -> anyhow::Result<()> {
    let registry = nha_registry::load(&config.registry_path).with_context(|| {
        format!(
            "refusing to export: {} did not validate",
            config.registry_path.display()
        )
    })?;

    let backup = args.json.clone().unwrap_or_else(|| config.backup_path.clone());
    nha_registry::write_backup(&registry, &backup)?;
    println!(
        "Backup:   {} ({} agent(s), version {})",
        backup.display(),
        registry.len(),
        registry.version
    );

    if !args.no_markdown {
        let markdown = args
            .markdown
            .clone()
            .unwrap_or_else(|| config.markdown_path.clone());
        nha_registry::write_markdown(&registry, &markdown)?;
        println!("Markdown: {}", markdown.display());
    }
    Ok(())
}
