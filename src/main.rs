mod settings;

use crate::settings::Settings;
use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use ipapk::{inspect, AaptBadging, AppMetadata, InspectOptions, LabelOverride, NoLabelOverride};
use log::{error, info};
use std::path::{Path, PathBuf};

#[derive(clap::Parser)]
#[command(version, about)]
struct Args {
    /// User specified config path
    #[arg(long, short, default_value = "ipapk.yaml")]
    pub config: PathBuf,

    /// Preferred icon density in dpi (Android only)
    #[arg(long, short)]
    pub density: Option<u16>,

    /// Do not ask aapt for the launchable activity label
    #[arg(long)]
    pub no_badging: bool,

    /// Path of the aapt program
    #[arg(long)]
    pub aapt: Option<String>,

    /// Write the icon as PNG to this file
    #[arg(long, short = 'o')]
    pub icon_out: Option<PathBuf>,

    /// Print one JSON record per archive
    #[arg(long)]
    pub json: bool,

    /// .apk, .ipa or .zip archives
    #[arg(required = true)]
    pub archives: Vec<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut settings = Settings::load(&args.config)?;
    if args.density.is_some() {
        settings.density = args.density;
    }
    if args.no_badging {
        settings.badging = false;
    }
    if let Some(aapt) = args.aapt {
        settings.aapt = aapt;
    }

    let label_override: Box<dyn LabelOverride> = if settings.badging {
        Box::new(AaptBadging {
            program: settings.aapt.clone(),
        })
    } else {
        Box::new(NoLabelOverride)
    };
    let options = InspectOptions {
        density: settings.density,
    };

    let mut failed = 0;
    for archive in &args.archives {
        let metadata = match inspect(archive, &options, label_override.as_ref()) {
            Ok(m) => m,
            Err(e) => {
                error!("{}: {}", archive.display(), e);
                failed += 1;
                continue;
            }
        };

        if args.json {
            println!("{}", serde_json::to_string(&metadata)?);
        } else {
            print_summary(archive, &metadata);
        }

        if let Some(out) = &args.icon_out {
            let target = icon_path(out, &metadata, args.archives.len() > 1);
            match &metadata.icon {
                Some(icon) => {
                    std::fs::write(&target, icon)
                        .with_context(|| format!("Failed to write {}", target.display()))?;
                    info!("Wrote icon to {}", target.display());
                }
                None => info!("{} has no icon to write", archive.display()),
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} archive(s) failed", failed, args.archives.len());
    }
    Ok(())
}

fn print_summary(archive: &Path, m: &AppMetadata) {
    info!("{} ({} bytes)", archive.display(), m.size);
    info!(" - platform: {}", m.platform);
    info!(" - name: {}", m.name);
    info!(" - bundle id: {}", m.bundle_id);
    info!(" - version: {} ({})", m.version, m.build);
    match &m.icon {
        Some(icon) => info!(" - icon: {} bytes", icon.len()),
        None => info!(" - icon: none"),
    }
}

/// With several archives each icon gets `<stem>-<bundle id>.<ext>`
fn icon_path(out: &Path, m: &AppMetadata, several: bool) -> PathBuf {
    if !several {
        return out.to_path_buf();
    }
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "icon".to_string());
    let ext = out
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "png".to_string());
    out.with_file_name(format!("{}-{}.{}", stem, m.bundle_id, ext))
}
