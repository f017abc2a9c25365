use anyhow::{Context, Result};
use clap::Parser;
use img_hoist::cli::{Args, Commands};
use img_hoist::convert::{convert_directory, ConvertOptions, ConvertTarget};
use img_hoist::dedup::dedup_file;
use img_hoist::logger;
use img_hoist::processing::NormalizeOptions;
use img_hoist::rewrite::{rewrite_files, RewritePreset, RewriteRule};
use img_hoist::session::{upload_images_sync, SessionOptions};
use img_hoist::upload::{ClientIdPool, UploadPolicy};
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.quiet, args.verbose);

    match args.command {
        Commands::Upload {
            root,
            endpoint,
            client_ids,
            max_attempts,
            min_delay_ms,
            max_delay_ms,
            save_every,
            progress_file,
            report,
            json,
            max_dimension,
            max_file_size,
            quality,
        } => {
            let mut options = SessionOptions::new(root);
            if !client_ids.is_empty() {
                options.pool = ClientIdPool::new(&client_ids)?;
            }
            options.policy = UploadPolicy::new(
                max_attempts,
                min_delay_ms.map(Duration::from_millis),
                max_delay_ms.map(Duration::from_millis),
            )?;
            options.normalize = NormalizeOptions::new(max_file_size, max_dimension, quality)?;
            if let Some(n) = save_every {
                options.save_every = n;
            }
            override_path(&mut options.progress_file, progress_file);
            override_path(&mut options.report_file, report);
            override_path(&mut options.json_file, json);

            upload_images_sync(options, endpoint).context("upload run failed")?;
        }
        Commands::Convert {
            root,
            to,
            backup,
            force,
            replace,
            threads,
        } => {
            setup_thread_pool(threads);
            let target = ConvertTarget::from_str(&to)?;
            let mut options = ConvertOptions::new(target, backup, force);
            if replace {
                options = options.replacing();
            }
            convert_directory(&root, &options)
                .with_context(|| format!("conversion in {:?} failed", root))?;
        }
        Commands::Rewrite {
            files,
            preset,
            pattern,
            replacement,
            dry_run,
        } => {
            let preset = preset.as_deref().map(RewritePreset::from_str).transpose()?;
            let rule = RewriteRule::from_parts(preset, pattern.as_deref(), replacement.as_deref())?;
            rewrite_files(&files, &rule, dry_run)?;
        }
        Commands::Dedup {
            file,
            level,
            dry_run,
        } => {
            dedup_file(&file, level, dry_run)
                .with_context(|| format!("deduplicating {:?} failed", file))?;
        }
    }

    Ok(())
}

fn override_path(target: &mut PathBuf, value: Option<PathBuf>) {
    if let Some(path) = value {
        *target = path;
    }
}

fn setup_thread_pool(threads: Option<usize>) {
    if let Some(num_threads) = threads {
        ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .unwrap_or_else(|e| {
                img_hoist::warn!("Failed to set thread pool size: {}", e);
            });
    }
}
