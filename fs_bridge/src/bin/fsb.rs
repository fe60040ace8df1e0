use std::io::Write;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fs_bridge::logging::{init_logging, LoggingConfig};
use fs_bridge::{FileEncoding, FsBridge, ProgressCallback, TransferProgress, UploadMethod, UploadOptions};

#[derive(Parser)]
#[clap(name = "fsb", version, about = "Upload, download and inspect files")]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Do not print transfer progress.
    #[clap(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a file as multipart/form-data.
    Upload {
        file: String,
        url: String,
        #[clap(short, long, default_value = "POST")]
        method: UploadMethod,
        /// Form field name of the file part.
        #[clap(short, long)]
        field: Option<String>,
        /// Extra form field, as name=value. May be repeated.
        #[clap(long = "form", value_parser = parse_key_value)]
        form: Vec<(String, String)>,
        /// Extra request header, as name=value. May be repeated.
        #[clap(short = 'H', long = "header", value_parser = parse_key_value)]
        headers: Vec<(String, String)>,
    },
    /// Download a URL to a local path.
    Download {
        url: String,
        dest: String,
        #[clap(short = 'H', long = "header", value_parser = parse_key_value)]
        headers: Vec<(String, String)>,
    },
    /// Print file metadata as json.
    Stat { path: String },
    /// List a directory as json.
    Ls { path: String },
    /// Print a file's content.
    Cat {
        path: String,
        #[clap(short, long, default_value = "utf8")]
        encoding: FileEncoding,
    },
    /// Print the platform directories as json.
    Dirs,
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected name=value, got {s:?}"))
}

fn progress_printer(quiet: bool) -> Option<ProgressCallback> {
    if quiet {
        return None;
    }
    Some(Box::new(|done, total| {
        match TransferProgress::new(done, total).fraction() {
            Some(f) => eprint!("\r{done}/{total} bytes ({:.1}%)", f * 100.),
            None => eprint!("\r{done} bytes"),
        }
        let _ = std::io::stderr().flush();
    }))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LoggingConfig::new(format!("fsb {}", env!("CARGO_PKG_VERSION"))));

    let cli = Cli::parse();
    let bridge = FsBridge::new()?;

    match cli.command {
        Command::Upload {
            file,
            url,
            method,
            field,
            form,
            headers,
        } => {
            let entry = bridge.file_entry(&file)?;
            let options = UploadOptions {
                url,
                method: Some(method),
                field,
                fields: form.into_iter().collect(),
                headers: headers.into_iter().collect(),
            };
            let handle = bridge.upload_file(&entry, options, progress_printer(cli.quiet)).await?;
            eprintln!("upload {} started", handle.job_id());
            let response = handle.await;
            if !cli.quiet {
                eprintln!();
            }
            print_json(&response?)?;
        },
        Command::Download { url, dest, headers } => {
            let handle = bridge
                .download_file_with_headers(&url, &dest, headers, progress_printer(cli.quiet))
                .await?;
            eprintln!("download {} started", handle.job_id());
            let entry = handle.await;
            if !cli.quiet {
                eprintln!();
            }
            print_json(&entry?)?;
        },
        Command::Stat { path } => print_json(&bridge.stat(&path).await?)?,
        Command::Ls { path } => print_json(&bridge.readdir(&path).await?)?,
        Command::Cat { path, encoding } => {
            let content = bridge.read_file(&path, encoding).await?;
            print!("{content}");
        },
        Command::Dirs => print_json(bridge.dirs())?,
    }

    Ok(())
}
