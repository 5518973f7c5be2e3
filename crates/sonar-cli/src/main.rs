use anyhow::{Context, Result};
use clap::Parser;
use sonar_context::{collect_project_files, project_type};
use sonar_core::API_KEY_ENV;
use sonar_llm::SonarClient;
use sonar_observe::Observer;
use sonar_store::Store;
use sonar_ui::{banner, theme};
use std::path::PathBuf;

mod commands;
mod context;
mod repl;
mod session;
#[cfg(test)]
mod testkit;
mod util;

use session::SessionContext;

#[derive(Parser)]
#[command(name = "sonar")]
#[command(about = "Perplexity-powered terminal development assistant", version)]
struct Cli {
    /// Project root to work in (defaults to the current directory).
    root: Option<PathBuf>,

    /// Verbose logging to stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{} Fatal: {err:#}", theme::err_mark());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // The credential gates startup entirely.
    let Ok(api_key) = std::env::var(API_KEY_ENV) else {
        eprintln!("{} Missing {API_KEY_ENV}", theme::err_mark());
        eprintln!("Set it: export {API_KEY_ENV}=your_key");
        std::process::exit(1);
    };

    let root = match cli.root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot open project root {}", root.display()))?;

    let store = Store::new(&root)?;
    let observer = Observer::new(&root)?;
    let client = SonarClient::new(api_key)?;
    let mut ctx = SessionContext::new(root.clone(), store, observer, Box::new(client))?;
    if cli.verbose || ctx.settings.verbose {
        ctx.observer.set_verbose(true);
    }

    let project = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());
    println!("{}", banner(&project, &ctx.settings.model));

    let kind = project_type(&root);
    println!(
        "{} Detected {} project",
        theme::ok_mark(),
        theme::yellow(kind.label())
    );
    let file_count = collect_project_files(&root, 2).len();
    println!(
        "{}",
        theme::dim(&format!("{file_count} files in context scope"))
    );
    println!(
        "{}",
        theme::dim("Type /help for commands; double Ctrl+C quits.")
    );

    ctx.observer.record("session start");
    repl::run(&mut ctx)?;
    ctx.observer.record("session end");
    Ok(())
}
