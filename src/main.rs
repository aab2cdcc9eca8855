//! maat CLI: typed terms, unification, contexts and belief revision over a
//! JSON knowledge document.
//!
//! Terms on the command line are JSON in the document's term format; an
//! argument starting with `@` names a file holding the JSON instead.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use akh_maat::config::EngineConfig;
use akh_maat::document::{KbDocument, check_term};
use akh_maat::engine::Engine;
use akh_maat::revision::ContractionStrategy;
use akh_maat::term::Term;

#[derive(Parser)]
#[command(name = "maat", version, about = "Symbolic reasoning core")]
struct Cli {
    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Knowledge document (JSON) to load before running the command.
    #[arg(long, short, global = true)]
    doc: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show engine info and statistics.
    Info,

    /// List contexts.
    Contexts,

    /// Match a pattern against one or more contexts.
    Query {
        /// Pattern term (JSON, or @file).
        pattern: String,

        /// Context to search; repeat for several, searched in order.
        #[arg(long = "context", short, required = true)]
        contexts: Vec<String>,

        /// Also search the ancestors of a single context.
        #[arg(long)]
        ancestors: bool,
    },

    /// Compute the most general unifier of two terms.
    Unify {
        /// Left term (JSON, or @file).
        left: String,
        /// Right term (JSON, or @file).
        right: String,
    },

    /// Add a belief to a context, producing a derived context.
    Expand {
        base: String,
        /// Belief term (JSON, or @file).
        belief: String,
        #[arg(long, default_value = "0.5")]
        entrenchment: f64,
        /// Write the resulting knowledge document here.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Remove a belief from a context, producing a derived context.
    Contract {
        base: String,
        /// Belief term (JSON, or @file).
        belief: String,
        /// partial-meet, kernel or argumentation.
        #[arg(long, default_value = "partial-meet")]
        strategy: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Revise a context by a belief (Levi identity).
    Revise {
        base: String,
        /// Belief term (JSON, or @file).
        belief: String,
        #[arg(long, default_value = "partial-meet")]
        strategy: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Write the loaded knowledge back out as a document.
    Export {
        out: PathBuf,
    },

    /// Write the effective configuration as TOML.
    InitConfig {
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let engine = Engine::new(config)?;
    if let Some(path) = &cli.doc {
        let summary = KbDocument::load(path)?.install(&engine)?;
        tracing::info!(
            path = %path.display(),
            contexts = summary.contexts,
            statements = summary.statements,
            "document loaded"
        );
    }

    match cli.command {
        Commands::Info => {
            print!("{}", engine.info());
        }

        Commands::Contexts => {
            let contexts = engine.contexts();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&contexts).into_diagnostic()?);
            } else {
                for c in contexts {
                    let parent = c.parent.as_deref().unwrap_or("-");
                    println!(
                        "  {:<32} {:<13} parent={:<24} statements={}",
                        c.id,
                        c.kind.to_string(),
                        parent,
                        c.statement_count
                    );
                }
            }
        }

        Commands::Query {
            pattern,
            contexts,
            ancestors,
        } => {
            let pattern = parse_term(&engine, &pattern)?;
            let matches = if ancestors {
                if contexts.len() != 1 {
                    miette::bail!("--ancestors takes exactly one --context");
                }
                engine
                    .store()
                    .query_with_ancestors(&pattern, &contexts[0], None)?
            } else {
                let ids: Vec<&str> = contexts.iter().map(String::as_str).collect();
                engine.query(&pattern, &ids, None)?
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&matches).into_diagnostic()?);
            } else if matches.is_empty() {
                println!("No matches for {pattern}");
            } else {
                println!("{} match(es) for {pattern}:", matches.len());
                for m in &matches {
                    println!("  [{}] {}  {}", m.context_id, m.statement, m.bindings);
                }
            }
        }

        Commands::Unify { left, right } => {
            let left = parse_term(&engine, &left)?;
            let right = parse_term(&engine, &right)?;
            let mgu = engine.unify(&left, &right)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&mgu).into_diagnostic()?);
            } else {
                println!("{left}  =  {right}");
                println!("  mgu: {mgu}");
            }
        }

        Commands::Expand {
            base,
            belief,
            entrenchment,
            out,
        } => {
            let belief = parse_term(&engine, &belief)?;
            let id = engine.expand(&base, belief, entrenchment)?;
            report_derived(&engine, &id, cli.json, out.as_deref())?;
        }

        Commands::Contract {
            base,
            belief,
            strategy,
            out,
        } => {
            let strategy: ContractionStrategy = strategy.parse()?;
            let belief = parse_term(&engine, &belief)?;
            let id = engine.contract(&base, &belief, strategy, None)?;
            report_derived(&engine, &id, cli.json, out.as_deref())?;
        }

        Commands::Revise {
            base,
            belief,
            strategy,
            out,
        } => {
            let strategy: ContractionStrategy = strategy.parse()?;
            let belief = parse_term(&engine, &belief)?;
            let id = engine.revise(&base, belief, strategy, None)?;
            report_derived(&engine, &id, cli.json, out.as_deref())?;
        }

        Commands::Export { out } => {
            KbDocument::capture(&engine)?.save(&out)?;
            println!("Exported {} context(s) to {}", engine.contexts().len(), out.display());
        }

        Commands::InitConfig { path } => {
            engine.config().save(&path)?;
            println!("Wrote configuration to {}", path.display());
        }
    }

    Ok(())
}

/// Parse a JSON term, or the JSON in the file named after a leading `@`.
fn parse_term(engine: &Engine, arg: &str) -> Result<Term> {
    let json = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).into_diagnostic()?,
        None => arg.to_string(),
    };
    let term: Term = serde_json::from_str(&json).into_diagnostic()?;
    check_term(engine.registry(), &term)?;
    Ok(term)
}

/// Print a derived context and its history record, optionally saving the
/// whole knowledge base.
fn report_derived(engine: &Engine, id: &str, json: bool, out: Option<&Path>) -> Result<()> {
    let set = engine.belief_set(id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&set).into_diagnostic()?);
    } else {
        println!("Derived context {id} ({} belief(s)):", set.len());
        for s in &set.statements {
            match s.meta.entrenchment {
                Some(e) => println!("  {}  [entrenchment {e:.2}]", s.term),
                None => println!("  {}", s.term),
            }
        }
        if let Some(record) = engine.history().last() {
            for removed in &record.removed {
                println!("  - removed {removed}");
            }
        }
    }
    if let Some(path) = out {
        KbDocument::capture(engine)?.save(path)?;
        println!("Saved knowledge document to {}", path.display());
    }
    Ok(())
}
