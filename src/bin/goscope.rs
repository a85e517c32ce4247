//! Smoke-test binary: scans a workspace, runs the symbolic evaluator
//! over its exported functions, and prints reachable-function /
//! interface-implementation edges. Not a product surface — its only job
//! is to exercise the library end-to-end.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;

use goscope::cache::PackageCache;
use goscope::config::GoScopeConfig;
use goscope::eval::Interpreter;
use goscope::fs::OsFileSystem;
use goscope::locator::{Locator, LocatorOptions};
use goscope::policy::ScanPolicy;
use goscope::scanner::ScanOptions;
use goscope::walker::ModuleWalker;

#[derive(Parser, Debug)]
#[command(name = "goscope", about = "Scan a Go workspace and report reachable functions")]
struct Cli {
    /// Workspace root containing a go.mod (defaults to the current directory).
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Package pattern to walk: `./...`, `<dir>/...`, or a bare directory.
    #[arg(long, default_value = "./...")]
    pattern: String,

    /// Emit one JSON array.
    #[arg(long)]
    json: bool,

    /// Emit newline-delimited JSON, one object per matched call.
    #[arg(long)]
    jsonl: bool,
}

#[derive(Serialize)]
struct MatchedCallReport {
    interface: String,
    method: String,
    implementor: String,
}

#[derive(Serialize)]
struct ScanReport {
    scanned_at: chrono::DateTime<chrono::Utc>,
    packages: usize,
    steps_taken: u64,
    matches: Vec<MatchedCallReport>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("goscope: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let root = cli.root.canonicalize().unwrap_or_else(|_| cli.root.clone());
    let fs: Arc<dyn goscope::fs::FileSystem> = Arc::new(OsFileSystem);
    let config = GoScopeConfig::load(fs.as_ref(), &root);

    let locator = Arc::new(Locator::discover(
        fs.clone(),
        &root,
        LocatorOptions {
            module_resolver: config.module_resolver,
            goroot: None,
            gomodcache: None,
        },
    )?);

    let walker = ModuleWalker::new(fs.clone(), locator.clone());
    let packages = walker.walk(&cli.pattern)?;
    tracing::debug!(count = packages.len(), "walked package imports");

    let scan_options = ScanOptions {
        include_tests: config.include_tests,
        annotation_markers: config.annotation_markers.clone(),
    };
    let cache = Arc::new(PackageCache::new(fs.clone(), scan_options));

    let scan_policy = ScanPolicy::from_globs(&config.scan_allow_prefixes, &config.scan_deny_prefixes)
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "invalid scan_allow_prefixes/scan_deny_prefixes pattern, scanning everything");
            ScanPolicy::default()
        });

    let interpreter = Interpreter::new(cache.clone(), locator.clone())
        .with_scan_policy(scan_policy)
        .with_max_steps(config.max_steps)
        .with_max_call_stack_depth(config.max_call_stack_depth);

    for summary in &packages {
        let Ok(pkg) = cache.get_or_scan(&locator, &summary.import_path) else {
            continue;
        };
        for func in pkg.functions.clone() {
            if func.receiver.is_some() || !func.is_exported() {
                continue;
            }
            let args = func
                .parameters
                .iter()
                .map(|p| {
                    p.field_type
                        .definition()
                        .map(|type_info| goscope::object::Object::placeholder_typed(type_info, "cli argument"))
                        .unwrap_or_else(|| goscope::object::Object::placeholder("cli argument"))
                })
                .collect();
            interpreter.apply(func, args, &pkg);
        }
    }

    let matches = interpreter.finalize();
    let matched: Vec<MatchedCallReport> = matches
        .iter()
        .map(|m| MatchedCallReport {
            interface: m.interface.full_name(),
            method: m.method_name.clone(),
            implementor: m.implementor.full_name(),
        })
        .collect();

    if cli.jsonl {
        for entry in &matched {
            println!("{}", serde_json::to_string(entry)?);
        }
    } else if cli.json {
        let report = ScanReport {
            scanned_at: chrono::Utc::now(),
            packages: packages.len(),
            steps_taken: interpreter.steps_taken(),
            matches: matched,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for entry in &matched {
            println!("{} implements {}.{}", entry.implementor, entry.interface, entry.method);
        }
        println!(
            "scanned {} package(s), {} interface edge(s), {} step(s)",
            packages.len(),
            matched.len(),
            interpreter.steps_taken()
        );
    }

    Ok(())
}
