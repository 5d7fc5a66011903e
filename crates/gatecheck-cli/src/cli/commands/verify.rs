//! `gatecheck verify` – run the equivalence check and print a report.

use anyhow::Result;
use gatecheck_core::config::GatecheckConfig;
use gatecheck_core::fixture::DirFixtureReader;
use gatecheck_core::verify::{
    AssetReport, EvaluationMode, PathOutcome, VerificationReport, Verifier,
};
use serde_json::{json, Value};
use std::error::Error;
use std::path::Path;

use super::load_assets;

/// Returns whether every asset passed.
pub async fn run_verify(
    cfg: GatecheckConfig,
    manifest: Option<&Path>,
    fail_fast: bool,
    json: bool,
) -> Result<bool> {
    let assets = load_assets(manifest)?;
    let mode = if fail_fast {
        EvaluationMode::FailFast
    } else {
        EvaluationMode::Exhaustive
    };
    let verifier = Verifier::from_config(&cfg)?.with_mode(mode);
    let reader = DirFixtureReader::new(&cfg.fixture_dir);
    tracing::info!(
        assets = assets.len(),
        fixtures = %cfg.fixture_dir.display(),
        ?mode,
        "starting verification"
    );

    let report = verifier.verify_all(&assets, &reader).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report);
    }
    Ok(report.all_passed())
}

fn print_report(report: &VerificationReport) {
    for entry in &report.assets {
        match entry {
            AssetReport::Verified(r) => {
                let verdict = if r.all_match { "ok" } else { "MISMATCH" };
                println!("{:<8} {}  (fixture {})", verdict, r.asset.label(), r.reference);
                print_paths(&r.paths);
            }
            AssetReport::Failed(e) => {
                println!("{:<8} {}/{}", "FAILED", e.collection_name, e.asset_id);
                print_paths(&e.outcomes);
                for f in &e.failures {
                    println!("  x {:<10} {}", f.path, error_chain(&f.error));
                }
            }
        }
    }
    if report.skipped > 0 {
        println!("{} asset(s) skipped after first failure", report.skipped);
    }
    let verdict = if report.all_passed() { "PASS" } else { "FAIL" };
    println!("{}: {} asset(s) checked", verdict, report.assets.len());
}

fn print_paths(paths: &[PathOutcome]) {
    for p in paths {
        let mark = if p.matches { "=" } else { "!" };
        println!("  {} {:<10} {}  {} bytes  {}", mark, p.name, p.digest, p.bytes, p.url);
    }
}

pub(crate) fn report_json(report: &VerificationReport) -> Value {
    let assets: Vec<Value> = report
        .assets
        .iter()
        .map(|entry| match entry {
            AssetReport::Verified(r) => json!({
                "status": if r.all_match { "ok" } else { "mismatch" },
                "result": r,
            }),
            AssetReport::Failed(e) => json!({
                "status": "failed",
                "asset": entry.label(),
                "paths": e.outcomes,
                "failures": e
                    .failures
                    .iter()
                    .map(|f| json!({ "path": f.path, "url": f.url, "error": error_chain(&f.error) }))
                    .collect::<Vec<_>>(),
            }),
        })
        .collect();
    json!({
        "passed": report.all_passed(),
        "skipped": report.skipped,
        "assets": assets,
    })
}

/// `outer: inner: root`, like anyhow's `{:#}`.
fn error_chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
