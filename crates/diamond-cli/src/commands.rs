//! Offline command implementations
//!
//! Each command returns its rendered output so it can be tested without a
//! process.

use anyhow::{Context, Result};
use diamond_core::{ContractArtifact, ContractArtifacts, UpgradeConfig, UpgradeMode};
use diamond_cut::validation::ensure_unrouted;
use diamond_cut::{CutBatch, CutPlanner, DiffPlanner, Facet, RoutingTable};
use diamond_primitives::abi::SelectorFilter;
use serde::Serialize;
use std::fmt::Write as _;

/// One planned transaction
#[derive(Debug, Serialize)]
struct PlannedBatch {
    phase: &'static str,
    cuts: CutBatch,
}

#[derive(Debug, Serialize)]
struct Plan {
    mode: UpgradeMode,
    batches: Vec<PlannedBatch>,
    result: RoutingTable,
}

fn desired_facets(config: &UpgradeConfig, artifacts: &ContractArtifacts) -> Result<Vec<Facet>> {
    config
        .facets
        .iter()
        .map(|spec| {
            let artifact = artifacts.get(&spec.name)?;
            let address = spec
                .address
                .with_context(|| format!("facet {} has no address; offline planning needs deployed facets", spec.name))?;
            let selectors = artifact
                .abi
                .selectors(&spec.filter)
                .with_context(|| format!("extracting selectors of {}", spec.name))?;
            Ok(Facet::new(spec.name.clone(), address, selectors))
        })
        .collect()
}

/// Plan the batches `config` would submit against `table` and preview the
/// resulting table
pub(crate) fn plan(
    config: &UpgradeConfig,
    artifacts: &ContractArtifacts,
    table: &RoutingTable,
    json: bool,
) -> Result<String> {
    let facets = desired_facets(config, artifacts)?;
    let protected = config.protected_set();
    let planner = CutPlanner::new();

    let mut batches = Vec::new();
    let result = match config.mode {
        UpgradeMode::TwoPhase => {
            let removal = planner.plan_removal(table, &protected);
            let cleared = table.apply(&removal).context("previewing removal")?;
            ensure_unrouted(&cleared, &facets)?;
            let addition = planner.plan_addition(&facets)?;
            let result = cleared.apply(&addition).context("previewing addition")?;
            batches.push(PlannedBatch {
                phase: "removal",
                cuts: removal,
            });
            batches.push(PlannedBatch {
                phase: "addition",
                cuts: addition,
            });
            result
        }
        UpgradeMode::AdditionOnly => {
            ensure_unrouted(table, &facets)?;
            let addition = planner.plan_addition(&facets)?;
            let result = table.apply(&addition).context("previewing addition")?;
            batches.push(PlannedBatch {
                phase: "addition",
                cuts: addition,
            });
            result
        }
        UpgradeMode::Diff => {
            let diff = DiffPlanner::new().plan(table, &protected, &facets)?;
            let result = table.apply(&diff).context("previewing diff")?;
            batches.push(PlannedBatch { phase: "diff", cuts: diff });
            result
        }
    };
    tracing::info!("planned {} batch(es) in {:?} mode", batches.len(), config.mode);

    let plan = Plan {
        mode: config.mode,
        batches,
        result,
    };
    if json {
        return serde_json::to_string_pretty(&plan).context("serializing plan");
    }
    Ok(render_plan(&plan))
}

fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    for batch in &plan.batches {
        let _ = writeln!(
            out,
            "{}: {} cut(s), {} selector(s)",
            batch.phase,
            batch.cuts.len(),
            batch.cuts.selector_count()
        );
        for cut in &batch.cuts {
            let selectors: Vec<String> = cut.selectors().iter().map(ToString::to_string).collect();
            let _ = writeln!(
                out,
                "  {:<8} {} [{}]",
                cut.action().to_string(),
                cut.facet_address().to_checksum(),
                selectors.join(", ")
            );
        }
    }
    let _ = writeln!(
        out,
        "result: {} facet(s), {} selector(s)",
        plan.result.len(),
        plan.result.selector_count()
    );
    for entry in plan.result.entries() {
        let _ = writeln!(
            out,
            "  {} {} selector(s)",
            entry.facet_address().to_checksum(),
            entry.selectors().len()
        );
    }
    out.trim_end().to_string()
}

/// `selector  signature` lines for what `filter` picks from `artifact`
pub(crate) fn selectors(artifact: &ContractArtifact, filter: &SelectorFilter) -> Result<String> {
    let selected = artifact
        .abi
        .selectors(filter)
        .with_context(|| format!("extracting selectors of {}", artifact.contract_name))?;

    let lines: Vec<String> = selected
        .iter()
        .map(|selector| {
            let signature = artifact
                .abi
                .functions()
                .iter()
                .find(|f| f.selector() == *selector)
                .map(diamond_primitives::abi::Function::signature)
                .unwrap_or_default();
            format!("{selector}  {signature}")
        })
        .collect();
    Ok(lines.join("\n"))
}

/// Hex call data for `method` of `artifact` with JSON `args`
pub(crate) fn encode_init(artifact: &ContractArtifact, method: &str, args: &serde_json::Value) -> Result<String> {
    let calldata = artifact
        .abi
        .encode_call_json(method, args)
        .with_context(|| format!("encoding {}.{}", artifact.contract_name, method))?;
    Ok(format!("0x{}", hex::encode(calldata)))
}
