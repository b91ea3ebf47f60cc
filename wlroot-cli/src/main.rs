// File: wlroot-cli/src/main.rs
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::{fs, io::Write, path::{Path, PathBuf}, process::ExitCode};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wlroot_hash::Digest;
use wlroot_ingest::{parse_onboarding_time, read_whitelist_file, IngestOptions};
use wlroot_leaf::{Address, Entry};
use wlroot_merkle::{verify, MerkleTree, Proof};
use wlroot_params::{load_params_file, Params};

#[derive(Parser)]
#[command(name="wlroot", version, about="Whitelist Merkle root and membership proofs")]
struct Cli {
    /// Optional params file (toml); flags take precedence
    #[arg(long, global = true)]
    params: Option<PathBuf>,
    /// tracing filter directive (overrides RUST_LOG and params)
    #[arg(long, global = true)]
    log: Option<String>,
    #[command(subcommand)]
    cmd: Cmd
}
#[derive(Subcommand)]
enum Cmd {
    /// Print the Merkle root of a whitelist
    Root(SourceArgs),
    /// Generate a membership proof for one entry
    Prove(ProveArgs),
    /// Verify a proof, from a proof file or from explicit parts
    Verify(VerifyArgs),
    /// Prove and verify every entry of a whitelist
    Check(SourceArgs),
}

#[derive(Args, Clone, Debug, Default)]
struct SourceArgs {
    #[arg(long)]
    whitelist: Option<PathBuf>,
    #[arg(long)]
    date_format: Option<String>,
}

#[derive(Args, Clone, Debug)]
struct ProveArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(long)]
    address: Address,
    /// Onboarding time: epoch seconds, a date, or RFC 3339
    #[arg(long)]
    time: String,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Clone, Debug, Default)]
struct VerifyArgs {
    #[arg(long)]
    proof: Option<PathBuf>,
    /// Expected root; overrides the root stored in the proof file
    #[arg(long)]
    root: Option<Digest>,
    #[arg(long)]
    address: Option<Address>,
    #[arg(long)]
    time: Option<String>,
    #[arg(long)]
    date_format: Option<String>,
    /// Sibling hash, leaf to root; repeat for each level
    #[arg(long = "sibling")]
    siblings: Vec<Digest>,
}

/// What `prove` writes and `verify --proof` reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ProofFile {
    root: Digest,
    entry: Entry,
    proof: Proof,
}

#[derive(Debug, PartialEq)]
struct CheckReport {
    root: Digest,
    leaves: usize,
    verified: usize,
    failed: Vec<Entry>,
    /// `Some(true)` when entry 0's proof was correctly rejected for entry 1
    cross_rejected: Option<bool>,
}

fn init_tracing(cli_directive: Option<&str>, params: &Params) {
    let filter = match cli_directive {
        Some(d) => EnvFilter::new(d),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(params.log.as_deref().unwrap_or("info"))),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn ingest_options(flag: Option<String>, params: &Params) -> IngestOptions {
    match flag.or_else(|| params.date_format.clone()) {
        Some(date_format) => IngestOptions { date_format },
        None => IngestOptions::default(),
    }
}

fn load_tree(whitelist: Option<PathBuf>, opts: &IngestOptions, params: &Params) -> Result<(Vec<Entry>, MerkleTree)> {
    let Some(path) = whitelist.or_else(|| params.whitelist.clone()) else {
        bail!("no whitelist given (use --whitelist or set `whitelist` in params)");
    };
    let entries = read_whitelist_file(&path, opts)
        .with_context(|| format!("reading whitelist {}", path.display()))?;
    let tree = MerkleTree::from_entries(&entries)
        .with_context(|| format!("building tree from {}", path.display()))?;
    Ok((entries, tree))
}

fn make_proof_file(tree: &MerkleTree, entry: Entry) -> Result<ProofFile> {
    let proof = tree
        .prove_entry(&entry)
        .with_context(|| format!("{} @ {} is not whitelisted", entry.address, entry.timestamp))?;
    Ok(ProofFile { root: tree.root(), entry, proof })
}

fn write_proof_file(pf: &ProofFile, out: &Path) -> Result<()> {
    let mut f = fs::File::create(out).with_context(|| format!("creating {}", out.display()))?;
    bincode::serialize_into(&mut f, pf).context("encoding proof file")?;
    Ok(())
}

fn read_proof_file(path: &Path) -> Result<ProofFile> {
    let f = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    bincode::deserialize_from(f).with_context(|| format!("decoding {}", path.display()))
}

fn check_entries(entries: &[Entry], tree: &MerkleTree) -> Result<CheckReport> {
    let root = tree.root();
    let mut failed = Vec::new();
    for e in entries {
        let p = tree.prove_entry(e)?;
        if !verify(&root, &e.preimage(), &p) {
            failed.push(*e);
        }
    }
    let cross_rejected = match entries {
        [first, second, ..] if first != second => {
            let p0 = tree.prove_entry(first)?;
            Some(!verify(&root, &second.preimage(), &p0))
        }
        _ => None,
    };
    Ok(CheckReport { root, leaves: tree.len(), verified: entries.len() - failed.len(), failed, cross_rejected })
}

fn run_root(args: SourceArgs, params: &Params, out: &mut impl Write) -> Result<Digest> {
    let opts = ingest_options(args.date_format, params);
    let (_, tree) = load_tree(args.whitelist, &opts, params)?;
    writeln!(out, "root={}", tree.root_hex())?;
    writeln!(out, "leaves={}", tree.len())?;
    Ok(tree.root())
}

fn run_prove(args: ProveArgs, params: &Params, out: &mut impl Write) -> Result<ProofFile> {
    let opts = ingest_options(args.source.date_format, params);
    let time = args.time;
    let timestamp = parse_onboarding_time(&time, &opts.date_format)
        .with_context(|| format!("parsing --time {time:?}"))?;
    let (_, tree) = load_tree(args.source.whitelist, &opts, params)?;
    let pf = make_proof_file(&tree, Entry::new(args.address, timestamp))?;
    for sib in pf.proof.to_hex_strings() {
        writeln!(out, "{sib}")?;
    }
    let Some(path) = args.out.or_else(|| params.proof_out.clone()) else {
        bail!("no output path for the proof file");
    };
    write_proof_file(&pf, &path)?;
    info!(path = %path.display(), siblings = pf.proof.len(), "wrote proof file");
    writeln!(out, "root={}", pf.root)?;
    writeln!(out, "wrote {}", path.display())?;
    Ok(pf)
}

/// Assemble what to verify: a proof file with optional overrides, or explicit parts.
fn resolve_verify(args: VerifyArgs, params: &Params) -> Result<ProofFile> {
    let opts = ingest_options(args.date_format, params);
    let timestamp = args
        .time
        .map(|t| parse_onboarding_time(&t, &opts.date_format).with_context(|| format!("parsing --time {t:?}")))
        .transpose()?;
    match args.proof {
        Some(path) => {
            let mut pf = read_proof_file(&path)?;
            if let Some(r) = args.root { pf.root = r; }
            if let Some(a) = args.address { pf.entry.address = a; }
            if let Some(t) = timestamp { pf.entry.timestamp = t; }
            if !args.siblings.is_empty() { pf.proof = Proof::new(args.siblings); }
            Ok(pf)
        }
        None => {
            let (Some(root), Some(address), Some(timestamp)) = (args.root, args.address, timestamp) else {
                bail!("without --proof, --root, --address and --time are required");
            };
            Ok(ProofFile { root, entry: Entry::new(address, timestamp), proof: Proof::new(args.siblings) })
        }
    }
}

fn run_verify(args: VerifyArgs, params: &Params, out: &mut impl Write) -> Result<bool> {
    let pf = resolve_verify(args, params)?;
    let ok = verify(&pf.root, &pf.entry.preimage(), &pf.proof);
    writeln!(out, "{}", if ok { "valid" } else { "invalid" })?;
    Ok(ok)
}

fn run_check(args: SourceArgs, params: &Params, out: &mut impl Write) -> Result<bool> {
    let opts = ingest_options(args.date_format, params);
    let (entries, tree) = load_tree(args.whitelist, &opts, params)?;
    let report = check_entries(&entries, &tree)?;
    writeln!(out, "root={}", report.root)?;
    writeln!(out, "leaves={} verified={}", report.leaves, report.verified)?;
    for e in &report.failed {
        warn!(address = %e.address, timestamp = e.timestamp, "proof did not verify");
    }
    match report.cross_rejected {
        Some(true) => writeln!(out, "cross-check: proof[0] rejected for entry[1]")?,
        Some(false) => writeln!(out, "cross-check: proof[0] ACCEPTED for entry[1]")?,
        None => writeln!(out, "cross-check: skipped")?,
    }
    Ok(report.failed.is_empty() && report.cross_rejected != Some(false))
}

/// 0 on success, 1 when a proof did not verify.
fn exit_status(ok: bool) -> u8 {
    if ok { 0 } else { 1 }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let params = match &cli.params {
        Some(p) => load_params_file(p)?,
        None => Params::default(),
    };
    init_tracing(cli.log.as_deref(), &params);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let ok = match cli.cmd {
        Cmd::Root(args) => run_root(args, &params, &mut out).map(|_| true)?,
        Cmd::Prove(args) => run_prove(args, &params, &mut out).map(|_| true)?,
        Cmd::Verify(args) => run_verify(args, &params, &mut out)?,
        Cmd::Check(args) => run_check(args, &params, &mut out)?,
    };
    Ok(ExitCode::from(exit_status(ok)))
}
