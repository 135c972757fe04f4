//! Binary entry point for the bolt database inspector.
#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};

use boltread::{
    admin::{self, AdminError, OpenOptions, VerifyLevel},
    primitives::pager::{Meta, MetaCandidate},
    Bucket, PageId, Value,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "bolt-inspect",
    version,
    about = "Read-only inspector for bolt database files",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    open: OpenArgs,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OpenArgs {
    #[arg(
        long,
        global = true,
        help = "Page size (bytes) assumed before the first meta page is read"
    )]
    page_size: Option<u32>,

    #[arg(long, global = true, help = "Maximum accepted branch depth")]
    max_depth: Option<usize>,

    #[arg(
        long,
        global = true,
        help = "Reject pages whose header id differs from their position"
    )]
    check_page_ids: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the authoritative meta page and both candidates
    Info {
        #[arg(value_name = "DB")]
        db_path: PathBuf,
    },
    /// Show page, bucket and key statistics
    Stats {
        #[arg(value_name = "DB")]
        db_path: PathBuf,
    },
    /// Verify the structure of the database
    Verify {
        #[arg(value_name = "DB")]
        db_path: PathBuf,

        #[arg(long, value_enum, default_value_t = VerifyLevelArg::Full)]
        level: VerifyLevelArg,
    },
    /// List the elements of a bucket
    Ls {
        #[arg(value_name = "DB")]
        db_path: PathBuf,

        #[arg(value_name = "BUCKET", help = "Path of nested bucket names")]
        path: Vec<String>,
    },
    /// Print the value stored under a key
    Get {
        #[arg(value_name = "DB")]
        db_path: PathBuf,

        #[arg(value_name = "KEY")]
        key: String,

        #[arg(long = "bucket", value_name = "NAME", help = "Bucket path, repeatable")]
        bucket: Vec<String>,
    },
    /// Print every bucket recursively
    Dump {
        #[arg(value_name = "DB")]
        db_path: PathBuf,

        #[arg(long, help = "Stop descending after this many bucket levels")]
        depth: Option<usize>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum VerifyLevelArg {
    Fast,
    Full,
}

impl From<VerifyLevelArg> for VerifyLevel {
    fn from(value: VerifyLevelArg) -> Self {
        match value {
            VerifyLevelArg::Fast => VerifyLevel::Fast,
            VerifyLevelArg::Full => VerifyLevel::Full,
        }
    }
}

#[derive(Serialize)]
struct InfoReport {
    page_size: u32,
    active_slot: usize,
    meta: Meta,
    candidates: Vec<MetaCandidate>,
}

#[derive(Serialize)]
struct ListEntry {
    key: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline: Option<bool>,
}

#[derive(Serialize)]
struct DumpNode {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    /// Root page of a bucket that was already expanded elsewhere in the dump.
    #[serde(skip_serializing_if = "Option::is_none")]
    repeated_root: Option<PageId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<DumpNode>,
}

impl DumpNode {
    fn new(key: String) -> Self {
        Self {
            key,
            value: None,
            repeated_root: None,
            children: Vec::new(),
        }
    }
}

struct PendingBucket {
    bucket: Bucket,
    parent: Option<usize>,
    depth: usize,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let open_opts = build_open_options(&cli.open);

    match cli.command {
        Command::Info { db_path } => {
            let db = admin::open_database(&db_path, &open_opts)?;
            let report = InfoReport {
                page_size: db.page_size(),
                active_slot: db.active_slot(),
                meta: *db.meta(),
                candidates: db.meta_candidates().to_vec(),
            };
            emit(cli.format, &report, || print_info_text(&report))?;
        }
        Command::Stats { db_path } => {
            let report = admin::stats(&db_path, &open_opts)?;
            emit(cli.format, &report, || print_stats_text(&report))?;
        }
        Command::Verify { db_path, level } => {
            let report = admin::verify(&db_path, &open_opts, level.into())?;
            emit(cli.format, &report, || print_verify_text(&report))?;
            if !report.success {
                std::process::exit(2);
            }
        }
        Command::Ls { db_path, path } => {
            let bucket = open_bucket(&db_path, &open_opts, &path)?;
            let entries: Vec<ListEntry> = bucket
                .elements()?
                .into_iter()
                .map(|element| match element.value {
                    Value::Bytes(bytes) => ListEntry {
                        key: render(&element.key),
                        kind: "value",
                        value: Some(render(&bytes)),
                        inline: None,
                    },
                    Value::Bucket(child) => ListEntry {
                        key: render(&element.key),
                        kind: "bucket",
                        value: None,
                        inline: Some(child.is_inline()),
                    },
                })
                .collect();
            emit(cli.format, &entries, || print_list_text(&entries))?;
        }
        Command::Get {
            db_path,
            key,
            bucket,
        } => {
            let target = open_bucket(&db_path, &open_opts, &bucket)?;
            match target.get(key.as_bytes())? {
                Some(Value::Bytes(bytes)) => {
                    let rendered = render(&bytes);
                    emit(cli.format, &rendered, || println!("{rendered}"))?;
                }
                Some(Value::Bucket(_)) => {
                    return Err(AdminError::Message(format!("{key} is a bucket")).into());
                }
                None => return Err(AdminError::Message(format!("key not found: {key}")).into()),
            }
        }
        Command::Dump { db_path, depth } => {
            let db = admin::open_database(&db_path, &open_opts)?;
            let tree = dump_bucket(db.root_bucket()?, depth.unwrap_or(usize::MAX))?;
            emit(cli.format, &tree, || print_dump_text(&tree, 0))?;
        }
    }

    Ok(())
}

fn build_open_options(args: &OpenArgs) -> OpenOptions {
    let mut opts = OpenOptions::default().check_page_ids(args.check_page_ids);
    if let Some(page_size) = args.page_size {
        opts = opts.default_page_size(page_size);
    }
    if let Some(depth) = args.max_depth {
        opts = opts.max_tree_depth(depth);
    }
    opts
}

fn open_bucket(db_path: &Path, opts: &OpenOptions, path: &[String]) -> Result<Bucket, Box<dyn Error>> {
    let db = admin::open_database(db_path, opts)?;
    match db.root_bucket()?.bucket_path(path)? {
        Some(bucket) => Ok(bucket),
        None => Err(AdminError::Message(format!("no bucket at /{}", path.join("/"))).into()),
    }
}

/// Expands nested buckets from a worklist, at most `depth` levels deep.
///
/// Each page-backed bucket root is expanded once; later references to it become
/// `repeated_root` entries, so a root pointing back at an ancestor cannot loop.
fn dump_bucket(root: Bucket, depth: usize) -> Result<Vec<DumpNode>, Box<dyn Error>> {
    let mut expanded: HashSet<PageId> = HashSet::new();
    if !root.is_inline() {
        expanded.insert(root.location().root);
    }
    // Nodes in creation order with their parent index; a parent always precedes its children.
    let mut arena: Vec<(Option<usize>, DumpNode)> = Vec::new();
    let mut work = vec![PendingBucket {
        bucket: root,
        parent: None,
        depth,
    }];
    while let Some(PendingBucket {
        bucket,
        parent,
        depth,
    }) = work.pop()
    {
        for element in bucket.elements()? {
            let index = arena.len();
            let mut node = DumpNode::new(render(&element.key));
            match element.value {
                Value::Bytes(bytes) => node.value = Some(render(&bytes)),
                Value::Bucket(child) if depth > 1 => {
                    let root = (!child.is_inline()).then(|| child.location().root);
                    match root {
                        Some(root) if !expanded.insert(root) => node.repeated_root = Some(root),
                        _ => work.push(PendingBucket {
                            bucket: child,
                            parent: Some(index),
                            depth: depth - 1,
                        }),
                    }
                }
                Value::Bucket(_) => {}
            }
            arena.push((parent, node));
        }
    }

    let mut top = Vec::new();
    while let Some((parent, mut node)) = arena.pop() {
        node.children.reverse();
        match parent {
            Some(parent) => arena[parent].1.children.push(node),
            None => top.push(node),
        }
    }
    top.reverse();
    Ok(top)
}

/// Printable text, or `0x`-prefixed hex when the bytes are not clean UTF-8.
fn render(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_owned(),
        _ => format!("0x{}", hex::encode(bytes)),
    }
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_info_text(report: &InfoReport) {
    let meta = &report.meta;
    println!("Meta (slot {}):", report.active_slot);
    println!(
        "  txid={} page_size={} root={} sequence={} freelist={} high_water={}",
        meta.txid, meta.page_size, meta.root.root, meta.root.sequence, meta.freelist, meta.high_water
    );
    println!("Candidates:");
    for candidate in &report.candidates {
        let txid = candidate
            .meta
            .map(|m| m.txid.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  slot={} offset={} txid={} status={}",
            candidate.slot,
            candidate.offset,
            txid,
            candidate.status()
        );
    }
}

fn print_stats_text(report: &admin::StatsReport) {
    println!("File:");
    println!(
        "  path={} size_bytes={} page_size={} page_count={}",
        report.file.path.as_deref().unwrap_or("-"),
        report.file.size_bytes,
        report.file.page_size,
        report.file.page_count
    );
    println!("Meta:");
    println!(
        "  active_slot={} txid={} root={} freelist={} high_water={}",
        report.meta.active_slot,
        report.meta.txid,
        report.meta.root,
        report.meta.freelist,
        report.meta.high_water
    );
    for candidate in &report.meta.candidates {
        println!(
            "  slot={} offset={} status={}",
            candidate.slot, candidate.offset, candidate.status
        );
    }
    println!("Tree:");
    println!(
        "  branch_pages={} leaf_pages={} overflow_pages={} max_depth={}",
        report.tree.branch_pages,
        report.tree.leaf_pages,
        report.tree.overflow_pages,
        report.tree.max_depth
    );
    println!(
        "  paged_buckets={} inline_buckets={} keys={} value_bytes={}",
        report.tree.paged_buckets,
        report.tree.inline_buckets,
        report.tree.keys,
        report.tree.value_bytes
    );
}

fn print_verify_text(report: &admin::VerifyReport) {
    println!(
        "Verify level={:?} success={}",
        report.level, report.success
    );
    println!(
        "  pages_checked={} buckets_checked={} keys_checked={}",
        report.counts.pages_checked, report.counts.buckets_checked, report.counts.keys_checked
    );
    if report.findings.is_empty() {
        println!("  no findings");
    } else {
        println!("Findings:");
        for finding in &report.findings {
            println!("  [{:?}] {}", finding.severity, finding.message);
        }
    }
}

fn print_list_text(entries: &[ListEntry]) {
    for entry in entries {
        match (&entry.value, entry.inline) {
            (Some(value), _) => println!("{} = {}", entry.key, value),
            (None, Some(true)) => println!("{}/ (inline bucket)", entry.key),
            (None, _) => println!("{}/", entry.key),
        }
    }
}

fn print_dump_text(nodes: &[DumpNode], indent: usize) {
    let pad = "  ".repeat(indent);
    for node in nodes {
        match &node.value {
            Some(value) => println!("{pad}{} = {}", node.key, value),
            None => match node.repeated_root {
                Some(root) => println!("{pad}{}/ -> page {root} (shown above)", node.key),
                None => {
                    println!("{pad}{}/", node.key);
                    print_dump_text(&node.children, indent + 1);
                }
            },
        }
    }
}
