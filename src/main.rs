use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use canopy_snapshot::{Snapshot, SnapshotNode, TreeSnapshot};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};

/// Canopy - tools for hierarchical workflow snapshots
#[derive(Parser)]
#[command(name = "canopy")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Work with tree snapshot files
  Snapshot {
    #[command(subcommand)]
    target: SnapshotTarget,
  },
}

#[derive(Subcommand)]
enum SnapshotTarget {
  /// Print the decoded tree as JSON
  Inspect {
    /// Path to a tree snapshot file
    snapshot_file: PathBuf,
  },

  /// Check that every node in the tree decodes
  Verify {
    /// Path to a tree snapshot file
    snapshot_file: PathBuf,
  },
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Snapshot { target }) => match target {
      SnapshotTarget::Inspect { snapshot_file } => {
        let tree = inspect(&snapshot_file)?;
        println!("{}", serde_json::to_string_pretty(&tree)?);
      }
      SnapshotTarget::Verify { snapshot_file } => {
        return match verify(&snapshot_file)? {
          Ok(nodes) => {
            println!("ok: {} nodes", nodes);
            Ok(ExitCode::SUCCESS)
          }
          Err(reason) => {
            eprintln!("invalid snapshot: {}", reason);
            Ok(ExitCode::FAILURE)
          }
        };
      }
    },
    None => {
      println!("canopy - use --help to see available commands");
    }
  }

  Ok(ExitCode::SUCCESS)
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
  let rt = tokio::runtime::Runtime::new()?;
  let bytes = rt
    .block_on(tokio::fs::read(path))
    .with_context(|| format!("failed to read snapshot file: {}", path.display()))?;
  Ok(Snapshot::of_bytes(bytes))
}

fn inspect(path: &Path) -> Result<Value> {
  let snapshot = read_snapshot(path)?;
  let tree = TreeSnapshot::parse_recursive(&snapshot)
    .with_context(|| format!("failed to decode snapshot: {}", path.display()))?;
  Ok(node_to_json(&tree))
}

/// The node count on success, or why decoding failed. I/O errors are returned
/// as errors rather than verification failures.
fn verify(path: &Path) -> Result<std::result::Result<usize, String>> {
  let snapshot = read_snapshot(path)?;
  Ok(
    TreeSnapshot::parse_recursive(&snapshot)
      .map(|tree| tree.node_count())
      .map_err(|e| e.to_string()),
  )
}

fn node_to_json(node: &SnapshotNode) -> Value {
  let bytes = node.state.bytes();
  let children: Vec<Value> = node
    .children
    .iter()
    .map(|(id, child)| {
      json!({
        "workflow_type": id.workflow_type,
        "key": id.key,
        "node": node_to_json(child),
      })
    })
    .collect();

  json!({
    "state": {
      "len": bytes.len(),
      "hex": bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>(),
      "utf8": std::str::from_utf8(bytes).ok(),
    },
    "children": children,
  })
}
