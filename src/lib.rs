pub mod block;
pub mod codegen;
pub mod document;
pub mod expr;
pub mod ident;
pub mod message;
pub mod session;
pub mod stmt;
pub mod variables;
pub mod workspace;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

use anyhow::Result;
use codegen::{emit_workspace, EmitOptions};
use std::path::{Path, PathBuf};

#[cfg(not(target_arch = "wasm32"))]
use message::{HostCommand, JsonLines};
#[cfg(not(target_arch = "wasm32"))]
use session::{Session, SessionCommand, SessionState};
#[cfg(not(target_arch = "wasm32"))]
use tracing::warn;
#[cfg(not(target_arch = "wasm32"))]
use workspace::Workspace;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> Result<()> {
    if args.bridge {
        return run_bridge(args);
    }
    let Some(input) = args.input.as_deref() else {
        anyhow::bail!("INPUT is required unless --bridge is given.");
    };

    let total_stages = 3
        + usize::from(args.emit_document.is_some())
        + usize::from(args.output.is_some());
    let progress = CliProgress::new("Generate", total_stages);
    let mut stage = 0usize;

    stage += 1;
    progress.emit(stage, "Resolving input path");
    let input = canonicalize_file(input)?;

    stage += 1;
    progress.emit(stage, "Reading block document");
    let mut workspace = load_workspace(&input)?;

    stage += 1;
    progress.emit(stage, "Sanitizing variables and generating Python");
    workspace.sanitize_variables();
    let code = emit_workspace(&workspace, args.emit_options());

    if let Some(emit_path) = &args.emit_document {
        stage += 1;
        progress.emit(stage, "Writing normalized document");
        std::fs::write(emit_path, document::encode(&workspace)?.as_bytes())?;
    }

    match &args.output {
        Some(output) => {
            stage += 1;
            progress.emit(stage, "Writing Python output");
            std::fs::write(output, code.as_bytes())?;
        }
        None => print!("{}", code),
    }
    Ok(())
}

/// Serves the host protocol over stdin/stdout, one JSON object per line.
#[cfg(not(target_arch = "wasm32"))]
fn run_bridge(args: &cli::Args) -> Result<()> {
    use std::io::BufRead;

    let initial = match args.input.as_deref() {
        Some(path) => load_workspace(&canonicalize_file(path)?)?,
        None => Workspace::new(),
    };
    let mut pending = Some(initial);
    let mut surface = || pending.take();
    let channel = JsonLines::new(std::io::stdout());
    let mut session = Session::open(&mut surface, channel, args.session_config());
    if session.state() == SessionState::Failed {
        anyhow::bail!("{}", session::EDITOR_TIMEOUT_MESSAGE);
    }

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match HostCommand::parse(&line) {
                Ok(command) => {
                    if tx.send(SessionCommand::Host(command)).is_err() {
                        break;
                    }
                }
                Err(err) => warn!(error = %err, "ignoring undecodable host command"),
            }
        }
    });
    session.run(rx);
    Ok(())
}

/// Decodes a document, migrates its variables and emits Python.
pub fn generate_python(xml: &str, options: EmitOptions) -> Result<String> {
    let mut workspace = document::decode(xml)?;
    workspace.sanitize_variables();
    Ok(emit_workspace(&workspace, options))
}

/// Decodes a document, migrates its variables and re-encodes it.
pub fn normalize_document(xml: &str) -> Result<String> {
    let mut workspace = document::decode(xml)?;
    workspace.sanitize_variables();
    Ok(document::encode(&workspace)?)
}

pub fn generate_python_from_file(input: &Path, options: EmitOptions) -> Result<String> {
    let input = canonicalize_file(input)?;
    let text = std::fs::read_to_string(&input)?;
    generate_python(&text, options)
}

pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

#[cfg(not(target_arch = "wasm32"))]
fn load_workspace(path: &Path) -> Result<Workspace> {
    let text = std::fs::read_to_string(path)?;
    document::decode(&text).map_err(|e| {
        anyhow::anyhow!("Document error: {} (file '{}')", e, pretty_path(path))
    })
}

#[cfg(not(target_arch = "wasm32"))]
fn pretty_path(path: &Path) -> String {
    let raw = path.display().to_string();
    if let Some(stripped) = raw.strip_prefix(r"\\?\") {
        stripped.to_string()
    } else {
        raw
    }
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!(
            "[{}] {}... ({}/{}) {}",
            self.prefix, label, step, self.total, bar
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
