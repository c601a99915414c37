use crate::codegen::{EmitOptions, TopLevelOrder};
use crate::session::{SessionConfig, WaitConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "blockpy",
    about = "Generate Python from a Blockly-style block document."
)]
pub struct Args {
    #[arg(value_name = "INPUT", required_unless_present = "bridge")]
    pub input: Option<PathBuf>,

    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        help = "Write the document with sanitized variables to this path."
    )]
    pub emit_document: Option<PathBuf>,

    #[arg(
        long,
        help = "Emit top-level chains top-to-bottom by canvas position instead of creation order."
    )]
    pub visual_order: bool,

    #[arg(
        long,
        help = "Serve the host protocol as JSON lines over stdin/stdout. INPUT, if given, is the initial document."
    )]
    pub bridge: bool,

    #[arg(
        long,
        default_value_t = 10_000,
        help = "How long the bridge waits for the editor to become ready."
    )]
    pub wait_timeout_ms: u64,

    #[arg(short, long, help = "Log debug output to stderr.")]
    pub verbose: bool,
}

impl Args {
    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            order: if self.visual_order {
                TopLevelOrder::Visual
            } else {
                TopLevelOrder::Insertion
            },
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            emit: self.emit_options(),
            wait: WaitConfig {
                timeout: Duration::from_millis(self.wait_timeout_ms),
                ..WaitConfig::default()
            },
        }
    }
}
