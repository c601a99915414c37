//! The single live editing session.
//!
//! A [`Session`] waits for the editor surface, then keeps the generated
//! program and the serialized document in step with every graph mutation
//! and pushes both to the host. Each event is handled to completion before
//! the next one is looked at.

use crate::block::{Block, BlockId, Field, VarId};
use crate::codegen::{emit_workspace, EmitOptions};
use crate::document::{self, DocumentError};
use crate::message::{HostChannel, HostCommand, HostMessage};
use crate::workspace::{Placement, Position, Workspace, WorkspaceError};
use std::fmt;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const EDITOR_TIMEOUT_MESSAGE: &str = "Timed out waiting for the block editor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Failed,
    Disposed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
            SessionState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is {0}, not ready")]
    NotReady(SessionState),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Something that eventually hands over the editor's program graph.
pub trait EditorSurface {
    fn poll(&mut self) -> Option<Workspace>;
}

impl<F> EditorSurface for F
where
    F: FnMut() -> Option<Workspace>,
{
    fn poll(&mut self) -> Option<Workspace> {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    pub emit: EmitOptions,
    pub wait: WaitConfig,
}

/// Change notification from the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    BlockCreated {
        block: Block,
        position: Option<Position>,
    },
    BlockMoved {
        id: BlockId,
        to: Placement,
    },
    BlockChanged {
        id: BlockId,
        field: String,
        value: Field,
    },
    BlockDeleted {
        id: BlockId,
    },
    VariableCreated {
        name: String,
    },
    VariableRenamed {
        id: VarId,
        name: String,
    },
    VariableDeleted {
        id: VarId,
    },
    ViewportChanged,
    SelectionChanged {
        id: Option<BlockId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Code and document were rebuilt and pushed.
    Regenerated,
    /// Nothing in the graph changed; only the view needs refreshing.
    LayoutRefresh,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Editor(EditorEvent),
    Host(HostCommand),
    Dispose,
}

pub struct Session<C: HostChannel> {
    state: SessionState,
    workspace: Workspace,
    code: String,
    document: String,
    channel: C,
    config: SessionConfig,
}

impl<C: HostChannel> Session<C> {
    /// Creates an uninitialized session; see [`Session::open`].
    pub fn new(channel: C, config: SessionConfig) -> Self {
        Self {
            state: SessionState::Uninitialized,
            workspace: Workspace::new(),
            code: String::new(),
            document: String::new(),
            channel,
            config,
        }
    }

    /// Waits for `surface` and brings the session up.
    ///
    /// On timeout the session ends in [`SessionState::Failed`] after posting
    /// a single error message.
    pub fn open(surface: &mut impl EditorSurface, channel: C, config: SessionConfig) -> Self {
        let mut session = Self::new(channel, config);
        session.start(surface);
        session
    }

    fn start(&mut self, surface: &mut impl EditorSurface) {
        let wait = self.config.wait;
        let started = Instant::now();
        let mut polls = 0usize;
        let workspace = loop {
            polls += 1;
            if let Some(workspace) = surface.poll() {
                break Some(workspace);
            }
            if started.elapsed() >= wait.timeout {
                break None;
            }
            thread::sleep(wait.poll_interval);
        };

        let Some(mut workspace) = workspace else {
            let timeout_ms = wait.timeout.as_millis() as u64;
            warn!(polls, timeout_ms, "editor surface never became ready");
            self.state = SessionState::Failed;
            self.push(HostMessage::Error {
                message: EDITOR_TIMEOUT_MESSAGE.to_string(),
            });
            return;
        };

        let migrated = workspace.sanitize_variables();
        info!(polls, migrated, blocks = workspace.block_count(), "editor ready");
        self.workspace = workspace;
        self.state = SessionState::Ready;
        if let Err(err) = self.refresh() {
            warn!(error = %err, "initial document could not be serialized");
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Program text from the last regeneration.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Serialized document from the last regeneration.
    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Applies one editor notification.
    ///
    /// A rejected mutation leaves the graph and both caches untouched.
    pub fn handle(&mut self, event: EditorEvent) -> Result<EventOutcome, SessionError> {
        self.ensure_ready()?;
        match event {
            EditorEvent::ViewportChanged | EditorEvent::SelectionChanged { .. } => {
                return Ok(EventOutcome::LayoutRefresh);
            }
            EditorEvent::BlockCreated { block, position } => {
                self.workspace.add_top_block(block, position)?;
            }
            EditorEvent::BlockMoved { id, to } => self.workspace.move_block(&id, to)?,
            EditorEvent::BlockChanged { id, field, value } => {
                self.workspace.set_field(&id, &field, value)?;
            }
            EditorEvent::BlockDeleted { id } => {
                self.workspace.remove_block(&id)?;
            }
            EditorEvent::VariableCreated { name } => {
                self.workspace.create_variable(&name);
            }
            EditorEvent::VariableRenamed { id, name } => {
                self.workspace.rename_variable(&id, &name)?;
            }
            EditorEvent::VariableDeleted { id } => self.workspace.delete_variable(&id)?,
        }
        self.refresh()?;
        Ok(EventOutcome::Regenerated)
    }

    /// Replaces the graph with a previously serialized document.
    pub fn restore(&mut self, xml: &str) -> Result<(), SessionError> {
        self.ensure_ready()?;
        let mut workspace = document::decode(xml).map_err(|err| {
            warn!(error = %err, "restore rejected, keeping current graph");
            err
        })?;
        let migrated = workspace.sanitize_variables();
        debug!(migrated, blocks = workspace.block_count(), "restoring document");
        let (code, document) = self.render(&workspace)?;
        self.workspace = workspace;
        self.publish(code, document);
        Ok(())
    }

    pub fn handle_host_command(&mut self, command: HostCommand) -> Result<(), SessionError> {
        match command {
            HostCommand::Restore { xml } => self.restore(&xml),
            HostCommand::Dispose => {
                self.dispose();
                Ok(())
            }
        }
    }

    /// Handles one raw JSON command; text that does not decode is ignored.
    pub fn handle_host_text(&mut self, raw: &str) -> Result<(), SessionError> {
        match HostCommand::parse(raw) {
            Ok(command) => self.handle_host_command(command),
            Err(err) => {
                warn!(error = %err, "ignoring undecodable host command");
                Ok(())
            }
        }
    }

    /// Processes commands one at a time until disposal or until every
    /// sender is gone.
    pub fn run(&mut self, commands: Receiver<SessionCommand>) {
        while let Ok(command) = commands.recv() {
            let result = match command {
                SessionCommand::Editor(event) => self.handle(event).map(|_| ()),
                SessionCommand::Host(command) => self.handle_host_command(command),
                SessionCommand::Dispose => {
                    self.dispose();
                    Ok(())
                }
            };
            if let Err(err) = result {
                warn!(error = %err, "command rejected");
            }
            if self.state == SessionState::Disposed {
                break;
            }
        }
    }

    pub fn dispose(&mut self) {
        if self.state != SessionState::Disposed {
            info!(from = %self.state, "session disposed");
            self.state = SessionState::Disposed;
        }
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(SessionError::NotReady(self.state))
        }
    }

    fn refresh(&mut self) -> Result<(), SessionError> {
        let (code, document) = self.render(&self.workspace)?;
        self.publish(code, document);
        Ok(())
    }

    fn render(&self, workspace: &Workspace) -> Result<(String, String), SessionError> {
        let code = emit_workspace(workspace, self.config.emit);
        let document = document::encode(workspace)?;
        Ok((code, document))
    }

    /// Caches a consistent code/document pair and pushes both.
    fn publish(&mut self, code: String, document: String) {
        self.code = code;
        self.document = document;
        self.push(HostMessage::Python {
            code: self.code.clone(),
        });
        self.push(HostMessage::Workspace {
            xml: self.document.clone(),
        });
    }

    fn push(&mut self, message: HostMessage) {
        if let Err(err) = self.channel.post(&message) {
            warn!(error = %err, "failed to deliver message to host");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;
    use crate::codegen::EMPTY_PROGRAM;
    use std::sync::mpsc;

    fn quick() -> SessionConfig {
        SessionConfig {
            emit: EmitOptions::default(),
            wait: WaitConfig {
                timeout: Duration::from_millis(30),
                poll_interval: Duration::from_millis(5),
            },
        }
    }

    fn ready(workspace: Workspace) -> Session<Vec<HostMessage>> {
        let mut pending = Some(workspace);
        Session::open(&mut || pending.take(), Vec::new(), quick())
    }

    fn print_number(id: &str, n: &str) -> Block {
        Block::new(id, BlockKind::Print).with_input(
            "VALUE",
            Block::new(format!("{id}_n").as_str(), BlockKind::Number).with_text("NUM", n),
        )
    }

    #[test]
    fn timeout_reports_one_error_and_fails() {
        let mut surface = || -> Option<Workspace> { None };
        let session = Session::open(&mut surface, Vec::<HostMessage>::new(), quick());
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(
            session.channel(),
            &vec![HostMessage::Error {
                message: EDITOR_TIMEOUT_MESSAGE.to_string()
            }]
        );
    }

    #[test]
    fn surface_that_appears_late_still_opens() {
        let mut attempts = 0;
        let mut surface = || {
            attempts += 1;
            (attempts >= 3).then(Workspace::new)
        };
        let channel = Vec::<HostMessage>::new();
        let session = Session::open(&mut surface, channel, SessionConfig::default());
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.code(), EMPTY_PROGRAM);
    }

    #[test]
    fn ready_pushes_code_then_document() {
        let session = ready(Workspace::new());
        let messages = session.channel();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            HostMessage::Python {
                code: EMPTY_PROGRAM.to_string()
            }
        );
        assert!(matches!(
            &messages[1],
            HostMessage::Workspace { xml } if xml == session.document()
        ));
    }

    #[test]
    fn opening_migrates_unsanitized_variables() {
        let mut vars = crate::variables::VariableRegistry::new();
        vars.insert_declared(VarId::from("v"), "2x");
        let set = Block::new("s", BlockKind::VariableSet)
            .with_variable("VAR", VarId::from("v"))
            .with_input("VALUE", Block::new("n", BlockKind::Number).with_text("NUM", "7"));
        let workspace = Workspace::with_parts(
            vec![crate::workspace::TopBlock {
                block: set,
                position: None,
            }],
            vars,
        );
        let session = ready(workspace);
        assert_eq!(session.code(), "_2x = 7\n");
        assert!(session.workspace().variables().get(&VarId::from("v")).is_none());
    }

    #[test]
    fn mutations_regenerate_and_push() {
        let mut session = ready(Workspace::new());
        let outcome = session
            .handle(EditorEvent::BlockCreated {
                block: print_number("p", "1"),
                position: None,
            })
            .unwrap();
        assert_eq!(outcome, EventOutcome::Regenerated);
        assert_eq!(session.code(), "print(1)\n");
        let messages = session.channel();
        assert_eq!(messages.len(), 4);
        assert_eq!(
            messages[2],
            HostMessage::Python {
                code: "print(1)\n".to_string()
            }
        );

        session
            .handle(EditorEvent::BlockChanged {
                id: BlockId::from("p_n"),
                field: "NUM".to_string(),
                value: Field::Text("2".to_string()),
            })
            .unwrap();
        assert_eq!(session.code(), "print(2)\n");

        session
            .handle(EditorEvent::BlockDeleted {
                id: BlockId::from("p"),
            })
            .unwrap();
        assert_eq!(session.code(), EMPTY_PROGRAM);
    }

    #[test]
    fn view_events_do_not_regenerate() {
        let mut session = ready(Workspace::new());
        assert_eq!(
            session.handle(EditorEvent::ViewportChanged).unwrap(),
            EventOutcome::LayoutRefresh
        );
        assert_eq!(
            session
                .handle(EditorEvent::SelectionChanged { id: None })
                .unwrap(),
            EventOutcome::LayoutRefresh
        );
        assert_eq!(session.channel().len(), 2);
    }

    #[test]
    fn rejected_edit_keeps_caches() {
        let mut session = ready(Workspace::new());
        session
            .handle(EditorEvent::BlockCreated {
                block: print_number("p", "1"),
                position: None,
            })
            .unwrap();
        let document = session.document().to_string();
        let err = session
            .handle(EditorEvent::BlockMoved {
                id: BlockId::from("missing"),
                to: Placement::TopLevel(Position::default()),
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::Workspace(WorkspaceError::UnknownBlock(_))));
        assert_eq!(session.code(), "print(1)\n");
        assert_eq!(session.document(), document);
        assert_eq!(session.channel().len(), 4);
    }

    #[test]
    fn restore_replaces_graph_and_bad_documents_are_rejected() {
        let mut session = ready(Workspace::new());
        let saved = r#"<xml>
  <block type="import_statement" id="i"><field name="MODULE">math</field></block>
</xml>"#;
        session.restore(saved).unwrap();
        assert_eq!(session.code(), "import math\n");

        let graph = session.workspace().clone();
        let document = session.document().to_string();
        let before = session.channel().len();
        assert!(matches!(
            session.restore("<xml><block"),
            Err(SessionError::Document(_))
        ));
        assert_eq!(session.code(), "import math\n");
        assert_eq!(session.document(), document);
        assert_eq!(session.workspace(), &graph);
        assert_eq!(session.channel().len(), before);
    }

    #[test]
    fn restore_commits_graph_code_and_document_together() {
        let mut session = ready(Workspace::new());
        let saved = r#"<xml>
  <variables><variable id="v">2 fast</variable></variables>
  <block type="variables_set" id="s"><field name="VAR" id="v">2 fast</field></block>
</xml>"#;
        session.restore(saved).unwrap();
        assert_eq!(session.code(), "_2_fast = None\n");
        assert_eq!(emit_workspace(session.workspace(), EmitOptions::default()), session.code());
        let reloaded = document::decode(session.document()).unwrap();
        assert_eq!(emit_workspace(&reloaded, EmitOptions::default()), session.code());
        let messages = session.channel();
        assert_eq!(
            messages[messages.len() - 2],
            HostMessage::Python {
                code: session.code().to_string()
            }
        );
        assert_eq!(
            messages[messages.len() - 1],
            HostMessage::Workspace {
                xml: session.document().to_string()
            }
        );
    }

    #[test]
    fn variable_events_flow_through_registry() {
        let mut session = ready(Workspace::new());
        session
            .handle(EditorEvent::VariableCreated {
                name: "my var".to_string(),
            })
            .unwrap();
        let id = session
            .workspace()
            .variables()
            .find_by_name("my_var")
            .map(|v| v.id.clone())
            .unwrap();
        session
            .handle(EditorEvent::BlockCreated {
                block: Block::new("g", BlockKind::Print).with_input(
                    "VALUE",
                    Block::new("r", BlockKind::VariableGet).with_variable("VAR", id.clone()),
                ),
                position: None,
            })
            .unwrap();
        assert_eq!(session.code(), "print(my_var)\n");

        session
            .handle(EditorEvent::VariableRenamed {
                id: id.clone(),
                name: "score!".to_string(),
            })
            .unwrap();
        assert_eq!(session.code(), "print(score_)\n");

        session
            .handle(EditorEvent::VariableDeleted { id })
            .unwrap();
        assert_eq!(session.code(), "print(\"\")\n");
    }

    #[test]
    fn host_text_is_decoded_or_ignored() {
        let mut session = ready(Workspace::new());
        session.handle_host_text("garbage").unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        session.handle_host_text(r#"{"type":"dispose"}"#).unwrap();
        assert_eq!(session.state(), SessionState::Disposed);
        assert!(matches!(
            session.handle(EditorEvent::ViewportChanged),
            Err(SessionError::NotReady(SessionState::Disposed))
        ));
    }

    #[test]
    fn run_processes_commands_until_dispose() {
        let mut session = ready(Workspace::new());
        let (tx, rx) = mpsc::channel();
        tx.send(SessionCommand::Editor(EditorEvent::BlockCreated {
            block: print_number("a", "1"),
            position: None,
        }))
        .unwrap();
        tx.send(SessionCommand::Editor(EditorEvent::BlockMoved {
            id: BlockId::from("nope"),
            to: Placement::TopLevel(Position::default()),
        }))
        .unwrap();
        tx.send(SessionCommand::Editor(EditorEvent::BlockCreated {
            block: print_number("b", "2"),
            position: None,
        }))
        .unwrap();
        tx.send(SessionCommand::Dispose).unwrap();
        tx.send(SessionCommand::Editor(EditorEvent::BlockDeleted {
            id: BlockId::from("a"),
        }))
        .unwrap();
        session.run(rx);
        assert_eq!(session.state(), SessionState::Disposed);
        assert_eq!(session.code(), "print(1)\nprint(2)\n");
    }
}
