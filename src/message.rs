use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Outbound notification pushed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostMessage {
    Python { code: String },
    Workspace { xml: String },
    Error { message: String },
}

/// Inbound request from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostCommand {
    Restore { xml: String },
    Dispose,
}

impl HostCommand {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text.trim())
    }
}

/// Fire-and-forget message channel to the host.
pub trait HostChannel {
    fn post(&mut self, message: &HostMessage) -> Result<()>;
}

impl HostChannel for Vec<HostMessage> {
    fn post(&mut self, message: &HostMessage) -> Result<()> {
        self.push(message.clone());
        Ok(())
    }
}

impl<C: HostChannel + ?Sized> HostChannel for &mut C {
    fn post(&mut self, message: &HostMessage) -> Result<()> {
        (**self).post(message)
    }
}

impl<C: HostChannel + ?Sized> HostChannel for Box<C> {
    fn post(&mut self, message: &HostMessage) -> Result<()> {
        (**self).post(message)
    }
}

/// Writes one JSON object per line.
pub struct JsonLines<W: Write> {
    writer: W,
}

impl<W: Write> JsonLines<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> HostChannel for JsonLines<W> {
    fn post(&mut self, message: &HostMessage) -> Result<()> {
        let line = serde_json::to_string(message)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_use_type_discriminant() {
        let python = HostMessage::Python {
            code: "print(1)\n".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&python).unwrap(),
            json!({"type": "python", "code": "print(1)\n"})
        );
        let workspace = HostMessage::Workspace {
            xml: "<xml />".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&workspace).unwrap(),
            json!({"type": "workspace", "xml": "<xml />"})
        );
        let error = HostMessage::Error {
            message: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"type": "error", "message": "boom"})
        );
    }

    #[test]
    fn commands_parse_from_host_json() {
        assert_eq!(
            HostCommand::parse(r#"{"type":"restore","xml":"<xml/>"}"#).unwrap(),
            HostCommand::Restore {
                xml: "<xml/>".to_string()
            }
        );
        assert_eq!(
            HostCommand::parse(" {\"type\":\"dispose\"}\n").unwrap(),
            HostCommand::Dispose
        );
        assert!(HostCommand::parse(r#"{"type":"explode"}"#).is_err());
        assert!(HostCommand::parse("not json").is_err());
    }

    #[test]
    fn json_lines_writes_one_object_per_line() {
        let mut channel = JsonLines::new(Vec::new());
        channel
            .post(&HostMessage::Python {
                code: "x = 1\n".to_string(),
            })
            .unwrap();
        channel
            .post(&HostMessage::Error {
                message: "late".to_string(),
            })
            .unwrap();
        let text = String::from_utf8(channel.into_inner()).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            serde_json::from_str::<HostMessage>(lines[0]).unwrap(),
            HostMessage::Python {
                code: "x = 1\n".to_string()
            }
        );
    }
}
