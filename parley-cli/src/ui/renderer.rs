//! Line-oriented output for the interactive session.
//!
//! Every method writes complete lines to the operator's output stream and
//! holds no formatting state between calls. Write failures are ignored: a
//! closed stdout must not take the session down with it.

use std::fmt::Display;
use std::io::Write;

use parley_harness::events::{AgentEvent, ToolResultEvent};
use parley_mcp::PromptDescriptor;

use crate::commands::UsageError;

/// Printed after every agent exchange.
pub const SEPARATOR: &str = "------------------------------";

/// Marker shown while waiting for operator input.
pub const INPUT_PROMPT: &str = "💬: ";

const TOOL_OUTPUT_LIMIT: usize = 400;

/// Truncate to `max_chars` characters, not bytes.
fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Formats session output onto `W`.
pub struct Renderer<W: Write> {
    out: W,
}

impl<W: Write> Renderer<W> {
    /// Render onto `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: impl Display) {
        let _ = writeln!(self.out, "{text}");
    }

    pub fn banner(&mut self) {
        self.line("\nMCP Chatbot started!");
        self.line("Type your queries or 'quit' to exit.");
        self.line("Use @<customer_id> to search for customers information");
        self.line("Use /prompts to list available prompts");
        self.line("Use /prompt <name> <arg1=value1> to execute a prompt");
    }

    pub fn input_prompt(&mut self) {
        let _ = write!(self.out, "{INPUT_PROMPT}");
        let _ = self.out.flush();
    }

    pub fn farewell(&mut self) {
        self.line("Goodbye!");
    }

    pub fn resource(&mut self, uri: &str, text: &str) {
        self.line(format_args!("\nResource: {uri}"));
        self.line("Content:");
        self.line(text);
    }

    pub fn no_content(&mut self) {
        self.line("No content available!");
    }

    /// One entry per prompt, with its argument names in declared order.
    pub fn prompts(&mut self, prompts: &[PromptDescriptor]) {
        if prompts.is_empty() {
            self.line("No prompts available.");
            return;
        }
        for prompt in prompts {
            self.line(format_args!(
                "- {}: {}",
                prompt.name,
                prompt.description.as_deref().unwrap_or_default()
            ));
            if !prompt.arguments.is_empty() {
                self.line("  Arguments:");
                for arg in &prompt.arguments {
                    self.line(format_args!("    - {}", arg.name));
                }
            }
        }
    }

    pub fn executing_prompt(&mut self, name: &str) {
        self.line(format_args!("\nExecuting prompt...'{name}'..."));
    }

    pub fn usage(&mut self, error: &UsageError) {
        self.line(error);
    }

    pub fn unknown_command(&mut self, token: &str) {
        self.line(format_args!("Unknown command: {token}"));
    }

    /// Render one agent event. Tool call requests are not shown; their
    /// outcome is, once the tool returns.
    pub fn agent_event(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::Assistant(message) => self.agent_message(&message.content),
            AgentEvent::ToolResult(result) => self.tool_invoked(result),
            AgentEvent::ToolCall(_) => {}
        }
    }

    /// Empty content renders nothing.
    pub fn agent_message(&mut self, content: &str) {
        if !content.is_empty() {
            self.line(format_args!("🤖: {content} \n"));
        }
    }

    pub fn tool_invoked(&mut self, event: &ToolResultEvent) {
        let outcome = match (&event.result, &event.error) {
            (_, Some(error)) => format!("error: {error}"),
            (Some(serde_json::Value::Object(map)), None) if map.len() == 1 => {
                match map.values().next() {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                }
            }
            (Some(value), None) => value.to_string(),
            (None, None) => String::new(),
        };
        self.line(format_args!(
            "🛠️ Tool Invoked: {} -> {}",
            event.tool_name,
            truncate_string(&outcome, TOOL_OUTPUT_LIMIT)
        ));
    }

    pub fn separator(&mut self) {
        self.line(SEPARATOR);
    }

    /// A command failed; the session goes on.
    pub fn error(&mut self, error: &dyn Display) {
        self.line(format_args!("Error: {error}"));
    }

    /// The session is over.
    pub fn fatal(&mut self, error: &dyn Display) {
        self.line(format_args!("An error occurred: {error}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_harness::events::AssistantEvent;
    use parley_mcp::PromptArgument;
    use serde_json::json;

    fn rendered(f: impl FnOnce(&mut Renderer<Vec<u8>>)) -> String {
        let mut renderer = Renderer::new(Vec::new());
        f(&mut renderer);
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    fn argument(name: &str) -> PromptArgument {
        PromptArgument {
            name: name.to_string(),
            description: None,
            required: true,
        }
    }

    #[test]
    fn prompt_listing_shows_arguments() {
        let prompts = vec![
            PromptDescriptor {
                name: "search".into(),
                description: Some("find customers".into()),
                arguments: vec![argument("area"), argument("num_customers")],
            },
            PromptDescriptor {
                name: "hello".into(),
                description: None,
                arguments: vec![],
            },
        ];

        let out = rendered(|r| r.prompts(&prompts));
        assert_eq!(
            out,
            "- search: find customers\n  Arguments:\n    - area\n    - num_customers\n- hello: \n"
        );
    }

    #[test]
    fn agent_message_rendering_is_repeatable() {
        let event = AgentEvent::Assistant(AssistantEvent {
            content: "The sum is 5.".into(),
        });
        let once = rendered(|r| r.agent_event(&event));
        let twice = rendered(|r| {
            r.agent_event(&event);
            r.agent_event(&event);
        });
        assert_eq!(twice, format!("{once}{once}"));
        assert!(once.contains("🤖: The sum is 5."));
    }

    #[test]
    fn empty_agent_message_is_skipped() {
        assert_eq!(rendered(|r| r.agent_message("")), "");
    }

    #[test]
    fn tool_results_and_failures() {
        let ok = ToolResultEvent {
            tool_name: "add".into(),
            result: Some(json!({"result": "5"})),
            error: None,
            duration: Some(0.1),
            tool_call_id: "call_1".into(),
        };
        assert_eq!(rendered(|r| r.tool_invoked(&ok)), "🛠️ Tool Invoked: add -> 5\n");

        let failed = ToolResultEvent {
            result: None,
            error: Some("division by zero".into()),
            ..ok
        };
        assert_eq!(
            rendered(|r| r.tool_invoked(&failed)),
            "🛠️ Tool Invoked: add -> error: division by zero\n"
        );
    }

    #[test]
    fn tool_call_requests_are_not_rendered() {
        let event = AgentEvent::ToolCall(parley_harness::events::ToolCallEvent {
            tool_name: "add".into(),
            args: json!({}),
            tool_call_id: "call_1".into(),
        });
        assert_eq!(rendered(|r| r.agent_event(&event)), "");
    }

    #[test]
    fn long_tool_output_is_truncated_on_char_boundaries() {
        let long = "é".repeat(TOOL_OUTPUT_LIMIT + 10);
        let truncated = truncate_string(&long, TOOL_OUTPUT_LIMIT);
        assert_eq!(truncated.chars().count(), TOOL_OUTPUT_LIMIT);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn resource_and_separator() {
        let out = rendered(|r| {
            r.resource("customers://acme", "Acme Corp, active");
            r.separator();
        });
        assert_eq!(
            out,
            format!("\nResource: customers://acme\nContent:\nAcme Corp, active\n{SEPARATOR}\n")
        );
        assert_eq!(SEPARATOR.len(), 30);
    }
}
