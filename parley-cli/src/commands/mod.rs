//! Operator input: classification into commands, and the session loop.

pub mod interactive;

use std::collections::BTreeMap;

use parley_harness::ParleyConfig;
use thiserror::Error;

/// URI scheme customer records are served under.
pub const RESOURCE_SCHEME: &str = "customers://";

/// URI of the customer resource `id`. An empty id is passed through; the
/// server decides what it means.
pub fn resource_uri(id: &str) -> String {
    format!("{RESOURCE_SCHEME}{id}")
}

/// One line of operator input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// End the session.
    Quit,
    /// `@<id>`: read the customer resource.
    ResourceQuery { id: String },
    /// `/prompts`: list the server's prompt catalog.
    ListPrompts,
    /// `/prompt <name> [key=value ...]`: render a prompt and ask the agent.
    ExecutePrompt {
        name: String,
        args: BTreeMap<String, String>,
    },
    /// A recognised command used the wrong way.
    Usage(UsageError),
    /// A `/` command nobody knows.
    UnknownCommand { token: String },
    /// Anything else goes to the agent as is.
    FreeQuery { text: String },
}

/// Malformed use of a known command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("Usage: /prompt <name> <arg1=value1> <arg2=value2>")]
    MissingPromptName,
}

/// Maps raw input lines to [`Command`]s. Every line maps to exactly one.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    quit_commands: Vec<String>,
}

impl Default for CommandClassifier {
    fn default() -> Self {
        Self::new(["quit", "exit", "q"])
    }
}

impl CommandClassifier {
    /// Classifier ending the session on any of `quit_commands`
    /// (case-insensitive).
    pub fn new<I, S>(quit_commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            quit_commands: quit_commands.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &ParleyConfig) -> Self {
        Self::new(config.quit_commands.iter().cloned())
    }

    /// Classify one line. Surrounding whitespace is ignored.
    pub fn classify(&self, raw: &str) -> Command {
        let line = raw.trim();

        if self
            .quit_commands
            .iter()
            .any(|q| q.eq_ignore_ascii_case(line))
        {
            return Command::Quit;
        }

        if let Some(id) = line.strip_prefix('@') {
            return Command::ResourceQuery { id: id.to_string() };
        }

        if line.starts_with('/') {
            let mut tokens = line.split_whitespace();
            let command = tokens.next().unwrap_or_default().to_lowercase();
            return match command.as_str() {
                "/prompts" => Command::ListPrompts,
                "/prompt" => match tokens.next() {
                    Some(name) => Command::ExecutePrompt {
                        name: name.to_string(),
                        args: parse_prompt_args(tokens),
                    },
                    None => Command::Usage(UsageError::MissingPromptName),
                },
                _ => Command::UnknownCommand { token: command },
            };
        }

        Command::FreeQuery {
            text: line.to_string(),
        }
    }
}

/// `key=value` tokens, split on the first `=`. Tokens without `=` are
/// dropped; a repeated key keeps its last value.
fn parse_prompt_args<'a>(tokens: impl Iterator<Item = &'a str>) -> BTreeMap<String, String> {
    let mut args = BTreeMap::new();
    for (key, value) in tokens.filter_map(|token| token.split_once('=')) {
        args.insert(key.to_string(), value.to_string());
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(raw: &str) -> Command {
        CommandClassifier::default().classify(raw)
    }

    fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn quit_words_in_any_case() {
        for raw in ["quit", "Exit", "q", "QUIT", "  exit  "] {
            assert_eq!(classify(raw), Command::Quit, "{raw}");
        }
        assert_eq!(
            classify("quitting"),
            Command::FreeQuery {
                text: "quitting".into()
            }
        );
    }

    #[test]
    fn configured_quit_words_replace_the_defaults() {
        let classifier = CommandClassifier::new(["bye"]);
        assert_eq!(classifier.classify("BYE"), Command::Quit);
        assert_eq!(
            classifier.classify("q"),
            Command::FreeQuery { text: "q".into() }
        );
    }

    #[test]
    fn resource_queries() {
        assert_eq!(classify("@42"), Command::ResourceQuery { id: "42".into() });
        assert_eq!(classify("@"), Command::ResourceQuery { id: String::new() });
        assert_eq!(resource_uri(""), "customers://");
        assert_eq!(resource_uri("acme"), "customers://acme");
    }

    #[test]
    fn prompt_with_arguments() {
        assert_eq!(
            classify("/prompt greet name=Ana city=SP"),
            Command::ExecutePrompt {
                name: "greet".into(),
                args: args(&[("name", "Ana"), ("city", "SP")]),
            }
        );
    }

    #[test]
    fn prompt_argument_edge_cases() {
        assert_eq!(
            classify("/prompt search"),
            Command::ExecutePrompt {
                name: "search".into(),
                args: BTreeMap::new(),
            }
        );
        assert_eq!(
            classify("/PROMPT search stray q=a=b area=SP area=RJ"),
            Command::ExecutePrompt {
                name: "search".into(),
                args: args(&[("q", "a=b"), ("area", "RJ")]),
            }
        );
    }

    #[test]
    fn prompt_without_name_is_a_usage_error() {
        assert_eq!(
            classify("/prompt"),
            Command::Usage(UsageError::MissingPromptName)
        );
        assert_eq!(
            classify("/prompt   "),
            Command::Usage(UsageError::MissingPromptName)
        );
    }

    #[test]
    fn slash_commands() {
        assert_eq!(classify("/prompts"), Command::ListPrompts);
        assert_eq!(classify("/Prompts extra"), Command::ListPrompts);
        assert_eq!(
            classify("/bogus"),
            Command::UnknownCommand {
                token: "/bogus".into()
            }
        );
        assert_eq!(
            classify("/"),
            Command::UnknownCommand { token: "/".into() }
        );
    }

    #[test]
    fn everything_else_is_a_free_query() {
        assert_eq!(
            classify("hello there"),
            Command::FreeQuery {
                text: "hello there".into()
            }
        );
        assert_eq!(
            classify("what is 2 + 3? @noon /now"),
            Command::FreeQuery {
                text: "what is 2 + 3? @noon /now".into()
            }
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = CommandClassifier::default();
        for raw in ["@7", "/prompts", "/prompt a b=c", "/x", "hi", "q"] {
            assert_eq!(classifier.classify(raw), classifier.classify(raw));
        }
    }
}
