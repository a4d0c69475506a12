use std::str::FromStr;

use tracing::debug;

use crate::{
    error::{Result, ShellError},
    redirection::Redirection,
};

/// Output file and whether it is appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: String,
    pub append: bool,
}

/// One finished line, split into what the executor needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedCommand {
    pub args: Vec<String>,
    /// Right stage of a single pipe.
    pub pipe_to: Option<Vec<String>>,
    pub input: Option<String>,
    pub output: Option<OutputTarget>,
    pub background: bool,
}

impl ParsedCommand {
    /// Parses a line into a command. Only one pipe is understood: a second
    /// `|` is a literal argument of the right stage, and redirection
    /// operators inside a pipeline are passed through as arguments.
    pub fn parse(line: &str, max_args: usize) -> Result<ParsedCommand> {
        let mut words: Vec<String> = line
            .split_whitespace()
            .take(max_args)
            .map(String::from)
            .collect();

        let mut background = false;
        if words.last().map(String::as_str) == Some("&") {
            words.pop();
            background = true;
        }

        if words.is_empty() {
            return Err(ShellError::Syntax(String::from("missing command")));
        }

        let mut parsed = ParsedCommand {
            background,
            ..Default::default()
        };

        if let Some(pipe) = words.iter().position(|w| w == "|") {
            let right = words.split_off(pipe + 1);
            words.pop();
            if words.is_empty() || right.is_empty() {
                return Err(ShellError::Syntax(String::from(
                    "pipe needs a command on both sides",
                )));
            }
            parsed.args = words;
            parsed.pipe_to = Some(right);
            debug!(?parsed, "parsed pipeline");
            return Ok(parsed);
        }

        let mut args = Vec::with_capacity(words.len());
        let mut words_iter = words.into_iter();
        while let Some(w) = words_iter.next() {
            let redir = match Redirection::from_str(&w) {
                Ok(r) => r,
                Err(_) => {
                    args.push(w);
                    continue;
                }
            };
            // Only the first input and the first output operator count.
            let already_set = match redir {
                Redirection::ReadIn => parsed.input.is_some(),
                Redirection::WriteOut | Redirection::AppendOut => parsed.output.is_some(),
            };
            if already_set {
                args.push(w);
                continue;
            }

            let filename = match words_iter.next() {
                Some(f) => f,
                None => {
                    return Err(ShellError::Syntax(format!(
                        "missing file name after '{}'",
                        redir
                    )))
                }
            };
            match redir {
                Redirection::ReadIn => parsed.input = Some(filename),
                Redirection::WriteOut => {
                    parsed.output = Some(OutputTarget {
                        path: filename,
                        append: false,
                    })
                }
                Redirection::AppendOut => {
                    parsed.output = Some(OutputTarget {
                        path: filename,
                        append: true,
                    })
                }
            }
        }

        if args.is_empty() {
            return Err(ShellError::Syntax(String::from("missing command")));
        }
        parsed.args = args;
        debug!(?parsed, "parsed command");
        Ok(parsed)
    }

    pub fn is_redirected(&self) -> bool {
        self.input.is_some() || self.output.is_some()
    }

    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(line: &str) -> ParsedCommand {
        ParsedCommand::parse(line, 99).unwrap()
    }

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn plain_command() {
        let p = parse("ls -la /tmp");
        assert_eq!(p.args, words("ls -la /tmp"));
        assert!(!p.background);
        assert!(p.pipe_to.is_none());
        assert!(!p.is_redirected());
    }

    #[test]
    fn trailing_ampersand_sets_background() {
        let p = parse("sleep 5 &");
        assert_eq!(p.args, words("sleep 5"));
        assert!(p.background);

        // Only a standalone trailing token counts
        let p = parse("echo a&");
        assert_eq!(p.args, words("echo a&"));
        assert!(!p.background);
    }

    #[test]
    fn single_pipe_splits_stages() {
        let p = parse("echo hi | wc -c");
        assert_eq!(p.args, words("echo hi"));
        assert_eq!(p.pipe_to, Some(words("wc -c")));
    }

    #[test]
    fn second_pipe_is_literal() {
        let p = parse("cat f | grep a | wc");
        assert_eq!(p.args, words("cat f"));
        assert_eq!(p.pipe_to, Some(words("grep a | wc")));
    }

    #[test]
    fn redirections_inside_pipeline_are_literal() {
        let p = parse("cat < in | sort > out");
        assert_eq!(p.args, words("cat < in"));
        assert_eq!(p.pipe_to, Some(words("sort > out")));
        assert!(p.input.is_none());
        assert!(p.output.is_none());
    }

    #[test]
    fn output_truncate_and_append() {
        let p = parse("echo data > out.txt");
        assert_eq!(p.args, words("echo data"));
        assert_eq!(
            p.output,
            Some(OutputTarget {
                path: String::from("out.txt"),
                append: false
            })
        );

        let p = parse("echo data >> out.txt");
        assert_eq!(p.output.unwrap().append, true);
    }

    #[test]
    fn input_and_output_together() {
        let p = parse("sort < in.txt > out.txt");
        assert_eq!(p.args, words("sort"));
        assert_eq!(p.input, Some(String::from("in.txt")));
        assert_eq!(p.output.unwrap().path, "out.txt");
    }

    #[test]
    fn later_duplicate_operator_is_literal() {
        let p = parse("echo a > one > two");
        assert_eq!(p.output.unwrap().path, "one");
        assert_eq!(p.args, words("echo a > two"));
    }

    #[test]
    fn errors() {
        assert!(ParsedCommand::parse("&", 99).is_err());
        assert!(ParsedCommand::parse("echo >", 99).is_err());
        assert!(ParsedCommand::parse("| wc", 99).is_err());
        assert!(ParsedCommand::parse("> out", 99).is_err());
    }

    #[test]
    fn argument_count_is_capped() {
        let line = (0..120).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let p = ParsedCommand::parse(&line, 99).unwrap();
        assert_eq!(p.args.len(), 99);
    }
}
