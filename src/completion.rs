//! Candidate generation for the token under the cursor, and the Tab
//! resolution rules built on top of it.
//!
//! A query never mutates its sources; the same line, cursor and sources always
//! give the same ordered candidates.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use rustyline::history::History;

use crate::exec_index::ExecutableIndex;

/// Everything a query may draw candidates from.
pub struct Sources<'a> {
    pub builtins: &'a [&'a str],
    pub index: &'a ExecutableIndex,
    pub history: &'a History,
    /// Directory relative paths are resolved against.
    pub cwd: &'a Path,
}

/// Where the token sits, which decides the candidate sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    /// First word of a stage
    Command,
    /// First argument of `cd`
    ChangeDir,
    /// Token containing `/`
    Path { dirs_only: bool },
    Argument,
}

/// The token ending at the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub start: usize,
    pub end: usize,
    pub token: String,
    pub context: Context,
}

impl Query {
    pub fn at(line: &str, cursor: usize) -> Query {
        let cursor = floor_char_boundary(line, cursor.min(line.len()));
        let before = &line[..cursor];
        let start = before
            .rfind(char::is_whitespace)
            .map(|i| i + before[i..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        let token = before[start..].to_owned();

        let previous: Vec<&str> = before[..start].split_whitespace().collect();
        // Words since the last pipe belong to the stage being edited.
        let stage: &[&str] = match previous.iter().rposition(|w| *w == "|") {
            Some(p) => &previous[p + 1..],
            None => &previous,
        };
        let after_cd = stage.len() == 1 && stage[0] == "cd";

        let context = if token.contains('/') {
            Context::Path {
                dirs_only: after_cd,
            }
        } else if stage.is_empty() {
            Context::Command
        } else if after_cd {
            Context::ChangeDir
        } else {
            Context::Argument
        };

        Query {
            start,
            end: cursor,
            token,
            context,
        }
    }
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Idle, or armed by an unresolved Tab on a given line/cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoublePress {
    Idle,
    Armed {
        at: Instant,
        line: String,
        cursor: usize,
    },
}

impl DoublePress {
    /// True when this press completes a double press: same line and cursor,
    /// inside `window`. Otherwise (re)arms and returns false.
    pub fn press(&mut self, line: &str, cursor: usize, now: Instant, window: Duration) -> bool {
        let second = match &*self {
            DoublePress::Armed {
                at,
                line: armed_line,
                cursor: armed_cursor,
            } => {
                armed_line == line
                    && *armed_cursor == cursor
                    && now.saturating_duration_since(*at) <= window
            }
            DoublePress::Idle => false,
        };

        if second {
            *self = DoublePress::Idle;
        } else {
            *self = DoublePress::Armed {
                at: now,
                line: line.to_owned(),
                cursor,
            };
        }
        second
    }

    pub fn reset(&mut self) {
        *self = DoublePress::Idle;
    }
}

/// What a Tab press asks the editor to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabOutcome {
    Nothing,
    /// Replace `line[start..end]` with `text`; cursor goes after it.
    Replace {
        start: usize,
        end: usize,
        text: String,
    },
    /// Ambiguous and pressed twice: show all candidates.
    Listing(Vec<String>),
    /// Ambiguous, first press.
    Armed,
}

pub struct Completer {
    pending: DoublePress,
    window: Duration,
    limit: usize,
}

impl Completer {
    pub fn new(window: Duration, limit: usize) -> Completer {
        Completer {
            pending: DoublePress::Idle,
            window,
            limit,
        }
    }

    pub fn candidates(&self, sources: &Sources, query: &Query) -> Vec<String> {
        let mut out = Candidates::new(self.limit);
        match query.context {
            Context::Command => {
                if query.token.is_empty() {
                    return vec![];
                }
                for b in sources.builtins.iter().filter(|b| b.starts_with(&query.token)) {
                    out.push(b);
                }
                for name in sources.index.matching(&query.token) {
                    out.push(name);
                }
                for entry in sources.history.iter().rev() {
                    if let Some(word) = entry.split_whitespace().next() {
                        if word.starts_with(&query.token) {
                            out.push(word);
                        }
                    }
                }
            }
            Context::ChangeDir => {
                for name in list_dir(sources.cwd, &query.token, true) {
                    out.push(&name);
                }
            }
            Context::Argument => {
                for name in list_dir(sources.cwd, &query.token, false) {
                    out.push(&name);
                }
            }
            Context::Path { dirs_only } => {
                // Split after the last '/', keep what the user typed as the prefix.
                let slash = query.token.rfind('/').unwrap_or(0);
                let (typed_dir, partial) = query.token.split_at(slash + 1);
                let lookup = resolve_dir(sources.cwd, typed_dir);
                for name in list_dir(&lookup, partial, dirs_only) {
                    out.push(&format!("{}{}", typed_dir, name));
                }
            }
        }
        out.into_vec()
    }

    pub fn query(&self, sources: &Sources, line: &str, cursor: usize) -> (Query, Vec<String>) {
        let query = Query::at(line, cursor);
        let candidates = self.candidates(sources, &query);
        (query, candidates)
    }

    /// Top candidate, when it actually extends a non-empty token.
    pub fn suggestion(&self, sources: &Sources, line: &str, cursor: usize) -> Option<(Query, String)> {
        let (query, candidates) = self.query(sources, line, cursor);
        if query.token.is_empty() {
            return None;
        }
        let top = candidates.into_iter().next()?;
        if top.len() > query.token.len() && top.starts_with(&query.token) {
            Some((query, top))
        } else {
            None
        }
    }

    pub fn tab(&mut self, sources: &Sources, line: &str, cursor: usize, now: Instant) -> TabOutcome {
        let (query, candidates) = self.query(sources, line, cursor);

        match candidates.len() {
            0 => TabOutcome::Nothing,
            1 => {
                self.pending.reset();
                let text = candidates.into_iter().next().unwrap_or_default();
                TabOutcome::Replace {
                    start: query.start,
                    end: query.end,
                    text,
                }
            }
            _ => {
                let common = longest_common_prefix(&candidates);
                if common.len() > query.token.len() && common.starts_with(&query.token) {
                    self.pending.reset();
                    return TabOutcome::Replace {
                        start: query.start,
                        end: query.end,
                        text: common.to_owned(),
                    };
                }
                if self.pending.press(line, cursor, now, self.window) {
                    TabOutcome::Listing(candidates)
                } else {
                    TabOutcome::Armed
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.pending.reset();
    }
}

/// Ordered, deduplicated, capped.
struct Candidates {
    items: Vec<String>,
    seen: HashSet<String>,
    limit: usize,
}

impl Candidates {
    fn new(limit: usize) -> Self {
        Candidates {
            items: vec![],
            seen: HashSet::new(),
            limit,
        }
    }

    fn push(&mut self, candidate: &str) {
        if self.items.len() < self.limit && self.seen.insert(candidate.to_owned()) {
            self.items.push(candidate.to_owned());
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}

/// Longest prefix shared by every candidate, on char boundaries.
pub fn longest_common_prefix(candidates: &[String]) -> &str {
    let first = match candidates.first() {
        Some(f) => f.as_str(),
        None => return "",
    };
    let mut end = first.len();
    for c in &candidates[1..] {
        end = first
            .char_indices()
            .zip(c.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((i, a), _)| i + a.len_utf8())
            .unwrap_or(0)
            .min(end);
    }
    &first[..end]
}

fn resolve_dir(cwd: &Path, typed_dir: &str) -> PathBuf {
    let expanded = if typed_dir.starts_with("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(&typed_dir[2..]),
            None => PathBuf::from("/").join(&typed_dir[2..]),
        }
    } else {
        PathBuf::from(typed_dir)
    };
    if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    }
}

/// Entries of `dir` starting with `partial`, by name. Directories get a
/// trailing '/'. Hidden entries only when asked for with a leading '.'.
fn list_dir(dir: &Path, partial: &str, dirs_only: bool) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return vec![],
    };
    let mut names = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let is_dir = e.path().is_dir();
            let name = e.file_name().into_string().ok()?;
            Some((name, is_dir))
        })
        .filter(|(name, _)| name.starts_with(partial))
        .filter(|(name, _)| partial.starts_with('.') || !name.starts_with('.'))
        .filter(|(_, is_dir)| !dirs_only || *is_dir)
        .map(|(mut name, is_dir)| {
            if is_dir {
                name.push('/');
            }
            name
        })
        .collect::<Vec<String>>();
    names.sort();
    names
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::File;

    const BUILTINS: &[&str] = &["pwd"];

    fn sources<'a>(index: &'a ExecutableIndex, history: &'a History, cwd: &'a Path) -> Sources<'a> {
        Sources {
            builtins: BUILTINS,
            index,
            history,
            cwd,
        }
    }

    fn completer() -> Completer {
        Completer::new(Duration::from_millis(800), 200)
    }

    #[test]
    fn command_candidates_builtins_then_index() {
        let index = ExecutableIndex::from_names(vec!["perl", "python3", "ls"]);
        let history = History::new();
        let cwd = Path::new(".");
        let src = sources(&index, &history, cwd);

        let (query, found) = completer().query(&src, "p", 1);
        assert_eq!(query.context, Context::Command);
        assert_eq!(found, vec!["pwd", "perl", "python3"]);
    }

    #[test]
    fn repeated_queries_are_identical() {
        let index = ExecutableIndex::from_names(vec!["perl", "python3"]);
        let history = History::new();
        let src = sources(&index, &history, Path::new("."));
        let c = completer();

        let first = c.query(&src, "p", 1).1;
        let second = c.query(&src, "p", 1).1;
        assert_eq!(first, second);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn history_words_follow_and_dedupe() {
        let index = ExecutableIndex::from_names(vec!["grep"]);
        let mut history = History::new();
        history.add("./gradle build");
        history.add("grep foo bar");
        history.add("gzip -d x.gz");
        let src = sources(&index, &history, Path::new("."));

        let (_, found) = completer().query(&src, "g", 1);
        assert_eq!(found, vec!["grep", "gzip"]);
    }

    #[test]
    fn single_candidate_replaces_token() {
        let index = ExecutableIndex::from_names(vec!["perl"]);
        let history = History::new();
        let src = sources(&index, &history, Path::new("."));

        let outcome = completer().tab(&src, "pw", 2, Instant::now());
        assert_eq!(
            outcome,
            TabOutcome::Replace {
                start: 0,
                end: 2,
                text: "pwd".to_owned()
            }
        );
    }

    #[test]
    fn common_prefix_extends_without_listing() {
        let index = ExecutableIndex::from_names(vec!["python2", "python3"]);
        let history = History::new();
        let src = sources(&index, &history, Path::new("."));
        let mut c = completer();

        let outcome = c.tab(&src, "py", 2, Instant::now());
        assert_eq!(
            outcome,
            TabOutcome::Replace {
                start: 0,
                end: 2,
                text: "python".to_owned()
            }
        );
    }

    #[test]
    fn second_press_in_window_lists() {
        let index = ExecutableIndex::from_names(vec!["perl", "python3"]);
        let history = History::new();
        let src = sources(&index, &history, Path::new("."));
        let mut c = completer();
        let t0 = Instant::now();

        assert_eq!(c.tab(&src, "p", 1, t0), TabOutcome::Armed);
        assert_eq!(
            c.tab(&src, "p", 1, t0 + Duration::from_millis(300)),
            TabOutcome::Listing(vec![
                "pwd".to_owned(),
                "perl".to_owned(),
                "python3".to_owned()
            ])
        );
        // Listing clears the marker: the next press arms again.
        assert_eq!(
            c.tab(&src, "p", 1, t0 + Duration::from_millis(400)),
            TabOutcome::Armed
        );
    }

    #[test]
    fn late_second_press_rearms() {
        let index = ExecutableIndex::from_names(vec!["perl", "python3"]);
        let history = History::new();
        let src = sources(&index, &history, Path::new("."));
        let mut c = completer();
        let t0 = Instant::now();

        assert_eq!(c.tab(&src, "p", 1, t0), TabOutcome::Armed);
        assert_eq!(
            c.tab(&src, "p", 1, t0 + Duration::from_secs(2)),
            TabOutcome::Armed
        );
        // Rearmed at the late press, so a quick third press lists.
        assert!(matches!(
            c.tab(&src, "p", 1, t0 + Duration::from_millis(2300)),
            TabOutcome::Listing(_)
        ));
    }

    #[test]
    fn zero_candidates_is_noop() {
        let index = ExecutableIndex::default();
        let history = History::new();
        let src = sources(&index, &history, Path::new("."));
        assert_eq!(
            completer().tab(&src, "zzz", 3, Instant::now()),
            TabOutcome::Nothing
        );
    }

    #[test]
    fn cd_only_offers_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::create_dir(dir.path().join("scripts")).unwrap();
        File::create(dir.path().join("setup.py")).unwrap();

        let index = ExecutableIndex::default();
        let history = History::new();
        let src = sources(&index, &history, dir.path());

        let (query, found) = completer().query(&src, "cd s", 4);
        assert_eq!(query.context, Context::ChangeDir);
        assert_eq!(found, vec!["scripts/", "src/"]);
    }

    #[test]
    fn path_token_keeps_typed_prefix() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        File::create(dir.path().join("docs").join("guide.md")).unwrap();
        File::create(dir.path().join("docs").join("glossary.md")).unwrap();
        File::create(dir.path().join("docs").join(".hidden")).unwrap();

        let index = ExecutableIndex::default();
        let history = History::new();
        let src = sources(&index, &history, dir.path());

        let (query, found) = completer().query(&src, "cat docs/g", 10);
        assert_eq!(query.context, Context::Path { dirs_only: false });
        assert_eq!(query.start, 4);
        assert_eq!(found, vec!["docs/glossary.md", "docs/guide.md"]);

        let (_, found) = completer().query(&src, "cat docs/", 9);
        assert_eq!(found, vec!["docs/glossary.md", "docs/guide.md"]);
    }

    #[test]
    fn argument_lists_current_directory() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();
        File::create(dir.path().join("other")).unwrap();

        let index = ExecutableIndex::default();
        let history = History::new();
        let src = sources(&index, &history, dir.path());

        let (query, found) = completer().query(&src, "cat no", 6);
        assert_eq!(query.context, Context::Argument);
        assert_eq!(found, vec!["notes.txt"]);
    }

    #[test]
    fn after_pipe_is_command_position() {
        let q = Query::at("ls | w", 6);
        assert_eq!(q.context, Context::Command);
        assert_eq!(q.token, "w");
        assert_eq!(q.start, 5);
    }

    #[test]
    fn suggestion_needs_extension() {
        let index = ExecutableIndex::from_names(vec!["python3"]);
        let history = History::new();
        let src = sources(&index, &history, Path::new("."));
        let c = completer();

        let (_, top) = c.suggestion(&src, "pyt", 3).unwrap();
        assert_eq!(top, "python3");
        assert!(c.suggestion(&src, "python3", 7).is_none());
        assert!(c.suggestion(&src, "", 0).is_none());
    }

    #[test]
    fn common_prefix_of_candidates() {
        let v = vec!["python2".to_owned(), "python3".to_owned(), "pyt".to_owned()];
        assert_eq!(longest_common_prefix(&v), "pyt");
        assert_eq!(longest_common_prefix(&[]), "");
        let v = vec!["abc".to_owned(), "xyz".to_owned()];
        assert_eq!(longest_common_prefix(&v), "");
    }

    #[test]
    fn candidate_cap_applies() {
        let names: Vec<String> = (0..50).map(|i| format!("tool{:02}", i)).collect();
        let index = ExecutableIndex::from_names(names);
        let history = History::new();
        let src = sources(&index, &history, Path::new("."));
        let c = Completer::new(Duration::from_millis(800), 10);

        assert_eq!(c.query(&src, "tool", 4).1.len(), 10);
    }
}
