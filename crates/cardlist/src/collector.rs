//! Resolves one value per search-form field by asking the operator.
//!
//! Select fields run through [`SelectMachine`], a small state machine over
//! discrete events so option paging can be driven without a terminal.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};

use crate::types::{FieldKind, FieldSpec, FormSchema, QueryParameters, SelectOption};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Sent for a checkbox the operator left blank.
pub const CHECKBOX_CHECKED: &str = "1";

const RULE: &str = "===============";

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("I/O error while prompting: {0}")]
    Io(#[from] io::Error),
    #[error("Input closed before a value for '{field}' was given")]
    InputClosed { field: String },
}

/// Line-oriented operator channel.
pub trait Prompter {
    fn say(&mut self, line: &str) -> io::Result<()>;

    /// Shows `prompt` and reads one line without its terminator. `None`
    /// means the input is exhausted.
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

pub struct StdioPrompter<R, W> {
    input: R,
    output: W,
}

impl StdioPrompter<io::StdinLock<'static>, io::Stdout> {
    pub fn new() -> Self {
        Self::with_io(io::stdin().lock(), io::stdout())
    }
}

impl Default for StdioPrompter<io::StdinLock<'static>, io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead, W: Write> StdioPrompter<R, W> {
    pub fn with_io(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompter for StdioPrompter<R, W> {
    fn say(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.output, "{}", line)
    }

    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectState {
    AwaitingInput,
    Paging { page: usize },
    Resolved(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectEvent {
    ShowOptions,
    Next,
    Prev,
    Submit(String),
}

impl SelectEvent {
    /// Navigation words only mean something while paging; anywhere else
    /// they are tried as keys.
    pub fn parse(input: &str, state: &SelectState) -> Self {
        let word = input.trim().to_lowercase();
        match state {
            SelectState::Paging { .. } => match word.as_str() {
                "prev" | "p" => SelectEvent::Prev,
                "next" | "n" => SelectEvent::Next,
                _ => SelectEvent::Submit(input.to_string()),
            },
            _ if word == "o" => SelectEvent::ShowOptions,
            _ => SelectEvent::Submit(input.to_string()),
        }
    }
}

/// One window of options, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionPage<'a> {
    pub number: usize,
    pub total: usize,
    pub options: &'a [SelectOption],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition<'a> {
    Show(OptionPage<'a>),
    Rejected(String),
    Resolved(String),
}

#[derive(Debug)]
pub struct SelectMachine<'a> {
    field: &'a FieldSpec,
    page_size: usize,
    state: SelectState,
}

impl<'a> SelectMachine<'a> {
    pub fn new(field: &'a FieldSpec, page_size: usize) -> Self {
        Self {
            field,
            page_size: page_size.max(1),
            state: SelectState::AwaitingInput,
        }
    }

    pub fn state(&self) -> &SelectState {
        &self.state
    }

    pub fn total_pages(&self) -> usize {
        self.field.options.len().div_ceil(self.page_size).max(1)
    }

    pub fn page(&self, number: usize) -> OptionPage<'a> {
        let total = self.total_pages();
        let number = number.clamp(1, total);
        let field: &'a FieldSpec = self.field;
        let options = &field.options;
        let start = ((number - 1) * self.page_size).min(options.len());
        let end = (start + self.page_size).min(options.len());

        OptionPage {
            number,
            total,
            options: &options[start..end],
        }
    }

    pub fn handle(&mut self, event: SelectEvent) -> Transition<'a> {
        if let SelectState::Resolved(value) = &self.state {
            return Transition::Resolved(value.clone());
        }

        match event {
            SelectEvent::Submit(key) => match self.field.find_option(&key) {
                Some(option) => {
                    self.state = SelectState::Resolved(option.value.clone());
                    Transition::Resolved(option.value.clone())
                }
                None => Transition::Rejected(key),
            },
            SelectEvent::ShowOptions => self.show(self.current_page()),
            SelectEvent::Next => match self.state {
                SelectState::Paging { page } => self.show(page + 1),
                _ => self.show(1),
            },
            SelectEvent::Prev => match self.state {
                SelectState::Paging { page } => self.show(page.saturating_sub(1)),
                _ => self.show(1),
            },
        }
    }

    fn current_page(&self) -> usize {
        match self.state {
            SelectState::Paging { page } => page,
            _ => 1,
        }
    }

    fn show(&mut self, number: usize) -> Transition<'a> {
        let page = self.page(number);
        self.state = SelectState::Paging { page: page.number };
        Transition::Show(page)
    }
}

pub struct ValueCollector<P> {
    prompter: P,
    page_size: usize,
    presets: HashMap<String, String>,
}

impl<P: Prompter> ValueCollector<P> {
    pub fn new(prompter: P) -> Self {
        Self {
            prompter,
            page_size: DEFAULT_PAGE_SIZE,
            presets: HashMap::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Answers given up front, keyed by field name.
    pub fn with_presets(mut self, presets: HashMap<String, String>) -> Self {
        self.presets = presets;
        self
    }

    pub fn into_inner(self) -> P {
        self.prompter
    }

    pub fn collect(&mut self, schema: &FormSchema) -> Result<QueryParameters, CollectError> {
        let mut params = QueryParameters::new();

        for field in &schema.fields {
            let value = match field.kind {
                FieldKind::Submit => {
                    self.ignore_preset(field);
                    continue;
                }
                FieldKind::Hidden => {
                    self.ignore_preset(field);
                    field.default_value.clone()
                }
                FieldKind::Text | FieldKind::Checkbox => self.collect_input(field)?,
                FieldKind::Select => self.collect_select(field)?,
            };
            log::debug!("{} = {:?}", field.name, value);
            params.insert(field.name.clone(), value);
        }

        Ok(params)
    }

    fn ignore_preset(&mut self, field: &FieldSpec) {
        if self.presets.remove(&field.name).is_some() {
            log::debug!("Ignoring preset for {} field '{}'", field.kind, field.name);
        }
    }

    fn collect_input(&mut self, field: &FieldSpec) -> Result<String, CollectError> {
        let answer = match self.presets.remove(&field.name) {
            Some(preset) => preset,
            None => {
                let prompt = format!(
                    "Enter value for '{}' (input type: {}): ",
                    field.display_name(),
                    field.kind
                );
                self.read(&prompt, field)?
            }
        };

        if !answer.is_empty() {
            return Ok(answer);
        }
        Ok(match field.kind {
            FieldKind::Checkbox => CHECKBOX_CHECKED.to_string(),
            _ => field.default_value.clone(),
        })
    }

    fn collect_select(&mut self, field: &FieldSpec) -> Result<String, CollectError> {
        let mut machine = SelectMachine::new(field, self.page_size);

        if let Some(preset) = self.presets.remove(&field.name) {
            match machine.handle(SelectEvent::Submit(preset)) {
                Transition::Resolved(value) => return Ok(value),
                Transition::Rejected(key) => log::warn!(
                    "Preset '{}' is not an option of '{}'; asking instead",
                    key,
                    field.name
                ),
                Transition::Show(_) => {}
            }
        }

        loop {
            let prompt = match machine.state() {
                SelectState::Paging { .. } => {
                    "Enter key or type 'prev'/'next' to navigate pages: ".to_string()
                }
                _ => format!(
                    "Enter value for '{}' (input type: {}) (type 'o' to see options): ",
                    field.name, field.kind
                ),
            };
            let input = self.read(&prompt, field)?;
            let event = SelectEvent::parse(&input, machine.state());

            match machine.handle(event) {
                Transition::Resolved(value) => return Ok(value),
                Transition::Rejected(key) => self
                    .prompter
                    .say(&format!("{} not found in keys. Please try again.", key))?,
                Transition::Show(page) => self.render_page(field, &page)?,
            }
        }
    }

    fn render_page(&mut self, field: &FieldSpec, page: &OptionPage) -> io::Result<()> {
        self.prompter
            .say(&format!("{} {} Options: {}", RULE, field.name, RULE))?;
        for option in page.options {
            self.prompter
                .say(&format!("{}  Key: {}", option.label, option.value))?;
        }
        self.prompter.say(&format!("{}{}", RULE, RULE))?;
        self.prompter
            .say(&format!("(Current page: {} of {})", page.number, page.total))
    }

    fn read(&mut self, prompt: &str, field: &FieldSpec) -> Result<String, CollectError> {
        self.prompter
            .ask(prompt)?
            .ok_or_else(|| CollectError::InputClosed {
                field: field.name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedPrompter {
        answers: VecDeque<String>,
        transcript: Vec<String>,
    }

    impl ScriptedPrompter {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                transcript: Vec::new(),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn say(&mut self, line: &str) -> io::Result<()> {
            self.transcript.push(line.to_string());
            Ok(())
        }

        fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
            self.transcript.push(prompt.to_string());
            Ok(self.answers.pop_front())
        }
    }

    fn select_field(name: &str, count: usize) -> FieldSpec {
        FieldSpec {
            kind: FieldKind::Select,
            name: name.to_string(),
            id: None,
            default_value: String::new(),
            options: (1..=count)
                .map(|i| SelectOption {
                    value: format!("K{}", i),
                    label: format!("Option {}", i),
                })
                .collect(),
        }
    }

    fn input_field(kind: FieldKind, name: &str, default: &str) -> FieldSpec {
        FieldSpec {
            kind,
            name: name.to_string(),
            id: Some(format!("{}-id", name)),
            default_value: default.to_string(),
            options: Vec::new(),
        }
    }

    fn shown_len(transition: Transition) -> (usize, usize) {
        match transition {
            Transition::Show(page) => (page.number, page.options.len()),
            other => panic!("expected a page, got {:?}", other),
        }
    }

    #[test]
    fn test_first_page_shows_at_most_ten() {
        for (len, expected) in [(0, 0), (3, 3), (10, 10), (25, 10)] {
            let field = select_field("f", len);
            let mut machine = SelectMachine::new(&field, DEFAULT_PAGE_SIZE);
            assert_eq!(
                shown_len(machine.handle(SelectEvent::ShowOptions)),
                (1, expected),
                "L = {}",
                len
            );
        }
    }

    #[test]
    fn test_next_shows_remainder_and_never_empty() {
        let field = select_field("f", 23);
        let mut machine = SelectMachine::new(&field, DEFAULT_PAGE_SIZE);

        assert_eq!(shown_len(machine.handle(SelectEvent::ShowOptions)), (1, 10));
        assert_eq!(shown_len(machine.handle(SelectEvent::Next)), (2, 10));
        assert_eq!(shown_len(machine.handle(SelectEvent::Next)), (3, 3));
        assert_eq!(shown_len(machine.handle(SelectEvent::Next)), (3, 3));
        assert_eq!(machine.state(), &SelectState::Paging { page: 3 });
    }

    #[test]
    fn test_next_on_evenly_divisible_list() {
        let field = select_field("f", 20);
        let mut machine = SelectMachine::new(&field, DEFAULT_PAGE_SIZE);

        machine.handle(SelectEvent::ShowOptions);
        assert_eq!(shown_len(machine.handle(SelectEvent::Next)), (2, 10));
        assert_eq!(shown_len(machine.handle(SelectEvent::Next)), (2, 10));
    }

    #[test]
    fn test_prev_from_first_page_is_noop() {
        let field = select_field("f", 15);
        let mut machine = SelectMachine::new(&field, DEFAULT_PAGE_SIZE);

        machine.handle(SelectEvent::ShowOptions);
        assert_eq!(shown_len(machine.handle(SelectEvent::Prev)), (1, 10));
        assert_eq!(machine.state(), &SelectState::Paging { page: 1 });

        machine.handle(SelectEvent::Next);
        assert_eq!(shown_len(machine.handle(SelectEvent::Prev)), (1, 10));
    }

    #[test]
    fn test_prev_returns_to_the_same_window() {
        let field = select_field("f", 35);
        let mut machine = SelectMachine::new(&field, DEFAULT_PAGE_SIZE);

        machine.handle(SelectEvent::ShowOptions);
        machine.handle(SelectEvent::Next);
        machine.handle(SelectEvent::Next);
        match machine.handle(SelectEvent::Prev) {
            Transition::Show(page) => {
                assert_eq!(page.number, 2);
                assert_eq!(page.options.first().unwrap().value, "K11");
                assert_eq!(page.options.last().unwrap().value, "K20");
            }
            other => panic!("expected a page, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_page_size() {
        let field = select_field("f", 7);
        let mut machine = SelectMachine::new(&field, 3);

        assert_eq!(machine.total_pages(), 3);
        machine.handle(SelectEvent::ShowOptions);
        machine.handle(SelectEvent::Next);
        assert_eq!(shown_len(machine.handle(SelectEvent::Next)), (3, 1));
    }

    #[test]
    fn test_select_key_resolves_with_option_value() {
        let field = select_field("f", 12);
        let mut machine = SelectMachine::new(&field, DEFAULT_PAGE_SIZE);

        assert_eq!(
            machine.handle(SelectEvent::Submit("k12".into())),
            Transition::Resolved("K12".into())
        );
        assert_eq!(machine.state(), &SelectState::Resolved("K12".into()));
    }

    #[test]
    fn test_invalid_key_keeps_state() {
        let field = select_field("f", 12);
        let mut machine = SelectMachine::new(&field, DEFAULT_PAGE_SIZE);

        assert_eq!(
            machine.handle(SelectEvent::Submit("zz".into())),
            Transition::Rejected("zz".into())
        );
        assert_eq!(machine.state(), &SelectState::AwaitingInput);

        machine.handle(SelectEvent::ShowOptions);
        machine.handle(SelectEvent::Next);
        machine.handle(SelectEvent::Submit("zz".into()));
        assert_eq!(machine.state(), &SelectState::Paging { page: 2 });
    }

    #[test]
    fn test_event_parse_depends_on_state() {
        let paging = SelectState::Paging { page: 1 };
        assert_eq!(SelectEvent::parse("O", &SelectState::AwaitingInput), SelectEvent::ShowOptions);
        assert_eq!(
            SelectEvent::parse("next", &SelectState::AwaitingInput),
            SelectEvent::Submit("next".into())
        );
        assert_eq!(SelectEvent::parse("N", &paging), SelectEvent::Next);
        assert_eq!(SelectEvent::parse("prev", &paging), SelectEvent::Prev);
        assert_eq!(SelectEvent::parse("K3", &paging), SelectEvent::Submit("K3".into()));
    }

    #[test]
    fn test_collect_follows_field_policies() {
        let schema = FormSchema {
            submit_url: "/search".into(),
            method: crate::types::Method::Post,
            fields: vec![
                input_field(FieldKind::Text, "keyword", "none"),
                input_field(FieldKind::Text, "title", ""),
                input_field(FieldKind::Checkbox, "exact", "on"),
                input_field(FieldKind::Hidden, "cmd", "search"),
                input_field(FieldKind::Submit, "button", "Search"),
            ],
        };
        let prompter = ScriptedPrompter::new(&["", "Kanade", ""]);
        let mut collector = ValueCollector::new(prompter);

        let params = collector.collect(&schema).unwrap();

        assert_eq!(params.get("keyword"), Some("none"));
        assert_eq!(params.get("title"), Some("Kanade"));
        assert_eq!(params.get("exact"), Some(CHECKBOX_CHECKED));
        assert_eq!(params.get("cmd"), Some("search"));
        assert_eq!(params.get("button"), None);
        assert_eq!(params.len(), 4);

        let transcript = collector.into_inner().transcript;
        assert_eq!(transcript[0], "Enter value for 'keyword-id' (input type: text): ");
        assert!(transcript.iter().all(|line| !line.contains("cmd")));
    }

    #[test]
    fn test_collect_select_with_paging_and_retry() {
        let schema = FormSchema {
            submit_url: String::new(),
            method: crate::types::Method::Get,
            fields: vec![select_field("expansion", 15)],
        };
        let prompter = ScriptedPrompter::new(&["bogus", "o", "next", "nope", "k14"]);
        let mut collector = ValueCollector::new(prompter);

        let params = collector.collect(&schema).unwrap();
        assert_eq!(params.get("expansion"), Some("K14"));

        let transcript = collector.into_inner().transcript;
        assert!(transcript.contains(&"bogus not found in keys. Please try again.".to_string()));
        assert!(transcript.contains(&"nope not found in keys. Please try again.".to_string()));
        assert!(transcript.contains(&"(Current page: 2 of 2)".to_string()));
        assert!(transcript.contains(&"(Current page: 1 of 2)".to_string()));
        assert!(transcript.contains(&"Option 15  Key: K15".to_string()));
    }

    #[test]
    fn test_collect_uses_valid_presets() {
        let schema = FormSchema {
            submit_url: String::new(),
            method: crate::types::Method::Get,
            fields: vec![
                select_field("expansion", 5),
                input_field(FieldKind::Text, "keyword", ""),
                input_field(FieldKind::Hidden, "cmd", "search"),
            ],
        };
        let presets = HashMap::from([
            ("expansion".to_string(), "k2".to_string()),
            ("keyword".to_string(), "Yuri".to_string()),
            ("cmd".to_string(), "other".to_string()),
        ]);
        let mut collector = ValueCollector::new(ScriptedPrompter::default()).with_presets(presets);

        let params = collector.collect(&schema).unwrap();
        assert_eq!(params.get("expansion"), Some("K2"));
        assert_eq!(params.get("keyword"), Some("Yuri"));
        assert_eq!(params.get("cmd"), Some("search"));
        assert!(collector.into_inner().transcript.is_empty());
    }

    #[test]
    fn test_invalid_preset_falls_back_to_prompt() {
        let schema = FormSchema {
            submit_url: String::new(),
            method: crate::types::Method::Get,
            fields: vec![select_field("expansion", 5)],
        };
        let presets = HashMap::from([("expansion".to_string(), "K9".to_string())]);
        let mut collector =
            ValueCollector::new(ScriptedPrompter::new(&["K3"])).with_presets(presets);

        assert_eq!(collector.collect(&schema).unwrap().get("expansion"), Some("K3"));
    }

    #[test]
    fn test_collect_reports_closed_input() {
        let schema = FormSchema {
            submit_url: String::new(),
            method: crate::types::Method::Get,
            fields: vec![select_field("expansion", 5)],
        };
        let mut collector = ValueCollector::new(ScriptedPrompter::new(&["o"]));

        match collector.collect(&schema) {
            Err(CollectError::InputClosed { field }) => assert_eq!(field, "expansion"),
            other => panic!("expected closed input, got {:?}", other),
        }
    }

    #[test]
    fn test_stdio_prompter_reads_lines() {
        let input = io::Cursor::new("first\r\nsecond\n");
        let mut output = Vec::new();
        {
            let mut prompter = StdioPrompter::with_io(input, &mut output);
            assert_eq!(prompter.ask("> ").unwrap().as_deref(), Some("first"));
            assert_eq!(prompter.ask("> ").unwrap().as_deref(), Some("second"));
            assert_eq!(prompter.ask("> ").unwrap(), None);
            prompter.say("done").unwrap();
        }
        assert_eq!(String::from_utf8(output).unwrap(), "> > > done\n");
    }
}
