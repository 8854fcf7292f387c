use crate::worker::{Backend, Outcome, Worker};
use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ncp_core::{DeviceRecord, SourceKind};
use std::sync::Arc;
use tracing::info;

pub const SYNC_OK_MESSAGE: &str = "Sync was successful";
pub const SYNC_FAILED_MESSAGE: &str = "Sync was not successful";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    CommandBar,
    Sidebar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Raw,
    Parsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncField {
    Source,
    Url,
    Token,
    Submit,
}

impl SyncField {
    const ORDER: [SyncField; 4] = [
        SyncField::Source,
        SyncField::Url,
        SyncField::Token,
        SyncField::Submit,
    ];

    fn step(self, delta: isize) -> Self {
        let idx = Self::ORDER
            .iter()
            .position(|field| *field == self)
            .unwrap_or(0) as isize;
        let len = Self::ORDER.len() as isize;
        Self::ORDER[(idx + delta).rem_euclid(len) as usize]
    }
}

/// Inventory sidebar inputs and the outcome of the last sync.
#[derive(Debug, Clone)]
pub struct SyncForm {
    pub source: SourceKind,
    pub url: String,
    pub token: String,
    pub field: SyncField,
    pub status: Option<String>,
    pub last_synced: Option<DateTime<Local>>,
}

impl SyncForm {
    /// Prefills from `NCP_SOT_SOURCE`, `NCP_SOT_URL` and `NCP_SOT_TOKEN`.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            source: read("NCP_SOT_SOURCE")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(SourceKind::Netbox),
            url: read("NCP_SOT_URL").unwrap_or_default(),
            token: read("NCP_SOT_TOKEN").unwrap_or_default(),
            field: SyncField::Source,
            status: None,
            last_synced: None,
        }
    }

    pub fn masked_token(&self) -> String {
        "*".repeat(self.token.chars().count())
    }

    pub fn last_synced_label(&self) -> String {
        match self.last_synced {
            Some(at) => format!("Last synced: {}", at.format("%Y-%m-%d %H:%M:%S")),
            None => "Last synced: -".to_string(),
        }
    }
}

pub struct App {
    pub input: String,
    pub raw_output: String,
    pub parsed_output: String,
    pub running: Option<String>,
    pub last_command: Option<String>,
    pub raw_scroll: u16,
    pub parsed_scroll: u16,
    pub scroll_pane: Pane,
    pub focus: Focus,
    pub show_sidebar: bool,
    pub show_help: bool,
    pub sync_form: SyncForm,
    pub inventory: Vec<DeviceRecord>,
    pub should_quit: bool,
    worker: Worker,
}

impl App {
    pub fn new(backend: Arc<dyn Backend>, sync_form: SyncForm) -> Self {
        let worker = Worker::new(backend);
        let inventory = worker.inventory();
        Self {
            input: String::new(),
            raw_output: String::new(),
            parsed_output: String::new(),
            running: None,
            last_command: None,
            raw_scroll: 0,
            parsed_scroll: 0,
            scroll_pane: Pane::Raw,
            focus: Focus::CommandBar,
            show_sidebar: false,
            show_help: false,
            sync_form,
            inventory,
            should_quit: false,
            worker,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn sync_running(&self) -> bool {
        self.worker.sync_pending()
    }

    pub fn on_tick(&mut self) {
        for outcome in self.worker.poll() {
            self.apply(outcome);
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Executed { line, result, .. } => {
                let (raw, parsed) = result.display_pair();
                self.raw_output = raw;
                self.parsed_output = parsed;
                self.raw_scroll = 0;
                self.parsed_scroll = 0;
                self.running = None;
                self.last_command = Some(line);
            }
            Outcome::Synced {
                ok,
                inventory,
                finished_at,
                ..
            } => {
                if ok {
                    self.sync_form.status = Some(SYNC_OK_MESSAGE.to_string());
                    self.sync_form.last_synced = Some(finished_at);
                    self.inventory = inventory;
                    info!(devices = self.inventory.len(), "inventory reloaded");
                } else {
                    self.sync_form.status = Some(SYNC_FAILED_MESSAGE.to_string());
                }
            }
        }
    }

    pub fn submit_command(&mut self) {
        let line = self.input.trim().to_string();
        if line.is_empty() {
            return;
        }
        if let (true, Some(previous)) = (self.worker.command_pending(), &self.running) {
            info!(previous = %previous, "superseding running command");
        }
        self.worker.submit_command(&line);
        self.running = Some(line);
        self.input.clear();
    }

    pub fn submit_sync(&mut self) {
        let form = &self.sync_form;
        let (source, url, token) = (form.source.as_str(), form.url.clone(), form.token.clone());
        self.worker.submit_sync(source, &url, &token);
        self.sync_form.status = None;
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('b') if ctrl => {
                self.toggle_sidebar();
                return;
            }
            KeyCode::F(2) => {
                self.toggle_sidebar();
                return;
            }
            KeyCode::F(1) => {
                self.show_help = !self.show_help;
                return;
            }
            KeyCode::F(3) => {
                self.scroll_pane = match self.scroll_pane {
                    Pane::Raw => Pane::Parsed,
                    Pane::Parsed => Pane::Raw,
                };
                return;
            }
            KeyCode::Esc => {
                if self.show_help {
                    self.show_help = false;
                } else if self.focus == Focus::Sidebar {
                    self.focus = Focus::CommandBar;
                } else {
                    self.should_quit = true;
                }
                return;
            }
            KeyCode::Up => {
                if self.focus == Focus::Sidebar {
                    self.sync_form.field = self.sync_form.field.step(-1);
                } else {
                    self.scroll(-1);
                }
                return;
            }
            KeyCode::Down => {
                if self.focus == Focus::Sidebar {
                    self.sync_form.field = self.sync_form.field.step(1);
                } else {
                    self.scroll(1);
                }
                return;
            }
            KeyCode::PageUp => {
                self.scroll(-10);
                return;
            }
            KeyCode::PageDown => {
                self.scroll(10);
                return;
            }
            _ => {}
        }

        match self.focus {
            Focus::CommandBar => self.handle_command_key(key),
            Focus::Sidebar => self.handle_sidebar_key(key),
        }
    }

    fn handle_command_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit_command(),
            KeyCode::Tab => {
                if let Some(completed) = complete_input(&self.input, &self.inventory) {
                    self.input = completed;
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char('?') if self.input.is_empty() => {
                self.show_help = !self.show_help;
            }
            KeyCode::Char(ch) => self.input.push(ch),
            _ => {}
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Enter && self.sync_form.field == SyncField::Submit {
            if !self.worker.sync_pending() {
                self.submit_sync();
            }
            return;
        }
        let form = &mut self.sync_form;
        match key.code {
            KeyCode::Tab | KeyCode::Enter => form.field = form.field.step(1),
            KeyCode::BackTab => form.field = form.field.step(-1),
            KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')
                if form.field == SyncField::Source =>
            {
                form.source = form.source.next();
            }
            KeyCode::Backspace => match form.field {
                SyncField::Url => {
                    form.url.pop();
                }
                SyncField::Token => {
                    form.token.pop();
                }
                _ => {}
            },
            KeyCode::Char(ch) => match form.field {
                SyncField::Url => form.url.push(ch),
                SyncField::Token => form.token.push(ch),
                _ => {}
            },
            _ => {}
        }
    }

    fn toggle_sidebar(&mut self) {
        if self.show_sidebar && self.focus == Focus::Sidebar {
            self.show_sidebar = false;
            self.focus = Focus::CommandBar;
        } else {
            self.show_sidebar = true;
            self.focus = Focus::Sidebar;
        }
    }

    fn scroll(&mut self, delta: i32) {
        let target = match self.scroll_pane {
            Pane::Raw => &mut self.raw_scroll,
            Pane::Parsed => &mut self.parsed_scroll,
        };
        *target = (*target as i32 + delta).clamp(0, u16::MAX as i32) as u16;
    }
}

/// Tab completion for the command bar: the host from the inventory, then the
/// `show` verb.
pub fn complete_input(input: &str, inventory: &[DeviceRecord]) -> Option<String> {
    let ends_with_space = input.ends_with(char::is_whitespace);
    let tokens: Vec<&str> = input.split_whitespace().collect();

    match (tokens.as_slice(), ends_with_space) {
        ([], _) => None,
        ([host], false) => complete_host(host, inventory),
        ([host], true) => Some(format!("{host} show ")),
        ([host, verb], false) if "show".starts_with(verb) && *verb != "show" => {
            Some(format!("{host} show "))
        }
        _ => None,
    }
}

fn complete_host(prefix: &str, inventory: &[DeviceRecord]) -> Option<String> {
    let needle = prefix.to_lowercase();
    let mut candidates: Vec<&str> = inventory
        .iter()
        .flat_map(|record| [record.name.as_str(), record.address()])
        .filter(|candidate| candidate.to_lowercase().starts_with(&needle))
        .collect();
    candidates.sort_unstable();
    candidates.dedup();

    match candidates.as_slice() {
        [] => None,
        [only] => Some(format!("{only} ")),
        many => {
            let common = common_prefix(many);
            (common.chars().count() > prefix.chars().count()).then_some(common)
        }
    }
}

fn common_prefix(items: &[&str]) -> String {
    let Some(first) = items.first() else {
        return String::new();
    };
    let mut prefix: Vec<char> = first.chars().collect();
    for item in &items[1..] {
        let shared = prefix
            .iter()
            .zip(item.chars())
            .take_while(|(a, b)| **a == *b)
            .count();
        prefix.truncate(shared);
    }
    prefix.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::tests::{wait_for, FakeBackend};
    use std::sync::Mutex;
    use std::time::Duration;

    fn record(name: &str, ip: &str) -> DeviceRecord {
        DeviceRecord {
            name: name.to_string(),
            primary_ip: ip.to_string(),
            device_type: "ISR4331".to_string(),
        }
    }

    fn inventory() -> Vec<DeviceRecord> {
        vec![
            record("nyc-edge-01", "10.0.0.1/32"),
            record("nyc-edge-02", "10.0.0.2/32"),
            record("lon-core-01", "10.1.0.1/32"),
        ]
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn blank_form() -> SyncForm {
        SyncForm {
            source: SourceKind::Netbox,
            url: String::new(),
            token: String::new(),
            field: SyncField::Source,
            status: None,
            last_synced: None,
        }
    }

    #[test]
    fn unique_host_completes_with_trailing_space() {
        assert_eq!(
            complete_input("lon", &inventory()),
            Some("lon-core-01 ".to_string())
        );
        assert_eq!(
            complete_input("10.1", &inventory()),
            Some("10.1.0.1 ".to_string())
        );
    }

    #[test]
    fn ambiguous_host_completes_common_prefix() {
        assert_eq!(
            complete_input("ny", &inventory()),
            Some("nyc-edge-0".to_string())
        );
        assert_eq!(complete_input("nyc-edge-0", &inventory()), None);
        assert_eq!(complete_input("zzz", &inventory()), None);
    }

    #[test]
    fn verb_is_completed_after_host() {
        assert_eq!(
            complete_input("r1 ", &inventory()),
            Some("r1 show ".to_string())
        );
        assert_eq!(
            complete_input("r1 sh", &inventory()),
            Some("r1 show ".to_string())
        );
        assert_eq!(complete_input("r1 show ver", &inventory()), None);
    }

    #[test]
    fn submitted_command_lands_in_both_panes() {
        let mut app = App::new(Arc::new(FakeBackend::default()), blank_form());
        for ch in "r1 show clock".chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.running.as_deref(), Some("r1 show clock"));
        assert!(app.input.is_empty());

        for outcome in wait_for(&mut app.worker, Duration::from_secs(2)) {
            app.apply(outcome);
        }
        assert_eq!(app.raw_output, "raw:r1 show clock");
        assert_eq!(app.parsed_output, "parsed:r1 show clock");
        assert!(app.running.is_none());
    }

    #[test]
    fn sidebar_sync_reports_status_and_timestamp() {
        let backend = FakeBackend {
            inventory: Mutex::new(Vec::new()),
            sync_ok: true,
        };
        let mut app = App::new(Arc::new(backend), blank_form());
        assert_eq!(app.sync_form.last_synced_label(), "Last synced: -");

        app.handle_key(key(KeyCode::F(2)));
        assert_eq!(app.focus, Focus::Sidebar);
        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.sync_form.source, SourceKind::Nautobot);
        app.handle_key(key(KeyCode::Down));
        for ch in "https://nauto.example".chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
        app.handle_key(key(KeyCode::Tab));
        for ch in "secret".chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
        assert_eq!(app.sync_form.masked_token(), "******");
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Enter));

        for outcome in wait_for(&mut app.worker, Duration::from_secs(2)) {
            app.apply(outcome);
        }
        assert_eq!(app.sync_form.status.as_deref(), Some(SYNC_OK_MESSAGE));
        assert!(app.sync_form.last_synced_label().starts_with("Last synced: 20"));
        assert_eq!(app.inventory.len(), 1);
    }

    #[test]
    fn failed_sync_keeps_last_synced_unset() {
        let mut app = App::new(Arc::new(FakeBackend::default()), blank_form());
        app.submit_sync();
        for outcome in wait_for(&mut app.worker, Duration::from_secs(2)) {
            app.apply(outcome);
        }
        assert_eq!(app.sync_form.status.as_deref(), Some(SYNC_FAILED_MESSAGE));
        assert_eq!(app.sync_form.last_synced_label(), "Last synced: -");
    }

    #[test]
    fn escape_unwinds_before_quitting() {
        let mut app = App::new(Arc::new(FakeBackend::default()), blank_form());
        app.handle_key(key(KeyCode::Char('?')));
        assert!(app.show_help);
        app.handle_key(key(KeyCode::Esc));
        assert!(!app.show_help && !app.should_quit());
        app.handle_key(key(KeyCode::F(2)));
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.focus, Focus::CommandBar);
        app.handle_key(key(KeyCode::Esc));
        assert!(app.should_quit());
    }
}
