use crate::db::ParkRecord;
use crate::entities::Designation;
use crate::selector::{select, DesignationFilter};
use crate::tables::{group_thousands, sort_for_view, View};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

const VIEWS: [View; 4] = [View::Location, View::Size, View::Visitors, View::Established];

pub struct App {
    pub records: Vec<ParkRecord>,
    /// Indices into `records`, filtered and sorted for the current view
    pub visible: Vec<usize>,
    pub state: TableState,
    pub filter: DesignationFilter,
    pub view: View,
    pub show_detail: bool,
    /// Designations present in the data, in fixed order, preceded by All
    filters: Vec<DesignationFilter>,
}

impl App {
    pub fn new(records: Vec<ParkRecord>, filter: DesignationFilter) -> Self {
        let mut filters = vec![DesignationFilter::All];
        filters.extend(
            Designation::ALL
                .iter()
                .filter(|d| records.iter().any(|r| r.designation == **d))
                .map(|d| DesignationFilter::Only(*d)),
        );

        let mut app = Self {
            records,
            visible: Vec::new(),
            state: TableState::default(),
            filter,
            view: View::Location,
            show_detail: false,
            filters,
        };
        app.refresh();
        app
    }

    fn refresh(&mut self) {
        let selected = select(&self.records, self.filter);
        let sorted = sort_for_view(&selected, self.view);
        self.visible = sorted
            .iter()
            .filter_map(|r| {
                self.records
                    .iter()
                    .position(|x| x.canonical_id == r.canonical_id)
            })
            .collect();

        if self.visible.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn selected_record(&self) -> Option<&ParkRecord> {
        self.state
            .selected()
            .and_then(|i| self.visible.get(i))
            .map(|idx| &self.records[*idx])
    }

    pub fn next_filter(&mut self) {
        let pos = self.filters.iter().position(|f| *f == self.filter).unwrap_or(0);
        self.filter = self.filters[(pos + 1) % self.filters.len()];
        self.refresh();
    }

    pub fn previous_filter(&mut self) {
        let pos = self.filters.iter().position(|f| *f == self.filter).unwrap_or(0);
        self.filter = self.filters[(pos + self.filters.len() - 1) % self.filters.len()];
        self.refresh();
    }

    pub fn next_view(&mut self) {
        let pos = VIEWS.iter().position(|v| *v == self.view).unwrap_or(0);
        self.view = VIEWS[(pos + 1) % VIEWS.len()];
        self.refresh();
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map(|i| (i + 20).min(len - 1)).unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map(|i| i.saturating_sub(20)).unwrap_or(0);
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_filter();
                    } else {
                        app.next_filter();
                    }
                }
                KeyCode::BackTab => app.previous_filter(),
                KeyCode::Char('v') => app.next_view(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => {
                    if !app.visible.is_empty() {
                        app.state.select(Some(0));
                    }
                }
                KeyCode::End => {
                    if !app.visible.is_empty() {
                        app.state.select(Some(app.visible.len() - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Table (+ detail)
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);
        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn view_name(view: View) -> &'static str {
    match view {
        View::Location => "Location",
        View::Size => "Size",
        View::Visitors => "Visitors",
        View::Established => "Established",
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled(
        app.filter.label(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )];
    spans.push(Span::raw("  |  "));
    for (i, view) in VIEWS.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *view == app.view {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(view_name(*view), style));
    }
    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("{} of {} parks", app.visible.len(), app.records.len()),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Park", "Designation", "States", "Area (sq mi)", "Latest visits", "Established"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.visible.iter().map(|idx| {
        let park = &app.records[*idx];
        let missing = Style::default().fg(Color::DarkGray);
        let cells = vec![
            Cell::from(truncate(&park.name, 40)),
            Cell::from(truncate(park.designation.as_str(), 28)),
            Cell::from(park.states_label()),
            match park.area_sq_mi {
                Some(a) => Cell::from(format!("{:.1}", a)),
                None => Cell::from("-").style(missing),
            },
            match park.latest_visits() {
                Some((year, v)) => Cell::from(format!("{} ({})", group_thousands(v), year)),
                None => Cell::from("-").style(missing),
            },
            match park.established_date {
                Some(d) => Cell::from(d.format("%Y-%m-%d").to_string()),
                None => Cell::from("-").style(missing),
            },
        ];
        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(42),
            Constraint::Length(30),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Length(20),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Parks "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let label = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let content = match app.selected_record() {
        None => vec![Line::from("  No park selected")],
        Some(park) => {
            let mut lines = vec![
                Line::from(Span::styled(format!("  {}", park.name), label)),
                Line::from(format!("  {}", park.designation)),
                Line::from(""),
                Line::from(format!("  id:          {}", park.canonical_id)),
                Line::from(format!("  states:      {}", park.states_label())),
                Line::from(format!(
                    "  location:    {}",
                    match (park.latitude, park.longitude) {
                        (Some(lat), Some(long)) => format!("{:.4}, {:.4}", lat, long),
                        _ => "-".to_string(),
                    }
                )),
                Line::from(format!(
                    "  established: {}",
                    park.established_date
                        .map(|d| d.format("%B %e, %Y").to_string())
                        .unwrap_or_else(|| "-".to_string())
                )),
                Line::from(""),
                Line::from(Span::styled("  VISITS", label)),
            ];
            if park.visits_by_year.is_empty() {
                lines.push(Line::from("  (none reported)"));
            }
            for (year, visits) in park.visits_by_year.iter().rev() {
                lines.push(Line::from(format!("  {}  {:>12}", year, group_thousands(*visits))));
            }
            lines
        }
    };

    let panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Park Details "),
    );
    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let position = match app.state.selected() {
        Some(i) => format!("{}/{}", i + 1, app.visible.len()),
        None => "0/0".to_string(),
    };
    let help = Line::from(vec![
        Span::styled(position, Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled(
            "↑↓/jk move  Tab designation  v view  Enter details  q quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let bar = Paragraph::new(vec![help]).block(Block::default().borders(Borders::ALL));
    f.render_widget(bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
