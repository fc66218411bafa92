mod tui_app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
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
use tui_app::{format_opt_time, format_price, format_time_ns, truncate, AppState, ConnectionStatus, Pane};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3001".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url);

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &client).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(5);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app))?;

        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Tab => app.toggle_focus(),
                        KeyCode::Down | KeyCode::Char('j') => {
                            if app.move_selection(true) {
                                app.refresh_details(client).await;
                            }
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            if app.move_selection(false) {
                                app.refresh_details(client).await;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, chunks[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let run_text = if app.health.running {
        "scraping…".to_string()
    } else {
        format!("last run {}", format_opt_time(app.health.last_run_finished_at))
    };

    let title_spans = vec![
        Span::styled(
            " Price Tracker  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} tracked", app.tracked.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(run_text, Style::default().fg(Color::White)),
        Span::raw("  │  "),
        Span::styled(
            format!(
                "{} new prices, {} failures",
                app.health.last_observations_recorded, app.health.last_persistence_failures
            ),
            Style::default().fg(Color::White),
        ),
    ];

    let paragraph = Paragraph::new(Line::from(title_spans))
        .block(Block::default().borders(Borders::ALL).border_style(
            Style::default().fg(Color::DarkGray),
        ));

    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, area: Rect) {
    // Horizontal split: tracked queries (35%) | listings + history (65%)
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(halves[1]);

    render_queries_table(f, app, halves[0]);
    render_listings_table(f, app, right[0]);
    render_history_table(f, app, right[1]);
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn header_row(labels: &[&'static str]) -> Row<'static> {
    Row::new(
        labels
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
    )
    .height(1)
}

fn render_queries_table(f: &mut Frame, app: &AppState, area: Rect) {
    let rows: Vec<Row> = app
        .tracked
        .iter()
        .map(|q| {
            let (state, color) = if q.is_active {
                ("on", Color::Green)
            } else {
                ("off", Color::DarkGray)
            };
            Row::new(vec![
                Cell::from(truncate(&q.query_term, 24)),
                Cell::from(state).style(Style::default().fg(color)),
                Cell::from(format_opt_time(q.last_scraped_at)).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Min(10), Constraint::Length(4), Constraint::Length(9)],
    )
    .header(header_row(&["Query", "", "Scraped"]))
    .block(pane_block(" TRACKED ", app.focus == Pane::Queries))
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default();
    state.select(app.selected_query);
    f.render_stateful_widget(table, area, &mut state);
}

fn render_listings_table(f: &mut Frame, app: &AppState, area: Rect) {
    let rows: Vec<Row> = app
        .snapshot
        .iter()
        .map(|l| {
            Row::new(vec![
                Cell::from(l.source_key.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(truncate(&l.display_name, 40)),
                Cell::from(format_price(l.latest_price, l.currency.as_deref())),
                Cell::from(format_opt_time(l.last_price_update)).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let title = match app.current_query() {
        Some(q) => format!(" LISTINGS · {} ", truncate(&q.query_term, 30)),
        None => " LISTINGS ".to_string(),
    };
    let table = Table::new(
        rows,
        [
            Constraint::Length(13),
            Constraint::Min(10),
            Constraint::Length(14),
            Constraint::Length(9),
        ],
    )
    .header(header_row(&["Store", "Listing", "Price", "Updated"]))
    .block(pane_block(&title, app.focus == Pane::Listings))
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default();
    state.select(app.selected_listing);
    f.render_stateful_widget(table, area, &mut state);
}

fn render_history_table(f: &mut Frame, app: &AppState, area: Rect) {
    // newest on top; price moves colored against the previous observation
    let rows: Vec<Row> = app
        .history
        .iter()
        .enumerate()
        .rev()
        .map(|(i, p)| {
            let prev = i.checked_sub(1).and_then(|j| app.history.get(j));
            let color = match prev {
                Some(prev) if p.price < prev.price => Color::Green,
                Some(prev) if p.price > prev.price => Color::Red,
                _ => Color::White,
            };
            Row::new(vec![
                Cell::from(format_time_ns(p.observed_at)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(format_price(Some(p.price), Some(&p.currency))).style(Style::default().fg(color)),
            ])
        })
        .collect();

    let title = match app.current_listing() {
        Some(l) => format!(" HISTORY · {} ", truncate(&l.display_name, 30)),
        None => " HISTORY ".to_string(),
    };
    let table = Table::new(rows, [Constraint::Length(9), Constraint::Min(10)])
        .header(header_row(&["Time", "Price"]))
        .block(pane_block(&title, false));

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("move  "),
        Span::styled("[Tab] ", Style::default().fg(Color::Yellow)),
        Span::raw("switch pane  "),
        Span::styled("auto-refresh: 5s", Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
