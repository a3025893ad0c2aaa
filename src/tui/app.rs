use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyModifiers};
use futures::StreamExt;
use ratatui::{
    layout::{
        Alignment,
        Constraint::{self},
        Layout, Rect,
    },
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table},
    Frame,
};
use rust_decimal::Decimal;
use std::time::Duration;
use strum::{Display, EnumIter, IntoEnumIterator};
use tokio::sync::{broadcast::Receiver, watch};

use crate::{
    coin::parse_amount,
    marketplace::Marketplace,
    persistence::SnapshotStore,
    portfolio::SubmitError,
    state::HoldingRow,
    tracker::Tracker,
    AppEvent,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter)]
enum Field {
    #[strum(to_string = "Coin name")]
    Name,
    #[strum(to_string = "Amount")]
    Amount,
}

impl Field {
    fn next(self) -> Self {
        match self {
            Field::Name => Field::Amount,
            Field::Amount => Field::Name,
        }
    }
}

pub struct App<M, S> {
    should_quit: bool,
    tracker: Tracker<M, S>,
    rx: Receiver<AppEvent>,
    total: watch::Receiver<Decimal>,
    rows: Vec<HoldingRow>,
    name: String,
    amount: String,
    focus: Field,
    error: Option<String>,
    last_event: Option<String>,
    submitting: bool,
}

impl<M: Marketplace, S: SnapshotStore> App<M, S> {
    pub fn new(tracker: Tracker<M, S>) -> Self {
        let rx = tracker.subscribe();
        let total = tracker.total_receiver();
        Self {
            should_quit: false,
            tracker,
            rx,
            total,
            rows: vec![],
            name: String::new(),
            amount: String::new(),
            focus: Field::Name,
            error: None,
            last_event: None,
            submitting: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.tracker.start().await;

        let mut terminal = ratatui::init();
        let _ = terminal.clear();

        let mut events = EventStream::new();

        let period = Duration::from_secs_f64(1.0 / 20.0);
        let mut interval = tokio::time::interval(period);

        while !self.should_quit {
            tokio::select! {
                _ = interval.tick() => {
                    self.rows = self.tracker.holdings().await;
                    terminal.draw(|frame| self.render(frame))?;
                },
                Some(Ok(event)) = events.next() => self.handle_events(event),
                Ok(event) = self.rx.recv() => self.handle_app_events(event),
            }

            // the index download can be slow, show the status first
            if self.submitting {
                terminal.draw(|frame| self.render(frame))?;
                self.submit().await;
            }
        }

        self.tracker.shutdown();

        Ok(())
    }

    fn handle_app_events(&mut self, event: AppEvent) {
        match event {
            AppEvent::Holding(coin) => {
                self.last_event = Some(format!("{} now at {}", coin.name, coin.amount));
            }
            AppEvent::Valuation(valuation) => {
                self.last_event = Some(format!(
                    "{} @ {}",
                    valuation.name,
                    valuation.price.round_dp(2)
                ));
            }
            AppEvent::Total(_) => {}
        }
    }

    fn handle_events(&mut self, event: Event) {
        if let Some(key) = event.as_key_press_event() {
            match key.code {
                KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.should_quit = true
                }
                KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                    self.focus = self.focus.next();
                }
                KeyCode::Enter => self.submitting = true,
                KeyCode::Backspace => {
                    self.input_mut().pop();
                }
                KeyCode::Char(c) => self.input_mut().push(c),
                _ => {}
            }
        }
    }

    fn input_mut(&mut self) -> &mut String {
        match self.focus {
            Field::Name => &mut self.name,
            Field::Amount => &mut self.amount,
        }
    }

    fn input(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Amount => &self.amount,
        }
    }

    async fn submit(&mut self) {
        self.submitting = false;
        let Some(amount) = parse_amount(&self.amount) else {
            self.error = Some(SubmitError::InvalidAmount.to_string());
            return;
        };

        match self.tracker.submit(&self.name, amount).await {
            Ok(_) => {
                self.name.clear();
                self.amount.clear();
                self.error = None;
                self.focus = Field::Name;
                self.rows = self.tracker.holdings().await;
            }
            Err(err) => {
                self.error = Some(err.to_string());
            }
        }
    }

    fn render(&self, frame: &mut Frame) {
        let [header_area, form_area, error_area, main_area, footer_area] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(3),
        ])
        .areas(frame.area());

        self.render_header(frame, header_area);
        self.render_form(frame, form_area);
        self.render_error(frame, error_area);
        self.render_holdings(frame, main_area);
        self.render_footer(frame, footer_area);
    }

    fn render_form(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().title("Add holding").borders(Borders::ALL);
        let items: Vec<ListItem> = Field::iter()
            .map(|field| {
                let style = if field == self.focus {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                };
                let cursor = if field == self.focus { "_" } else { "" };
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{:>10}: ", field.to_string()), style),
                    Span::raw(format!("{}{}", self.input(field), cursor)),
                ]))
            })
            .collect();
        frame.render_widget(List::new(items).block(block), area);
    }

    fn render_error(&self, frame: &mut Frame, area: Rect) {
        if self.submitting {
            let p = Paragraph::new(Line::from("Checking coin index..."))
                .style(Style::default().fg(Color::Yellow))
                .alignment(Alignment::Center);
            frame.render_widget(p, area);
        } else if let Some(error) = &self.error {
            let p = Paragraph::new(Line::from(error.as_str()))
                .style(Style::default().fg(Color::Red))
                .alignment(Alignment::Center);
            frame.render_widget(p, area);
        }
    }

    fn render_holdings(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().title("Holdings").borders(Borders::ALL);
        let header = Row::new(vec![
            Cell::from("Name"),
            Cell::from(Line::from("Amount").alignment(Alignment::Right)),
            Cell::from(Line::from("Total").alignment(Alignment::Right)),
        ])
        .style(Style::default().fg(Color::Blue));

        let total = self.total.borrow().round_dp(2).to_string();
        let mut rows: Vec<Row> = self.rows.iter().map(Row::from).collect();
        rows.push(Row::new(vec![
            Cell::from(""),
            Cell::from(""),
            Cell::from(
                Line::from(vec![
                    Span::raw("Total Sum: "),
                    Span::styled(total, Style::default().fg(Color::Yellow)),
                ])
                .alignment(Alignment::Right),
            ),
        ]));

        let table = Table::new(
            rows,
            [
                Constraint::Fill(2),
                Constraint::Fill(1),
                Constraint::Fill(1),
            ],
        )
        .header(header)
        .block(block);
        frame.render_widget(table, area);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title("Coin Tracker")
            .borders(Borders::ALL);
        frame.render_widget(block, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL);
        let mut text = String::from("Tab: switch field, Enter: submit, Esc: quit");
        if let Some(event) = &self.last_event {
            text.push_str(" | ");
            text.push_str(event);
        }
        let p1 = Paragraph::new(Line::from(text)).block(block);
        frame.render_widget(p1, area);
    }
}

impl From<&HoldingRow> for Row<'_> {
    fn from(row: &HoldingRow) -> Self {
        let value = row
            .value
            .map_or("?".to_string(), |value| value.round_dp(2).to_string());
        Row::new(vec![
            Cell::from(Span::styled(
                row.coin.name.clone(),
                Style::new().fg(Color::Blue),
            )),
            Cell::from(Line::from(row.coin.amount.to_string()).alignment(Alignment::Right)),
            Cell::from(
                Line::from(Span::styled(value, Style::default().fg(Color::Yellow)))
                    .alignment(Alignment::Right),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyEvent;
    use ratatui::{backend::TestBackend, Terminal};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        marketplace::{simulation::SimulationMarketplace, CoinListing},
        persistence::MemorySnapshotStore,
        settings::Settings,
    };

    async fn app() -> App<SimulationMarketplace, MemorySnapshotStore> {
        let marketplace = SimulationMarketplace::new(vec![CoinListing::new("btc-bitcoin", "Bitcoin")]);
        let tracker = Tracker::load(marketplace, MemorySnapshotStore::new(), Settings::default())
            .await
            .unwrap();
        App::new(tracker)
    }

    #[tokio::test]
    async fn test_form_submission_clears_inputs() {
        let mut app = app().await;
        app.name = String::from("Bitcoin");
        app.amount = String::from("2");
        app.error = Some(String::from("Invalid coin name"));

        app.submit().await;

        assert_eq!(app.name, "");
        assert_eq!(app.amount, "");
        assert_eq!(app.error, None);
        assert_eq!(app.rows.len(), 1);
        assert_eq!(app.rows[0].coin.amount, dec!(2));
    }

    #[tokio::test]
    async fn test_form_errors_keep_inputs() {
        let mut app = app().await;
        app.name = String::from("Bitcoin");
        app.amount = String::from("two");
        app.submit().await;
        assert_eq!(app.error.as_deref(), Some("Invalid amount"));
        assert_eq!(app.name, "Bitcoin");

        app.name = String::from("Bitconnect");
        app.amount = String::from("1");
        app.submit().await;
        assert_eq!(app.error.as_deref(), Some("Invalid coin name"));
        assert_eq!(app.amount, "1");
        assert!(app.tracker.holdings().await.is_empty());
    }

    #[tokio::test]
    async fn test_enter_marks_submission_pending() {
        let mut app = app().await;
        app.name = String::from("Bitcoin");
        app.amount = String::from("1");
        app.error = Some(String::from("Invalid amount"));

        app.handle_events(Event::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
        assert!(app.submitting);
        assert_eq!(app.name, "Bitcoin");

        let backend = TestBackend::new(60, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| app.render(frame)).unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("Checking coin index..."));
        assert!(!screen.contains("Invalid amount"));

        app.submit().await;
        assert!(!app.submitting);
        assert_eq!(app.name, "");
        assert_eq!(app.rows.len(), 1);
    }

    #[test]
    fn test_field_cycle() {
        assert_eq!(Field::Name.next(), Field::Amount);
        assert_eq!(Field::Amount.next(), Field::Name);
        assert_eq!(Field::iter().count(), 2);
        assert_eq!(Field::Name.to_string(), "Coin name");
    }
}
