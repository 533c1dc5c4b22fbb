use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::io;
use std::mem;

use chrono::{DateTime, Local};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Circle, Line as Segment},
        Block, BorderType, Borders, Clear, List, ListItem, Paragraph, Wrap,
    },
    Frame, Terminal,
};

use metar_stall::decoder::{self, ApiStatus, Client, Report};
use metar_stall::units::{direction, speed};
use metar_stall::weather::{self, Condition, Tone};

const MISSING: &str = "---";

pub struct App {
    client: Client,
    status: ApiStatus,
    report: Option<Report>,
    updated: Option<DateTime<Local>>,
    error: Option<String>,
    /// Text typed into the entry popup, `Some` while it is open.
    input: Option<String>,
    loading: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Idle,
    Quit,
    Decode(String),
}

impl App {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            status: ApiStatus::Checking,
            report: None,
            updated: None,
            error: None,
            input: None,
            loading: false,
        }
    }

    pub fn check_health(&mut self) {
        self.status = self.client.health();
    }

    /// Replaces the shown report on success; on failure the previous report stays up.
    pub fn decode(&mut self, metar: &str) {
        match self.client.decode(metar) {
            Ok(report) => {
                tracing::info!(station = ?report.station, "report decoded");
                self.report = Some(report);
                self.updated = Some(Local::now());
                self.status = ApiStatus::Online;
                self.error = None;
            }
            Err(err) => {
                if let decoder::Error::Unreachable { .. } = err {
                    self.status = ApiStatus::Offline;
                }
                self.error = Some(err.to_string());
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Action {
        let Some(buf) = self.input.as_mut() else {
            return match code {
                KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
                KeyCode::Char('n') => {
                    self.input = Some(String::new());
                    Action::Idle
                }
                _ => Action::Idle,
            };
        };

        match code {
            KeyCode::Esc => {
                self.input = None;
                Action::Idle
            }
            KeyCode::Enter => {
                let metar = mem::take(buf);
                self.input = None;
                Action::Decode(metar)
            }
            KeyCode::Backspace => {
                buf.pop();
                Action::Idle
            }
            KeyCode::Char(c) => {
                buf.push(c);
                Action::Idle
            }
            _ => Action::Idle,
        }
    }
}

pub fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    initial: Option<String>,
) -> io::Result<()> {
    terminal.draw(|f| ui(f, &app))?;
    app.check_health();

    let mut pending = initial;
    loop {
        if let Some(metar) = pending.take() {
            app.loading = true;
            terminal.draw(|f| ui(f, &app))?;
            app.decode(&metar);
            app.loading = false;
        }

        terminal.draw(|f| ui(f, &app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match app.handle_key(key.code) {
                Action::Quit => return Ok(()),
                Action::Decode(metar) => pending = Some(metar),
                Action::Idle => {}
            }
        }
    }
}

fn card(title: &str) -> Block {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(Color::Yellow),
        ))
        .title_alignment(Alignment::Left)
        .border_style(Style::default().fg(Color::Cyan))
        .border_type(BorderType::Rounded)
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Amber => Color::Yellow,
        Tone::Slate => Color::Gray,
        Tone::Orange => Color::LightRed,
        Tone::Cyan => Color::Cyan,
    }
}

fn or_missing(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => MISSING.to_string(),
    }
}

fn first_word(value: Option<&str>) -> Option<&str> {
    value?.split_whitespace().next()
}

fn reading<'a>(value: String, unit: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::raw(" "),
        Span::styled(
            value,
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(unit, Style::default().fg(Color::DarkGray)),
    ])
}

fn detail(text: String) -> Line<'static> {
    Line::from(Span::styled(format!(" {text}"), Style::default().fg(Color::Gray)))
}

fn bullets(items: &[String]) -> Vec<ListItem> {
    items
        .iter()
        .map(|item| ListItem::new(format!(" • {item}")))
        .collect()
}

/// Point `r` units out from the centre along a compass bearing, in canvas coordinates (y up).
fn polar(bearing: f64, r: f64) -> (f64, f64) {
    let rad = bearing.to_radians();
    (r * rad.sin(), r * rad.cos())
}

/// Rose with N/E/S/O labels and 30° ticks. The arrow is only drawn for a fixed bearing; the hub
/// always is.
fn render_compass_rose(f: &mut Frame, area: Rect, bearing: Option<u16>) {
    let rose = Canvas::default()
        .marker(Marker::Braille)
        .x_bounds([-1.4, 1.4])
        .y_bounds([-1.4, 1.4])
        .paint(move |ctx| {
            ctx.draw(&Circle {
                x: 0.0,
                y: 0.0,
                radius: 1.0,
                color: Color::Cyan,
            });

            for deg in (0..360u16).step_by(30) {
                let inner = if deg % 90 == 0 { 0.75 } else { 0.85 };
                let (x1, y1) = polar(f64::from(deg), inner);
                let (x2, y2) = polar(f64::from(deg), 1.0);
                ctx.draw(&Segment {
                    x1,
                    y1,
                    x2,
                    y2,
                    color: Color::Cyan,
                });
            }

            if let Some(bearing) = bearing {
                let bearing = f64::from(bearing);
                let (tx, ty) = polar(bearing, 0.7);
                ctx.draw(&Segment {
                    x1: 0.0,
                    y1: 0.0,
                    x2: tx,
                    y2: ty,
                    color: Color::LightCyan,
                });
                for wing in [150.0, -150.0] {
                    let (wx, wy) = polar(bearing + wing, 0.25);
                    ctx.draw(&Segment {
                        x1: tx,
                        y1: ty,
                        x2: tx + wx,
                        y2: ty + wy,
                        color: Color::LightCyan,
                    });
                }
            }

            ctx.draw(&Circle {
                x: 0.0,
                y: 0.0,
                radius: 0.08,
                color: Color::LightCyan,
            });

            let label = |s: &'static str| {
                Span::styled(
                    s,
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                )
            };
            ctx.print(-0.05, 1.2, label("N"));
            ctx.print(1.15, 0.0, label("E"));
            ctx.print(-0.05, -1.3, label("S"));
            ctx.print(-1.3, 0.0, label("O"));
        });
    f.render_widget(rose, area);
}

fn display_headline<'a>(app: &'a App) -> Paragraph<'a> {
    let status_color = match app.status {
        ApiStatus::Online => Color::Green,
        ApiStatus::Offline => Color::Red,
        ApiStatus::Checking => Color::DarkGray,
    };
    let status = Span::styled(
        format!("API {}", app.status.label()),
        Style::default().fg(status_color).add_modifier(Modifier::BOLD),
    );

    let mut lines = match &app.report {
        Some(report) => vec![
            Line::from(vec![
                Span::raw(" "),
                Span::styled(
                    or_missing(report.airport_name.as_deref()),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" : "),
                Span::styled(
                    format!("{} · ICAO", or_missing(report.station.as_deref())),
                    Style::default().fg(Color::Blue),
                ),
                Span::raw("   "),
                status,
            ]),
            Line::from(format!(" {}", or_missing(report.datetime.as_deref()))),
        ],
        None => vec![
            Line::from(vec![
                Span::raw(" "),
                Span::styled(
                    "METAR Stall",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" : Operaciones METAR   "),
                status,
            ]),
            Line::from(" [n] nuevo reporte  [q] salir"),
        ],
    };

    if let Some(updated) = app.updated {
        lines.push(Line::from(Span::styled(
            format!(" Actualizado {}", updated.format("%d-%m-%Y %H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        )));
    }
    if app.report.as_ref().is_some_and(|r| r.auto_report) {
        lines.push(Line::from(Span::styled(
            " Reporte automático (AUTO)",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
    }

    Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .border_type(BorderType::Rounded),
    )
}

fn display_message(report: &Report) -> Paragraph {
    let mut lines = vec![
        Line::from(Span::styled(
            " Mensaje original",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            format!(" {}", report.raw),
            Style::default().fg(Color::LightCyan),
        )),
    ];

    let summary = weather::condense(report.report_text.as_deref().unwrap_or_default());
    if !summary.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            " Resumen narrativo",
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::from(format!(" {summary}")));
    }

    let extras = [
        ("RVR", &report.rvr),
        ("Tendencias", &report.trends),
        ("Grupos no disponibles", &report.unavailable_groups),
    ];
    for (name, values) in extras {
        if !values.is_empty() {
            lines.push(detail(format!("{name}: {}", values.join(", "))));
        }
    }
    if let Some(remarks) = &report.remarks {
        lines.push(detail(format!("Observaciones: {remarks}")));
    }

    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(card("Parte"))
}

fn render_wind(f: &mut Frame, area: Rect, report: &Report) {
    let block = card("Viento");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(16)])
        .split(inner);

    let wind = &report.wind;
    let direction_text = wind.direction.as_deref().unwrap_or_default();
    let bearing = direction::bearing_for(direction_text, wind.degrees);

    let knots = wind.speed.as_deref().and_then(speed::knots);
    let mut lines = vec![
        Line::from(""),
        reading(or_missing(first_word(wind.speed.as_deref())), "KT"),
    ];
    if let Some(kt) = knots {
        lines.push(detail(format!("{:.0} km/h", speed::kt2kph(kt))));
    }
    if let Some(bearing) = bearing {
        lines.push(detail(format!(
            "{bearing:03}° {}",
            direction::degree_to_compass(f32::from(bearing))
        )));
    }
    if let Some(gusts) = &wind.gusts {
        lines.push(detail(format!("Ráfagas: {gusts}")));
    }
    if let Some(variation) = &wind.variation {
        lines.push(detail(variation.clone()));
    }
    lines.push(detail(or_missing(
        wind.text.as_deref().or(wind.direction.as_deref()),
    )));

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), chunks[0]);
    render_compass_rose(f, chunks[1], bearing);
}

fn display_visibility(report: &Report) -> Paragraph {
    let vis = &report.visibility;
    let main = vis.main.as_deref().unwrap_or_default();
    let condition: Condition = weather::classify(
        main,
        vis.text.as_deref().unwrap_or_default(),
        &report.weather,
        &report.clouds,
    );
    let color = tone_color(condition.tone());
    let unit = if main.contains("km") { "KM" } else { "M" };

    let mut lines = vec![
        Line::from(""),
        reading(or_missing(first_word(vis.main.as_deref())), unit),
        Line::from(vec![
            Span::raw(" "),
            Span::styled(
                format!("[ {} {} ]", condition.icon(), condition.label().to_uppercase()),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
        ]),
        detail(or_missing(vis.text.as_deref().or(vis.main.as_deref()))),
    ];
    if let Some(vertical) = &vis.vertical {
        lines.push(detail(format!("Vertical: {vertical}")));
    }
    if let Some(minimum) = &vis.minimum {
        lines.push(detail(format!("Mínima: {minimum}")));
    }

    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(card("Visibilidad"))
}

fn display_phenomena(report: &Report) -> List {
    let mut items = if report.weather.is_empty() {
        vec![ListItem::new(" Sin fenómenos significativos")]
    } else {
        bullets(&report.weather)
    };
    if !report.recent_weather.is_empty() {
        items.push(ListItem::new(Line::from(Span::styled(
            " Tiempo reciente",
            Style::default().fg(Color::DarkGray),
        ))));
        items.extend(bullets(&report.recent_weather));
    }
    List::new(items).block(card("Fenómenos"))
}

fn display_clouds(report: &Report) -> List {
    let items = if report.clouds.is_empty() {
        vec![ListItem::new(" Sin nubes significativas")]
    } else {
        bullets(&report.clouds)
    };
    List::new(items).block(card("Cielo y nubes"))
}

fn display_temperature(report: &Report) -> Paragraph {
    let temp = &report.temperature;
    let air = temp
        .air
        .as_deref()
        .map(|air| air.replace("ºC", ""))
        .filter(|air| !air.trim().is_empty());
    let text = match &temp.text {
        Some(text) => text.clone(),
        None => format!("Punto de rocío: {}", or_missing(temp.dewpoint.as_deref())),
    };
    Paragraph::new(vec![
        Line::from(""),
        reading(or_missing(air.as_deref()), "ºC"),
        detail(text),
    ])
    .wrap(Wrap { trim: false })
    .block(card("Temperatura"))
}

fn display_qnh(report: &Report) -> Paragraph {
    let text = report
        .qnh_text
        .clone()
        .unwrap_or_else(|| "Presión reducida a nivel del mar".to_string());
    Paragraph::new(vec![
        Line::from(""),
        reading(or_missing(first_word(report.qnh.as_deref())), "HPA"),
        detail(text),
    ])
    .wrap(Wrap { trim: false })
    .block(card("QNH"))
}

fn placeholder(text: &str, color: Color) -> Paragraph {
    Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            text.to_uppercase(),
            Style::default().fg(color),
        )),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .border_type(BorderType::Rounded),
    )
}

fn display_error(error: &str) -> Paragraph {
    Paragraph::new(Line::from(vec![
        Span::styled(" ⚠ ", Style::default().fg(Color::Red)),
        Span::styled(error, Style::default().fg(Color::LightRed)),
    ]))
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .border_type(BorderType::Rounded),
    )
}

fn display_input(input: &str) -> Paragraph {
    Paragraph::new(vec![
        Line::from(Span::styled(
            " Pega el mensaje METAR completo. [Enter] decodificar  [Esc] cerrar",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw(" > "),
            Span::styled(input, Style::default().fg(Color::LightCyan)),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
    ])
    .wrap(Wrap { trim: false })
    .block(card("Ingresar METAR"))
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_report(f: &mut Frame, area: Rect, report: &Report) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10),
            Constraint::Min(9),
            Constraint::Min(7),
        ])
        .split(area);

    f.render_widget(display_message(report), rows[0]);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(30), Constraint::Percentage(30)])
        .split(rows[1]);
    render_wind(f, top[0], report);
    f.render_widget(display_visibility(report), top[1]);
    f.render_widget(display_phenomena(report), top[2]);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(30), Constraint::Percentage(30)])
        .split(rows[2]);
    f.render_widget(display_clouds(report), bottom[0]);
    f.render_widget(display_temperature(report), bottom[1]);
    f.render_widget(display_qnh(report), bottom[2]);
}

fn ui(f: &mut Frame, app: &App) {
    let error_height = if app.error.is_some() { 3 } else { 0 };
    let vert_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(error_height),
            Constraint::Min(0),
        ])
        .split(f.area());

    f.render_widget(display_headline(app), vert_layout[0]);

    if let Some(error) = &app.error {
        f.render_widget(display_error(error), vert_layout[1]);
    }

    if app.loading {
        f.render_widget(
            placeholder("Procesando mensaje", Color::LightCyan),
            vert_layout[2],
        );
    } else if let Some(report) = &app.report {
        render_report(f, vert_layout[2], report);
    } else {
        f.render_widget(
            placeholder("Esperando datos METAR", Color::DarkGray),
            vert_layout[2],
        );
    }

    if let Some(input) = &app.input {
        let popup = centered(f.area(), 90, 7);
        f.render_widget(Clear, popup);
        f.render_widget(display_input(input), popup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use std::time::Duration;

    fn app() -> App {
        let client = Client::new("http://127.0.0.1:9", Duration::from_millis(100)).unwrap();
        App::new(client)
    }

    fn cavok_report() -> Report {
        serde_json::from_str(
            r#"{
                "raw": "METAR LEVC 121430Z 12005KT CAVOK 18/12 Q1015=",
                "station": "LEVC",
                "airport_name": "Valencia",
                "datetime": "Día 12 a las 14.30 UTC",
                "auto_report": true,
                "wind": {"direction": "120° (sureste)", "speed": "5 kt", "degrees": 120,
                         "text": "Viento de 120 grados (sureste) con 5 nudos"},
                "visibility": {"main": "CAVOK",
                               "text": "Visibilidad de 10 kilómetros o más y sin nubes significativas"},
                "clouds": ["Cielo despejado (CAVOK)"],
                "temperature": {"air": "18ºC", "dewpoint": "12ºC"},
                "qnh": "1015 hPa",
                "qnh_text": "QNH de 1015 hectopascales",
                "report_text": "Informe METAR decodificado para Valencia (LEVC). Viento de 120 grados."
            }"#,
        )
        .unwrap()
    }

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 45)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_render_waiting() {
        let screen = render(&app());
        assert!(screen.contains("ESPERANDO DATOS METAR"));
        assert!(screen.contains("API checking"));
    }

    #[test]
    fn test_render_report() {
        let mut app = app();
        app.report = Some(cavok_report());
        app.status = ApiStatus::Online;
        let screen = render(&app);

        assert!(screen.contains("Valencia"));
        assert!(screen.contains("LEVC · ICAO"));
        assert!(screen.contains("DESPEJADO"));
        assert!(screen.contains("Viento de 120 grados."));
        assert!(!screen.contains("decodificado para"));
        assert!(screen.contains("Reporte automático (AUTO)"));
        assert!(screen.contains("Sin fenómenos significativos"));
        assert!(screen.contains("1015"));
        assert!(screen.contains("120° ESE"));
    }

    #[test]
    fn test_render_loading_and_error() {
        let mut app = app();
        app.loading = true;
        app.error = Some("Formato METAR inválido".to_string());
        let screen = render(&app);
        assert!(screen.contains("PROCESANDO MENSAJE"));
        assert!(screen.contains("Formato METAR inválido"));
    }

    #[test]
    fn test_render_input_popup() {
        let mut app = app();
        app.input = Some("METAR LEMD".to_string());
        let screen = render(&app);
        assert!(screen.contains("Ingresar METAR"));
        assert!(screen.contains("> METAR LEMD"));
    }

    #[test]
    fn test_keys() {
        let mut app = app();
        assert_eq!(app.handle_key(KeyCode::Char('x')), Action::Idle);
        assert_eq!(app.handle_key(KeyCode::Char('n')), Action::Idle);
        for c in "LEMDX".chars() {
            app.handle_key(KeyCode::Char(c));
        }
        app.handle_key(KeyCode::Backspace);
        // 'q' is text while the popup is open
        assert_eq!(app.handle_key(KeyCode::Char('q')), Action::Idle);
        assert_eq!(
            app.handle_key(KeyCode::Enter),
            Action::Decode("LEMDq".to_string())
        );
        assert!(app.input.is_none());

        app.handle_key(KeyCode::Char('n'));
        assert_eq!(app.handle_key(KeyCode::Esc), Action::Idle);
        assert!(app.input.is_none());
        assert_eq!(app.handle_key(KeyCode::Char('q')), Action::Quit);
    }

    #[test]
    fn test_invalid_input_keeps_report() {
        let mut app = app();
        app.report = Some(cavok_report());
        app.decode("   ");
        assert_eq!(app.error.as_deref(), Some("El METAR está vacío."));
        assert!(app.report.is_some());
        assert_eq!(app.status, ApiStatus::Checking);
    }

    #[test]
    fn test_polar() {
        let (x, y) = polar(0.0, 1.0);
        assert!(x.abs() < 1e-9 && (y - 1.0).abs() < 1e-9);
        let (x, y) = polar(90.0, 1.0);
        assert!((x - 1.0).abs() < 1e-9 && y.abs() < 1e-9);
    }

    #[test]
    fn test_first_word_and_missing() {
        assert_eq!(first_word(Some("10 km o más")), Some("10"));
        assert_eq!(first_word(None), None);
        assert_eq!(or_missing(Some("  ")), MISSING);
        assert_eq!(or_missing(None), MISSING);
    }
}
