use crate::clock;
use crate::marquee::Marquee;
use crate::player::Player;
use crate::queue::QueueRow;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use std::rc::Rc;
use std::time::Duration;
use time::OffsetDateTime;
use unicode_width::UnicodeWidthStr;

const APP_TITLE: &str = "Music Widget  ";
const TIMELINE_BAR_WIDTH: usize = 32;

struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    favorite: Color,
    header: Color,
    selected_bg: Color,
    popup_bg: Color,
}

const COLORS: Palette = Palette {
    bg: Color::Rgb(10, 15, 24),
    panel_bg: Color::Rgb(19, 29, 43),
    panel_alt_bg: Color::Rgb(24, 38, 58),
    border: Color::Rgb(125, 95, 255),
    text: Color::Rgb(214, 228, 248),
    muted: Color::Rgb(149, 173, 204),
    accent: Color::Rgb(0, 210, 255),
    alert: Color::Rgb(249, 174, 88),
    favorite: Color::Rgb(255, 122, 165),
    header: Color::Rgb(214, 205, 133),
    selected_bg: Color::Rgb(34, 55, 82),
    popup_bg: Color::Rgb(22, 33, 51),
};

/// Per-frame UI state owned by the event loop.
pub struct ViewState<'a> {
    pub now: OffsetDateTime,
    pub marquee: &'a Marquee,
    pub marquee_elapsed: Duration,
    pub overlay_open: bool,
    pub selected_row: usize,
    pub search_input: Option<&'a str>,
}

fn sections(area: Rect) -> Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area)
}

/// Inner area of the timeline panel, for mapping mouse clicks.
pub fn timeline_rect(area: Rect) -> Rect {
    sections(area)[2].inner(Margin {
        vertical: 1,
        horizontal: 1,
    })
}

pub fn draw(frame: &mut Frame, player: &Player, view: &ViewState<'_>) {
    let core = player.core();
    frame.render_widget(
        Block::default().style(Style::default().bg(COLORS.bg)),
        frame.area(),
    );

    let vertical = sections(frame.area());

    let clock_lines = vec![
        Line::from(vec![
            Span::styled(
                APP_TITLE,
                Style::default()
                    .fg(COLORS.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                clock::format_time(view.now),
                Style::default().fg(COLORS.text).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(
            clock::format_date(view.now),
            Style::default().fg(COLORS.muted),
        )),
    ];
    frame.render_widget(
        Paragraph::new(clock_lines).block(panel_block("Clock", COLORS.panel_bg)),
        vertical[0],
    );

    let inner_width = vertical[1].width.saturating_sub(4) as usize;
    let track = core.current_track();
    let title = track.map_or("-", |track| track.title.as_str());
    let artist = track.map_or("-", |track| track.artist.as_str());
    let album = player
        .published()
        .map_or("-", |metadata| metadata.album.as_str());
    let starred = core.current_index().is_some_and(|idx| core.is_favorite(idx));
    let star = if starred { "★ " } else { "☆ " };
    let state_label = if player.is_playing() { "Playing" } else { "Paused" };

    let info = vec![
        Line::from(vec![
            Span::styled(star, Style::default().fg(COLORS.favorite)),
            Span::styled(
                view.marquee.window(
                    title,
                    inner_width.saturating_sub(star.width()),
                    view.marquee_elapsed,
                ),
                Style::default().fg(COLORS.text).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(
            view.marquee
                .window(artist, inner_width, view.marquee_elapsed),
            Style::default().fg(COLORS.muted),
        )),
        Line::from(Span::styled(
            format!("Album  {album}"),
            Style::default().fg(COLORS.muted),
        )),
        Line::from(Span::styled(
            state_label,
            Style::default().fg(COLORS.alert),
        )),
    ];
    frame.render_widget(
        Paragraph::new(info).block(panel_block("Now Playing", COLORS.panel_alt_bg)),
        vertical[1],
    );

    frame.render_widget(
        Paragraph::new(Span::styled(
            timeline_line(player),
            Style::default().fg(COLORS.text),
        ))
        .block(panel_block("Timeline", COLORS.panel_bg)),
        vertical[2],
    );

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(
            "Space play, n next, p previous, f favorite, +/- volume, m mute, l playlist, q quit",
            Style::default().fg(COLORS.muted),
        ),
        Span::styled("  |  ", Style::default().fg(COLORS.muted)),
        Span::styled(core.status.as_str(), Style::default().fg(COLORS.text)),
    ]))
    .block(panel_block("Message", COLORS.panel_bg));
    frame.render_widget(footer, vertical[3]);

    if view.overlay_open {
        draw_playlist(frame, player, view);
    }
}

fn draw_playlist(frame: &mut Frame, player: &Player, view: &ViewState<'_>) {
    let core = player.core();
    let popup = centered_rect(frame.area(), 70, 70);
    frame.render_widget(Clear, popup);

    let current = core.current_index();
    let items: Vec<ListItem> = core
        .view()
        .rows
        .iter()
        .map(|row| match row {
            QueueRow::ArtistHeader {
                artist,
                collapsed,
                track_count,
            } => ListItem::new(Line::from(vec![
                Span::styled(
                    if *collapsed { "▸ " } else { "▾ " },
                    Style::default().fg(COLORS.muted),
                ),
                Span::styled(
                    format!("{artist} ({track_count})"),
                    Style::default()
                        .fg(COLORS.header)
                        .add_modifier(Modifier::BOLD),
                ),
            ])),
            QueueRow::Track(idx) => {
                let Some(track) = core.catalog().get(*idx) else {
                    return ListItem::new("");
                };
                let marker = if current == Some(*idx) { "  > " } else { "    " };
                let star = if core.is_favorite(*idx) { "★ " } else { "  " };
                let style = if current == Some(*idx) {
                    Style::default().fg(COLORS.accent).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(COLORS.text)
                };
                ListItem::new(Line::from(vec![
                    Span::styled(marker, Style::default().fg(COLORS.muted)),
                    Span::styled(star, Style::default().fg(COLORS.favorite)),
                    Span::styled(format!("{} - {}", track.title, track.artist), style),
                ]))
            }
        })
        .collect();

    let mut state = ListState::default();
    let rows = core.view().rows.len();
    state.select((rows > 0).then(|| view.selected_row.min(rows - 1)));

    let query = core.query();
    let mut title = format!(
        "Playlist / {} {}",
        query.sort_mode.as_str(),
        query.sort_order.label()
    );
    if query.favorites_only {
        title.push_str(" / Favorites");
    }
    match view.search_input {
        Some(input) => title.push_str(&format!(" / Search: {input}_")),
        None if !query.search.is_empty() => {
            title.push_str(&format!(" / Search: {}", query.search))
        }
        None => {}
    }

    let list = List::new(items)
        .block(panel_block(&title, COLORS.popup_bg))
        .highlight_style(
            Style::default()
                .bg(COLORS.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, popup, &mut state);

    let hint_area = Rect {
        x: popup.x.saturating_add(2),
        y: popup.y.saturating_add(popup.height.saturating_sub(1)),
        width: popup.width.saturating_sub(4),
        height: 1,
    };
    frame.render_widget(
        Paragraph::new(Span::styled(
            " Enter play/fold, / search, s sort, o order, v favorites, f star, Esc close ",
            Style::default().fg(COLORS.muted),
        )),
        hint_area,
    );
}

fn panel_block(title: &str, bg: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(COLORS.text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(COLORS.border))
        .style(Style::default().bg(bg))
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

/// `m:ss`, as the widget shows elapsed and total time.
pub fn format_time(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}

/// Maps a click column on the timeline bar to a seek ratio.
pub fn timeline_ratio(timeline: Rect, column: u16) -> Option<f32> {
    let start = timeline.x.saturating_add(1);
    if column < start {
        return None;
    }
    let offset = (column - start) as f32;
    (offset < TIMELINE_BAR_WIDTH as f32).then(|| offset / TIMELINE_BAR_WIDTH as f32)
}

fn timeline_line(player: &Player) -> String {
    let elapsed = player.position().unwrap_or(Duration::ZERO);
    let total = player.duration();
    let ratio = total.and_then(|duration| {
        let total_secs = duration.as_secs_f64();
        (total_secs > 0.0).then_some((elapsed.as_secs_f64() / total_secs).clamp(0.0, 1.0))
    });
    let volume = player.volume();

    format!(
        "{}  {} / {}  |  {} {:>3}%",
        progress_bar(ratio, TIMELINE_BAR_WIDTH),
        format_time(elapsed),
        total.map(format_time).unwrap_or_else(|| String::from("0:00")),
        volume.level().icon(),
        (volume.volume() * 100.0).round() as u16
    )
}
