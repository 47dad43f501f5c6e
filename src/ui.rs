use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};

use crate::{
    app::{App, Prompt, ERROR_MESSAGE, LOADING_MESSAGE},
    clock::Clock,
    session::{SessionPhase, TypingSession},
    storage::ProgressStore,
    text::{tokens, wrap_tokens},
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

impl<S: ProgressStore, C: Clock> Widget for &App<S, C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_bold_style = Style::default()
            .patch(bold_style)
            .add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let text_width = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
        let prompt_lines = prompt_lines(self, text_width);
        let prompt_height = (prompt_lines.len() as u16).max(1);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // stats
                Constraint::Length(1), // status
                Constraint::Fill(1),
                Constraint::Length(prompt_height),
                Constraint::Length(1), // padding
                Constraint::Length(1), // author
                Constraint::Length(1), // story badge
                Constraint::Fill(1),
                Constraint::Length(1), // legend
            ])
            .split(area);

        Paragraph::new(Span::styled(stats_line(self), bold_style)).render(chunks[0], buf);

        if let Some(status) = status_line(self) {
            Paragraph::new(status)
                .alignment(Alignment::Right)
                .render(chunks[1], buf);
        }

        let single_line = prompt_lines.len() == 1;
        Paragraph::new(prompt_lines)
            .alignment(if single_line {
                // short prompts look better centered
                Alignment::Center
            } else {
                Alignment::Left
            })
            .wrap(Wrap { trim: false })
            .render(chunks[3], buf);

        if let Some(quote) = self.quote() {
            Paragraph::new(Span::styled(
                format!("— {}", quote.author),
                Style::default().patch(bold_style).patch(italic_style),
            ))
            .alignment(Alignment::Right)
            .render(chunks[5], buf);
        }

        if let Some((pos, total)) = self.story_position() {
            Paragraph::new(Span::styled(
                format!("story {pos}/{total}"),
                Style::default().fg(Color::Magenta),
            ))
            .alignment(Alignment::Right)
            .render(chunks[6], buf);
        }

        Paragraph::new(Span::styled(legend(self), italic_style.patch(dim_bold_style)))
            .render(chunks[8], buf);
    }
}

fn stats_line<S: ProgressStore, C: Clock>(app: &App<S, C>) -> String {
    let (secs, wpm, accuracy) = app
        .metrics()
        .map(|m| (m.elapsed_secs, m.wpm, m.accuracy))
        .unwrap_or((0, 0, 100));
    format!("Time: {secs}s   WPM: {wpm}   Accuracy: {accuracy}%")
}

fn status_line<S: ProgressStore, C: Clock>(app: &App<S, C>) -> Option<Span<'static>> {
    match app.phase()? {
        SessionPhase::Paused => Some(Span::styled(
            "PAUSED - focus the terminal to continue",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        )),
        SessionPhase::Finished => Some(Span::styled(
            SessionPhase::Finished.to_string(),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        SessionPhase::Idle | SessionPhase::Running => None,
    }
}

fn legend<S: ProgressStore, C: Clock>(app: &App<S, C>) -> &'static str {
    if app.is_finished() {
        "(enter) next / (esc)ape"
    } else if app.is_loading() || app.is_unavailable() {
        "(tab) retry / (esc)ape"
    } else if !app.can_restart() {
        "finish this one to continue the story / (esc)ape"
    } else {
        "(tab) restart / (esc)ape"
    }
}

fn prompt_lines<S: ProgressStore, C: Clock>(app: &App<S, C>, width: u16) -> Vec<Line<'static>> {
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    match app.prompt() {
        Prompt::Loading => vec![Line::from(Span::styled(LOADING_MESSAGE, dim_style))],
        Prompt::Unavailable => vec![Line::from(Span::styled(
            ERROR_MESSAGE,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))],
        Prompt::Ready { session, .. } => session_lines(session, app.is_focused(), width),
    }
}

fn session_lines<C: Clock>(
    session: &TypingSession<C>,
    focused: bool,
    width: u16,
) -> Vec<Line<'static>> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let correct_style = Style::default().patch(bold_style).fg(Color::White);
    let mistake_style = Style::default().patch(bold_style).fg(Color::Red);
    let pending_style = Style::default()
        .patch(bold_style)
        .add_modifier(Modifier::DIM);
    let caret_style = pending_style.add_modifier(Modifier::UNDERLINED);

    let typed: Vec<char> = session.typed().chars().collect();
    let cursor = session.cursor_pos();
    let show_caret = focused && !session.is_finished();

    let toks = tokens(session.reference());
    wrap_tokens(&toks, width as usize)
        .into_iter()
        .map(|line| {
            let spans = line
                .into_iter()
                .flat_map(|token| token.iter())
                .map(|&(idx, expected)| match typed.get(idx) {
                    Some(&c) if c == expected => Span::styled(expected.to_string(), correct_style),
                    Some(_) => Span::styled(
                        match expected {
                            ' ' => "·".to_owned(),
                            c => c.to_string(),
                        },
                        mistake_style,
                    ),
                    None if show_caret && idx == cursor => {
                        Span::styled(expected.to_string(), caret_style)
                    }
                    None => Span::styled(expected.to_string(), pending_style),
                })
                .collect::<Vec<Span>>();
            Line::from(spans)
        })
        .collect()
}
