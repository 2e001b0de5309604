use std::collections::HashMap;
use std::sync::Arc;

use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Clear, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::{debug, trace};

use super::error::TuiResult;
use super::focus::FocusState;
use super::viewport::RowCursor;
use crate::config::ColorsConfig;
use crate::formatting::{sanitize, truncate_to_width};
use crate::grid::{GridAreas, GridSpec};
use crate::widget::{InstanceState, WidgetInstance};

pub const LOADING: &str = "Loading…";
const ERROR_MARK: &str = " ! ";

/// Border colour and selected-row style of one widget
struct Decoration {
    border: Color,
    highlight: Option<Style>,
}

/// Rendered body of one widget, valid for one (seq, focused) pair
struct CachedBody {
    seq: u64,
    focused: bool,
    text: Text<'static>,
}

/// Owns the terminal surface and paints every widget onto it
///
/// All painting goes through `&mut self`, so only one paint touches the surface at a
/// time. Each paint re-reads the focus state it is given; a widget's `render` is only
/// called again when its data or its focus changed.
pub struct RenderCoordinator<B: Backend> {
    terminal: Terminal<B>,
    grid: GridSpec,
    areas: GridAreas,
    surface: Rect,
    colors: ColorsConfig,
    bodies: HashMap<usize, CachedBody>,
}

impl<B: Backend> RenderCoordinator<B> {
    pub fn new(terminal: Terminal<B>, grid: GridSpec, colors: ColorsConfig) -> TuiResult<Self> {
        let size = terminal.size()?;
        let surface = Rect::new(0, 0, size.width, size.height);
        let areas = grid.split(surface);
        Ok(Self {
            terminal,
            grid,
            areas,
            surface,
            colors,
            bodies: HashMap::new(),
        })
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<B> {
        &mut self.terminal
    }

    pub fn areas(&self) -> &GridAreas {
        &self.areas
    }

    /// Re-split the grid for the current terminal size and force a full repaint
    pub fn resize(&mut self) -> TuiResult<()> {
        self.terminal.autoresize()?;
        let size = self.terminal.size()?;
        self.relayout(Rect::new(0, 0, size.width, size.height));
        self.terminal.clear()?;
        Ok(())
    }

    fn relayout(&mut self, surface: Rect) {
        debug!(
            "PAINT: surface {}x{} -> {}x{}, re-resolving grid",
            self.surface.width, self.surface.height, surface.width, surface.height
        );
        self.surface = surface;
        self.areas = self.grid.split(surface);
        self.bodies.clear();
    }

    /// Line count of the widget's current body and the height it is drawn into
    pub fn body_extent(&self, instance: &WidgetInstance) -> (u16, u16) {
        let rows = self
            .bodies
            .get(&instance.index())
            .map_or(0, |cached| line_count(&cached.text));
        let height = Block::bordered()
            .inner(instance.rect().to_area(&self.areas))
            .height;
        (rows, height)
    }

    /// Topmost widget under a terminal coordinate. Later widgets are drawn on top.
    pub fn widget_at(&self, instances: &[Arc<WidgetInstance>], x: u16, y: u16) -> Option<usize> {
        instances
            .iter()
            .rev()
            .find(|instance| instance.rect().contains_point(&self.areas, x, y))
            .map(|instance| instance.index())
    }

    /// Paint all widgets in declaration order
    ///
    /// `cursors` is indexed by widget and is clamped to each body as it is drawn.
    pub fn paint(
        &mut self,
        instances: &[Arc<WidgetInstance>],
        focus: &FocusState,
        hover: Option<usize>,
        cursors: &mut [RowCursor],
    ) -> TuiResult<()> {
        let size = self.terminal.size()?;
        let surface = Rect::new(0, 0, size.width, size.height);
        if surface != self.surface {
            self.relayout(surface);
        }

        let snapshots: Vec<InstanceState> = instances.iter().map(|i| i.snapshot()).collect();
        for (instance, state) in instances.iter().zip(&snapshots) {
            self.refresh_body(instance, state, focus.is_focused(instance.index()));
        }

        let Self {
            terminal,
            areas,
            colors,
            bodies,
            ..
        } = self;

        terminal.draw(|frame| {
            for (instance, state) in instances.iter().zip(&snapshots) {
                let index = instance.index();
                let focused = focus.is_focused(index);
                let decoration = Decoration {
                    border: if focused {
                        colors.border.focused
                    } else if hover == Some(index) {
                        colors.border.focusable
                    } else {
                        colors.border.normal
                    },
                    highlight: focused.then(|| {
                        Style::default()
                            .fg(colors.highlight.fore)
                            .bg(colors.highlight.back)
                    }),
                };
                let body = bodies.get(&index).map(|cached| &cached.text);
                let mut detached = RowCursor::default();
                let cursor = cursors.get_mut(index).unwrap_or(&mut detached);
                draw_widget(
                    frame,
                    instance.rect().to_area(areas),
                    instance.name(),
                    state,
                    body,
                    &decoration,
                    cursor,
                );
            }
        })?;
        trace!("PAINT: {} widget(s), focus {:?}", instances.len(), focus.focused());
        Ok(())
    }

    fn refresh_body(&mut self, instance: &WidgetInstance, state: &InstanceState, focused: bool) {
        let index = instance.index();
        let Some(statuses) = &state.statuses else {
            self.bodies.remove(&index);
            return;
        };

        if let Some(cached) = self.bodies.get(&index) {
            if cached.seq == state.seq && cached.focused == focused {
                return;
            }
        }

        trace!("PAINT: rendering '{}' (seq {})", instance.name(), state.seq);
        let text = instance.widget().render(statuses, focused, &self.colors.rows);
        self.bodies.insert(
            index,
            CachedBody {
                seq: state.seq,
                focused,
                text,
            },
        );
    }
}

fn line_count(text: &Text) -> u16 {
    u16::try_from(text.lines.len()).unwrap_or(u16::MAX)
}

fn draw_widget(
    frame: &mut Frame,
    area: Rect,
    name: &str,
    state: &InstanceState,
    body: Option<&Text<'static>>,
    decoration: &Decoration,
    cursor: &mut RowCursor,
) {
    let mut title = vec![Span::raw(format!(" {} ", sanitize(name)))];
    if state.last_error.is_some() {
        title.push(Span::styled(
            ERROR_MARK,
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let block = Block::bordered()
        .border_style(Style::default().fg(decoration.border))
        .title(Line::from(title));
    let inner = block.inner(area);

    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    let (body_area, error_area) = match &state.last_error {
        Some(_) if inner.height > 0 => {
            let [body_area, error_area] =
                Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).areas(inner);
            (body_area, Some(error_area))
        }
        _ => (inner, None),
    };

    match body {
        Some(text) => {
            cursor.fit(line_count(text), body_area.height);
            frame.render_widget(
                Paragraph::new(text.clone()).scroll((cursor.offset(), 0)),
                body_area,
            );

            if let Some(style) = decoration.highlight {
                let row = cursor.selected().saturating_sub(cursor.offset());
                if !text.lines.is_empty() && row < body_area.height {
                    let line = Rect {
                        y: body_area.y + row,
                        height: 1,
                        ..body_area
                    };
                    frame.buffer_mut().set_style(line, style);
                }
            }
        }
        None => frame.render_widget(
            Paragraph::new(LOADING).style(Style::default().fg(Color::DarkGray)),
            body_area,
        ),
    }

    if let (Some(error), Some(error_area)) = (&state.last_error, error_area) {
        let message = truncate_to_width(&sanitize(&error.to_string()), error_area.width as usize);
        frame.render_widget(
            Paragraph::new(message).style(Style::default().fg(Color::Red)),
            error_area,
        );
    }
}
