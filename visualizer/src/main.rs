use iced::{
    mouse, time, window,
    widget::{
        button,
        canvas::{self, Canvas, Frame, Geometry, Path},
        column, row, slider, text, Column, Container,
    },
    Alignment, Color, Element, Length, Point, Rectangle, Renderer, Size, Subscription, Task,
    Theme,
};
use serde::Deserialize;
use smokecore::dispatch::Rgb;
use smokecore::playback::{LegendEntry, ParticleSprite};
use smokecore::telemetry::log::format_timestamp;
use smokecore::{FrameSnapshot, PlaybackCommand};
use std::time::Duration;

const BRIDGE_URL: &str = "http://127.0.0.1:9000";
const SIDEBAR_WIDTH: f32 = 300.0;
/// Space around the canvas taken by padding, spacing and the slider.
const CANVAS_MARGIN_X: f32 = SIDEBAR_WIDTH + 8.0 + 32.0;
const CANVAS_MARGIN_Y: f32 = 32.0 + 8.0 + 20.0;

fn main() -> iced::Result {
    iced::application(Visualizer::boot, Visualizer::update, Visualizer::view)
        .title(application_title)
        .subscription(application_subscription)
        .theme(application_theme)
        .run()
}

fn application_title(_: &Visualizer) -> String {
    "SF 911 Smoke".into()
}

fn application_subscription(_: &Visualizer) -> Subscription<Message> {
    Subscription::batch([
        time::every(Duration::from_millis(33)).map(|_| Message::Tick),
        window::resize_events().map(|(_id, size)| Message::WindowResized(size)),
    ])
}

fn application_theme(_: &Visualizer) -> Theme {
    Theme::Dark
}

#[derive(Debug)]
struct Visualizer {
    frame: Option<VisualizationPayload>,
    status: String,
    /// Slider position while the user drags; `None` follows playback.
    scrub: Option<f64>,
    in_flight: bool,
}

#[derive(Debug, Clone)]
enum Message {
    Tick,
    FrameFetched(Result<VisualizationPayload, String>),
    Control(PlaybackCommand),
    ControlSent(Result<(), String>),
    ScrubChanged(f64),
    ScrubReleased,
    WindowResized(Size),
}

impl Visualizer {
    fn boot() -> (Self, Task<Message>) {
        (
            Visualizer {
                frame: None,
                status: "Waiting for playback...".into(),
                scrub: None,
                in_flight: true,
            },
            Task::perform(fetch_frame(), Message::FrameFetched),
        )
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                if state.in_flight {
                    return Task::none();
                }
                state.in_flight = true;
                Task::perform(fetch_frame(), Message::FrameFetched)
            }
            Message::FrameFetched(Ok(payload)) => {
                state.in_flight = false;
                state.status = payload.status.clone();
                state.frame = Some(payload);
                Task::none()
            }
            Message::FrameFetched(Err(err)) => {
                state.in_flight = false;
                state.status = format!("Bridge error: {err}");
                Task::none()
            }
            Message::Control(command) => {
                Task::perform(post_control(command), Message::ControlSent)
            }
            Message::ControlSent(Ok(())) => Task::none(),
            Message::ControlSent(Err(err)) => {
                state.status = format!("Control error: {err}");
                Task::none()
            }
            Message::ScrubChanged(value) => {
                state.scrub = Some(value);
                Task::none()
            }
            Message::ScrubReleased => match state.scrub.take() {
                Some(fraction) => Task::perform(
                    post_control(PlaybackCommand::ScrubTo(fraction)),
                    Message::ControlSent,
                ),
                None => Task::none(),
            },
            Message::WindowResized(size) => {
                let width = size.width - CANVAS_MARGIN_X;
                let height = size.height - CANVAS_MARGIN_Y;
                if width <= 0.0 || height <= 0.0 {
                    return Task::none();
                }
                Task::perform(
                    post_control(PlaybackCommand::Resize { width, height }),
                    Message::ControlSent,
                )
            }
        }
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let snapshot = state.frame.as_ref().map(|payload| &payload.snapshot);

        let scene = Canvas::new(SmokeScene::new(snapshot))
            .width(Length::Fill)
            .height(Length::Fill);

        let playback_time = snapshot
            .and_then(|snapshot| snapshot.playback_time)
            .map(format_timestamp)
            .unwrap_or_else(|| "--".into());
        let active = snapshot.map_or(0, |snapshot| snapshot.active_emitters);
        let calls = snapshot.map_or(0, |snapshot| snapshot.record_count);
        let paused = snapshot.is_some_and(|snapshot| snapshot.paused);
        let speed = snapshot.map_or(0.0, |snapshot| snapshot.speed);
        let wind = snapshot.map_or(0.0, |snapshot| snapshot.wind);
        let mic_level = state.frame.as_ref().map_or(0.0, |payload| payload.mic_level);

        let progress = state
            .scrub
            .or_else(|| snapshot.and_then(|snapshot| snapshot.progress))
            .unwrap_or(0.0);

        let hud = column![
            text("SF 911 Smoke").size(24),
            text(format!("Active calls: {active} / {calls} loaded")).size(14),
            text(format!("Playback: {playback_time}")).size(14),
            text(if paused {
                "Speed: paused".to_string()
            } else {
                format!("Speed: {speed:.0}x")
            })
            .size(14),
            text(format!("Window: {:.0}%", progress * 100.0)).size(14),
            text(format!("Mic level: {mic_level:.3}  wind {wind:+.3}")).size(14),
            text(&state.status).size(12),
        ]
        .spacing(4);

        let controls = row![
            button(if paused { "Resume" } else { "Pause" })
                .on_press(Message::Control(PlaybackCommand::TogglePause))
                .padding(8),
            button("Slower")
                .on_press(Message::Control(PlaybackCommand::SlowDown))
                .padding(8),
            button("Faster")
                .on_press(Message::Control(PlaybackCommand::SpeedUp))
                .padding(8),
            button("Reset")
                .on_press(Message::Control(PlaybackCommand::Reset))
                .padding(8),
        ]
        .spacing(8)
        .align_y(Alignment::Center);

        let timeline = slider(0.0..=1.0, progress, Message::ScrubChanged)
            .step(0.001)
            .on_release(Message::ScrubReleased);

        let legend = snapshot
            .map(|snapshot| legend_column(&snapshot.legend))
            .unwrap_or_else(|| Column::new().push(text("No calls yet").size(12)));

        let sidebar = column![hud, controls, text("Call types").size(16), legend]
            .spacing(12)
            .padding(16)
            .width(Length::Fixed(SIDEBAR_WIDTH));

        let main = column![scene, timeline].spacing(8).padding(16);

        Container::new(row![sidebar, main].spacing(8))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}

fn legend_column(entries: &[LegendEntry]) -> Column<'static, Message> {
    if entries.is_empty() {
        return Column::new().push(text("No active calls").size(12));
    }
    entries
        .iter()
        .fold(Column::new().spacing(4), |col, entry| {
            col.push(
                text(format!("\u{25CF} {} ({})", entry.label, entry.code))
                    .size(12)
                    .color(to_color(entry.color, 1.0)),
            )
        })
}

fn to_color(rgb: Rgb, alpha: f32) -> Color {
    Color::from_rgba8(rgb.r, rgb.g, rgb.b, alpha)
}

async fn fetch_frame() -> Result<VisualizationPayload, String> {
    let response = reqwest::get(format!("{BRIDGE_URL}/frame"))
        .await
        .map_err(|e| e.to_string())?;
    response
        .json::<VisualizationPayload>()
        .await
        .map_err(|e| e.to_string())
}

async fn post_control(command: PlaybackCommand) -> Result<(), String> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{BRIDGE_URL}/control"))
        .json(&command)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if response.status().is_success() {
        Ok(())
    } else {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(format!("{}: {}", status, text))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct VisualizationPayload {
    #[serde(flatten)]
    snapshot: FrameSnapshot,
    #[serde(default)]
    status: String,
    #[serde(default)]
    mic_level: f32,
}

/// Draws the current sprites over black, scaled from the engine surface
/// to the canvas bounds.
struct SmokeScene {
    sprites: Vec<ParticleSprite>,
    surface: (f32, f32),
}

impl SmokeScene {
    fn new(snapshot: Option<&FrameSnapshot>) -> Self {
        match snapshot {
            Some(snapshot) => Self {
                sprites: snapshot.sprites.clone(),
                surface: (snapshot.surface_width, snapshot.surface_height),
            },
            None => Self {
                sprites: Vec::new(),
                surface: (1.0, 1.0),
            },
        }
    }
}

impl canvas::Program<Message> for SmokeScene {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(Point::ORIGIN, bounds.size(), Color::BLACK);

        let scale_x = bounds.width / self.surface.0.max(1.0);
        let scale_y = bounds.height / self.surface.1.max(1.0);
        let scale = scale_x.min(scale_y);

        for sprite in &self.sprites {
            let radius = (sprite.size * scale / 2.0).max(0.5);
            let center = Point::new(sprite.x * scale_x, sprite.y * scale_y);
            let puff = Path::circle(center, radius);
            let alpha = sprite.opacity as f32 / 255.0;
            frame.fill(&puff, to_color(sprite.color, alpha));
        }

        vec![frame.into_geometry()]
    }
}
