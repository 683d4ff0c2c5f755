// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! Terminal status panel

use crate::control::LoopState;
use crate::telemetry::{Frame, Observer, TelemetryHistory, PLOT_TTC_CAP};
use console::{style, Color, StyledObject};
use std::io::{self, Write};

/// TTC below which the value is highlighted
const TTC_WARNING: f64 = 2.0;

/// Number of samples shown in the trend lines
const TREND_WIDTH: usize = 40;

/// Trend lines are recomputed every this many recorded samples
const TREND_REFRESH: u64 = 5;

const TREND_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

const ORANGE: Color = Color::Color256(214);

/// Status panel showing speeds, distance, TTC, the applied command and the link state
pub struct Hud<W: Write> {
    out: W,
    refresh_interval: u64,
    /// Overwrite the previous panel instead of appending
    redraw: bool,
    drawn_lines: usize,
    trends: Vec<String>,
}

impl Hud<io::Stdout> {
    /// Panel on stdout, redrawn in place if stdout is a terminal
    pub fn stdout(refresh_interval: u64) -> Self {
        let redraw = console::Term::stdout().is_term();
        Self {
            out: io::stdout(),
            refresh_interval,
            redraw,
            drawn_lines: 0,
            trends: Vec::new(),
        }
    }
}

impl<W: Write> Hud<W> {
    /// Panel appended to `out` on every refresh
    pub fn new(out: W, refresh_interval: u64) -> Self {
        Self {
            out,
            refresh_interval,
            redraw: false,
            drawn_lines: 0,
            trends: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, frame: &Frame, history: &TelemetryHistory) -> Vec<String> {
        let metrics = &frame.metrics;
        let ttc = if metrics.ttc.is_finite() {
            let text = format!("{:.2} s", metrics.ttc);
            if metrics.ttc < TTC_WARNING {
                style(text).fg(Color::Red).bold()
            } else {
                style(text)
            }
        } else {
            style("∞".to_owned())
        };

        let link = {
            let text = format!("{} ({} decision)", frame.state, frame.source);
            match frame.state {
                LoopState::Running => style(text).fg(Color::Green),
                _ => style(text).fg(Color::Yellow),
            }
        };

        if self.trends.is_empty() || history.recorded() % TREND_REFRESH == 0 {
            self.trends = trends(history);
        }

        let mut lines = vec![
            style("AEB SCENARIO - CAR TO BICYCLIST")
                .fg(Color::Yellow)
                .bold()
                .to_string(),
            format!(
                "Time:           {:.2} s (tick {})",
                frame.sim_time, frame.tick
            ),
            format!("Ego speed:      {:.1} km/h", metrics.ego_speed * 3.6),
            format!("Cyclist speed:  {:.1} km/h", metrics.other_speed * 3.6),
            format!("Distance:       {:.2} m", metrics.distance),
            format!("TTC:            {ttc}"),
            String::new(),
            format!("Throttle:       {:.2}", frame.command.throttle),
            format!("Brake:          {:.2}", frame.command.brake),
            format!("AEB active:     {}", flag(frame.decision.aeb_active, ORANGE)),
            format!("FCW:            {}", flag(frame.decision.fcw_active, ORANGE)),
            format!("Collision:      {}", flag(frame.collision, Color::Red)),
            format!("Link:           {link}"),
            String::new(),
        ];
        lines.extend(self.trends.iter().cloned());
        lines
    }
}

impl<W: Write> Observer for Hud<W> {
    fn name(&self) -> &str {
        "hud"
    }

    fn refresh_interval(&self) -> u64 {
        self.refresh_interval
    }

    fn update(&mut self, frame: &Frame, history: &TelemetryHistory) -> io::Result<()> {
        let lines = self.render(frame, history);
        if self.redraw && self.drawn_lines > 0 {
            // Move up over the previous panel and clear it
            write!(self.out, "\x1b[{}A\x1b[0J", self.drawn_lines)?;
        }
        for line in &lines {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()?;
        self.drawn_lines = lines.len();
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn flag(value: bool, highlight: Color) -> StyledObject<bool> {
    if value {
        style(value).fg(highlight).bold()
    } else {
        style(value)
    }
}

/// Distance, TTC and speed sparklines. Both speeds share one scale.
fn trends(history: &TelemetryHistory) -> Vec<String> {
    let snapshot = history.snapshot();
    let top_speed = snapshot
        .ego_speed
        .iter()
        .chain(&snapshot.other_speed)
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    vec![
        format!("Distance trend  {}", trend(&snapshot.distance, None)),
        format!(
            "TTC trend       {}",
            trend(&snapshot.ttc_for_display(), Some(PLOT_TTC_CAP))
        ),
        format!("Ego speed       {}", trend(&snapshot.ego_speed, Some(top_speed))),
        format!(
            "Cyclist speed   {}",
            trend(&snapshot.other_speed, Some(top_speed))
        ),
    ]
}

/// Sparkline of the most recent values, scaled to `max` or the largest value shown
fn trend(values: &[f64], max: Option<f64>) -> String {
    let start = values.len().saturating_sub(TREND_WIDTH);
    let recent = &values[start..];
    let max = max.unwrap_or_else(|| {
        recent
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    });
    recent
        .iter()
        .map(|value| {
            if !(max > 0.0) || !value.is_finite() {
                return TREND_LEVELS[0];
            }
            let level = (value.max(0.0) / max * (TREND_LEVELS.len() - 1) as f64).round() as usize;
            TREND_LEVELS[level.min(TREND_LEVELS.len() - 1)]
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::telemetry::test::frame;

    fn plain(hud: Hud<Vec<u8>>) -> String {
        let bytes = hud.into_inner();
        console::strip_ansi_codes(&String::from_utf8(bytes).unwrap()).into_owned()
    }

    #[test]
    fn panel_shows_speeds_in_kmh() {
        let mut history = TelemetryHistory::new(10);
        let frame = frame(3, 20.0);
        history.record(frame.sample());
        let mut hud = Hud::new(Vec::new(), 1);
        hud.update(&frame, &history).unwrap();
        let text = plain(hud);
        assert!(text.contains("Ego speed:      18.0 km/h"));
        assert!(text.contains("Cyclist speed:  3.6 km/h"));
        assert!(text.contains("Distance:       20.00 m"));
        assert!(text.contains("TTC:            5.00 s"));
        assert!(text.contains("Brake:          1.00"));
        assert!(text.contains("Link:           running (default decision)"));
    }

    #[test]
    fn infinite_ttc_and_flags() {
        let mut history = TelemetryHistory::new(10);
        let mut frame = frame(1, 40.0);
        frame.metrics.ttc = f64::INFINITY;
        frame.collision = true;
        frame.decision.aeb_active = true;
        frame.state = LoopState::Degraded;
        history.record(frame.sample());
        let mut hud = Hud::new(Vec::new(), 1);
        hud.update(&frame, &history).unwrap();
        let text = plain(hud);
        assert!(text.contains("TTC:            ∞"));
        assert!(text.contains("AEB active:     true"));
        assert!(text.contains("FCW:            false"));
        assert!(text.contains("Collision:      true"));
        assert!(text.contains("degraded"));
    }

    #[test]
    fn status_follows_every_tick_while_trends_lag() {
        let mut history = TelemetryHistory::new(10);
        let mut hud = Hud::new(Vec::new(), 1);
        for tick in 1..=6 {
            let mut frame = frame(tick, 48.0 - 8.0 * tick as f64);
            frame.collision = tick == 6;
            history.record(frame.sample());
            hud.update(&frame, &history).unwrap();
        }
        let text = plain(hud);
        let last_panel = text.rsplit("AEB SCENARIO").next().unwrap();
        assert!(last_panel.contains("Distance:       0.00 m"));
        assert!(last_panel.contains("Collision:      true"));
        // Recomputed at the fifth sample, so five values wide
        let distance_trend = last_panel
            .lines()
            .find(|line| line.starts_with("Distance trend"))
            .unwrap();
        assert_eq!(distance_trend, "Distance trend  █▇▅▄▂");
    }

    #[test]
    fn speed_trends_share_a_scale() {
        let mut history = TelemetryHistory::new(10);
        let frame = frame(1, 20.0);
        history.record(frame.sample());
        let mut hud = Hud::new(Vec::new(), 1);
        hud.update(&frame, &history).unwrap();
        let text = plain(hud);
        // Ego at 5 m/s is the top of the scale, the cyclist at 1 m/s a fifth of it
        assert!(text.contains("Ego speed       █"));
        assert!(text.contains("Cyclist speed   ▂"));
    }

    #[test]
    fn trend_scales_to_maximum() {
        assert_eq!(trend(&[0.0, 5.0, 10.0], None), "▁▅█");
        assert_eq!(trend(&[10.0, 10.0], Some(10.0)), "██");
        assert_eq!(trend(&[], None), "");
        assert_eq!(trend(&[0.0, 0.0], None), "▁▁");
        let long: Vec<f64> = (0..100).map(f64::from).collect();
        assert_eq!(trend(&long, None).chars().count(), TREND_WIDTH);
    }
}
