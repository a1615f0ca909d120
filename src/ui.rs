use crate::metrics::short_label;
use crate::models::{Dashboard, Entry, TrendDirection, TrendSeries};
use crate::sync::SyncPhase;
use std::fmt::Write;

pub fn render_index(dashboard: &Dashboard) -> String {
    let (weight, trend, trend_class, last_log) = match &dashboard.weight {
        Some(summary) => {
            let (trend, class) = match (summary.delta, summary.direction) {
                (Some(delta), Some(TrendDirection::Favorable)) => {
                    (format!("▼ {:.1}kg", delta.abs()), "good")
                }
                (Some(delta), Some(TrendDirection::Unfavorable)) => {
                    (format!("▲ {:.1}kg", delta.abs()), "bad")
                }
                _ => ("--".to_string(), ""),
            };
            (
                format!("{:.1}", summary.latest.value),
                trend,
                class,
                short_label(summary.latest.date),
            )
        }
        None => ("--.-".to_string(), "--".to_string(), "", "--".to_string()),
    };

    let waist = dashboard
        .waist
        .as_ref()
        .map(|reading| format!("{}cm", reading.value))
        .unwrap_or_else(|| "--".to_string());
    let bmi = dashboard
        .bmi
        .map(|bmi| format!("{bmi:.1}"))
        .unwrap_or_else(|| "--".to_string());

    let (avg_cals, avg_protein) = match &dashboard.macros {
        Some(macros) => (
            format!("{:.0}", macros.avg_calories),
            format!("{:.0}g", macros.avg_protein_g),
        ),
        None => ("--".to_string(), "--".to_string()),
    };

    let sync_label = match dashboard.sync.phase {
        SyncPhase::Ok => match dashboard.sync.last_synced {
            Some(at) => format!("Synced {}", at.with_timezone(&chrono::Local).format("%H:%M")),
            None => "Synced".to_string(),
        },
        SyncPhase::Syncing => "Syncing...".to_string(),
        SyncPhase::Offline => "Offline".to_string(),
    };

    INDEX_HTML
        .replace("{{WEIGHT}}", &weight)
        .replace("{{TREND}}", &trend)
        .replace("{{TREND_CLASS}}", trend_class)
        .replace("{{WAIST}}", &waist)
        .replace("{{BMI}}", &bmi)
        .replace("{{LAST_LOG}}", &last_log)
        .replace("{{GOALS}}", &render_goals(dashboard))
        .replace("{{AVG_CALS}}", &avg_cals)
        .replace("{{AVG_PROTEIN}}", &avg_protein)
        .replace("{{CHART}}", &render_chart(&dashboard.trend))
        .replace("{{RANGE}}", &escape(&dashboard.range))
        .replace("{{HISTORY}}", &render_history(&dashboard.history))
        .replace("{{COUNT}}", &dashboard.entry_count.to_string())
        .replace("{{SYNC}}", &sync_label)
}

fn render_goals(dashboard: &Dashboard) -> String {
    let mut html = String::new();
    for goal in &dashboard.goals {
        let remaining = if goal.reached {
            "✓ Reached!".to_string()
        } else {
            format!("{:.1}kg to go", goal.remaining)
        };
        let _ = write!(
            html,
            r#"<div class="goal"><span>{}</span><div class="bar"><i style="width:{:.0}%"></i></div><small>{}</small></div>"#,
            escape(&goal.label),
            goal.percent,
            remaining
        );
    }
    html
}

fn render_history(rows: &[Entry]) -> String {
    let mut html = String::new();
    let dash = || "-".to_string();
    for entry in rows {
        let macros = if entry.has_macros() {
            format!(
                "{} / {}",
                entry.calories.map(|c| format!("{c:.0}")).unwrap_or_else(dash),
                entry.protein_g.map(|p| format!("{p:.0}g")).unwrap_or_else(dash)
            )
        } else {
            dash()
        };
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            short_label(entry.date),
            entry.weight.map(|w| format!("{w}kg")).unwrap_or_else(dash),
            entry.waist_cm.map(|w| format!("{w}cm")).unwrap_or_else(dash),
            macros
        );
    }
    html
}

/// Weight as a solid line and waist as a dashed one, each on its own scale.
fn render_chart(series: &TrendSeries) -> String {
    const WIDTH: f64 = 600.0;
    const HEIGHT: f64 = 220.0;
    const PAD: f64 = 24.0;

    if series.weight.is_empty() {
        return r#"<text x="50%" y="50%" text-anchor="middle">No data yet</text>"#.to_string();
    }

    let step = if series.weight.len() > 1 {
        (WIDTH - PAD * 2.0) / (series.weight.len() - 1) as f64
    } else {
        0.0
    };
    let x = |index: usize| PAD + index as f64 * step;

    let line = |values: Vec<(usize, f64)>| -> String {
        let min = values.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
        let max = values.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
        let span = if max > min { max - min } else { 1.0 };
        let mut path = String::new();
        for (n, (index, value)) in values.iter().enumerate() {
            let y = HEIGHT - PAD - (value - min) / span * (HEIGHT - PAD * 2.0);
            let _ = write!(path, "{}{:.1} {:.1} ", if n == 0 { "M" } else { "L" }, x(*index), y);
        }
        path
    };

    let weight = line(series.weight.iter().copied().enumerate().collect());
    let waist_points: Vec<(usize, f64)> = series
        .waist
        .iter()
        .enumerate()
        .filter_map(|(index, value)| value.map(|v| (index, v)))
        .collect();

    let mut svg = format!(r#"<path class="weight" d="{weight}"/>"#);
    if !waist_points.is_empty() {
        let _ = write!(svg, r#"<path class="waist" d="{}"/>"#, line(waist_points));
    }
    if let (Some(first), Some(last)) = (series.labels.first(), series.labels.last()) {
        let _ = write!(
            svg,
            r#"<text x="{PAD}" y="{HEIGHT}">{first}</text><text x="{}" y="{HEIGHT}" text-anchor="end">{last}</text>"#,
            WIDTH - PAD
        );
    }
    svg
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>HealthOS</title>
  <style>
    :root { --bg: #0f172a; --card: #1e293b; --text: #f1f5f9; --dim: #94a3b8; --blue: #3b82f6; --green: #10b981; --red: #ef4444; }
    * { box-sizing: border-box; }
    body { margin: 0; background: var(--bg); color: var(--text); font-family: system-ui, sans-serif; padding: 24px 16px; }
    main { max-width: 880px; margin: 0 auto; display: grid; gap: 18px; }
    header { display: flex; justify-content: space-between; align-items: baseline; }
    h1 { margin: 0; font-size: 1.6rem; }
    .sync { color: var(--dim); font-size: 0.85rem; }
    .cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(150px, 1fr)); gap: 12px; }
    .card { background: var(--card); border-radius: 14px; padding: 14px; }
    .label { display: block; color: var(--dim); font-size: 0.75rem; text-transform: uppercase; letter-spacing: 0.08em; }
    .value { font-size: 1.6rem; font-weight: 600; }
    .good { color: var(--green); }
    .bad { color: var(--red); }
    .goal { display: grid; grid-template-columns: 70px 1fr 110px; gap: 10px; align-items: center; margin: 6px 0; }
    .bar { background: #334155; border-radius: 99px; height: 8px; overflow: hidden; }
    .bar i { display: block; height: 100%; background: var(--blue); }
    svg { width: 100%; height: 220px; }
    svg text { fill: var(--dim); font-size: 11px; }
    path.weight { fill: none; stroke: var(--blue); stroke-width: 2.5; }
    path.waist { fill: none; stroke: var(--green); stroke-width: 2; stroke-dasharray: 4 3; }
    form { display: grid; grid-template-columns: repeat(auto-fit, minmax(120px, 1fr)); gap: 8px; }
    input, button { padding: 10px; border-radius: 10px; border: 1px solid #334155; background: #0b1222; color: var(--text); }
    button { background: var(--blue); border: none; font-weight: 600; cursor: pointer; }
    table { width: 100%; border-collapse: collapse; font-size: 0.9rem; }
    td, th { padding: 6px 4px; border-bottom: 1px solid #334155; text-align: left; }
    th { color: var(--dim); font-weight: 500; }
  </style>
</head>
<body>
  <main>
    <header>
      <h1>HealthOS</h1>
      <span class="sync">{{SYNC}}</span>
    </header>

    <section class="cards">
      <div class="card"><span class="label">Weight</span><span class="value">{{WEIGHT}}</span> <span class="{{TREND_CLASS}}">{{TREND}}</span></div>
      <div class="card"><span class="label">Waist</span><span class="value">{{WAIST}}</span></div>
      <div class="card"><span class="label">BMI</span><span class="value">{{BMI}}</span></div>
      <div class="card"><span class="label">Last log</span><span class="value">{{LAST_LOG}}</span></div>
      <div class="card"><span class="label">Avg calories (7 logs)</span><span class="value">{{AVG_CALS}}</span></div>
      <div class="card"><span class="label">Avg protein (7 logs)</span><span class="value">{{AVG_PROTEIN}}</span></div>
    </section>

    <section class="card">
      <span class="label">Goals</span>
      {{GOALS}}
    </section>

    <section class="card">
      <span class="label">Trend ({{RANGE}})</span>
      <svg viewBox="0 0 600 230" role="img" aria-label="Weight and waist trend">{{CHART}}</svg>
    </section>

    <section class="card">
      <span class="label">Log today</span>
      <form method="post" action="/log">
        <input name="weight" inputmode="decimal" placeholder="Weight (kg)" />
        <input name="waist_cm" inputmode="decimal" placeholder="Waist (cm)" />
        <input name="calories" inputmode="decimal" placeholder="Calories" />
        <input name="protein_g" inputmode="decimal" placeholder="Protein (g)" />
        <button type="submit">Save</button>
      </form>
    </section>

    <section class="card">
      <span class="label">History ({{COUNT}} total)</span>
      <table>
        <tr><th>Date</th><th>Weight</th><th>Waist</th><th>Cals / Protein</th></tr>
        {{HISTORY}}
      </table>
    </section>
  </main>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use crate::metrics::{build_dashboard, ChartRange};
    use crate::sync::SyncState;
    use chrono::NaiveDate;

    #[test]
    fn page_shows_cards_and_history() {
        let entries = vec![
            Entry {
                weight: Some(104.0),
                ..Entry::new(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap())
            },
            Entry {
                weight: Some(103.2),
                waist_cm: Some(99.0),
                calories: Some(2150.0),
                ..Entry::new(NaiveDate::from_ymd_opt(2025, 11, 2).unwrap())
            },
        ];
        let dashboard = build_dashboard(
            &entries,
            &MetricsConfig::default(),
            ChartRange::default(),
            SyncState::default(),
        );

        let html = render_index(&dashboard);
        assert!(html.contains("103.2"));
        assert!(html.contains("▼ 0.8kg"));
        assert!(html.contains("99cm"));
        assert!(html.contains("2150 / -"));
        assert!(html.contains("Offline"));
        assert!(html.contains("path class=\"weight\""));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn empty_dashboard_renders_placeholders() {
        let dashboard = build_dashboard(
            &[],
            &MetricsConfig::default(),
            ChartRange::All,
            SyncState::default(),
        );
        let html = render_index(&dashboard);
        assert!(html.contains("--.-"));
        assert!(html.contains("No data yet"));
    }
}
