use rigeval_core::visualize::{Marker, MarkerShape, ScatterChart};

const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 180.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 70.0;
const GLYPH_SIZE: f64 = 9.0;

/// Linear mapping from data space to pixel space.
struct Scale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl Scale {
    fn map(&self, v: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        r0 + (v - d0) / (d1 - d0) * (r1 - r0)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Padded y domain that always includes zero.
fn y_domain(chart: &ScatterChart) -> (f64, f64) {
    let (lo, hi) = chart.y_extent().unwrap_or((0.0, 10.0));
    let (lo, hi) = (lo.min(0.0), hi.max(0.0));
    let pad = ((hi - lo) * 0.1).max(1.0);
    (lo - pad, hi + pad)
}

fn polygon_points(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{x:.1},{y:.1}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// SVG element drawing one marker glyph centred on (cx, cy).
pub fn glyph(marker: Marker, cx: f64, cy: f64, color: &str) -> String {
    let s = GLYPH_SIZE;
    let paint = if marker.filled {
        format!(r#"fill="{color}" fill-opacity="0.75" stroke="{color}" stroke-width="1.5""#)
    } else {
        format!(r#"fill="none" stroke="{color}" stroke-width="2""#)
    };
    match marker.shape {
        MarkerShape::Circle => format!(r#"<circle cx="{cx:.1}" cy="{cy:.1}" r="{s:.1}" {paint}/>"#),
        MarkerShape::Square => {
            let side = s * 1.7;
            format!(
                r#"<rect x="{:.1}" y="{:.1}" width="{side:.1}" height="{side:.1}" {paint}/>"#,
                cx - side / 2.0,
                cy - side / 2.0
            )
        }
        MarkerShape::Triangle => {
            let pts = [(cx, cy - s * 1.15), (cx + s, cy + s * 0.85), (cx - s, cy + s * 0.85)];
            format!(r#"<polygon points="{}" {paint}/>"#, polygon_points(&pts))
        }
        MarkerShape::Diamond => {
            let pts = [(cx, cy - s * 1.2), (cx + s, cy), (cx, cy + s * 1.2), (cx - s, cy)];
            format!(r#"<polygon points="{}" {paint}/>"#, polygon_points(&pts))
        }
        MarkerShape::Cross => {
            let (a, b) = (s * 0.35, s);
            let d = format!(
                "M{:.1},{:.1} H{:.1} V{:.1} H{:.1} V{:.1} H{:.1} V{:.1} H{:.1} V{:.1} H{:.1} V{:.1} H{:.1} Z",
                cx - a, cy - b,
                cx + a, cy - a,
                cx + b, cy + a,
                cx + a, cy + b,
                cx - a, cy + a,
                cx - b, cy - a,
                cx - a
            );
            format!(r#"<path d="{d}" {paint}/>"#)
        }
        MarkerShape::Star => {
            let pts: Vec<(f64, f64)> = (0..10)
                .map(|i| {
                    let radius = if i % 2 == 0 { s * 1.25 } else { s * 0.5 };
                    let angle = std::f64::consts::PI * (i as f64) / 5.0 - std::f64::consts::FRAC_PI_2;
                    (cx + radius * angle.cos(), cy + radius * angle.sin())
                })
                .collect();
            format!(r#"<polygon points="{}" {paint}/>"#, polygon_points(&pts))
        }
    }
}

/// Render a scatter chart as a standalone SVG document.
pub fn render_chart(chart: &ScatterChart) -> String {
    let width = chart.width as f64;
    let height = chart.height as f64;
    let plot_right = width - MARGIN_RIGHT;
    let plot_bottom = height - MARGIN_BOTTOM;
    let x = Scale {
        domain: chart.x_range,
        range: (MARGIN_LEFT, plot_right),
    };
    let y_dom = y_domain(chart);
    let y = Scale {
        domain: y_dom,
        range: (plot_bottom, MARGIN_TOP),
    };

    let mut out = String::new();
    out.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\" font-family=\"sans-serif\">\n",
        chart.width, chart.height, chart.width, chart.height
    ));
    out.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    out.push_str(&format!(
        "<defs><clipPath id=\"plot-area\"><rect x=\"{MARGIN_LEFT}\" y=\"{MARGIN_TOP}\" width=\"{:.1}\" height=\"{:.1}\"/></clipPath></defs>\n",
        plot_right - MARGIN_LEFT,
        plot_bottom - MARGIN_TOP
    ));
    out.push_str(&format!(
        "<text x=\"{:.1}\" y=\"32\" text-anchor=\"middle\" font-size=\"18\" font-weight=\"bold\">{}</text>\n",
        (MARGIN_LEFT + plot_right) / 2.0,
        escape(&chart.title)
    ));

    // Grid and ticks
    let mut tick = (chart.x_range.0 / 20.0).ceil() * 20.0;
    while tick <= chart.x_range.1 {
        let px = x.map(tick);
        out.push_str(&format!(
            "<line x1=\"{px:.1}\" y1=\"{MARGIN_TOP}\" x2=\"{px:.1}\" y2=\"{plot_bottom:.1}\" stroke=\"#e5e5e5\"/><text x=\"{px:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"12\">{tick:.0}</text>\n",
            plot_bottom + 18.0
        ));
        tick += 20.0;
    }
    for i in 0..=5 {
        let value = y_dom.0 + (y_dom.1 - y_dom.0) * i as f64 / 5.0;
        let py = y.map(value);
        out.push_str(&format!(
            "<line x1=\"{MARGIN_LEFT}\" y1=\"{py:.1}\" x2=\"{plot_right:.1}\" y2=\"{py:.1}\" stroke=\"#e5e5e5\"/><text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"12\">{value:.1}</text>\n",
            MARGIN_LEFT - 8.0,
            py + 4.0
        ));
    }
    if y_dom.0 < 0.0 && y_dom.1 > 0.0 {
        let py = y.map(0.0);
        out.push_str(&format!(
            "<line class=\"zero\" x1=\"{MARGIN_LEFT}\" y1=\"{py:.1}\" x2=\"{plot_right:.1}\" y2=\"{py:.1}\" stroke=\"#999999\" stroke-dasharray=\"4 3\"/>\n"
        ));
    }
    out.push_str(&format!(
        "<rect x=\"{MARGIN_LEFT}\" y=\"{MARGIN_TOP}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"none\" stroke=\"black\"/>\n",
        plot_right - MARGIN_LEFT,
        plot_bottom - MARGIN_TOP
    ));

    // Axis labels
    out.push_str(&format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"14\" font-weight=\"bold\">{}</text>\n",
        (MARGIN_LEFT + plot_right) / 2.0,
        height - 25.0,
        escape(&chart.x_label)
    ));
    out.push_str(&format!(
        "<text x=\"20\" y=\"{0:.1}\" text-anchor=\"middle\" font-size=\"14\" font-weight=\"bold\" transform=\"rotate(-90 20 {0:.1})\">{1}</text>\n",
        (MARGIN_TOP + plot_bottom) / 2.0,
        escape(&chart.y_label)
    ));

    if let Some(trend) = &chart.trend {
        let (x0, x1) = chart.x_range;
        out.push_str(&format!(
            "<line class=\"trend\" x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"#555555\" stroke-width=\"2\" stroke-dasharray=\"8 5\" clip-path=\"url(#plot-area)\"/>\n",
            x.map(x0),
            y.map(trend.line.at(x0)),
            x.map(x1),
            y.map(trend.line.at(x1))
        ));
        out.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"12\" fill=\"#555555\">trend (R² = {:.3})</text>\n",
            plot_right - 8.0,
            MARGIN_TOP + 18.0,
            trend.r_squared
        ));
    }

    // Points: one group per agent, glyph identifies the agent
    for series in &chart.series {
        out.push_str(&format!(
            "<g class=\"series\" data-agent=\"{}\" data-marker=\"{}\">\n",
            escape(&series.agent),
            series.marker
        ));
        for point in &series.points {
            let (px, py) = (x.map(point.x), y.map(point.y));
            out.push_str(&format!(
                "<g class=\"point\" data-agent=\"{}\" data-marker=\"{}\" data-repository=\"{}\"><title>{} - {}: ({:.1}, {:.1})</title>{}</g>\n",
                escape(&series.agent),
                series.marker,
                escape(&point.label),
                escape(&series.agent),
                escape(&point.label),
                point.x,
                point.y,
                glyph(series.marker, px, py, &series.color)
            ));
            out.push_str(&format!(
                "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"10\" fill=\"#333333\">{}</text>\n",
                px + GLYPH_SIZE + 3.0,
                py - GLYPH_SIZE,
                escape(&point.label)
            ));
        }
        out.push_str("</g>\n");
    }

    // Legend
    let legend_x = plot_right + 20.0;
    for (i, series) in chart.series.iter().enumerate() {
        let ly = MARGIN_TOP + 20.0 + i as f64 * 26.0;
        out.push_str(&format!(
            "<g class=\"legend\" data-agent=\"{}\" data-marker=\"{}\">{}<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"13\">{}</text></g>\n",
            escape(&series.agent),
            series.marker,
            glyph(series.marker, legend_x + 10.0, ly, &series.color),
            legend_x + 26.0,
            ly + 4.0,
            escape(&series.agent)
        ));
    }

    out.push_str("</svg>\n");
    out
}
