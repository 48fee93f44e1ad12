use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::state::TopologyViewState;
use crate::topology::legend::LegendEntry;
use crate::topology::model::{Link, LinkClass, Node};

const BACKGROUND: &str = "#1a1a2e";
const LINK_COLOR: &str = "rgba(100, 180, 255, 0.6)";
const SMALL_LINK_COLOR: &str = "rgba(100, 180, 255, 0.35)";
const HIGHLIGHT_COLOR: &str = "#6fdc8c";
const SELECTED_COLOR: &str = "#ff9f43";
const UNKNOWN_FILL: &str = "#888888";

pub fn legend_color(entry: LegendEntry) -> &'static str {
	match entry {
		LegendEntry::Router => "#3b7dd8",
		LegendEntry::Console => "#d0d0d8",
		LegendEntry::Sender => "#f5c15c",
		LegendEntry::Receiver => "#5cc8f5",
		LegendEntry::SenderReceiver => "#c59bf0",
		LegendEntry::QpidBroker => "#e07b7b",
		LegendEntry::ArtemisBroker => "#d99b5a",
		LegendEntry::Service => "#8fce8f",
	}
}

fn node_fill(node: &Node) -> &'static str {
	LegendEntry::of(node).map_or(UNKNOWN_FILL, legend_color)
}

pub fn render(state: &TopologyViewState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_links(state, ctx);
	draw_nodes(state, ctx);
	ctx.restore();
}

fn draw_links(state: &TopologyViewState, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	let graph = state.session.graph();
	let hovered = state.session.hovered_link();

	for (i, link) in graph.links.iter().enumerate() {
		let (a, b) = (&graph.nodes[link.source], &graph.nodes[link.target]);
		let (dx, dy) = (b.x - a.x, b.y - a.y);
		let dist = dx.hypot(dy);
		if dist < a.radius() + b.radius() {
			continue;
		}
		let (ux, uy) = (dx / dist, dy / dist);
		let color = if hovered == Some(i) {
			SELECTED_COLOR
		} else if link.highlighted {
			HIGHLIGHT_COLOR
		} else if link.class == LinkClass::Small {
			SMALL_LINK_COLOR
		} else {
			LINK_COLOR
		};
		let width = match link.class {
			LinkClass::InterRouter => 2.5,
			LinkClass::Small => 1.5,
		} / k;

		let start = (a.x + ux * a.radius(), a.y + uy * a.radius());
		let end = (b.x - ux * b.radius(), b.y - uy * b.radius());
		ctx.set_stroke_style_str(color);
		ctx.set_line_width(if link.highlighted { width * 1.6 } else { width });
		ctx.begin_path();
		ctx.move_to(start.0, start.1);
		ctx.line_to(end.0, end.1);
		ctx.stroke();

		ctx.set_fill_style_str(color);
		draw_arrows(link, start, end, (ux, uy), 8.0 / k, ctx);
	}
}

/// `right` points at the target end, `left` at the source end.
fn draw_arrows(
	link: &Link,
	start: (f64, f64),
	end: (f64, f64),
	(ux, uy): (f64, f64),
	size: f64,
	ctx: &CanvasRenderingContext2d,
) {
	if link.right {
		arrow_head(end, (ux, uy), size, ctx);
	}
	if link.left {
		arrow_head(start, (-ux, -uy), size, ctx);
	}
}

fn arrow_head(tip: (f64, f64), (ux, uy): (f64, f64), size: f64, ctx: &CanvasRenderingContext2d) {
	let (back_x, back_y) = (tip.0 - ux * size, tip.1 - uy * size);
	let (px, py) = (-uy * size * 0.5, ux * size * 0.5);
	ctx.begin_path();
	ctx.move_to(tip.0, tip.1);
	ctx.line_to(back_x + px, back_y + py);
	ctx.line_to(back_x - px, back_y - py);
	ctx.close_path();
	ctx.fill();
}

fn draw_nodes(state: &TopologyViewState, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	let graph = state.session.graph();
	let (selected, hovered) = (state.session.selected(), state.hovered_node());

	for (i, node) in graph.nodes.iter().enumerate() {
		let r = node.radius();
		ctx.begin_path();
		let _ = ctx.arc(node.x, node.y, r, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(node_fill(node));
		ctx.fill();

		let (stroke, width) = if selected == Some(i) {
			(SELECTED_COLOR, 3.0)
		} else if node.highlighted {
			(HIGHLIGHT_COLOR, 3.0)
		} else if hovered == Some(i) {
			("white", 2.0)
		} else {
			("rgba(255, 255, 255, 0.5)", 1.0)
		};
		if node.fixed {
			let _ = ctx.set_line_dash(&js_sys::Array::of2(
				&JsValue::from_f64(4.0 / k),
				&JsValue::from_f64(3.0 / k),
			));
		}
		ctx.set_stroke_style_str(stroke);
		ctx.set_line_width(width / k);
		ctx.stroke();
		let _ = ctx.set_line_dash(&js_sys::Array::new());

		ctx.set_fill_style_str("white");
		ctx.set_text_align("center");
		ctx.set_text_baseline("middle");
		let size = if node.is_router() { 12.0 } else { 11.0 };
		ctx.set_font(&format!("{size}px sans-serif"));
		let _ = ctx.fill_text(&node.label(), node.x, node.y);

		let count = node.multiplicity();
		if count > 1 {
			ctx.set_font("10px sans-serif");
			let _ = ctx.fill_text(&format!("x {count}"), node.x, node.y + r + 9.0);
		}
	}
	ctx.set_text_align("start");
	ctx.set_text_baseline("alphabetic");
}
