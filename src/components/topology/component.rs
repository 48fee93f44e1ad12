use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use log::error;
use send_wrapper::SendWrapper;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::render;
use super::state::{TopologyViewState, ViewUpdate};
use super::storage::{StoragePositions, TopologyOptions};
use crate::topology::legend::LegendEntry;
use crate::topology::source::SnapshotSource;

fn window_size(window: &Window) -> (f64, f64) {
	let dim = |v: Result<JsValue, JsValue>, fallback: f64| {
		v.ok().and_then(|v| v.as_f64()).unwrap_or(fallback)
	};
	(dim(window.inner_width(), 800.0), dim(window.inner_height(), 600.0))
}

fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
	canvas.get_context("2d").ok().flatten()?.dyn_into().ok()
}

fn pointer(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

fn publish(
	update: ViewUpdate,
	tooltip: RwSignal<Option<String>>,
	legend: RwSignal<Vec<LegendEntry>>,
) {
	if let Some(html) = update.tooltip {
		tooltip.set(html);
	}
	if let Some(entries) = update.legend {
		legend.set(entries);
	}
}

/// Live router network diagram drawn on a canvas, fed by `source`.
#[component]
pub fn TopologyCanvas(
	source: Box<dyn SnapshotSource>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: Rc<RefCell<Option<TopologyViewState>>> = Rc::new(RefCell::new(None));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let source = Rc::new(RefCell::new(Some(source)));
	let (state_init, animate_init, resize_cb_init) =
		(state.clone(), animate.clone(), resize_cb.clone());

	let options = TopologyOptions::load();
	let legend_open = RwSignal::new(options.legend_open);
	let legend_entries = RwSignal::new(Vec::<LegendEntry>::new());
	let tooltip = RwSignal::new(None::<String>);
	let tooltip_at = RwSignal::new((0.0_f64, 0.0_f64));

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};
		let Some(source) = source.borrow_mut().take() else {
			return;
		};

		let (w, h) = if fullscreen {
			window_size(&window)
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = context_2d(&canvas) else {
			error!("canvas has no 2d context");
			return;
		};
		*state_init.borrow_mut() = Some(TopologyViewState::new(
			source,
			Box::new(StoragePositions::new()),
			w,
			h,
		));

		if fullscreen {
			let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (nw, nh) = window_size(&win);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *state_resize.borrow_mut() {
					s.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (state_anim, animate_inner) = (state_init.clone(), animate_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			let update = {
				let mut guard = state_anim.borrow_mut();
				// torn down: let the loop end
				let Some(s) = guard.as_mut() else {
					return;
				};
				s.frame(js_sys::Date::now());
				render::render(s, &ctx);
				s.take_update()
			};
			publish(update, tooltip, legend_entries);
			if let Some(ref cb) = *animate_inner.borrow() {
				if let Some(win) = web_sys::window() {
					let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
				}
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let state_cleanup = SendWrapper::new(state.clone());
	let resize_cleanup = SendWrapper::new(resize_cb.clone());
	on_cleanup(move || {
		if let Some(cb) = resize_cleanup.borrow_mut().take() {
			if let Some(window) = web_sys::window() {
				let _ = window
					.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}
		if let Some(mut s) = state_cleanup.borrow_mut().take() {
			s.teardown();
		}
	});

	let state_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		if ev.button() != 0 {
			return;
		}
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_md.borrow_mut() {
			s.press(x, y);
		}
	};

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			return;
		};
		let update = match *state_mm.borrow_mut() {
			Some(ref mut s) => {
				s.pointer_moved(x, y);
				s.take_update()
			}
			None => return,
		};
		tooltip_at.set((x + 14.0, y + 14.0));
		publish(update, tooltip, legend_entries);
	};

	let state_mu = state.clone();
	let on_mouseup = move |_: MouseEvent| {
		let update = match *state_mu.borrow_mut() {
			Some(ref mut s) => {
				s.release();
				s.take_update()
			}
			None => return,
		};
		publish(update, tooltip, legend_entries);
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		let update = match *state_ml.borrow_mut() {
			Some(ref mut s) => {
				s.release();
				s.clear_hover();
				s.take_update()
			}
			None => return,
		};
		publish(update, tooltip, legend_entries);
	};

	let state_dc = state.clone();
	let on_dblclick = move |ev: MouseEvent| {
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_dc.borrow_mut() {
			s.double_click(x, y);
		}
	};

	let state_cm = state.clone();
	let on_contextmenu = move |ev: MouseEvent| {
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_cm.borrow_mut() {
			if s.toggle_pin(x, y) {
				ev.prevent_default();
			}
		}
	};

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_wh.borrow_mut() {
			s.zoom(x, y, ev.delta_y() < 0.0);
		}
	};

	let toggle_legend = move |_| {
		legend_open.update(|open| *open = !*open);
		TopologyOptions {
			legend_open: legend_open.get_untracked(),
			..TopologyOptions::load()
		}
		.save();
	};

	view! {
		<div class="topology" style="position: relative;">
			<canvas
				node_ref=canvas_ref
				class="topology-canvas"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:dblclick=on_dblclick
				on:contextmenu=on_contextmenu
				on:wheel=on_wheel
				style="display: block; cursor: grab;"
			/>
			<Show when=move || tooltip.with(Option::is_some)>
				<div
					class="topology-tooltip"
					style=move || {
						let (x, y) = tooltip_at.get();
						format!(
							"position: absolute; left: {x}px; top: {y}px; pointer-events: none; \
							 background: rgba(255, 255, 255, 0.95); color: #222; padding: 4px 6px; \
							 border-radius: 4px; font: 12px sans-serif;"
						)
					}
					inner_html=move || tooltip.get().unwrap_or_default()
				/>
			</Show>
			<div
				class="topology-legend"
				style="position: absolute; top: 8px; right: 8px; color: #eee; font: 12px sans-serif;"
			>
				<button on:click=toggle_legend>"Legend"</button>
				<Show when=move || legend_open.get()>
					<ul style="list-style: none; margin: 4px 0; padding: 0;">
						<For
							each=move || legend_entries.get()
							key=|entry| *entry
							children=move |entry: LegendEntry| {
								view! {
									<li>
										<span style=format!(
											"display: inline-block; width: 10px; height: 10px; \
											 border-radius: 50%; margin-right: 6px; background: {};",
											render::legend_color(entry),
										) />
										{entry.label()}
									</li>
								}
							}
						/>
					</ul>
				</Show>
			</div>
		</div>
	}
}
