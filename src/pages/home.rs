use leptos::prelude::*;
use send_wrapper::SendWrapper;

use crate::components::topology::TopologyCanvas;
use crate::components::topology::storage::TopologyOptions;
use crate::topology::demo::{DemoNetwork, DemoSource};
use crate::topology::source::SnapshotSource;

/// Routers in the simulated network.
const DEMO_ROUTERS: usize = 5;
/// How often the simulated network changes.
const DEMO_STEP_MS: f64 = 7000.0;

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let options = TopologyOptions::load();
	// the boundary's children must be Send; the source never leaves this thread
	let source: SendWrapper<Box<dyn SnapshotSource>> = SendWrapper::new(Box::new(DemoSource::new(
		DemoNetwork::new(DEMO_ROUTERS),
		options.poll_interval_ms,
		DEMO_STEP_MS,
	)));

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<TopologyCanvas source=source.take() fullscreen=true />
				<div class="graph-overlay">
					<h1>"Router Topology"</h1>
					<p class="subtitle">
						"Click a router to select it, hover another to trace the route. Drag to pin, double-click to release."
					</p>
				</div>
			</div>
		</ErrorBoundary>
	}
}
