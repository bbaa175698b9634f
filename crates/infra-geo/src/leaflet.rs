// Leaflet map renderer
// Self-contained HTML document: one feature group per route, origin and
// destination markers joined by a line, plus a hidden route-group marker div
// per route so embedders can count routes by type.

use routemap_core::domain::ResolvedRoute;
use routemap_core::port::{MapRenderer, RenderError};
use serde::Serialize;
use std::fmt::Write;

const LEAFLET_VERSION: &str = "1.9.4";
const MAP_CENTER: (f64, f64) = (39.5, -98.35);
const MAP_ZOOM: u8 = 4;
const ORIGIN_ICON: &str =
    "https://raw.githubusercontent.com/pointhi/leaflet-color-markers/master/img/marker-icon-red.png";
const DESTINATION_ICON: &str =
    "https://raw.githubusercontent.com/pointhi/leaflet-color-markers/master/img/marker-icon-green.png";

/// Route as embedded in the page script
#[derive(Serialize)]
struct RouteFeature<'a> {
    id: &'a str,
    category: &'static str,
    origin: [f64; 2],
    destination: [f64; 2],
}

impl<'a> From<&'a ResolvedRoute> for RouteFeature<'a> {
    fn from(route: &'a ResolvedRoute) -> Self {
        Self {
            id: &route.delivery_id,
            category: route.category.as_str(),
            origin: [route.origin.lat, route.origin.lon],
            destination: [route.destination.lat, route.destination.lon],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeafletRenderer;

impl LeafletRenderer {
    pub fn new() -> Self {
        Self
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl MapRenderer for LeafletRenderer {
    fn render(&self, routes: &[ResolvedRoute]) -> Result<String, RenderError> {
        let features: Vec<RouteFeature<'_>> = routes.iter().map(RouteFeature::from).collect();
        // a delivery id containing "</script>" must not end the script block
        let routes_json = serde_json::to_string(&features)
            .map_err(|e| RenderError::Serialization(e.to_string()))?
            .replace("</", "<\\/");

        let mut groups = String::new();
        for route in routes {
            writeln!(
                groups,
                r#"<div class="route-group" data-type="{}" data-delivery-id="{}"></div>"#,
                route.category,
                escape_html(&route.delivery_id)
            )
            .map_err(|e| RenderError::Failed(e.to_string()))?;
        }

        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<link rel="stylesheet" href="https://unpkg.com/leaflet@{version}/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@{version}/dist/leaflet.js"></script>
<style>#route-map {{ width: 100%; height: 100%; min-height: 600px; }} .route-group {{ display: none; }}</style>
</head>
<body>
<div id="route-map"></div>
<div class="route-groups">
{groups}</div>
<script>
(function () {{
  var map = L.map('route-map').setView([{lat}, {lon}], {zoom});
  L.tileLayer('https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
    attribution: '&copy; OpenStreetMap contributors'
  }}).addTo(map);
  var originIcon = L.icon({{ iconUrl: '{origin_icon}', iconSize: [12, 20] }});
  var destinationIcon = L.icon({{ iconUrl: '{destination_icon}', iconSize: [12, 20] }});
  var routes = {routes_json};
  routes.forEach(function (route) {{
    var group = L.featureGroup();
    L.marker(route.origin, {{ icon: originIcon }}).bindPopup('Origin').addTo(group);
    L.marker(route.destination, {{ icon: destinationIcon }}).bindPopup('Destination').addTo(group);
    var popup = document.createElement('span');
    popup.textContent = 'Delivery #: ' + route.id;
    L.polyline([route.origin, route.destination], {{ color: 'blue', weight: 3 }})
      .bindPopup(popup, {{ maxWidth: 300 }})
      .addTo(group);
    group.addTo(map);
  }});
}})();
</script>
</body>
</html>
"#,
            version = LEAFLET_VERSION,
            groups = groups,
            lat = MAP_CENTER.0,
            lon = MAP_CENTER.1,
            zoom = MAP_ZOOM,
            origin_icon = ORIGIN_ICON,
            destination_icon = DESTINATION_ICON,
            routes_json = routes_json,
        ))
    }
}
