// src/client/map_view.rs
use crate::models::place::Place;
use std::collections::BTreeMap;

pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: 35.6812,
    lng: 139.7671,
};
pub const DEFAULT_ZOOM: f64 = 11.0;
/// Zoom applied when a place is selected from the chat list
pub const SELECTED_ZOOM: f64 = 16.0;
/// Below this zoom nearby markers collapse into clusters
pub const CLUSTER_ZOOM_THRESHOLD: f64 = 13.0;
const MIN_ZOOM: f64 = 2.0;
const MAX_ZOOM: f64 = 20.0;
/// Cluster cell edge in screen pixels, on 256px tiles
const CLUSTER_CELL_PX: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    Unselected,
    Hovered,
    Selected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LowZoomPolicy {
    #[default]
    AllPlaces,
    /// Only certified places are drawn below the cluster threshold
    CertifiedOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapItem {
    Marker {
        place_id: i64,
        position: LatLng,
        state: MarkerState,
    },
    Cluster {
        center: LatLng,
        place_ids: Vec<i64>,
    },
}

#[derive(Debug, Default)]
pub struct MapView {
    places: Vec<Place>,
    viewport: Viewport,
    hovered: Option<i64>,
    selected: Option<i64>,
    low_zoom_policy: LowZoomPolicy,
}

impl MapView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_low_zoom_policy(mut self, policy: LowZoomPolicy) -> Self {
        self.low_zoom_policy = policy;
        self
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    /// Replaces the result set. Hover and selection on places that left the
    /// set are dropped.
    pub fn set_places(&mut self, places: Vec<Place>) {
        self.places = places;
        if self.hovered.is_some_and(|id| self.place(id).is_none()) {
            self.hovered = None;
        }
        if self.selected.is_some_and(|id| self.place(id).is_none()) {
            self.selected = None;
        }
    }

    pub fn place(&self, id: i64) -> Option<&Place> {
        self.places.iter().find(|p| p.id == id)
    }

    pub fn marker_state(&self, id: i64) -> MarkerState {
        if self.selected == Some(id) {
            MarkerState::Selected
        } else if self.hovered == Some(id) {
            MarkerState::Hovered
        } else {
            MarkerState::Unselected
        }
    }

    pub fn hover(&mut self, id: i64) {
        if self.place(id).is_some() {
            self.hovered = Some(id);
        }
    }

    pub fn unhover(&mut self, id: i64) {
        if self.hovered == Some(id) {
            self.hovered = None;
        }
    }

    /// Selects a place and pans to it. Returns false for unknown ids.
    pub fn select(&mut self, id: i64) -> bool {
        let Some(place) = self.place(id) else {
            return false;
        };
        if let Some((lat, lng)) = place.coordinates() {
            self.viewport = Viewport {
                center: LatLng { lat, lng },
                zoom: self.viewport.zoom.max(SELECTED_ZOOM),
            };
        }
        self.selected = Some(id);
        true
    }

    /// Viewport is left where it is
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Place whose popup is open: the selection wins over a hover
    pub fn popup_place(&self) -> Option<&Place> {
        self.selected
            .or(self.hovered)
            .and_then(|id| self.place(id))
    }

    /// Closes the open popup. Returns the id whose selection was cleared so
    /// the chat list can drop its highlight too.
    pub fn close_popup(&mut self) -> Option<i64> {
        if let Some(id) = self.selected.take() {
            if self.hovered == Some(id) {
                self.hovered = None;
            }
            return Some(id);
        }
        self.hovered = None;
        None
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.viewport.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn pan_to(&mut self, center: LatLng) {
        self.viewport.center = center;
    }

    /// Markers and clusters for the current zoom. Places without
    /// coordinates are never drawn; the selected place is always a marker.
    pub fn items(&self) -> Vec<MapItem> {
        let zoom = self.viewport.zoom;
        let mut items = Vec::new();

        if zoom >= CLUSTER_ZOOM_THRESHOLD {
            for place in &self.places {
                if let Some(item) = self.marker(place) {
                    items.push(item);
                }
            }
            return items;
        }

        let cell = cell_degrees(zoom);
        let mut cells: BTreeMap<(i64, i64), Vec<&Place>> = BTreeMap::new();

        for place in &self.places {
            let Some((lat, lng)) = place.coordinates() else {
                continue;
            };
            if self.selected == Some(place.id) {
                if let Some(item) = self.marker(place) {
                    items.push(item);
                }
                continue;
            }
            if self.low_zoom_policy == LowZoomPolicy::CertifiedOnly && !place.is_certified() {
                continue;
            }
            let key = ((lat / cell).floor() as i64, (lng / cell).floor() as i64);
            cells.entry(key).or_default().push(place);
        }

        for members in cells.into_values() {
            if let [single] = members.as_slice() {
                if let Some(item) = self.marker(single) {
                    items.push(item);
                }
                continue;
            }
            let count = members.len() as f64;
            let (lat_sum, lng_sum) = members
                .iter()
                .filter_map(|p| p.coordinates())
                .fold((0.0, 0.0), |(a, b), (lat, lng)| (a + lat, b + lng));
            items.push(MapItem::Cluster {
                center: LatLng {
                    lat: lat_sum / count,
                    lng: lng_sum / count,
                },
                place_ids: members.iter().map(|p| p.id).collect(),
            });
        }

        items
    }

    fn marker(&self, place: &Place) -> Option<MapItem> {
        let (lat, lng) = place.coordinates()?;
        Some(MapItem::Marker {
            place_id: place.id,
            position: LatLng { lat, lng },
            state: self.marker_state(place.id),
        })
    }
}

fn cell_degrees(zoom: f64) -> f64 {
    360.0 / 2f64.powf(zoom) * (CLUSTER_CELL_PX / 256.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::place::sample_place;

    fn located(id: i64, lat: f64, lng: f64) -> Place {
        let mut place = sample_place(id, &format!("Place {}", id));
        place.latitude = Some(lat);
        place.longitude = Some(lng);
        place
    }

    fn map() -> MapView {
        let mut map = MapView::new();
        map.set_places(vec![
            located(1, 35.6938, 139.7034),
            located(2, 35.6939, 139.7035),
            located(3, 34.6937, 135.5023),
            sample_place(4, "No coordinates"),
        ]);
        map
    }

    #[test]
    fn test_hover_and_unhover() {
        let mut map = map();
        map.hover(1);
        assert_eq!(map.marker_state(1), MarkerState::Hovered);
        assert_eq!(map.popup_place().unwrap().id, 1);

        map.unhover(2);
        assert_eq!(map.marker_state(1), MarkerState::Hovered);
        map.unhover(1);
        assert_eq!(map.marker_state(1), MarkerState::Unselected);
        assert!(map.popup_place().is_none());
    }

    #[test]
    fn test_select_pans_and_zooms() {
        let mut map = map();
        assert!(map.select(3));
        assert_eq!(map.marker_state(3), MarkerState::Selected);

        let viewport = map.viewport();
        assert_eq!(viewport.center, LatLng { lat: 34.6937, lng: 135.5023 });
        assert_eq!(viewport.zoom, SELECTED_ZOOM);

        assert!(!map.select(999));
        assert_eq!(map.selected(), Some(3));
    }

    #[test]
    fn test_clear_selection_keeps_viewport() {
        let mut map = map();
        map.select(1);
        let before = map.viewport();
        map.clear_selection();
        assert_eq!(map.viewport(), before);
        assert_eq!(map.marker_state(1), MarkerState::Unselected);
    }

    #[test]
    fn test_close_popup_reports_cleared_selection() {
        let mut map = map();
        map.hover(2);
        map.select(1);
        assert_eq!(map.popup_place().unwrap().id, 1);

        assert_eq!(map.close_popup(), Some(1));
        assert_eq!(map.selected(), None);
        // Hover popup remains until it is closed as well
        assert_eq!(map.popup_place().unwrap().id, 2);
        assert_eq!(map.close_popup(), None);
        assert!(map.popup_place().is_none());
    }

    #[test]
    fn test_selection_dropped_when_place_leaves_results() {
        let mut map = map();
        map.select(1);
        map.set_places(vec![located(3, 34.6937, 135.5023)]);
        assert_eq!(map.selected(), None);
    }

    #[test]
    fn test_low_zoom_clusters_nearby_places() {
        let mut map = map();
        map.set_zoom(8.0);

        let items = map.items();
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(|item| matches!(
            item,
            MapItem::Cluster { place_ids, .. } if place_ids == &vec![1, 2]
        )));
        assert!(items
            .iter()
            .any(|item| matches!(item, MapItem::Marker { place_id: 3, .. })));
    }

    #[test]
    fn test_high_zoom_draws_every_located_place() {
        let mut map = map();
        map.set_zoom(CLUSTER_ZOOM_THRESHOLD);
        let items = map.items();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| matches!(item, MapItem::Marker { .. })));
    }

    #[test]
    fn test_certified_only_policy_at_low_zoom() {
        let mut certified = located(5, 43.0618, 141.3545);
        certified.halal_status = Some("Halal Certified".into());

        let mut map = MapView::new().with_low_zoom_policy(LowZoomPolicy::CertifiedOnly);
        map.set_places(vec![located(1, 35.6938, 139.7034), certified]);
        map.set_zoom(6.0);

        let items = map.items();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], MapItem::Marker { place_id: 5, .. }));

        // Selected places are always drawn
        map.select(1);
        map.set_zoom(6.0);
        assert_eq!(map.items().len(), 2);
    }
}
