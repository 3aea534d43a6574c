//! Clickable-region registry for mouse interaction with the bar.
//!
//! Tracks button positions on the bar row and maps clicks to actions, so
//! the host can consume a click without moving focus off the terminal.

use std::sync::{Arc, RwLock};

/// A clickable region on the bar row.
#[derive(Debug, Clone)]
pub struct Region {
    /// Start x position (1-based, inclusive)
    pub start_x: u16,
    /// End x position (1-based, inclusive)
    pub end_x: u16,
    /// Action to perform when clicked
    pub action: BarAction,
}

/// Action a clicked region triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarAction {
    /// Send the key button at this index in the key table.
    Key(usize),
    /// Toggle the microphone button at this index in the locale list.
    Mic(usize),
}

/// Thread-safe registry of clickable regions.
#[derive(Debug, Default, Clone)]
pub struct ButtonRegistry {
    regions: Arc<RwLock<Vec<Region>>>,
    /// Terminal row the bar occupies (1-based, 0 while unset)
    row: Arc<RwLock<u16>>,
}

impl ButtonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all registered regions.
    pub fn clear(&self) {
        if let Ok(mut regions) = self.regions.write() {
            regions.clear();
        }
    }

    /// Register a region at the given columns.
    pub fn register(&self, start_x: u16, end_x: u16, action: BarAction) {
        if let Ok(mut regions) = self.regions.write() {
            regions.push(Region {
                start_x,
                end_x,
                action,
            });
        }
    }

    /// Set the terminal row the bar is drawn on.
    pub fn set_row(&self, y: u16) {
        if let Ok(mut row) = self.row.write() {
            *row = y;
        }
    }

    /// Get the terminal row the bar is drawn on.
    pub fn row(&self) -> u16 {
        self.row.read().map(|row| *row).unwrap_or(0)
    }

    /// Rebuild regions from the rendered buttons, in display order.
    /// Layout mirrors `render_line`: `[label]` cells joined by one space.
    pub fn layout(&self, buttons: &[(String, BarAction)]) {
        self.clear();
        let mut x: u16 = 1;
        for (label, action) in buttons {
            let width = label.chars().count() as u16 + 2;
            self.register(x, x + width - 1, *action);
            x += width + 1;
        }
    }

    /// Find the action at the given terminal coordinates.
    /// Returns the action if a button was clicked.
    pub fn find_at(&self, x: u16, y: u16) -> Option<BarAction> {
        let row = self.row();
        if row == 0 || y != row {
            return None;
        }
        let regions = self.regions.read().ok()?;
        for region in regions.iter() {
            if x >= region.start_x && x <= region.end_x {
                return Some(region.action);
            }
        }
        None
    }
}
